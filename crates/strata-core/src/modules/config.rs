//! Module configuration decoding.
//!
//! A project or module declares its imports either through the modern
//! `[module]` table or the legacy `theme` key (a string or list of strings;
//! each entry becomes an import with default mounts). Declaring both is an
//! error.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use strata_types::Component;

use crate::error::{Error, Result};

/// The filenames a module's own configuration may use, searched in order.
pub const CONFIG_BASENAME: &str = "config";
pub const CONFIG_EXTENSIONS: [&str; 2] = ["toml", "json"];

/// Top-level module configuration: the ordered imports.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ModuleConfig {
    #[serde(default)]
    pub imports: Vec<Import>,
}

/// One module import.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Import {
    /// Module path, e.g. "github.com/bep/mycomponent", or the folder name
    /// below the themes directory.
    #[serde(default)]
    pub path: String,
    /// Directory remappings. Empty means "mount every component folder the
    /// module has".
    #[serde(default)]
    pub mounts: Vec<Mount>,
}

impl Import {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mounts: Vec::new(),
        }
    }
}

/// A declared graft of a module-relative source directory onto a target
/// path inside a component subtree.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Mount {
    /// Relative path in the module, e.g. "scss".
    #[serde(default)]
    pub source: PathBuf,
    /// Relative target path, e.g. "assets/bootstrap/scss". Must begin with
    /// a recognized component folder.
    #[serde(default)]
    pub target: PathBuf,
    /// Language tag for content mounts.
    #[serde(default)]
    pub lang: Option<String>,
}

impl Mount {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            lang: None,
        }
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    /// The component subtree this mount targets, if recognized.
    pub fn component(&self) -> Option<Component> {
        Component::from_target(&self.target)
    }

    /// Whether this mount targets the content component.
    pub fn is_content(&self) -> bool {
        self.component() == Some(Component::Content)
    }
}

/// The raw shape of a configuration file, restricted to the keys this layer
/// recognizes. Unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct RawModuleConfig {
    #[serde(default)]
    theme: Option<StringOrList>,
    #[serde(default)]
    module: Option<ModuleConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringOrList {
    One(String),
    Many(Vec<String>),
}

/// Decode the module configuration from a parsed configuration file.
pub fn decode_config(raw: RawModuleConfig) -> Result<ModuleConfig> {
    if raw.theme.is_some() && raw.module.is_some() {
        return Err(Error::config(
            "ambiguous module config; both 'theme' and 'module' provided",
        ));
    }

    if let Some(theme) = raw.theme {
        let paths = match theme {
            StringOrList::One(s) => vec![s],
            StringOrList::Many(v) => v,
        };
        return Ok(ModuleConfig {
            imports: paths.into_iter().map(Import::new).collect(),
        });
    }

    Ok(raw.module.unwrap_or_default())
}

/// Parse and decode a configuration file's module section by extension.
pub fn decode_config_file(filename: &Path, contents: &str) -> Result<ModuleConfig> {
    let raw: RawModuleConfig = match filename.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(contents)
            .map_err(|e| Error::config(format!("{}: {e}", filename.display())))?,
        Some("json") => serde_json::from_str(contents)
            .map_err(|e| Error::config(format!("{}: {e}", filename.display())))?,
        other => {
            return Err(Error::config(format!(
                "unsupported config format {:?} for {}",
                other.unwrap_or(""),
                filename.display()
            )))
        }
    };
    decode_config(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_config() {
        let toml_config = r#"
[module]
[[module.imports]]
path="github.com/bep/mycomponent"
[[module.imports.mounts]]
source="scss"
target="assets/bootstrap/scss"
[[module.imports.mounts]]
source="src/markdown/blog"
target="content/blog"
lang="en"
"#;
        let cfg = decode_config_file(Path::new("config.toml"), toml_config).unwrap();

        assert_eq!(cfg.imports.len(), 1);
        let imp = &cfg.imports[0];
        assert_eq!(imp.path, "github.com/bep/mycomponent");
        assert_eq!(imp.mounts[1].source, PathBuf::from("src/markdown/blog"));
        assert_eq!(imp.mounts[1].target, PathBuf::from("content/blog"));
        assert_eq!(imp.mounts[1].lang.as_deref(), Some("en"));
        assert!(imp.mounts[1].is_content());
        assert_eq!(imp.mounts[0].component(), Some(Component::Assets));
    }

    #[test]
    fn test_decode_legacy_theme() {
        let cfg = decode_config_file(Path::new("config.toml"), "theme = [\"a\", \"b\"]\n").unwrap();
        assert_eq!(cfg.imports.len(), 2);
        assert_eq!(cfg.imports[0].path, "a");
        assert_eq!(cfg.imports[1].path, "b");
        assert!(cfg.imports[0].mounts.is_empty());

        let cfg = decode_config_file(Path::new("config.toml"), "theme = \"a\"\n").unwrap();
        assert_eq!(cfg.imports.len(), 1);
        assert_eq!(cfg.imports[0].path, "a");
    }

    #[test]
    fn test_decode_both_old_and_new_is_an_error() {
        let toml_config = r#"
theme = ["a", "b"]

[module]
[[module.imports]]
path="github.com/bep/mycomponent"
"#;
        let err = decode_config_file(Path::new("config.toml"), toml_config).unwrap_err();
        assert!(err.to_string().contains("ambiguous"));
    }

    #[test]
    fn test_decode_json() {
        let json_config = r#"{"module": {"imports": [{"path": "mytheme"}]}}"#;
        let cfg = decode_config_file(Path::new("config.json"), json_config).unwrap();
        assert_eq!(cfg.imports[0].path, "mytheme");
    }
}
