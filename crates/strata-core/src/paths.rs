//! Project path configuration consumed by the filesystem builder.

use std::path::{Path, PathBuf};

use strata_types::Language;

/// Where everything lives for one project build.
///
/// Directory values are relative to `working_dir` unless absolute. An empty
/// directory value means "not configured" and fails the build for the
/// components that require it.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Absolute path to the project directory.
    pub working_dir: PathBuf,
    /// Absolute path to the themes directory.
    pub themes_dir: PathBuf,

    /// The language whose content is served unprefixed, e.g. "en".
    pub default_content_language: String,
    /// All configured site languages, including the default.
    pub languages: Vec<Language>,
    /// One static filesystem and publish subfolder per language.
    pub multihost: bool,

    pub data_dir: String,
    pub i18n_dir: String,
    pub layout_dir: String,
    pub archetype_dir: String,
    pub asset_dir: String,
    pub resource_dir: String,
}

impl Paths {
    /// Paths with the conventional directory layout below `working_dir`.
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        let working_dir = working_dir.into();
        Self {
            themes_dir: working_dir.join("themes"),
            working_dir,
            default_content_language: "en".to_string(),
            languages: vec![Language::new("en").with_content_dir("content")],
            multihost: false,
            data_dir: "data".to_string(),
            i18n_dir: "i18n".to_string(),
            layout_dir: "layouts".to_string(),
            archetype_dir: "archetypes".to_string(),
            asset_dir: "assets".to_string(),
            resource_dir: "resources".to_string(),
        }
    }

    /// Make a configured directory absolute below the working dir.
    pub fn abs_pathify(&self, dir: impl AsRef<Path>) -> PathBuf {
        let dir = dir.as_ref();
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.working_dir.join(dir)
        }
    }

    /// The content directory of the default content language, falling back
    /// to the conventional "content".
    pub fn default_content_dir(&self) -> String {
        self.languages
            .iter()
            .find(|l| l.lang == self.default_content_language)
            .map(|l| l.content_dir.clone())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| "content".to_string())
    }
}
