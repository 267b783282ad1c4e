//! The module record.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::client::GoModule;
use super::config::{ModuleConfig, Mount};

/// One resolved module.
///
/// Covers the project itself, vendored copies, manager-resolved modules and
/// plain theme folders with the same shape; a manager-resolved module
/// additionally carries its [`GoModule`] record.
#[derive(Debug)]
pub struct Module {
    pub(crate) path: String,
    pub(crate) dir: PathBuf,
    pub(crate) version: String,
    pub(crate) vendored: bool,
    /// The first module that imported this one; `None` for the project.
    pub(crate) owner: Option<Arc<Module>>,
    pub(crate) gomod: Option<GoModule>,
    pub(crate) mounts: Vec<Mount>,
    pub(crate) config: Option<ModuleConfig>,
    pub(crate) config_filename: Option<PathBuf>,
}

impl Module {
    /// The module path, e.g. "github.com/bep/mycomponent", or the folder
    /// name below the themes directory.
    pub fn path(&self) -> &str {
        if self.path.is_empty() {
            if let Some(gomod) = &self.gomod {
                return &gomod.path;
            }
        }
        &self.path
    }

    /// Directory holding the files for this module. May point below the
    /// vendor directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The module version; empty for the project and theme-folder modules.
    pub fn version(&self) -> &str {
        if self.version.is_empty() {
            if let Some(gomod) = &self.gomod {
                return &gomod.version;
            }
        }
        &self.version
    }

    /// Whether this module was resolved through the module manager.
    pub fn is_managed(&self) -> bool {
        self.gomod.is_some()
    }

    /// Whether the directory points below the project's vendor dir.
    pub fn vendored(&self) -> bool {
        self.vendored
    }

    /// The first module that defined this module as a dependency; `None`
    /// for the project pseudo-module.
    pub fn owner(&self) -> Option<&Arc<Module>> {
        self.owner.as_ref()
    }

    /// The manager module replacing this one, if any.
    pub fn replace(&self) -> Option<&GoModule> {
        if self.vendored {
            return None;
        }
        self.gomod.as_ref().and_then(|g| g.replace.as_deref())
    }

    /// The directory remappings, with defaults applied.
    pub fn mounts(&self) -> &[Mount] {
        &self.mounts
    }

    /// The module's own configuration, if it has a config file.
    pub fn config(&self) -> Option<&ModuleConfig> {
        self.config.as_ref()
    }

    /// The configuration filename, e.g. ".../themes/mytheme/config.toml".
    pub fn config_filename(&self) -> Option<&Path> {
        self.config_filename.as_deref()
    }

    /// "path@version" with a "+vendor" suffix for vendored modules; just
    /// the path when there is no version (the project itself).
    pub fn path_version(&self) -> String {
        let mut version = self.version().to_string();
        if self.vendored {
            version.push_str("+vendor");
        }
        if version.is_empty() {
            self.path().to_string()
        } else {
            format!("{}@{}", self.path(), version)
        }
    }
}

/// The identity key for a module path: major-version suffix stripped,
/// lowercased. Multiple major versions of the same module cannot coexist;
/// the first occurrence wins.
pub fn path_key(path: &str) -> String {
    let stripped = match path.rsplit_once('/') {
        Some((prefix, last)) if is_major_version(last) => prefix,
        _ => path,
    };
    stripped.to_lowercase()
}

fn is_major_version(segment: &str) -> bool {
    match segment.strip_prefix('v') {
        Some(digits) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
            digits.parse::<u32>().map(|n| n >= 2).unwrap_or(false)
        }
        _ => false,
    }
}
