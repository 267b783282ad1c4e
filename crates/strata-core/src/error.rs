//! Error types for module resolution and filesystem construction.
//!
//! The filesystem layers themselves speak `std::io::Error`: a missing path
//! is `ErrorKind::NotFound` (so overlays can fall through to the next
//! layer) and a write on a read-only layer is `ErrorKind::PermissionDenied`.
//! This enum covers everything above that: configuration, module
//! resolution, and build-time validation. The collector and the builder
//! fail fast on the first error; nothing is accumulated.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for module collection and filesystem building.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from module collection and source-filesystem construction.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid site or module configuration. Fatal at build start.
    #[error("invalid module config{}: {reason}", fmt_module(.module))]
    Config {
        /// Module path the config belongs to, if known.
        module: Option<String>,
        reason: String,
    },

    /// An import could not be located in the vendor directory, the module
    /// manager, or the themes directory.
    #[error("module {path:?} not found; either add it as a module or store it in {themes_dir:?}{}", fmt_hint(.hint))]
    ModuleNotFound {
        path: String,
        themes_dir: PathBuf,
        /// Extra guidance when the project has a module manifest but the
        /// manager binary is missing or too old.
        hint: Option<String>,
    },

    /// A declared mount source does not exist on disk.
    #[error("invalid module config for {module:?}: mount source not found: {mount_source:?}")]
    MountSourceNotFound {
        module: String,
        mount_source: PathBuf,
    },

    /// Two of the project's content directories nest inside each other.
    #[error("found overlapping content dirs ({0:?} and {1:?})")]
    OverlappingContentDirs(PathBuf, PathBuf),

    /// The vendor manifest could not be parsed.
    #[error("invalid modules list: {0:?}")]
    InvalidVendorManifest(PathBuf),

    /// The module manager subprocess failed.
    #[error("go command failed: {stderr}")]
    Manager { stderr: String },

    /// Underlying filesystem error, propagated verbatim with path context.
    #[error("{path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Wrap an `io::Error` with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// A configuration error not tied to a particular module.
    pub fn config(reason: impl Into<String>) -> Self {
        Error::Config {
            module: None,
            reason: reason.into(),
        }
    }

    /// A configuration error for a named module.
    pub fn module_config(module: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Config {
            module: Some(module.into()),
            reason: reason.into(),
        }
    }
}

fn fmt_module(module: &Option<String>) -> String {
    match module {
        Some(m) => format!(" for {m:?}"),
        None => String::new(),
    }
}

fn fmt_hint(hint: &Option<String>) -> String {
    match hint {
        Some(h) => format!(": {h}"),
        None => String::new(),
    }
}
