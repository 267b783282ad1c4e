//! Per-language site configuration.

use serde::Deserialize;

/// One configured site language.
///
/// The filesystem builder needs the language code, its content directory
/// and its static directories; everything else about a language (titles,
/// weights, params) belongs to the rendering layer.
#[derive(Debug, Clone, Deserialize)]
pub struct Language {
    /// Language code, e.g. "en", "nn".
    pub lang: String,

    /// Content directory for this language, relative to the working dir.
    /// Empty means "use the default content language's directory".
    #[serde(default)]
    pub content_dir: String,

    /// Static directories for this language, relative to the working dir.
    /// Later entries win over earlier ones when they overlap.
    #[serde(default)]
    pub static_dirs: Vec<String>,
}

impl Language {
    /// Create a language with just a code.
    pub fn new(lang: impl Into<String>) -> Self {
        Self {
            lang: lang.into(),
            content_dir: String::new(),
            static_dirs: Vec::new(),
        }
    }

    /// Set the content directory.
    pub fn with_content_dir(mut self, dir: impl Into<String>) -> Self {
        self.content_dir = dir.into();
        self
    }

    /// Add a static directory.
    pub fn with_static_dir(mut self, dir: impl Into<String>) -> Self {
        self.static_dirs.push(dir.into());
        self
    }
}
