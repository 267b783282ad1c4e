//! Language-partitioned filesystem.
//!
//! Merges several language-tagged filesystems into one. The first provider
//! is the root; the rest are fallback layers. Listing a directory yields
//! the entries of every layer, each tagged with a language and a match
//! weight, and duplicates are resolved by weight:
//!
//! - a filename with no language code inherits the provider's language
//!   (weight 0, never deduplicated against other weight-0 entries)
//! - a filename with a recognized language code is authoritative
//!   (weight 1, or 2 when the code matches the provider's language)
//!
//! So `myfile.sv.txt` inside the sv filesystem beats the same name coming
//! from another layer.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::Path;
use std::sync::{Arc, Weak};

use super::traits::{not_found, FileInfo, Filesystem};

/// One language-tagged source filesystem.
pub struct LangProvider {
    pub lang: String,
    pub fs: Arc<dyn Filesystem>,
}

impl LangProvider {
    pub fn new(lang: impl Into<String>, fs: Arc<dyn Filesystem>) -> Self {
        Self {
            lang: lang.into(),
            fs,
        }
    }
}

/// The merged, language-aware view over an ordered provider chain.
pub struct LanguageFs {
    providers: Vec<LangProvider>,
    languages: HashSet<String>,
    // Handed out as the sub-fs handle on directory entries.
    me: Weak<LanguageFs>,
}

impl std::fmt::Debug for LanguageFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageFs").finish_non_exhaustive()
    }
}

impl LanguageFs {
    /// Create a new language filesystem from an ordered provider chain and
    /// the set of recognized language codes.
    pub fn new(
        languages: HashSet<String>,
        providers: Vec<LangProvider>,
    ) -> io::Result<Arc<Self>> {
        if providers.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "requires at least 1 filesystem",
            ));
        }
        Ok(Arc::new_cyclic(|me| Self {
            providers,
            languages,
            me: me.clone(),
        }))
    }

    /// Try to extract the language from a filename. Any recognized language
    /// code in the name wins over the language set on the filesystem, e.g.
    /// "mypost.en.md" is English wherever it is found.
    ///
    /// Returns `(file_lang, translation_base_name)` where `file_lang` is
    /// empty when the name carries no recognized code.
    fn lang_info_from(&self, name: &str) -> (String, String) {
        let mut base = name.to_string();
        if let Some(idx) = base.rfind('.') {
            if idx > 0 {
                base.truncate(idx);
            }
        }

        if let Some(idx) = base.rfind('.') {
            let candidate = &base[idx + 1..];
            if self.languages.contains(candidate) {
                let lang = candidate.to_string();
                base.truncate(idx);
                return (lang, base);
            }
        }

        (String::new(), base)
    }

    fn apply_meta(&self, provider: &LangProvider, mut info: FileInfo) -> FileInfo {
        if info.is_dir() {
            info.meta.fs = self.me.upgrade().map(|fs| fs as Arc<dyn Filesystem>);
            return info;
        }

        let (file_lang, translation_base_name) = self.lang_info_from(info.name());
        let mut lang = provider.lang.clone();
        let mut weight = 0;
        if !file_lang.is_empty() {
            weight = 1;
            if file_lang == provider.lang {
                // Give priority to myfile.sv.txt inside the sv filesystem.
                weight += 1;
            }
            lang = file_lang;
        }

        info.meta.lang = Some(lang);
        info.meta.weight = weight;
        info.meta.translation_base_name = Some(translation_base_name);
        info
    }

    /// Keep, for every set of file entries sharing a name, the one with the
    /// highest weight; ties break to the earliest layer. Directory entries
    /// and weight-0 files are never deduplicated.
    fn filter_duplicates(entries: Vec<FileInfo>) -> Vec<FileInfo> {
        let mut keep: HashMap<String, (usize, i32)> = HashMap::new();

        for (i, info) in entries.iter().enumerate() {
            if info.is_dir() {
                continue;
            }
            let weight = info.meta.weight;
            if weight > 0 {
                match keep.get(info.name()) {
                    Some((_, w)) if weight <= *w => {}
                    _ => {
                        keep.insert(info.name().to_string(), (i, weight));
                    }
                }
            }
        }

        if keep.is_empty() {
            return entries;
        }

        entries
            .into_iter()
            .enumerate()
            .filter(|(i, info)| {
                if info.is_dir() {
                    return true;
                }
                match keep.get(info.name()) {
                    Some((idx, _)) => idx == i,
                    None => true,
                }
            })
            .map(|(_, info)| info)
            .collect()
    }
}

#[async_trait]
impl Filesystem for LanguageFs {
    async fn stat(&self, path: &Path) -> io::Result<FileInfo> {
        for provider in &self.providers {
            match provider.fs.stat(path).await {
                Ok(info) => return Ok(self.apply_meta(provider, info)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Err(not_found(path))
    }

    async fn read_dir(&self, path: &Path) -> io::Result<Vec<FileInfo>> {
        let mut entries = Vec::new();

        for provider in &self.providers {
            match provider.fs.read_dir(path).await {
                Ok(children) => {
                    entries.extend(
                        children
                            .into_iter()
                            .map(|child| self.apply_meta(provider, child)),
                    );
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }

        Ok(Self::filter_duplicates(entries))
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        // Files are reached through their real filenames; only directories
        // are opened through the merged view.
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("files not supported: {}", path.display()),
        ))
    }
}
