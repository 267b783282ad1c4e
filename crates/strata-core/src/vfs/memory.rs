//! In-memory filesystem implementation.
//!
//! Used in tests where no real-filename guarantees are needed. All data is
//! ephemeral.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::sync::RwLock;

use super::traits::{normalize, not_found, DirEntry, FileInfo, Filesystem};

#[derive(Debug, Clone)]
enum Entry {
    File { data: Vec<u8>, modified: SystemTime },
    Directory,
}

/// In-memory filesystem. Thread-safe via internal `RwLock`.
#[derive(Debug)]
pub struct MemoryFs {
    entries: RwLock<HashMap<PathBuf, Entry>>,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    /// Create a new empty in-memory filesystem.
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        // Root directory always exists.
        entries.insert(PathBuf::new(), Entry::Directory);
        Self {
            entries: RwLock::new(entries),
        }
    }

    async fn ensure_parents(&self, path: &Path) {
        let mut entries = self.entries.write().await;
        let mut current = PathBuf::new();
        for component in path.parent().into_iter().flat_map(|p| p.components()) {
            if let std::path::Component::Normal(s) = component {
                current.push(s);
                entries.entry(current.clone()).or_insert(Entry::Directory);
            }
        }
    }

    fn info_for(path: &Path, entry: &Entry) -> FileInfo {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match entry {
            Entry::File { data, modified } => {
                let mut e = DirEntry::file(name, data.len() as u64);
                e.modified = Some(*modified);
                FileInfo::new(e)
            }
            Entry::Directory => FileInfo::new(DirEntry::directory(name)),
        }
    }
}

#[async_trait]
impl Filesystem for MemoryFs {
    async fn stat(&self, path: &Path) -> io::Result<FileInfo> {
        let normalized = normalize(path);
        let entries = self.entries.read().await;
        match entries.get(&normalized) {
            Some(entry) => Ok(Self::info_for(&normalized, entry)),
            None => Err(not_found(path)),
        }
    }

    async fn read_dir(&self, path: &Path) -> io::Result<Vec<FileInfo>> {
        let normalized = normalize(path);
        let entries = self.entries.read().await;

        match entries.get(&normalized) {
            Some(Entry::Directory) => {}
            Some(Entry::File { .. }) => {
                return Err(io::Error::new(
                    io::ErrorKind::NotADirectory,
                    format!("not a directory: {}", path.display()),
                ))
            }
            None => return Err(not_found(path)),
        }

        let mut result: Vec<FileInfo> = entries
            .iter()
            .filter(|(p, _)| p.parent() == Some(normalized.as_path()) && **p != normalized)
            .map(|(p, e)| Self::info_for(p, e))
            .collect();

        result.sort_by(|a, b| a.entry.name.cmp(&b.entry.name));
        Ok(result)
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let normalized = normalize(path);
        let entries = self.entries.read().await;
        match entries.get(&normalized) {
            Some(Entry::File { data, .. }) => Ok(data.clone()),
            Some(Entry::Directory) => Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("is a directory: {}", path.display()),
            )),
            None => Err(not_found(path)),
        }
    }

    async fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let normalized = normalize(path);
        self.ensure_parents(&normalized).await;

        let mut entries = self.entries.write().await;
        if let Some(Entry::Directory) = entries.get(&normalized) {
            return Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("is a directory: {}", path.display()),
            ));
        }
        entries.insert(
            normalized,
            Entry::File {
                data: data.to_vec(),
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    async fn mkdir(&self, path: &Path) -> io::Result<()> {
        let normalized = normalize(path);
        self.ensure_parents(&normalized).await;

        let mut entries = self.entries.write().await;
        match entries.get(&normalized) {
            Some(Entry::Directory) => Ok(()),
            Some(Entry::File { .. }) => Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("file exists: {}", path.display()),
            )),
            None => {
                entries.insert(normalized, Entry::Directory);
                Ok(())
            }
        }
    }

    async fn remove(&self, path: &Path) -> io::Result<()> {
        let normalized = normalize(path);
        if normalized.as_os_str().is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "cannot remove root directory",
            ));
        }

        let mut entries = self.entries.write().await;
        if let Some(Entry::Directory) = entries.get(&normalized) {
            let has_children = entries
                .keys()
                .any(|k| k.parent() == Some(normalized.as_path()) && *k != normalized);
            if has_children {
                return Err(io::Error::new(
                    io::ErrorKind::DirectoryNotEmpty,
                    format!("directory not empty: {}", path.display()),
                ));
            }
        }

        entries.remove(&normalized).ok_or_else(|| not_found(path))?;
        Ok(())
    }

    fn read_only(&self) -> bool {
        false
    }
}
