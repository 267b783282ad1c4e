//! Core VFS trait and the decorated file-info types.

use async_trait::async_trait;
use std::fmt;
use std::io;
use std::path::{Component as PathComponent, Path, PathBuf};
use std::sync::Arc;

pub use strata_types::{DirEntry, DirEntryKind};

/// Per-file metadata carried alongside every file-info record.
///
/// Layers fill these in as a record passes through them; a field that is
/// already set is never overwritten (the layer closest to the real file
/// wins). `weight == 0` means "no weight assigned".
#[derive(Clone, Default)]
pub struct FileMeta {
    /// Real absolute path of the file in the underlying filesystem.
    pub filename: Option<PathBuf>,
    /// Path relative to the virtual root the entry was obtained through.
    pub path: Option<PathBuf>,
    /// Language tag.
    pub lang: Option<String>,
    /// Language match weight; see `LanguageFs`.
    pub weight: i32,
    /// Base filename with extension and language code stripped,
    /// e.g. "myarticle.en.md" becomes "myarticle".
    pub translation_base_name: Option<String>,
    /// The filesystem the entry was obtained through. Set on directories so
    /// callers can recurse without knowing the composition.
    pub fs: Option<Arc<dyn Filesystem>>,
}

impl FileMeta {
    /// Merge `other` into `self`. Fields already set on `self` are kept.
    pub fn merge(&mut self, other: FileMeta) {
        if self.filename.is_none() {
            self.filename = other.filename;
        }
        if self.path.is_none() {
            self.path = other.path;
        }
        if self.lang.is_none() {
            self.lang = other.lang;
        }
        if self.weight == 0 {
            self.weight = other.weight;
        }
        if self.translation_base_name.is_none() {
            self.translation_base_name = other.translation_base_name;
        }
        if self.fs.is_none() {
            self.fs = other.fs;
        }
    }

    /// Read the file contents via its real filename.
    pub async fn open(&self) -> io::Result<Vec<u8>> {
        match &self.filename {
            Some(filename) => tokio::fs::read(filename).await,
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "file opener not found",
            )),
        }
    }
}

impl fmt::Debug for FileMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileMeta")
            .field("filename", &self.filename)
            .field("path", &self.path)
            .field("lang", &self.lang)
            .field("weight", &self.weight)
            .field("translation_base_name", &self.translation_base_name)
            .field("fs", &self.fs.as_ref().map(|_| "..."))
            .finish()
    }
}

/// A directory entry plus the metadata the virtual layers attached to it.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub entry: DirEntry,
    pub meta: FileMeta,
}

impl FileInfo {
    pub fn new(entry: DirEntry) -> Self {
        Self {
            entry,
            meta: FileMeta::default(),
        }
    }

    /// A synthetic directory entry carrying only a name. Used for virtual
    /// roots that have no on-disk counterpart.
    pub fn dir_name_only(name: impl Into<String>) -> Self {
        Self::new(DirEntry::directory(name))
    }

    pub fn name(&self) -> &str {
        &self.entry.name
    }

    pub fn is_dir(&self) -> bool {
        self.entry.is_dir()
    }

    pub fn is_file(&self) -> bool {
        self.entry.is_file()
    }
}

/// Abstract read-mostly filesystem interface.
///
/// All operations use paths relative to the filesystem root. Write
/// operations default to permission-denied; only layers that explicitly
/// support writing override them.
#[async_trait]
pub trait Filesystem: Send + Sync {
    /// Get metadata for a file or directory, following symlinks.
    async fn stat(&self, path: &Path) -> io::Result<FileInfo>;

    /// Get metadata without following symlinks. Layers that cannot tell
    /// the difference fall back to `stat`.
    async fn lstat(&self, path: &Path) -> io::Result<FileInfo> {
        self.stat(path).await
    }

    /// List entries in a directory.
    async fn read_dir(&self, path: &Path) -> io::Result<Vec<FileInfo>>;

    /// Read the entire contents of a file.
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Write data to a file, creating it if it doesn't exist.
    async fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let _ = (path, data);
        Err(permission_denied())
    }

    /// Create a directory (and parent directories if needed).
    async fn mkdir(&self, path: &Path) -> io::Result<()> {
        let _ = path;
        Err(permission_denied())
    }

    /// Remove a file or empty directory.
    async fn remove(&self, path: &Path) -> io::Result<()> {
        let _ = path;
        Err(permission_denied())
    }

    /// Returns true if this filesystem rejects writes.
    fn read_only(&self) -> bool {
        true
    }

    /// Resolve a path to a real on-disk path, if this filesystem is backed
    /// by the real filesystem.
    fn real_path(&self, path: &Path) -> Option<PathBuf> {
        let _ = path;
        None
    }

    /// Check if a path exists.
    async fn exists(&self, path: &Path) -> bool {
        self.stat(path).await.is_ok()
    }
}

/// The permission error returned for writes on read-only layers.
pub(crate) fn permission_denied() -> io::Error {
    io::Error::new(io::ErrorKind::PermissionDenied, "filesystem is read-only")
}

pub(crate) fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("not found: {}", path.display()),
    )
}

/// Normalize a path: remove leading `/`, resolve `.` and `..`.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            PathComponent::RootDir => {}
            PathComponent::CurDir => {}
            PathComponent::ParentDir => {
                result.pop();
            }
            PathComponent::Normal(s) => {
                result.push(s);
            }
            PathComponent::Prefix(_) => {}
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/b/c")), PathBuf::from("a/b/c"));
        assert_eq!(normalize(Path::new("a/./b")), PathBuf::from("a/b"));
        assert_eq!(normalize(Path::new("a/x/../b")), PathBuf::from("a/b"));
        assert_eq!(normalize(Path::new("/")), PathBuf::new());
    }

    #[test]
    fn test_meta_merge_keeps_present_fields() {
        let mut meta = FileMeta {
            lang: Some("en".to_string()),
            weight: 2,
            ..Default::default()
        };
        meta.merge(FileMeta {
            lang: Some("sv".to_string()),
            weight: 1,
            filename: Some(PathBuf::from("/real/file.txt")),
            ..Default::default()
        });

        assert_eq!(meta.lang.as_deref(), Some("en"));
        assert_eq!(meta.weight, 2);
        assert_eq!(meta.filename, Some(PathBuf::from("/real/file.txt")));
    }

    #[tokio::test]
    async fn test_meta_open_without_filename() {
        let meta = FileMeta::default();
        let err = meta.open().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
