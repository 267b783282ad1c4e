//! Local filesystem backend with real-filename decoration.
//!
//! Every `stat`/`lstat`/`read_dir` result is decorated with the absolute
//! on-disk path (`meta.filename`), so the real location of a file survives
//! any number of virtual layers stacked on top.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::traits::{normalize, permission_denied, DirEntry, DirEntryKind, FileInfo, Filesystem};

/// Local filesystem rooted at a directory.
///
/// All operations are relative to `root`. With [`DiskFs::os`] the root is
/// empty and callers pass absolute paths through unchanged.
#[derive(Debug, Clone)]
pub struct DiskFs {
    root: PathBuf,
    read_only: bool,
}

impl DiskFs {
    /// Create a writable filesystem rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            read_only: false,
        }
    }

    /// Create a read-only filesystem rooted at the given directory.
    pub fn read_only(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            read_only: true,
        }
    }

    /// A read-only passthrough for absolute paths.
    pub fn os() -> Self {
        Self {
            root: PathBuf::new(),
            read_only: true,
        }
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path to the real path below the root.
    fn resolve(&self, path: &Path) -> PathBuf {
        if self.root.as_os_str().is_empty() {
            return path.to_path_buf();
        }
        self.root.join(normalize(path))
    }

    fn check_writable(&self) -> io::Result<()> {
        if self.read_only {
            Err(permission_denied())
        } else {
            Ok(())
        }
    }

    fn entry_name(full: &Path) -> String {
        full.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn info_from(full: PathBuf, meta: std::fs::Metadata) -> FileInfo {
        let entry = DirEntry {
            name: Self::entry_name(&full),
            kind: if meta.is_dir() {
                DirEntryKind::Directory
            } else {
                DirEntryKind::File
            },
            size: meta.len(),
            modified: meta.modified().ok(),
        };
        let mut info = FileInfo::new(entry);
        info.meta.filename = Some(full);
        info
    }
}

#[async_trait]
impl Filesystem for DiskFs {
    async fn stat(&self, path: &Path) -> io::Result<FileInfo> {
        let full = self.resolve(path);
        let meta = fs::metadata(&full).await?;
        Ok(Self::info_from(full, meta))
    }

    async fn lstat(&self, path: &Path) -> io::Result<FileInfo> {
        let full = self.resolve(path);
        let meta = fs::symlink_metadata(&full).await?;
        Ok(Self::info_from(full, meta))
    }

    async fn read_dir(&self, path: &Path) -> io::Result<Vec<FileInfo>> {
        let full = self.resolve(path);
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&full).await?;

        while let Some(entry) = dir.next_entry().await? {
            // Re-stat each child so every listing entry carries its real
            // absolute filename.
            let child = full.join(entry.file_name());
            let meta = fs::metadata(&child).await?;
            entries.push(Self::info_from(child, meta));
        }

        entries.sort_by(|a, b| a.entry.name.cmp(&b.entry.name));
        Ok(entries)
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(self.resolve(path)).await
    }

    async fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        self.check_writable()?;
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&full, data).await
    }

    async fn mkdir(&self, path: &Path) -> io::Result<()> {
        self.check_writable()?;
        fs::create_dir_all(self.resolve(path)).await
    }

    async fn remove(&self, path: &Path) -> io::Result<()> {
        self.check_writable()?;
        let full = self.resolve(path);
        let meta = fs::metadata(&full).await?;
        if meta.is_dir() {
            fs::remove_dir(&full).await
        } else {
            fs::remove_file(&full).await
        }
    }

    fn read_only(&self) -> bool {
        self.read_only
    }

    fn real_path(&self, path: &Path) -> Option<PathBuf> {
        Some(self.resolve(path))
    }
}
