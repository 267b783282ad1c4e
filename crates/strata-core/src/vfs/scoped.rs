//! Base-path scoping adaptor.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::traits::{normalize, FileInfo, Filesystem};

/// Exposes a subtree of another filesystem as a filesystem of its own.
///
/// A `ScopedFs` with base `layouts` turns `stat("index.html")` into
/// `inner.stat("layouts/index.html")`. The builder uses this to carve one
/// component subtree out of a module overlay.
pub struct ScopedFs {
    inner: Arc<dyn Filesystem>,
    base: PathBuf,
}

impl ScopedFs {
    pub fn new(inner: Arc<dyn Filesystem>, base: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            base: normalize(&base.into()),
        }
    }

    fn full(&self, path: &Path) -> PathBuf {
        self.base.join(normalize(path))
    }
}

#[async_trait]
impl Filesystem for ScopedFs {
    async fn stat(&self, path: &Path) -> io::Result<FileInfo> {
        self.inner.stat(&self.full(path)).await
    }

    async fn lstat(&self, path: &Path) -> io::Result<FileInfo> {
        self.inner.lstat(&self.full(path)).await
    }

    async fn read_dir(&self, path: &Path) -> io::Result<Vec<FileInfo>> {
        self.inner.read_dir(&self.full(path)).await
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.inner.read(&self.full(path)).await
    }

    fn real_path(&self, path: &Path) -> Option<PathBuf> {
        self.inner.real_path(&self.full(path))
    }
}
