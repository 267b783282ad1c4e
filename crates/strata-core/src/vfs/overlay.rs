//! Copy-on-write style overlay of two filesystems.
//!
//! The upper layer shadows the lower for identical paths. Reads fall
//! through to the lower layer only on not-found; listings are the union
//! with upper entries winning by name. Writes go to the upper layer when it
//! was composed writable, and are rejected otherwise.

use async_trait::async_trait;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::traits::{not_found, permission_denied, FileInfo, Filesystem};

/// Two-layer overlay; see the module docs.
pub struct OverlayFs {
    upper: Arc<dyn Filesystem>,
    lower: Arc<dyn Filesystem>,
    writable_upper: bool,
}

impl OverlayFs {
    /// Read-only overlay of `upper` over `lower`.
    pub fn new(upper: Arc<dyn Filesystem>, lower: Arc<dyn Filesystem>) -> Self {
        Self {
            upper,
            lower,
            writable_upper: false,
        }
    }

    /// Overlay whose upper layer accepts writes.
    pub fn writable(upper: Arc<dyn Filesystem>, lower: Arc<dyn Filesystem>) -> Self {
        Self {
            upper,
            lower,
            writable_upper: true,
        }
    }

    /// Fold an ordered list of layers into one overlay, first layer on
    /// top: the first-declared layer wins for any given path.
    pub fn stack(mut layers: Vec<Arc<dyn Filesystem>>) -> Option<Arc<dyn Filesystem>> {
        let mut acc: Arc<dyn Filesystem> = layers.pop()?;
        while let Some(upper) = layers.pop() {
            acc = Arc::new(OverlayFs::new(upper, acc));
        }
        Some(acc)
    }

    fn is_not_found(e: &io::Error) -> bool {
        e.kind() == io::ErrorKind::NotFound
    }
}

#[async_trait]
impl Filesystem for OverlayFs {
    async fn stat(&self, path: &Path) -> io::Result<FileInfo> {
        match self.upper.stat(path).await {
            Ok(info) => Ok(info),
            Err(e) if Self::is_not_found(&e) => self.lower.stat(path).await,
            Err(e) => Err(e),
        }
    }

    async fn lstat(&self, path: &Path) -> io::Result<FileInfo> {
        match self.upper.lstat(path).await {
            Ok(info) => Ok(info),
            Err(e) if Self::is_not_found(&e) => self.lower.lstat(path).await,
            Err(e) => Err(e),
        }
    }

    async fn read_dir(&self, path: &Path) -> io::Result<Vec<FileInfo>> {
        let upper = match self.upper.read_dir(path).await {
            Ok(entries) => Some(entries),
            Err(e) if Self::is_not_found(&e) => None,
            Err(e) => return Err(e),
        };
        let lower = match self.lower.read_dir(path).await {
            Ok(entries) => Some(entries),
            Err(e) if Self::is_not_found(&e) => None,
            Err(e) => return Err(e),
        };

        match (upper, lower) {
            (None, None) => Err(not_found(path)),
            (Some(u), None) => Ok(u),
            (None, Some(l)) => Ok(l),
            (Some(u), Some(l)) => {
                let seen: HashSet<String> = u.iter().map(|e| e.name().to_string()).collect();
                let mut merged = u;
                merged.extend(l.into_iter().filter(|e| !seen.contains(e.name())));
                Ok(merged)
            }
        }
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        match self.upper.read(path).await {
            Ok(data) => Ok(data),
            Err(e) if Self::is_not_found(&e) => self.lower.read(path).await,
            Err(e) => Err(e),
        }
    }

    async fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        if !self.writable_upper {
            return Err(permission_denied());
        }
        self.upper.write(path, data).await
    }

    async fn mkdir(&self, path: &Path) -> io::Result<()> {
        if !self.writable_upper {
            return Err(permission_denied());
        }
        self.upper.mkdir(path).await
    }

    async fn remove(&self, path: &Path) -> io::Result<()> {
        if !self.writable_upper {
            return Err(permission_denied());
        }
        self.upper.remove(path).await
    }

    fn read_only(&self) -> bool {
        !self.writable_upper
    }

    fn real_path(&self, path: &Path) -> Option<PathBuf> {
        self.upper
            .real_path(path)
            .or_else(|| self.lower.real_path(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MemoryFs;

    async fn fixture() -> OverlayFs {
        let upper = MemoryFs::new();
        upper.write(Path::new("index.html"), b"project").await.unwrap();
        upper.write(Path::new("only-upper.html"), b"u").await.unwrap();

        let lower = MemoryFs::new();
        lower.write(Path::new("index.html"), b"module").await.unwrap();
        lower.write(Path::new("only-lower.html"), b"l").await.unwrap();

        OverlayFs::new(Arc::new(upper), Arc::new(lower))
    }

    #[tokio::test]
    async fn test_upper_shadows_lower() {
        let fs = fixture().await;
        assert_eq!(fs.read(Path::new("index.html")).await.unwrap(), b"project");
        assert_eq!(fs.read(Path::new("only-lower.html")).await.unwrap(), b"l");
    }

    #[tokio::test]
    async fn test_listing_union() {
        let fs = fixture().await;
        let names: Vec<String> = fs
            .read_dir(Path::new(""))
            .await
            .unwrap()
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(names, vec!["index.html", "only-upper.html", "only-lower.html"]);
    }

    #[tokio::test]
    async fn test_read_only_by_default() {
        let fs = fixture().await;
        let err = fs.write(Path::new("new.html"), b"x").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[tokio::test]
    async fn test_writable_upper() {
        let upper = MemoryFs::new();
        let lower = MemoryFs::new();
        lower.write(Path::new("gen.json"), b"old").await.unwrap();

        let fs = OverlayFs::writable(Arc::new(upper), Arc::new(lower));
        fs.write(Path::new("gen.json"), b"new").await.unwrap();
        assert_eq!(fs.read(Path::new("gen.json")).await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_stack_first_declared_wins() {
        let a = MemoryFs::new();
        a.write(Path::new("f.txt"), b"a").await.unwrap();
        let b = MemoryFs::new();
        b.write(Path::new("f.txt"), b"b").await.unwrap();
        b.write(Path::new("b.txt"), b"b-only").await.unwrap();
        let c = MemoryFs::new();
        c.write(Path::new("f.txt"), b"c").await.unwrap();

        let stacked =
            OverlayFs::stack(vec![Arc::new(a), Arc::new(b), Arc::new(c)]).unwrap();
        assert_eq!(stacked.read(Path::new("f.txt")).await.unwrap(), b"a");
        assert_eq!(stacked.read(Path::new("b.txt")).await.unwrap(), b"b-only");
    }

    #[tokio::test]
    async fn test_missing_everywhere_is_not_found() {
        let fs = fixture().await;
        let err = fs.stat(Path::new("nope")).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
