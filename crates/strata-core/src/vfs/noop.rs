//! The empty filesystem.

use async_trait::async_trait;
use std::io;
use std::path::Path;

use super::traits::{not_found, FileInfo, Filesystem};

/// A filesystem with nothing in it.
///
/// Stands in when a component has no project directory and no module
/// mounts, so consumers never have to special-case a missing filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopFs;

#[async_trait]
impl Filesystem for NoopFs {
    async fn stat(&self, path: &Path) -> io::Result<FileInfo> {
        Err(not_found(path))
    }

    async fn read_dir(&self, path: &Path) -> io::Result<Vec<FileInfo>> {
        Err(not_found(path))
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        Err(not_found(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_everything_is_not_found() {
        let fs = NoopFs;
        assert_eq!(
            fs.stat(Path::new("x")).await.unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
        assert!(!fs.exists(Path::new("x")).await);
    }
}
