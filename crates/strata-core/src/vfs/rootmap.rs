//! Root-mapping filesystem.
//!
//! Maps several virtual roots into one filesystem. Listing the artificial
//! root yields the virtual-root names in declaration order; paths beneath a
//! virtual root are rewritten to the mapped real directory. The same
//! virtual root may be mapped more than once (one mapping per language);
//! such a root can only be resolved through [`RootMappingFs::dirs`].

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::traits::{normalize, not_found, FileInfo, FileMeta, Filesystem};

/// One virtual-root edge: `from` is the virtual path, `to` the real
/// directory it maps to, with optional language metadata.
#[derive(Debug, Clone)]
pub struct RootMapping {
    pub from: PathBuf,
    pub to: PathBuf,
    pub lang: Option<String>,
}

impl RootMapping {
    pub fn new(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            lang: None,
        }
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    /// The real path for a virtual `name` below this mapping's root.
    fn filename(&self, name: &Path) -> PathBuf {
        match name.strip_prefix(&self.from) {
            Ok(rest) => self.to.join(rest),
            Err(_) => self.to.clone(),
        }
    }

    fn clean(&mut self) {
        self.from = normalize(&self.from);
        if !self.to.is_absolute() {
            self.to = normalize(&self.to);
        }
    }
}

/// A filesystem composed of root mappings over an underlying filesystem.
///
/// A mapping whose `to` does not exist is accepted at construction;
/// existence failures surface at stat/open time.
pub struct RootMappingFs {
    inner: Arc<dyn Filesystem>,
    mappings: Vec<RootMapping>,
}

impl RootMappingFs {
    /// Create a new root-mapping filesystem. Mappings are cleaned here;
    /// declaration order is preserved for root listings.
    pub fn new(inner: Arc<dyn Filesystem>, mappings: impl IntoIterator<Item = RootMapping>) -> Self {
        let mappings = mappings
            .into_iter()
            .map(|mut rm| {
                rm.clean();
                rm
            })
            .collect();
        Self { inner, mappings }
    }

    /// Convenience variant taking `(from, to)` string pairs.
    pub fn from_pairs<S: Into<PathBuf>>(
        inner: Arc<dyn Filesystem>,
        pairs: impl IntoIterator<Item = (S, S)>,
    ) -> Self {
        Self::new(
            inner,
            pairs.into_iter().map(|(from, to)| RootMapping::new(from, to)),
        )
    }

    /// The configured mappings, cleaned, in declaration order.
    pub fn mappings(&self) -> &[RootMapping] {
        &self.mappings
    }

    /// All `{filename, lang}` records for the virtual root matching `name`.
    /// This is how callers resolve a root that is mapped by more than one
    /// language.
    pub fn dirs(&self, name: &Path) -> Vec<FileMeta> {
        self.roots_for(name)
            .iter()
            .map(|rm| FileMeta {
                filename: Some(rm.filename(&normalize(name))),
                lang: rm.lang.clone(),
                ..Default::default()
            })
            .collect()
    }

    fn is_root(name: &Path) -> bool {
        normalize(name).as_os_str().is_empty()
    }

    /// All mappings sharing the longest `from` that covers `name`.
    fn roots_for(&self, name: &Path) -> Vec<&RootMapping> {
        let name = normalize(name);
        let mut best: Option<&Path> = None;
        for rm in &self.mappings {
            if name.starts_with(&rm.from) {
                let better = match best {
                    Some(b) => rm.from.as_os_str().len() > b.as_os_str().len(),
                    None => true,
                };
                if better {
                    best = Some(&rm.from);
                }
            }
        }
        match best {
            Some(from) => self.mappings.iter().filter(|rm| rm.from == from).collect(),
            None => Vec::new(),
        }
    }

    /// The single mapping covering `name`; fails when the root is
    /// ambiguous (mapped by several languages).
    fn get_root(&self, name: &Path) -> io::Result<&RootMapping> {
        let roots = self.roots_for(name);
        match roots.len() {
            0 => Err(not_found(name)),
            1 => Ok(roots[0]),
            n => Err(io::Error::other(format!(
                "ambiguous root {:?}: got {} matches",
                name, n
            ))),
        }
    }

    fn decorate(&self, mut info: FileInfo, rm: &RootMapping, virtual_path: PathBuf) -> FileInfo {
        let fs = info.is_dir().then(|| self.inner.clone());
        info.meta.merge(FileMeta {
            filename: Some(rm.filename(&virtual_path)),
            path: Some(virtual_path),
            lang: rm.lang.clone(),
            fs,
            ..Default::default()
        });
        info
    }
}

#[async_trait]
impl Filesystem for RootMappingFs {
    async fn stat(&self, path: &Path) -> io::Result<FileInfo> {
        if Self::is_root(path) {
            return Ok(FileInfo::dir_name_only("/"));
        }
        let rm = self.get_root(path)?;
        let info = self.inner.stat(&rm.filename(&normalize(path))).await?;
        Ok(self.decorate(info, rm, normalize(path)))
    }

    async fn lstat(&self, path: &Path) -> io::Result<FileInfo> {
        if Self::is_root(path) {
            return Ok(FileInfo::dir_name_only("/"));
        }
        let rm = self.get_root(path)?;
        let info = self.inner.lstat(&rm.filename(&normalize(path))).await?;
        Ok(self.decorate(info, rm, normalize(path)))
    }

    async fn read_dir(&self, path: &Path) -> io::Result<Vec<FileInfo>> {
        if Self::is_root(path) {
            // One entry per mapping, in declaration order.
            return Ok(self
                .mappings
                .iter()
                .map(|rm| {
                    let mut info = FileInfo::dir_name_only(rm.from.to_string_lossy());
                    info.meta.lang = rm.lang.clone();
                    info
                })
                .collect());
        }

        let name = normalize(path);
        let rm = self.get_root(&name)?;
        let children = self.inner.read_dir(&rm.filename(&name)).await?;
        Ok(children
            .into_iter()
            .map(|child| {
                let virtual_path = name.join(child.name());
                self.decorate(child, rm, virtual_path)
            })
            .collect())
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let rm = self.get_root(&normalize(path))?;
        self.inner.read(&rm.filename(&normalize(path))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::{DiskFs, MemoryFs};
    use std::env;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::fs;

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_dir() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        env::temp_dir().join(format!("strata-rootmap-test-{}-{}", std::process::id(), id))
    }

    #[tokio::test]
    async fn test_mount() {
        let dir = temp_dir();
        fs::create_dir_all(dir.join("themes/a/myblogcontent")).await.unwrap();
        fs::write(dir.join("themes/a/myblogcontent/test.txt"), b"some content")
            .await
            .unwrap();

        let base = Arc::new(DiskFs::read_only(dir.join("themes/a")));
        let rfs = RootMappingFs::new(
            base,
            [RootMapping::new("blog", "myblogcontent").with_lang("no")],
        );

        let blog = rfs.stat(Path::new("blog")).await.unwrap();
        assert!(blog.is_dir());
        assert_eq!(
            blog.meta.filename,
            Some(dir.join("themes/a/myblogcontent"))
        );
        assert_eq!(blog.meta.lang.as_deref(), Some("no"));

        let entries = rfs.read_dir(Path::new("blog")).await.unwrap();
        assert_eq!(entries.len(), 1);
        let tf = &entries[0];
        assert_eq!(tf.name(), "test.txt");
        assert_eq!(
            tf.meta.filename,
            Some(dir.join("themes/a/myblogcontent/test.txt"))
        );
        assert_eq!(tf.meta.path, Some(PathBuf::from("blog/test.txt")));
        assert_eq!(tf.meta.open().await.unwrap(), b"some content");

        let _ = fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_real_name_mapping() {
        let rfs = RootMappingFs::from_pairs(
            Arc::new(MemoryFs::new()),
            [("f1", "f1t"), ("f2", "f2t")],
        );

        let rm = rfs.get_root(Path::new("f1/foo/file.txt")).unwrap();
        assert_eq!(
            rm.filename(Path::new("f1/foo/file.txt")),
            PathBuf::from("f1t/foo/file.txt")
        );
    }

    #[tokio::test]
    async fn test_root_listing_keeps_declaration_order() {
        let mem = MemoryFs::new();
        mem.mkdir(Path::new("f1t")).await.unwrap();
        mem.mkdir(Path::new("f2t")).await.unwrap();
        mem.mkdir(Path::new("f3t")).await.unwrap();
        mem.write(Path::new("f2t/myfile.txt"), b"some content").await.unwrap();

        let rfs = RootMappingFs::from_pairs(
            Arc::new(mem),
            [("bf1", "f1t"), ("cf2", "f2t"), ("af3", "f3t")],
        );

        let fi = rfs.stat(Path::new("cf2/myfile.txt")).await.unwrap();
        assert_eq!(fi.name(), "myfile.txt");

        let names: Vec<String> = rfs
            .read_dir(Path::new("/"))
            .await
            .unwrap()
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(names, vec!["bf1", "cf2", "af3"]);
    }

    #[tokio::test]
    async fn test_shared_root_is_ambiguous_but_dirs_resolves() {
        let mem = MemoryFs::new();
        mem.write(Path::new("a/mysvblogcontent/test.txt"), b"sv").await.unwrap();
        mem.write(Path::new("a/myenblogcontent/test.txt"), b"en").await.unwrap();
        mem.write(Path::new("a/mysvdocs/test.txt"), b"docs").await.unwrap();

        let rfs = RootMappingFs::new(
            Arc::new(mem),
            [
                RootMapping::new("blog", "a/mysvblogcontent").with_lang("sv"),
                RootMapping::new("blog", "a/myenblogcontent").with_lang("en"),
                RootMapping::new("docs", "a/mysvdocs").with_lang("sv"),
            ],
        );

        // Two languages map the same virtual root: direct stat is ambiguous.
        let err = rfs.stat(Path::new("blog/test.txt")).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);

        // The side operation exposes every mapping.
        let dirs = rfs.dirs(Path::new("blog"));
        assert_eq!(dirs.len(), 2);
        assert_eq!(dirs[0].lang.as_deref(), Some("sv"));
        assert_eq!(dirs[0].filename, Some(PathBuf::from("a/mysvblogcontent")));
        assert_eq!(dirs[1].lang.as_deref(), Some("en"));

        // The unshared root resolves normally.
        assert!(rfs.stat(Path::new("docs/test.txt")).await.is_ok());
    }

    #[tokio::test]
    async fn test_writes_denied() {
        let rfs = RootMappingFs::from_pairs(Arc::new(MemoryFs::new()), [("a", "b")]);
        let err = rfs.write(Path::new("a/x.txt"), b"data").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[tokio::test]
    async fn test_missing_target_surfaces_at_stat_time() {
        // A mapping whose target does not exist is accepted at construction.
        let rfs = RootMappingFs::from_pairs(Arc::new(MemoryFs::new()), [("a", "nosuch")]);
        let err = rfs.stat(Path::new("a/x.txt")).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
