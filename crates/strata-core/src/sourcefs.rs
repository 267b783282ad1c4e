//! The source filesystems used by a build.
//!
//! These are virtual composites of the project's directories and every
//! resolved module's mounts, one per component: content gets a
//! language-partitioned view, data and i18n get strict-ordered root
//! mappings (each root visible as a distinct subtree), layouts, archetypes
//! and assets get a read-only overlay with the project on top, resources
//! the same but writable at the project layer, and static one overlay per
//! language in multihost mode.

use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

use strata_types::Component;

use crate::error::{Error, Result};
use crate::modules::Module;
use crate::paths::Paths;
use crate::vfs::{
    DiskFs, FileInfo, Filesystem, LangProvider, LanguageFs, NoopFs, OverlayFs, RootMapping,
    RootMappingFs, ScopedFs,
};

/// The project's virtual root inside the data and i18n filesystems. The
/// funky name makes a collision with a module path all but impossible.
pub const PROJECT_VIRTUAL_FOLDER: &str = "__strata__project";

/// The composed filesystem for one component, plus what is needed to use
/// it from the outside.
pub struct SourceFilesystem {
    /// The virtual composite filesystem. Paths are relative to the
    /// component root.
    pub fs: Arc<dyn Filesystem>,

    /// The underlying real filesystem, for resolving entries of `dirs`.
    pub source: Arc<dyn Filesystem>,

    /// Absolute paths to the directories that contribute to this
    /// filesystem, in precedence order.
    pub dirs: Vec<PathBuf>,

    /// Set in multihost mode for static filesystems: the subfolder to
    /// publish into.
    pub publish_folder: Option<String>,
}

impl SourceFilesystem {
    /// Whether the given absolute filename is a member of this filesystem.
    pub fn contains(&self, filename: &Path) -> bool {
        self.dirs.iter().any(|dir| filename.starts_with(dir))
    }

    /// Make an absolute filename relative to this filesystem. Returns
    /// `None` if the filename is not a member.
    pub fn make_path_relative(&self, filename: &Path) -> Option<PathBuf> {
        self.dirs
            .iter()
            .find_map(|dir| filename.strip_prefix(dir).ok().map(Path::to_path_buf))
    }

    /// Absolute paths to the existing directories at `from` below each of
    /// this filesystem's roots.
    pub async fn real_dirs(&self, from: impl AsRef<Path>) -> Vec<PathBuf> {
        let mut dirnames = Vec::new();
        for dir in &self.dirs {
            let dirname = dir.join(from.as_ref());
            if self.source.stat(&dirname).await.is_ok() {
                dirnames.push(dirname);
            }
        }
        dirnames
    }

    /// The real filename behind a component-relative path, when the
    /// composite can resolve it; the input otherwise.
    pub async fn real_filename(&self, rel: &Path) -> PathBuf {
        match self.fs.stat(rel).await {
            Ok(info) => info.meta.filename.unwrap_or_else(|| rel.to_path_buf()),
            Err(_) => rel.to_path_buf(),
        }
    }
}

/// The per-component source filesystems of one build.
pub struct SourceFilesystems {
    pub content: SourceFilesystem,
    pub data: SourceFilesystem,
    pub i18n: SourceFilesystem,
    pub layouts: SourceFilesystem,
    pub archetypes: SourceFilesystem,
    pub assets: SourceFilesystem,
    pub resources: SourceFilesystem,

    /// In multihost mode one static filesystem per language; otherwise a
    /// single entry under the blank key.
    pub statics: HashMap<String, SourceFilesystem>,
}

impl SourceFilesystems {
    /// The static filesystem for the given language, possibly the shared
    /// one, possibly empty.
    pub fn static_fs(&self, lang: &str) -> Arc<dyn Filesystem> {
        if let Some(fs) = self.statics.get(lang) {
            return fs.fs.clone();
        }
        if let Some(fs) = self.statics.get("") {
            return fs.fs.clone();
        }
        Arc::new(NoopFs)
    }

    /// A composite of content, static and assets, in that precedence
    /// order. The language picks the static filesystem.
    pub fn content_static_asset_fs(&self, lang: &str) -> Arc<dyn Filesystem> {
        OverlayFs::stack(vec![
            self.content.fs.clone(),
            self.static_fs(lang),
            self.assets.fs.clone(),
        ])
        .expect("three layers")
    }

    /// Look for a resource in static, assets and finally content. Returns
    /// the file info and the filesystem it was found through. Only a
    /// not-found in every filesystem yields not-found.
    pub async fn stat_resource(
        &self,
        lang: &str,
        filename: &Path,
    ) -> io::Result<(FileInfo, Arc<dyn Filesystem>)> {
        let candidates = [
            self.static_fs(lang),
            self.assets.fs.clone(),
            self.content.fs.clone(),
        ];
        let mut last_err = None;
        for fs in candidates {
            match fs.stat(filename).await {
                Ok(info) => return Ok((info, fs)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => last_err = Some(e),
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| io::Error::from(io::ErrorKind::NotFound)))
    }

    pub fn is_static(&self, filename: &Path) -> bool {
        self.statics.values().any(|fs| fs.contains(filename))
    }

    pub fn is_content(&self, filename: &Path) -> bool {
        self.content.contains(filename)
    }

    pub fn is_layout(&self, filename: &Path) -> bool {
        self.layouts.contains(filename)
    }

    pub fn is_data(&self, filename: &Path) -> bool {
        self.data.contains(filename)
    }

    pub fn is_asset(&self, filename: &Path) -> bool {
        self.assets.contains(filename)
    }

    pub fn is_i18n(&self, filename: &Path) -> bool {
        self.i18n.contains(filename)
    }

    /// Make an absolute static filename relative to the static filesystem
    /// it belongs to.
    pub fn make_static_path_relative(&self, filename: &Path) -> Option<PathBuf> {
        self.statics
            .values()
            .find_map(|fs| fs.make_path_relative(filename))
    }
}

/// The entry point the generator holds on to.
pub struct BaseFs {
    pub sources: SourceFilesystems,
}

impl std::fmt::Debug for BaseFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseFs").finish_non_exhaustive()
    }
}

impl BaseFs {
    /// Build the source filesystems for the given paths and resolved
    /// modules (project pseudo-module first).
    pub async fn build(paths: &Paths, modules: &[Arc<Module>]) -> Result<BaseFs> {
        let builder = Builder {
            paths,
            imported: modules
                .iter()
                .filter(|m| m.owner().is_some())
                .cloned()
                .collect(),
            source: Arc::new(DiskFs::os()),
        };
        Ok(BaseFs {
            sources: builder.build().await?,
        })
    }

    /// Make a filename relative to the content root, if it is below one.
    pub fn rel_content_dir(&self, filename: &Path) -> PathBuf {
        for dir in &self.sources.content.dirs {
            if let Ok(rel) = filename.strip_prefix(dir) {
                return rel.to_path_buf();
            }
        }
        // Either not a content dir or already relative.
        filename.to_path_buf()
    }
}

struct Builder<'a> {
    paths: &'a Paths,
    imported: Vec<Arc<Module>>,
    source: Arc<dyn Filesystem>,
}

impl Builder<'_> {
    async fn build(self) -> Result<SourceFilesystems> {
        // Reject overlapping content dirs before constructing anything.
        let (content_langs, abs_content_dirs) = self.content_dirs()?;

        let module_fss: Vec<(Arc<Module>, Arc<RootMappingFs>)> = self
            .imported
            .iter()
            .map(|m| (m.clone(), self.module_fs(m)))
            .collect();

        // First-declared module wins: fold the overlays right to left.
        let overlay = OverlayFs::stack(
            module_fss
                .iter()
                .map(|(_, fs)| fs.clone() as Arc<dyn Filesystem>)
                .collect(),
        );

        let content = self
            .create_content_fs(content_langs, abs_content_dirs, &module_fss)
            .await?;

        let data = self
            .create_root_mapping_fs("data_dir", &self.paths.data_dir, Component::Data)
            .await?;
        let i18n = self
            .create_root_mapping_fs("i18n_dir", &self.paths.i18n_dir, Component::I18n)
            .await?;

        let layouts = self
            .create_fs(&overlay, false, true, "layout_dir", &self.paths.layout_dir, Component::Layouts)
            .await?;
        let archetypes = self
            .create_fs(
                &overlay,
                false,
                true,
                "archetype_dir",
                &self.paths.archetype_dir,
                Component::Archetypes,
            )
            .await?;
        let assets = self
            .create_fs(&overlay, false, true, "asset_dir", &self.paths.asset_dir, Component::Assets)
            .await?;
        let resources = self
            .create_fs(
                &overlay,
                true,
                false,
                "resource_dir",
                &self.paths.resource_dir,
                Component::Resources,
            )
            .await?;

        let statics = self.create_static_fs(&overlay).await?;

        Ok(SourceFilesystems {
            content,
            data,
            i18n,
            layouts,
            archetypes,
            assets,
            resources,
            statics,
        })
    }

    /// A root-mapping filesystem exposing one module's mounts, with the
    /// default content language substituted on untagged content mounts.
    fn module_fs(&self, module: &Module) -> Arc<RootMappingFs> {
        let mappings = module.mounts().iter().map(|mnt| {
            let mut rm = RootMapping::new(&mnt.target, &mnt.source);
            if mnt.is_content() {
                rm.lang = Some(
                    mnt.lang
                        .clone()
                        .unwrap_or_else(|| self.paths.default_content_language.clone()),
                );
            }
            rm
        });

        let base: Arc<dyn Filesystem> = Arc::new(DiskFs::read_only(module.dir()));
        Arc::new(RootMappingFs::new(base, mappings))
    }

    /// The ordered per-language content dirs: the default content language
    /// first, one entry per distinct directory.
    fn content_dirs(&self) -> Result<(Vec<(String, PathBuf)>, Vec<PathBuf>)> {
        let default_dir = self.paths.default_content_dir();

        let mut ordered: Vec<(String, String)> = Vec::new();
        let mut dir_seen = HashSet::new();

        let mut push = |lang: &str, dir: &str| {
            let dir = if dir.is_empty() { &default_dir } else { dir };
            if dir_seen.insert(dir.to_string()) {
                ordered.push((lang.to_string(), dir.to_string()));
            }
        };

        for language in &self.paths.languages {
            if language.lang == self.paths.default_content_language {
                push(&language.lang, &language.content_dir);
            }
        }
        for language in &self.paths.languages {
            if language.lang != self.paths.default_content_language {
                push(&language.lang, &language.content_dir);
            }
        }

        let langs_dirs: Vec<(String, PathBuf)> = ordered
            .into_iter()
            .map(|(lang, dir)| (lang, self.paths.abs_pathify(dir)))
            .collect();
        let abs_dirs: Vec<PathBuf> = langs_dirs.iter().map(|(_, d)| d.clone()).collect();

        // Nested content dirs will never compose into one view.
        for (i, d1) in abs_dirs.iter().enumerate() {
            for (j, d2) in abs_dirs.iter().enumerate() {
                if i == j {
                    continue;
                }
                if d1.starts_with(d2) || d2.starts_with(d1) {
                    return Err(Error::OverlappingContentDirs(d1.clone(), d2.clone()));
                }
            }
        }

        Ok((langs_dirs, abs_dirs))
    }

    async fn create_content_fs(
        &self,
        content_langs: Vec<(String, PathBuf)>,
        mut dirs: Vec<PathBuf>,
        module_fss: &[(Arc<Module>, Arc<RootMappingFs>)],
    ) -> Result<SourceFilesystem> {
        let mut providers: Vec<LangProvider> = content_langs
            .into_iter()
            .map(|(lang, dir)| {
                LangProvider::new(lang, Arc::new(DiskFs::read_only(dir)) as Arc<dyn Filesystem>)
            })
            .collect();

        // Modules contribute in declaration order, each content mount as a
        // provider for its language.
        let content_root = Path::new(Component::Content.as_str());
        for (module, rmfs) in module_fss {
            for rm in rmfs.mappings() {
                if !rm.from.starts_with(content_root) {
                    continue;
                }
                let lang = rm
                    .lang
                    .clone()
                    .unwrap_or_else(|| self.paths.default_content_language.clone());
                let real_dir = module.dir().join(&rm.to);

                let fs: Arc<dyn Filesystem> = match rm.from.strip_prefix(content_root) {
                    Ok(rest) if !rest.as_os_str().is_empty() => {
                        // content/blog stays visible below blog/.
                        let base: Arc<dyn Filesystem> =
                            Arc::new(DiskFs::read_only(module.dir()));
                        Arc::new(RootMappingFs::new(
                            base,
                            [RootMapping {
                                from: rest.to_path_buf(),
                                to: rm.to.clone(),
                                lang: Some(lang.clone()),
                            }],
                        ))
                    }
                    _ => Arc::new(DiskFs::read_only(&real_dir)),
                };

                providers.push(LangProvider::new(lang, fs));
                dirs.push(real_dir);
            }
        }

        let fs: Arc<dyn Filesystem> = if providers.is_empty() {
            Arc::new(NoopFs)
        } else {
            let languages: HashSet<String> = self
                .paths
                .languages
                .iter()
                .map(|l| l.lang.clone())
                .collect();
            LanguageFs::new(languages, providers).map_err(|e| Error::io("content", e))?
        };

        Ok(SourceFilesystem {
            fs,
            source: self.source.clone(),
            dirs,
            publish_folder: None,
        })
    }

    /// Data and i18n keep a strict order instead of overlay merging: every
    /// root is a distinct subtree, the project under a reserved name and
    /// each module under its module path.
    async fn create_root_mapping_fs(
        &self,
        dir_key: &str,
        dir_value: &str,
        component: Component,
    ) -> Result<SourceFilesystem> {
        if dir_value.is_empty() {
            return Err(Error::config(format!("config {dir_key:?} not set")));
        }

        let mut mappings: Vec<RootMapping> = Vec::new();
        let mut dirs: Vec<PathBuf> = Vec::new();

        let project_dir = self.paths.abs_pathify(dir_value);
        if fs::metadata(&project_dir).await.is_ok() {
            dirs.push(project_dir.clone());
            mappings.push(RootMapping::new(PROJECT_VIRTUAL_FOLDER, project_dir));
        }

        let folder = Path::new(component.as_str());
        for module in &self.imported {
            for mnt in module.mounts() {
                if !mnt.target.starts_with(folder) {
                    // Not part of this filesystem.
                    continue;
                }
                let to = module.dir().join(&mnt.source);
                if fs::metadata(&to).await.is_err() {
                    continue;
                }

                let rest = mnt.target.strip_prefix(folder).unwrap_or(Path::new(""));
                let from = Path::new(module.path()).join(rest);
                dirs.push(to.clone());
                mappings.push(RootMapping::new(from, to));
            }
        }

        let fs: Arc<dyn Filesystem> = if mappings.is_empty() {
            Arc::new(NoopFs)
        } else {
            Arc::new(RootMappingFs::new(self.source.clone(), mappings))
        };

        Ok(SourceFilesystem {
            fs,
            source: self.source.clone(),
            dirs,
            publish_folder: None,
        })
    }

    /// Overlay composition for layouts, archetypes, assets and resources:
    /// the project's directory on top of the modules' component subtree.
    async fn create_fs(
        &self,
        overlay: &Option<Arc<dyn Filesystem>>,
        mkdir: bool,
        read_only: bool,
        dir_key: &str,
        dir_value: &str,
        component: Component,
    ) -> Result<SourceFilesystem> {
        if dir_value.is_empty() {
            return Err(Error::config(format!("config {dir_key:?} not set")));
        }

        let abs_dir = self.paths.abs_pathify(dir_value);
        let mut exists = fs::metadata(&abs_dir).await.is_ok();
        if !exists && mkdir {
            // We really need this directory. Make it.
            if fs::create_dir_all(&abs_dir).await.is_ok() {
                exists = true;
            }
        }

        let mut dirs: Vec<PathBuf> = Vec::new();
        let project_fs: Option<Arc<dyn Filesystem>> = if exists {
            dirs.push(abs_dir.clone());
            if read_only {
                Some(Arc::new(DiskFs::read_only(&abs_dir)))
            } else {
                Some(Arc::new(DiskFs::new(&abs_dir)))
            }
        } else {
            None
        };

        let module_fs: Option<Arc<dyn Filesystem>> = overlay
            .as_ref()
            .map(|ov| Arc::new(ScopedFs::new(ov.clone(), component.as_str())) as Arc<dyn Filesystem>);

        for module in &self.imported {
            for mnt in module.mounts() {
                if mnt.component() == Some(component) {
                    dirs.push(module.dir().join(&mnt.source));
                }
            }
        }

        let fs: Arc<dyn Filesystem> = match (project_fs, module_fs) {
            (Some(project), Some(modules)) => {
                if read_only {
                    Arc::new(OverlayFs::new(project, modules))
                } else {
                    Arc::new(OverlayFs::writable(project, modules))
                }
            }
            (Some(project), None) => project,
            (None, Some(modules)) => modules,
            (None, None) => Arc::new(NoopFs),
        };

        Ok(SourceFilesystem {
            fs,
            source: self.source.clone(),
            dirs,
            publish_folder: None,
        })
    }

    async fn create_static_fs(
        &self,
        overlay: &Option<Arc<dyn Filesystem>>,
    ) -> Result<HashMap<String, SourceFilesystem>> {
        let mut result = HashMap::new();

        let module_fs = || {
            overlay.as_ref().map(|ov| {
                Arc::new(ScopedFs::new(ov.clone(), Component::Static.as_str()))
                    as Arc<dyn Filesystem>
            })
        };

        let module_dirs: Vec<PathBuf> = self
            .imported
            .iter()
            .flat_map(|module| {
                module
                    .mounts()
                    .iter()
                    .filter(|mnt| mnt.component() == Some(Component::Static))
                    .map(|mnt| module.dir().join(&mnt.source))
            })
            .collect();

        if self.paths.multihost {
            for language in &self.paths.languages {
                let static_dirs = remove_duplicates_keep_right(language.static_dirs.clone());
                let (fs, dirs) = self.static_overlay(static_dirs, module_fs()).await;
                let Some(fs) = fs else { continue };

                let mut dirs = dirs;
                dirs.extend(module_dirs.iter().cloned());

                result.insert(
                    language.lang.clone(),
                    SourceFilesystem {
                        fs,
                        source: self.source.clone(),
                        dirs,
                        publish_folder: Some(language.lang.clone()),
                    },
                );
            }
            return Ok(result);
        }

        let mut static_dirs = Vec::new();
        for language in &self.paths.languages {
            static_dirs.extend(language.static_dirs.iter().cloned());
        }
        let static_dirs = remove_duplicates_keep_right(static_dirs);

        let (fs, dirs) = self.static_overlay(static_dirs, module_fs()).await;
        if let Some(fs) = fs {
            let mut dirs = dirs;
            dirs.extend(module_dirs);

            result.insert(
                String::new(),
                SourceFilesystem {
                    fs,
                    source: self.source.clone(),
                    dirs,
                    publish_folder: None,
                },
            );
        }

        Ok(result)
    }

    /// Overlay the existing project static dirs (rightmost declaration
    /// wins) on top of the modules' static subtree.
    async fn static_overlay(
        &self,
        static_dirs: Vec<String>,
        module_fs: Option<Arc<dyn Filesystem>>,
    ) -> (Option<Arc<dyn Filesystem>>, Vec<PathBuf>) {
        let mut dirs: Vec<PathBuf> = Vec::new();
        for dir in &static_dirs {
            let abs = self.paths.abs_pathify(dir);
            if fs::metadata(&abs).await.is_ok() {
                dirs.push(abs);
            }
        }

        let project = OverlayFs::stack(
            dirs.iter()
                .rev()
                .map(|d| Arc::new(DiskFs::read_only(d)) as Arc<dyn Filesystem>)
                .collect(),
        );

        let fs = match (project, module_fs) {
            (Some(p), Some(m)) => Some(Arc::new(OverlayFs::new(p, m)) as Arc<dyn Filesystem>),
            (Some(p), None) => Some(p),
            (None, Some(m)) => Some(m),
            (None, None) => None,
        };

        (fs, dirs)
    }
}

fn remove_duplicates_keep_right(input: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = VecDeque::new();
    for v in input.into_iter().rev() {
        if seen.insert(v.clone()) {
            out.push_front(v);
        }
    }
    out.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_duplicates_keep_right() {
        let input = vec![
            "static".to_string(),
            "static1".to_string(),
            "static".to_string(),
            "static2".to_string(),
        ];
        assert_eq!(
            remove_duplicates_keep_right(input),
            vec!["static1".to_string(), "static".to_string(), "static2".to_string()]
        );
    }
}
