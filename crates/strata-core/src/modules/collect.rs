//! Module collection: walk the import graph and produce the ordered module
//! list.
//!
//! Resolution order for every import: the closest vendor directory, then
//! the module manager, then the conventional themes directory. The first
//! module seen for a path wins (keyed major-version-stripped and
//! lowercased), which also breaks import cycles.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

use strata_types::COMPONENT_FOLDERS;

use super::client::{
    gomod_by_path, gomod_main, Client, GoBinaryStatus, GoModule, VENDOR_DIR,
    VENDOR_MODULES_FILENAME,
};
use super::config::{decode_config_file, Import, ModuleConfig, Mount, CONFIG_BASENAME, CONFIG_EXTENSIONS};
use super::module::{path_key, Module};
use crate::error::{Error, Result};
use crate::vfs::normalize;

/// The output of collection: the ordered module list (project pseudo-module
/// first) plus the project's manifest path, if it has one.
#[derive(Debug, Default)]
pub struct ModulesConfig {
    pub modules: Vec<Arc<Module>>,
    pub manifest_filename: Option<PathBuf>,
}

impl Client {
    /// Collect and create the module tree.
    pub async fn collect(&mut self) -> Result<ModulesConfig> {
        let mut collector = Collector {
            client: self,
            seen: HashSet::new(),
            vendored: HashMap::new(),
            gomods: Vec::new(),
            modules: Vec::new(),
        };
        collector.run().await?;
        let modules = collector.modules;

        Ok(ModulesConfig {
            modules,
            manifest_filename: self.manifest_filename.clone(),
        })
    }
}

/// A module found in a vendor manifest, owned by the module whose vendor
/// dir listed it. The top-most owner wins.
struct VendoredModule {
    owner: Arc<Module>,
    dir: PathBuf,
    version: String,
}

struct Collector<'a> {
    client: &'a mut Client,
    /// Pick the first and prevent circular imports.
    seen: HashSet<String>,
    /// Module path to vendor dir, from `_vendor/modules.txt` files.
    vendored: HashMap<String, VendoredModule>,
    /// What the manager reports, when the project has a manifest.
    gomods: Vec<GoModule>,
    /// Ordered result, project first.
    modules: Vec<Arc<Module>>,
}

impl Collector<'_> {
    async fn run(&mut self) -> Result<()> {
        self.load_manager_modules().await?;

        let project = Arc::new(self.project_module());
        self.modules.push(project.clone());

        // Depth-first over the import graph with an explicit stack; deep
        // module trees must not be limited by call-stack depth.
        let mut stack: Vec<(Arc<Module>, VecDeque<Import>)> = Vec::new();
        let imports: VecDeque<Import> = self.client.module_config.imports.clone().into();
        if !imports.is_empty() {
            stack.push((project, imports));
        }

        loop {
            let (owner, import) = {
                let Some(top) = stack.last_mut() else { break };
                match top.1.pop_front() {
                    Some(import) => (top.0.clone(), import),
                    None => {
                        stack.pop();
                        continue;
                    }
                }
            };

            if self.is_seen(&import.path) {
                continue;
            }

            let module = self.add(&owner, import).await?;

            let child_imports: VecDeque<Import> = module
                .config()
                .map(|c| c.imports.clone())
                .unwrap_or_default()
                .into();
            if !child_imports.is_empty() {
                stack.push((module, child_imports));
            }
        }

        Ok(())
    }

    fn project_module(&self) -> Module {
        let gomod = gomod_main(&self.gomods).cloned();
        let path = if gomod.is_some() {
            String::new()
        } else {
            "project".to_string()
        };

        Module {
            path,
            dir: self.client.working_dir.clone(),
            version: String::new(),
            vendored: false,
            owner: None,
            gomod,
            mounts: Vec::new(),
            config: None,
            config_filename: None,
        }
    }

    fn is_seen(&mut self, path: &str) -> bool {
        !self.seen.insert(path_key(path))
    }

    async fn load_manager_modules(&mut self) -> Result<()> {
        self.gomods = self.client.list_manager_modules().await?;
        Ok(())
    }

    /// Resolve one import and append it to the module list.
    async fn add(&mut self, owner: &Arc<Module>, import: Import) -> Result<Arc<Module>> {
        let module_path = import.path.clone();

        let mut module_dir: Option<PathBuf> = None;
        let mut version = String::new();
        let mut vendored = false;
        let mut gomod: Option<GoModule> = None;
        let mut real_owner = owner.clone();

        if !self.client.ignore_vendor {
            self.collect_modules_txt(owner).await?;

            // Try the vendor dir first.
            if let Some(vm) = self.vendored.get(&module_path) {
                module_dir = Some(vm.dir.clone());
                version = vm.version.clone();
                vendored = true;
                // This may be the owner of the vendor dir.
                real_owner = vm.owner.clone();
            }
        }

        if module_dir.is_none() {
            if let Some(gm) = gomod_by_path(&self.gomods, &module_path) {
                if gm.dir.is_some() {
                    module_dir = gm.dir.clone();
                    gomod = Some(gm.clone());
                }
            }

            if module_dir.is_none()
                && self.client.manifest_filename.is_some()
                && Client::is_probably_module(&module_path)
            {
                // Try to fetch it and reload the module list.
                self.client.get(std::slice::from_ref(&module_path)).await?;
                self.load_manager_modules().await?;

                if let Some(gm) = gomod_by_path(&self.gomods, &module_path) {
                    if gm.dir.is_some() {
                        module_dir = gm.dir.clone();
                        gomod = Some(gm.clone());
                    }
                }
            }

            // Fall back to the themes directory.
            if module_dir.is_none() {
                let dir = self.client.themes_dir.join(&module_path);
                if fs::metadata(&dir).await.is_err() {
                    return Err(self.module_not_found(&module_path));
                }
                module_dir = Some(dir);
            }
        }

        let dir = module_dir.expect("resolved above");
        if fs::metadata(&dir).await.is_err() {
            return Err(self.module_not_found(&module_path));
        }

        let mut mounts = import.mounts;
        validate_and_apply_defaults(&module_path, &dir, &mut mounts).await?;

        let (config, config_filename) = load_module_config(&dir).await?;

        let module = Arc::new(Module {
            path: module_path,
            dir,
            version,
            vendored,
            owner: Some(real_owner),
            gomod,
            mounts,
            config,
            config_filename,
        });

        self.modules.push(module.clone());
        Ok(module)
    }

    /// Scan the owner's vendor manifest, recording each entry for the
    /// top-most owner that lists it.
    async fn collect_modules_txt(&mut self, owner: &Arc<Module>) -> Result<()> {
        let vendor_dir = owner.dir().join(VENDOR_DIR);
        let filename = vendor_dir.join(VENDOR_MODULES_FILENAME);

        let contents = match fs::read_to_string(&filename).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Error::io(filename, e)),
        };

        for line in contents.lines() {
            // # github.com/alecthomas/chroma v0.6.3
            let line = line.trim_matches(|c| c == '#' || c == ' ').trim();
            let mut parts = line.split_whitespace();
            let (Some(path), Some(version), None) = (parts.next(), parts.next(), parts.next())
            else {
                return Err(Error::InvalidVendorManifest(filename));
            };

            if !self.vendored.contains_key(path) {
                self.vendored.insert(
                    path.to_string(),
                    VendoredModule {
                        owner: owner.clone(),
                        dir: vendor_dir.join(path),
                        version: version.to_string(),
                    },
                );
            }
        }

        Ok(())
    }

    fn module_not_found(&self, path: &str) -> Error {
        let hint = if self.client.manifest_filename.is_some() {
            match self.client.go_binary_status {
                GoBinaryStatus::NotFound => Some(
                    "we found a go.mod file in your project, but you need to install Go to use it. See https://golang.org/dl/."
                        .to_string(),
                ),
                GoBinaryStatus::TooOld => Some(
                    "we found a go.mod file in your project, but you need a newer version of Go to use it. See https://golang.org/dl/."
                        .to_string(),
                ),
                GoBinaryStatus::Ok => None,
            }
        } else {
            None
        };

        Error::ModuleNotFound {
            path: path.to_string(),
            themes_dir: self.client.themes_dir.clone(),
            hint,
        }
    }
}

/// Check every declared mount and synthesize defaults when the module
/// declares none: one mount per component folder that exists on disk.
async fn validate_and_apply_defaults(
    module_path: &str,
    dir: &Path,
    mounts: &mut Vec<Mount>,
) -> Result<()> {
    for mnt in mounts.iter_mut() {
        if mnt.source.as_os_str().is_empty() || mnt.target.as_os_str().is_empty() {
            return Err(Error::module_config(
                module_path,
                "both source and target must be set",
            ));
        }

        mnt.source = normalize(&mnt.source);
        mnt.target = normalize(&mnt.target);

        // The source must exist on disk.
        let source_dir = dir.join(&mnt.source);
        if fs::metadata(&source_dir).await.is_err() {
            return Err(Error::MountSourceNotFound {
                module: module_path.to_string(),
                mount_source: mnt.source.clone(),
            });
        }

        // The target must point into one of the component folders.
        if mnt.component().is_none() {
            return Err(Error::module_config(
                module_path,
                format!(
                    "mount target must be one of: {:?}",
                    COMPONENT_FOLDERS.map(|c| c.as_str())
                ),
            ));
        }
    }

    if mounts.is_empty() {
        for component in COMPONENT_FOLDERS {
            let source_dir = dir.join(component.as_str());
            if fs::metadata(&source_dir).await.is_ok() {
                mounts.push(Mount::new(component.as_str(), component.as_str()));
            }
        }
    }

    Ok(())
}

/// Load a module's own configuration from `config.{toml,json}` if present.
async fn load_module_config(dir: &Path) -> Result<(Option<ModuleConfig>, Option<PathBuf>)> {
    for ext in CONFIG_EXTENSIONS {
        let filename = dir.join(format!("{CONFIG_BASENAME}.{ext}"));
        if fs::metadata(&filename).await.is_ok() {
            let contents = fs::read_to_string(&filename)
                .await
                .map_err(|e| Error::io(&filename, e))?;
            let config = decode_config_file(&filename, &contents)?;
            return Ok((Some(config), Some(filename)));
        }
    }

    Ok((None, None))
}
