//! The module client: manager subprocess plumbing and the vendor/tidy/graph
//! operations.
//!
//! The only thing assumed about the external module manager is the `go`
//! executable on PATH with `mod init`, `mod download`,
//! `list -m -json all` and `get`. A missing or too-old binary is recorded,
//! not fatal: resolution can still succeed through the vendor directory or
//! the themes directory.

use serde::Deserialize;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::fs;
use tokio::process::Command;

use super::config::ModuleConfig;
use crate::error::{Error, Result};

pub(crate) const VENDOR_DIR: &str = "_vendor";
pub(crate) const VENDOR_MODULES_FILENAME: &str = "modules.txt";
pub(crate) const GO_MOD_FILENAME: &str = "go.mod";
pub(crate) const GO_SUM_FILENAME: &str = "go.sum";

/// Environment variable overriding the module proxy; passed to the manager
/// as GOPROXY.
pub const MODPROXY_ENV: &str = "STRATA_MODPROXY";

/// Recorded state of the manager binary after the first invocation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GoBinaryStatus {
    #[default]
    Ok,
    /// The `go` binary is not on PATH.
    NotFound,
    /// The `go` binary is too old to understand our flags.
    TooOld,
}

/// A module as reported by `go list -m -json all`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct GoModule {
    /// Module path.
    pub path: String,
    /// Module version.
    pub version: String,
    /// Replaced by this module.
    pub replace: Option<Box<GoModule>>,
    /// Is this the main module?
    pub main: bool,
    /// Is this module only an indirect dependency?
    pub indirect: bool,
    /// Directory holding files for this module, if any.
    pub dir: Option<PathBuf>,
    /// Path to the manifest file for this module, if any.
    pub go_mod: Option<PathBuf>,
}

pub(crate) fn gomod_by_path<'a>(mods: &'a [GoModule], path: &str) -> Option<&'a GoModule> {
    mods.iter().find(|m| m.path.eq_ignore_ascii_case(path))
}

pub(crate) fn gomod_main(mods: &[GoModule]) -> Option<&GoModule> {
    mods.iter().find(|m| m.main)
}

/// Configuration for [`Client::new`].
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Absolute path to the project dir.
    pub working_dir: PathBuf,
    /// Absolute path to the project's themes dir.
    pub themes_dir: PathBuf,
    /// Ignore any vendor directory.
    pub ignore_vendor: bool,
    /// Module proxy; `MODPROXY_ENV` wins over this, default "direct".
    pub mod_proxy: Option<String>,
    /// The top-level module config.
    pub module_config: ModuleConfig,
}

/// Manages the modules of a project: collection, vendoring, manifest
/// hygiene and the manager subprocess.
pub struct Client {
    pub(crate) working_dir: PathBuf,
    pub(crate) themes_dir: PathBuf,
    pub(crate) ignore_vendor: bool,
    pub(crate) module_config: ModuleConfig,
    mod_proxy: Option<String>,

    /// Set when the project has a module manifest (a `go.mod` file).
    pub(crate) manifest_filename: Option<PathBuf>,

    /// Set when running the manager fails in a way that suggests the
    /// binary is missing or outdated, so resolution errors can carry
    /// instructional guidance.
    pub(crate) go_binary_status: GoBinaryStatus,
}

impl Client {
    /// Create a new client for the project in `working_dir`. The client
    /// resolves dependencies recursively but needs the top-level imports to
    /// start out.
    pub fn new(cfg: ClientConfig) -> Self {
        let manifest = cfg.working_dir.join(GO_MOD_FILENAME);
        let manifest_filename = manifest.exists().then_some(manifest);

        Self {
            working_dir: cfg.working_dir,
            themes_dir: cfg.themes_dir,
            ignore_vendor: cfg.ignore_vendor,
            module_config: cfg.module_config,
            mod_proxy: cfg.mod_proxy,
            manifest_filename,
            go_binary_status: GoBinaryStatus::Ok,
        }
    }

    /// The absolute path to the project's module manifest, if it has one.
    pub fn manifest_filename(&self) -> Option<&Path> {
        self.manifest_filename.as_deref()
    }

    fn proxy(&self) -> String {
        if let Ok(p) = std::env::var(MODPROXY_ENV) {
            if !p.is_empty() {
                return p;
            }
        }
        // "direct" means "git clone" and similar rather than a proxy.
        self.mod_proxy.clone().unwrap_or_else(|| "direct".to_string())
    }

    /// Resolve dependencies with the manager, e.g.
    /// `get ["github.com/x/y@v0.3.0"]`.
    pub async fn get(&mut self, args: &[String]) -> Result<()> {
        let mut full: Vec<String> = vec!["get".to_string()];
        full.extend(args.iter().cloned());
        let out = self.run_go(&full).await?;
        if !out.is_empty() {
            let _ = std::io::stdout().write_all(&out);
        }
        Ok(())
    }

    /// Initialize a module manifest for the project.
    pub async fn init(&mut self, path: &str) -> Result<()> {
        let mut args = vec!["mod".to_string(), "init".to_string()];
        if !path.is_empty() {
            args.push(path.to_string());
        }
        self.run_go(&args).await?;
        self.manifest_filename = Some(self.working_dir.join(GO_MOD_FILENAME));
        Ok(())
    }

    /// Whether a module path looks like something the manager can fetch
    /// (as opposed to a folder below the themes dir).
    pub fn is_probably_module(path: &str) -> bool {
        let first = path.split('/').next().unwrap_or("");
        first.contains('.') && !path.contains("..")
    }

    /// Print the dependency graph, one `owner module` edge per line.
    pub async fn graph<W: Write>(&mut self, w: &mut W) -> Result<()> {
        let mc = self.collect().await?;
        for module in &mc.modules {
            let Some(owner) = module.owner() else {
                continue;
            };
            let mut dep = format!("{} {}", owner.path_version(), module.path_version());
            if let Some(replace) = module.replace() {
                if let Some(dir) = &replace.dir {
                    dep.push_str(&format!(" => {}", dir.display()));
                }
            }
            writeln!(w, "{dep}").map_err(|e| Error::io("graph", e))?;
        }
        Ok(())
    }

    /// Write the dependency tree below the project's vendor directory and
    /// list it in the vendor manifest.
    ///
    /// The first module for a given path wins, so if the top-level module
    /// is vendored, that is the full set of dependencies.
    pub async fn vendor(&mut self) -> Result<()> {
        let vendor_dir = self.working_dir.join(VENDOR_DIR);
        self.rm_vendor_dir(&vendor_dir).await?;

        // One "# path version" line per vendored module.
        let mut modules_content = String::new();

        let mc = self.collect().await?;
        for module in &mc.modules {
            if module.owner().is_none() {
                continue;
            }
            // Components living directly in the themes directory are not
            // vendored.
            if !module.is_managed() && !module.vendored() {
                continue;
            }

            modules_content
                .push_str(&format!("# {} {}\n", module.path(), module.version()));

            let dst = vendor_dir.join(module.path());
            copy_dir(module.dir(), &dst)
                .await
                .map_err(|e| Error::io(module.dir(), e))?;
        }

        if !modules_content.is_empty() {
            let filename = vendor_dir.join(VENDOR_MODULES_FILENAME);
            fs::write(&filename, modules_content)
                .await
                .map_err(|e| Error::io(filename, e))?;
        }

        Ok(())
    }

    /// Remove dependencies no longer in use from the manifest and lockfile.
    pub async fn tidy(&mut self) -> Result<()> {
        let mc = self.collect().await?;

        let mut in_use = HashSet::new();
        for module in &mc.modules {
            if module.owner().is_some() && module.is_managed() {
                // Matching the format in the manifest.
                in_use.insert(format!("{} {}", module.path(), module.version()));
            }
        }

        self.rewrite_manifest(GO_MOD_FILENAME, &in_use).await?;
        // The lockfile carries the entire dependency graph, so check it
        // against the same set.
        self.rewrite_manifest(GO_SUM_FILENAME, &in_use).await?;

        Ok(())
    }

    /// List the modules the manager knows about. Empty when the project has
    /// no manifest or the manager is unavailable.
    pub(crate) async fn list_manager_modules(&mut self) -> Result<Vec<GoModule>> {
        if self.manifest_filename.is_none() {
            return Ok(Vec::new());
        }

        self.run_go(&["mod".to_string(), "download".to_string()])
            .await?;

        let out = self
            .run_go(&[
                "list".to_string(),
                "-m".to_string(),
                "-json".to_string(),
                "all".to_string(),
            ])
            .await?;

        let mut modules = Vec::new();
        let stream = serde_json::Deserializer::from_slice(&out).into_iter::<GoModule>();
        for module in stream {
            let module = module.map_err(|e| Error::Manager {
                stderr: format!("failed to decode modules list: {e}"),
            })?;
            modules.push(module);
        }

        Ok(modules)
    }

    /// Run the manager with the given arguments and return its stdout.
    ///
    /// When the binary is missing or too old the status is recorded and an
    /// empty output is returned; the caller falls back to the vendor or
    /// themes directory.
    pub(crate) async fn run_go(&mut self, args: &[String]) -> Result<Vec<u8>> {
        if self.go_binary_status != GoBinaryStatus::Ok {
            return Ok(Vec::new());
        }

        let output = Command::new("go")
            .args(args)
            .current_dir(&self.working_dir)
            .env("PWD", &self.working_dir)
            .env("GOPROXY", self.proxy())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("go binary not found, skipping module manager");
                self.go_binary_status = GoBinaryStatus::NotFound;
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(Error::Manager {
                    stderr: format!("failed to execute 'go {}': {e}", args.join(" ")),
                })
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            if stderr.contains("flag provided but not defined") {
                tracing::debug!("go binary too old, skipping module manager");
                self.go_binary_status = GoBinaryStatus::TooOld;
                return Ok(Vec::new());
            }
            return Err(Error::Manager { stderr });
        }

        Ok(output.stdout)
    }

    /// Rewrite a manifest file, keeping only dependency lines whose
    /// `path version` pair is in `in_use`. Non-dependency lines are left
    /// alone; the file is only rewritten when something was dropped.
    async fn rewrite_manifest(&self, name: &str, in_use: &HashSet<String>) -> Result<()> {
        if name == GO_MOD_FILENAME && self.manifest_filename.is_none() {
            return Ok(());
        }

        let filename = self.working_dir.join(name);
        let contents = match fs::read_to_string(&filename).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Error::io(filename, e)),
        };

        // In the manifest only the indented require-block entries are
        // dependency lines; the lockfile is dependency lines throughout.
        let is_dep_line = |line: &str| name != GO_MOD_FILENAME || line.starts_with('\t');

        let mut out = String::new();
        let mut dirty = false;

        for line in contents.lines() {
            let mut do_write = true;

            if is_dep_line(line) {
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    let mut parts = trimmed.split_whitespace();
                    if let (Some(path), Some(version)) = (parts.next(), parts.next()) {
                        let version = version
                            .strip_suffix(&format!("/{GO_MOD_FILENAME}"))
                            .unwrap_or(version);
                        do_write = in_use.contains(&format!("{path} {version}"));
                    }
                }
            }

            if do_write {
                out.push_str(line);
                out.push('\n');
            } else {
                dirty = true;
            }
        }

        if !dirty {
            return Ok(());
        }

        fs::write(&filename, out)
            .await
            .map_err(|e| Error::io(filename, e))
    }

    /// Delete the vendor dir before re-vendoring. A vendor dir without a
    /// manifest was created by someone else; leave it alone.
    async fn rm_vendor_dir(&self, vendor_dir: &Path) -> Result<()> {
        if fs::metadata(vendor_dir).await.is_err() {
            return Ok(());
        }

        let manifest = vendor_dir.join(VENDOR_MODULES_FILENAME);
        if fs::metadata(&manifest).await.is_err() {
            return Err(Error::config(format!(
                "found {VENDOR_DIR} dir without {VENDOR_MODULES_FILENAME}, skip delete"
            )));
        }

        fs::remove_dir_all(vendor_dir)
            .await
            .map_err(|e| Error::io(vendor_dir, e))
    }
}

/// Recursively copy a directory tree. Symlinks are skipped.
async fn copy_dir(src: &Path, dst: &Path) -> std::io::Result<()> {
    let mut stack = vec![(src.to_path_buf(), dst.to_path_buf())];

    while let Some((src, dst)) = stack.pop() {
        fs::create_dir_all(&dst).await?;
        let mut dir = fs::read_dir(&src).await?;
        while let Some(entry) = dir.next_entry().await? {
            let file_type = entry.file_type().await?;
            let to = dst.join(entry.file_name());
            if file_type.is_dir() {
                stack.push((entry.path(), to));
            } else if file_type.is_file() {
                fs::copy(entry.path(), &to).await?;
            }
        }
    }

    Ok(())
}
