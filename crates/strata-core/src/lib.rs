//! strata-core: the component layer of the strata site generator.
//!
//! This crate provides:
//!
//! - **VFS**: the virtual filesystem layers that compose a project and its
//!   modules into one read-mostly view per component (content, data, i18n,
//!   layouts, archetypes, assets, resources, static)
//! - **Modules**: the module graph resolver — vendor directories, the Go
//!   module proxy, and the conventional themes directory, in that order
//! - **SourceFs**: the builder that turns a resolved module list plus the
//!   project's paths into the per-component source filesystems
//!
//! # Architecture
//!
//! ```text
//! site config ──► modules::Client::collect() ──► ModulesConfig
//!                                                    │
//!                     paths::Paths ──────────────────┤
//!                                                    ▼
//!                                  sourcefs::SourceFilesystemsBuilder
//!                                                    │
//!                 ┌───────────────┬─────────────┬────┴────────┬──────────┐
//!                 ▼               ▼             ▼             ▼          ▼
//!              content          data/i18n   layouts/...   resources   static
//!           (LanguageFs)    (RootMappingFs) (OverlayFs)  (OverlayFs) (OverlayFs)
//! ```
//!
//! Everything below the builder is read-only for callers (resources keeps a
//! writable project layer). After construction the composed filesystems are
//! safe for concurrent reads.

pub mod error;
pub mod modules;
pub mod paths;
pub mod sourcefs;
pub mod vfs;

pub use error::{Error, Result};
pub use modules::{Client, ClientConfig, Module, ModulesConfig};
pub use paths::Paths;
pub use sourcefs::{BaseFs, SourceFilesystem, SourceFilesystems};
pub use vfs::{DiskFs, FileInfo, FileMeta, Filesystem, LanguageFs, OverlayFs, RootMapping, RootMappingFs};
