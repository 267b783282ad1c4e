//! Module graph resolution.
//!
//! A module is a unit of reusable content and configuration. It may come
//! from the module manager, a local vendor copy below `_vendor`, or a
//! folder inside the themes directory — resolved in that order, recursively
//! from the project's top-level imports.

mod client;
mod collect;
mod config;
mod module;

pub use client::{Client, ClientConfig, GoBinaryStatus, GoModule, MODPROXY_ENV};
pub use collect::ModulesConfig;
pub use config::{decode_config, decode_config_file, Import, ModuleConfig, Mount, RawModuleConfig};
pub use module::{path_key, Module};
