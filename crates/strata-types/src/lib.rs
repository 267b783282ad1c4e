//! strata-types: shared plain types for the strata site generator.
//!
//! This crate holds the types that cross crate boundaries:
//!
//! - **Component**: the eight recognized component folders
//! - **DirEntry**: the unified directory-entry shape used by the VFS
//! - **Language**: per-language site configuration consumed by the
//!   filesystem builder

mod component;
mod dir_entry;
mod language;

pub use component::{Component, COMPONENT_FOLDERS};
pub use dir_entry::{DirEntry, DirEntryKind};
pub use language::Language;
