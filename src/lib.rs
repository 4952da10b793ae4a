//! Update-site descriptor parsing and category unit publishing.
//!
//! This crate turns legacy update-site descriptors (`site.xml` /
//! `category.xml`) plus an already-produced pool of versioned units into
//! synthetic category units:
//! - **site**: the descriptor model, the two dialect grammars, the
//!   streaming parser and the caching loader
//! - **publish**: the category resolution engine, unit lookup and the
//!   publishing action with its stats side pass
//! - **model** / **version** / **diag**: unit metadata, version
//!   arithmetic and the multi-status diagnostics shared by both sides

pub mod diag;
pub mod model;
pub mod publish;
pub mod site;
pub mod version;

// Re-export common types for convenience
pub use diag::{Diagnostic, MultiStatus, Severity};
pub use model::*;
pub use version::{Version, VersionError, VersionQuery, VersionRange};
