//! Git source backend
//!
//! This module handles:
//! - Bare repository mirrors under the global dependencies directory
//! - Tag enumeration and ref resolution
//! - Reading file blobs at a revision and populating working trees

pub mod checkout;
pub mod mirror;
pub mod refs;

pub use checkout::{checkout_to, read_file_at_revision, submodules_at, Submodule};
pub use mirror::{clone_or_fetch, MirrorOutcome};
pub use refs::{list_tags, resolve_ref};
