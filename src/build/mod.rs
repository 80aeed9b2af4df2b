//! Build scheduler and cache invalidation
//!
//! This module handles:
//! - The build graph and its topological ordering
//! - The per-artifact version-file protocol
//! - Dispatching source builds and binary installs

pub mod builder;
pub mod graph;
pub mod scheduler;
pub mod version_file;

use std::path::PathBuf;

pub use builder::{BuildOutcome, BuiltFramework, FrameworkBuilder, XcodeBuilder};
pub use graph::{build_graph, restrict_to, topological_sort, BuildNode};
pub use scheduler::build_resolved;
pub use version_file::{BuildIdentity, ClaimedFrameworks, FrameworkEntry, VersionFile};

/// Options controlling one build run
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Platform labels to build for (e.g. `Mac`, `iOS`)
    pub platforms: Vec<String>,
    pub configuration: String,
    pub toolchain: Option<String>,
    pub derived_data: Option<PathBuf>,
    /// Identifies the Swift toolchain in version files
    pub swift_toolchain_version: String,
    /// Consult and write version files
    pub cache_builds: bool,
    /// Install release assets for hosted dependencies instead of building
    pub use_binaries: bool,
    /// Prefer xcframework assets over single-platform ones
    pub use_xcframeworks: bool,
    /// Worker pool size; 0 means the processor count
    pub jobs: usize,
    /// Restrict to these dependency names and their transitive dependencies
    pub filter: Vec<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            platforms: vec!["Mac".to_string()],
            configuration: "Release".to_string(),
            toolchain: None,
            derived_data: None,
            swift_toolchain_version: String::new(),
            cache_builds: false,
            use_binaries: true,
            use_xcframeworks: false,
            jobs: 0,
            filter: Vec::new(),
        }
    }
}
