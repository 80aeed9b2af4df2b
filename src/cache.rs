//! Global cache directories
//!
//! Repository mirrors and downloaded binary assets live in a process-wide
//! cache shared across projects. The roots are explicit configuration with
//! platform defaults; the resolver and backends receive them as parameters.

use std::path::{Path, PathBuf};

use crate::error::{Result, UticaError};

/// Cache directory name under the user's cache directory
const CACHE_DIR: &str = "utica";

/// Subdirectory holding bare repository mirrors
pub const DEPENDENCIES_DIR: &str = "dependencies";

/// Subdirectory holding downloaded binary assets
pub const BINARIES_DIR: &str = "binaries";

/// Process-wide cache locations
#[derive(Debug, Clone)]
pub struct Cache {
    root: PathBuf,
}

impl Cache {
    /// The default cache root: the platform cache location (XDG on Linux,
    /// Library/Caches on macOS) plus `utica`, overridable with
    /// `UTICA_CACHE_DIR`.
    pub fn default_location() -> Result<Self> {
        if let Ok(dir) = std::env::var("UTICA_CACHE_DIR") {
            return Ok(Self::at(PathBuf::from(dir)));
        }

        let base = dirs::cache_dir().ok_or_else(|| UticaError::CacheOperationFailed {
            message: "could not determine the user cache directory".to_string(),
        })?;
        Ok(Self::at(base.join(CACHE_DIR)))
    }

    /// A cache rooted at an explicit directory (used by tests)
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of bare repository mirrors
    pub fn repositories_dir(&self) -> PathBuf {
        self.root.join(DEPENDENCIES_DIR)
    }

    /// Mirror location for a dependency name
    pub fn mirror_path(&self, name: &str) -> PathBuf {
        self.repositories_dir().join(name)
    }

    /// Directory of cached binary assets for one dependency version
    pub fn binary_asset_dir(&self, name: &str, version: &str) -> PathBuf {
        self.root.join(BINARIES_DIR).join(name).join(version)
    }
}
