//! Project directory layout
//!
//! Locates the manifest pair, the lockfile, and the well-known output
//! directories relative to a project root.

use std::path::{Path, PathBuf};

use crate::cartfile::{
    Cartfile, ResolvedCartfile, CARTFILE_NAME, PRIVATE_CARTFILE_NAME, RESOLVED_CARTFILE_NAME,
};
use crate::error::{Result, UticaError};

/// Relative directory for source checkouts
pub const CHECKOUTS_DIR: &str = "Carthage/Checkouts";

/// Relative directory for build products
pub const BUILD_DIR: &str = "Carthage/Build";

/// A project rooted at a working directory
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
}

impl Project {
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cartfile_path(&self) -> PathBuf {
        self.root.join(CARTFILE_NAME)
    }

    pub fn private_cartfile_path(&self) -> PathBuf {
        self.root.join(PRIVATE_CARTFILE_NAME)
    }

    pub fn resolved_cartfile_path(&self) -> PathBuf {
        self.root.join(RESOLVED_CARTFILE_NAME)
    }

    pub fn checkouts_dir(&self) -> PathBuf {
        self.root.join(CHECKOUTS_DIR)
    }

    pub fn checkout_dir(&self, dependency_name: &str) -> PathBuf {
        self.checkouts_dir().join(dependency_name)
    }

    pub fn build_dir(&self) -> PathBuf {
        self.root.join(BUILD_DIR)
    }

    /// Version file location: `<buildDir>/.<name>.version`
    pub fn version_file_path(&self, dependency_name: &str) -> PathBuf {
        self.build_dir().join(format!(".{dependency_name}.version"))
    }

    /// Load and merge the primary and private manifests
    ///
    /// At least one of the two must exist; declaring the same dependency in
    /// both is an error.
    pub fn load_combined_cartfile(&self) -> Result<Cartfile> {
        let primary_path = self.cartfile_path();
        let private_path = self.private_cartfile_path();

        let primary = primary_path.is_file().then(|| Cartfile::load(&primary_path));
        let private = private_path.is_file().then(|| Cartfile::load(&private_path));

        match (primary, private) {
            (None, None) => Err(UticaError::CartfileMissing {
                path: primary_path.display().to_string(),
            }),
            (Some(primary), None) => primary,
            (None, Some(private)) => private,
            (Some(primary), Some(private)) => {
                let mut cartfile = primary?;
                cartfile.merge(private?)?;
                Ok(cartfile)
            }
        }
    }

    /// Load the lockfile
    pub fn load_resolved_cartfile(&self) -> Result<ResolvedCartfile> {
        ResolvedCartfile::load(&self.resolved_cartfile_path())
    }
}
