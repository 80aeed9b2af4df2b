//! Backend access for the resolver
//!
//! The resolver reaches sources and binary manifests through the
//! [`DependencyProvider`] trait; tests substitute an in-memory provider.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::binary::BinaryProjectClient;
use crate::cache::Cache;
use crate::cartfile::{Cartfile, CARTFILE_NAME};
use crate::dependency::DependencyId;
use crate::error::{Result, UticaError};
use crate::git;
use crate::specifier::VersionSpecifier;
use crate::version::PinnedVersion;

/// What the resolver needs from the outside world
pub trait DependencyProvider {
    /// Every published version of a dependency (tags or binary JSON keys)
    fn available_versions(&self, dependency: &DependencyId) -> Result<Vec<PinnedVersion>>;

    /// Resolve a git reference (branch, tag, or SHA) to a pinned commit
    fn resolve_git_reference(
        &self,
        dependency: &DependencyId,
        reference: &str,
    ) -> Result<PinnedVersion>;

    /// The dependency declarations of `dependency` at `version`
    fn dependencies_for(
        &self,
        dependency: &DependencyId,
        version: &PinnedVersion,
    ) -> Result<Vec<(DependencyId, VersionSpecifier)>>;
}

/// The production provider: git mirrors plus the binary backend, with every
/// answer memoized per run
pub struct ProjectDependencyProvider {
    cache: Cache,
    binary_client: BinaryProjectClient,
    /// Base directory for resolving relative binary identifiers in nested
    /// manifests
    base_directory: PathBuf,
    versions: Mutex<HashMap<DependencyId, Vec<PinnedVersion>>>,
    declarations: Mutex<HashMap<(DependencyId, PinnedVersion), Vec<(DependencyId, VersionSpecifier)>>>,
}

impl ProjectDependencyProvider {
    pub fn new(
        cache: Cache,
        binary_client: BinaryProjectClient,
        base_directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            cache,
            binary_client,
            base_directory: base_directory.into(),
            versions: Mutex::new(HashMap::new()),
            declarations: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn binary_client(&self) -> &BinaryProjectClient {
        &self.binary_client
    }

    fn open_mirror(&self, dependency: &DependencyId) -> Result<git2::Repository> {
        let url = dependency
            .clone_url()
            .ok_or_else(|| UticaError::GitOperationFailed {
                message: format!("{dependency} is not a source dependency"),
            })?;
        let mirror = self.cache.mirror_path(&dependency.name());
        let (repo, _) = git::clone_or_fetch(&url, &mirror, None)?;
        Ok(repo)
    }
}

impl DependencyProvider for ProjectDependencyProvider {
    fn available_versions(&self, dependency: &DependencyId) -> Result<Vec<PinnedVersion>> {
        if let Some(versions) = self.versions.lock().unwrap().get(dependency) {
            return Ok(versions.clone());
        }

        let versions = match dependency {
            DependencyId::Binary(binary) => self
                .binary_client
                .project(binary)?
                .available_versions(),
            _ => {
                let repo = self.open_mirror(dependency)?;
                let tagged: Vec<PinnedVersion> = git::list_tags(&repo)?
                    .into_iter()
                    .map(PinnedVersion::new)
                    .filter(|pinned| pinned.semantic().is_some())
                    .collect();
                if tagged.is_empty() {
                    return Err(UticaError::TaggedVersionNotFound {
                        dependency: dependency.to_string(),
                    });
                }
                tagged
            }
        };

        self.versions
            .lock()
            .unwrap()
            .insert(dependency.clone(), versions.clone());
        Ok(versions)
    }

    fn resolve_git_reference(
        &self,
        dependency: &DependencyId,
        reference: &str,
    ) -> Result<PinnedVersion> {
        if matches!(dependency, DependencyId::Binary(_)) {
            return Err(UticaError::GitRefResolveFailed {
                git_ref: reference.to_string(),
                reason: "binary dependencies do not support git references".to_string(),
            });
        }

        let url = dependency.clone_url().unwrap_or_default();
        let mirror = self.cache.mirror_path(&dependency.name());
        let (repo, _) = git::clone_or_fetch(&url, &mirror, Some(reference))?;
        git::resolve_ref(&repo, reference).map(PinnedVersion::new)
    }

    fn dependencies_for(
        &self,
        dependency: &DependencyId,
        version: &PinnedVersion,
    ) -> Result<Vec<(DependencyId, VersionSpecifier)>> {
        // Binary dependencies have no transitive dependencies
        if matches!(dependency, DependencyId::Binary(_)) {
            return Ok(Vec::new());
        }

        let key = (dependency.clone(), version.clone());
        if let Some(declarations) = self.declarations.lock().unwrap().get(&key) {
            return Ok(declarations.clone());
        }

        let repo = self.open_mirror(dependency)?;
        let declarations =
            match git::read_file_at_revision(&repo, CARTFILE_NAME, version.commitish()) {
                Ok(bytes) => {
                    let contents = String::from_utf8_lossy(&bytes);
                    Cartfile::from_string(&contents, &self.base_directory)?.dependencies
                }
                // No Cartfile at that revision means no dependencies
                Err(_) => Vec::new(),
            };

        self.declarations
            .lock()
            .unwrap()
            .insert(key, declarations.clone());
        Ok(declarations)
    }
}
