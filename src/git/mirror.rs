//! Repository mirror maintenance
//!
//! This module handles:
//! - Creating bare mirrors under the global dependencies directory
//! - Fetching new refs, deduplicated per remote URL per run
//! - Skipping fetches when a requested commit is already present

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use git2::Repository;

use crate::error::{Result, UticaError};

/// Refspecs that keep the mirror's branches and tags in sync with the remote
const MIRROR_REFSPECS: [&str; 2] = [
    "+refs/heads/*:refs/heads/*",
    "+refs/tags/*:refs/tags/*",
];

/// What `clone_or_fetch` did to the mirror
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorOutcome {
    /// A fresh mirror was created
    Cloned,
    /// An existing mirror fetched new refs
    Fetched,
    /// The mirror already had everything needed
    UpToDate,
}

/// Remote URLs fetched during this run; at most one fetch per remote
fn fetched_urls() -> &'static Mutex<HashSet<String>> {
    static FETCHED: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();
    FETCHED.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Forget one remote's fetch record (used by tests)
#[cfg(test)]
pub fn forget_fetched(url: &str) {
    fetched_urls().lock().unwrap().remove(url);
}

fn mark_fetched(url: &str) -> bool {
    fetched_urls().lock().unwrap().insert(url.to_string())
}

/// Ensure a bare mirror of `url` exists at `mirror_path` and is current
///
/// When `commitish` names an object already present in the mirror and is not
/// a branch name, the fetch is skipped entirely. A failed fetch surfaces as a
/// structured error and leaves the existing mirror usable.
pub fn clone_or_fetch(
    url: &str,
    mirror_path: &Path,
    commitish: Option<&str>,
) -> Result<(Repository, MirrorOutcome)> {
    if mirror_path.join("HEAD").is_file() {
        let repo = Repository::open_bare(mirror_path).map_err(|e| UticaError::GitOperationFailed {
            message: format!(
                "could not open mirror at {}: {}",
                mirror_path.display(),
                e.message()
            ),
        })?;

        if let Some(commitish) = commitish {
            let is_branch = repo
                .find_reference(&format!("refs/heads/{commitish}"))
                .is_ok();
            if !is_branch && repo.revparse_single(commitish).is_ok() {
                return Ok((repo, MirrorOutcome::UpToDate));
            }
        }

        if !mark_fetched(url) {
            return Ok((repo, MirrorOutcome::UpToDate));
        }

        fetch_into(&repo, url)?;
        return Ok((repo, MirrorOutcome::Fetched));
    }

    std::fs::create_dir_all(mirror_path).map_err(|e| UticaError::FileWriteFailed {
        path: mirror_path.display().to_string(),
        reason: e.to_string(),
    })?;

    let repo = Repository::init_bare(mirror_path).map_err(|e| UticaError::GitCloneFailed {
        url: url.to_string(),
        reason: e.message().to_string(),
    })?;

    mark_fetched(url);
    if let Err(e) = fetch_into(&repo, url) {
        // Remove the half-initialized mirror so a later run re-clones
        drop(repo);
        let _ = std::fs::remove_dir_all(mirror_path);
        return Err(UticaError::GitCloneFailed {
            url: url.to_string(),
            reason: e.to_string(),
        });
    }

    Ok((repo, MirrorOutcome::Cloned))
}

fn fetch_into(repo: &Repository, url: &str) -> Result<()> {
    let mut remote = repo
        .remote_anonymous(url)
        .map_err(|e| UticaError::GitFetchFailed {
            url: url.to_string(),
            reason: e.message().to_string(),
        })?;

    remote
        .fetch(&MIRROR_REFSPECS, None, None)
        .map_err(|e| UticaError::GitFetchFailed {
            url: url.to_string(),
            reason: e.message().to_string(),
        })
}
