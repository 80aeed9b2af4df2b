//! Working-tree population and revision-pinned file access
//!
//! All reads go through the bare mirror; working trees are materialized with
//! `checkout_tree` against an explicit target directory.

use std::path::Path;

use git2::build::CheckoutBuilder;
use git2::{ObjectType, Repository};

use crate::error::{Result, UticaError};

/// A submodule recorded in `.gitmodules` at some revision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submodule {
    pub name: String,
    pub path: String,
    pub url: String,
    /// The gitlink commit recorded in the parent tree
    pub sha: String,
}

/// Read one file's blob contents at a revision
pub fn read_file_at_revision(repo: &Repository, path: &str, revision: &str) -> Result<Vec<u8>> {
    let ref_failed = |reason: String| UticaError::GitRefResolveFailed {
        git_ref: revision.to_string(),
        reason,
    };

    let commit = repo
        .revparse_single(revision)
        .and_then(|object| object.peel_to_commit())
        .map_err(|e| ref_failed(e.message().to_string()))?;
    let tree = commit.tree().map_err(|e| ref_failed(e.message().to_string()))?;

    let entry = tree
        .get_path(Path::new(path))
        .map_err(|e| UticaError::FileReadFailed {
            path: path.to_string(),
            reason: format!("not present at revision {revision}: {}", e.message()),
        })?;
    let blob = entry
        .to_object(repo)
        .and_then(|object| object.peel_to_blob())
        .map_err(|e| UticaError::FileReadFailed {
            path: path.to_string(),
            reason: e.message().to_string(),
        })?;

    Ok(blob.content().to_vec())
}

/// Populate `work_dir` with the tree at `revision`
pub fn checkout_to(repo: &Repository, work_dir: &Path, revision: &str) -> Result<()> {
    std::fs::create_dir_all(work_dir).map_err(|e| UticaError::FileWriteFailed {
        path: work_dir.display().to_string(),
        reason: e.to_string(),
    })?;

    let object = repo
        .revparse_single(revision)
        .map_err(|e| UticaError::GitCheckoutFailed {
            revision: revision.to_string(),
            reason: e.message().to_string(),
        })?;

    let mut options = CheckoutBuilder::new();
    options
        .target_dir(work_dir)
        .force()
        .recreate_missing(true)
        .update_index(false);

    repo.checkout_tree(&object, Some(&mut options))
        .map_err(|e| UticaError::GitCheckoutFailed {
            revision: revision.to_string(),
            reason: e.message().to_string(),
        })
}

/// Enumerate submodules recorded at `revision`
///
/// Returns the `.gitmodules` entries joined with the gitlink SHAs from the
/// parent tree; entries whose path has no gitlink are skipped.
pub fn submodules_at(repo: &Repository, revision: &str) -> Result<Vec<Submodule>> {
    let gitmodules = match read_file_at_revision(repo, ".gitmodules", revision) {
        Ok(bytes) => bytes,
        Err(_) => return Ok(Vec::new()),
    };
    let declarations = parse_gitmodules(&String::from_utf8_lossy(&gitmodules));

    let commit = repo
        .revparse_single(revision)
        .and_then(|object| object.peel_to_commit())
        .map_err(|e| UticaError::GitRefResolveFailed {
            git_ref: revision.to_string(),
            reason: e.message().to_string(),
        })?;
    let tree = commit.tree().map_err(|e| UticaError::GitOperationFailed {
        message: e.message().to_string(),
    })?;

    let mut submodules = Vec::new();
    for (name, path, url) in declarations {
        let Ok(entry) = tree.get_path(Path::new(&path)) else {
            continue;
        };
        if entry.kind() != Some(ObjectType::Commit) {
            continue;
        }
        submodules.push(Submodule {
            name,
            path,
            url,
            sha: entry.id().to_string(),
        });
    }

    Ok(submodules)
}

/// Parse `.gitmodules` into (name, path, url) triples
fn parse_gitmodules(contents: &str) -> Vec<(String, String, String)> {
    let mut result = Vec::new();
    let mut current: Option<(String, Option<String>, Option<String>)> = None;

    let mut flush = |entry: Option<(String, Option<String>, Option<String>)>,
                     result: &mut Vec<(String, String, String)>| {
        if let Some((name, Some(path), Some(url))) = entry {
            result.push((name, path, url));
        }
    };

    for line in contents.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("[submodule \"") {
            flush(current.take(), &mut result);
            if let Some(name) = rest.strip_suffix("\"]") {
                current = Some((name.to_string(), None, None));
            }
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if let Some(entry) = current.as_mut() {
            match key.trim() {
                "path" => entry.1 = Some(value.trim().to_string()),
                "url" => entry.2 = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }
    flush(current, &mut result);

    result
}
