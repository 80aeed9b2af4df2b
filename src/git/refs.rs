//! Tag enumeration and ref resolution
//!
//! Resolution prefers an exact tag match over general rev-parse so that a
//! branch and tag sharing a name pin to the tagged commit.

use git2::Repository;

use crate::error::{Result, UticaError};

/// List every tag ref in the repository
pub fn list_tags(repo: &Repository) -> Result<Vec<String>> {
    let names = repo
        .tag_names(None)
        .map_err(|e| UticaError::GitOperationFailed {
            message: format!("could not list tags: {}", e.message()),
        })?;

    Ok(names
        .iter()
        .flatten()
        .map(|name| name.to_string())
        .collect())
}

/// Resolve a ref (tag, branch, or SHA) to a full commit SHA
pub fn resolve_ref(repo: &Repository, reference: &str) -> Result<String> {
    if let Ok(tag_ref) = repo.find_reference(&format!("refs/tags/{reference}")) {
        if let Ok(commit) = tag_ref.peel_to_commit() {
            return Ok(commit.id().to_string());
        }
    }

    repo.revparse_single(reference)
        .and_then(|object| object.peel_to_commit())
        .map(|commit| commit.id().to_string())
        .map_err(|e| UticaError::GitRefResolveFailed {
            git_ref: reference.to_string(),
            reason: e.message().to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn commit_file(repo: &Repository, name: &str, contents: &str, message: &str) -> git2::Oid {
        let workdir = repo.workdir().unwrap();
        std::fs::write(workdir.join(name), contents).unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let signature = git2::Signature::now("test", "test@example.com").unwrap();
        let parents: Vec<git2::Commit> = repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok())
            .into_iter()
            .collect();
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &parent_refs,
        )
        .unwrap()
    }

    #[test]
    fn test_list_tags() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        let commit_id = commit_file(&repo, "a.txt", "a", "initial");
        let commit = repo.find_commit(commit_id).unwrap();
        let signature = git2::Signature::now("test", "test@example.com").unwrap();

        for tag in ["0.9.0", "1.0.0", "v1.1.0"] {
            repo.tag(tag, commit.as_object(), &signature, tag, false)
                .unwrap();
        }

        let mut tags = list_tags(&repo).unwrap();
        tags.sort();
        assert_eq!(tags, vec!["0.9.0", "1.0.0", "v1.1.0"]);
    }

    #[test]
    fn test_resolve_ref_prefers_exact_tag() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        let first = commit_file(&repo, "a.txt", "a", "first");
        let signature = git2::Signature::now("test", "test@example.com").unwrap();
        let first_commit = repo.find_commit(first).unwrap();
        repo.tag("pinned", first_commit.as_object(), &signature, "pinned", false)
            .unwrap();

        let second = commit_file(&repo, "b.txt", "b", "second");
        // A branch with the same name points at the newer commit
        repo.branch("pinned", &repo.find_commit(second).unwrap(), false)
            .unwrap();

        assert_eq!(resolve_ref(&repo, "pinned").unwrap(), first.to_string());
    }

    #[test]
    fn test_resolve_ref_falls_back_to_rev_parse() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        let commit = commit_file(&repo, "a.txt", "a", "initial");

        assert_eq!(
            resolve_ref(&repo, &commit.to_string()).unwrap(),
            commit.to_string()
        );
        let head_branch = repo.head().unwrap().shorthand().unwrap().to_string();
        assert_eq!(
            resolve_ref(&repo, &head_branch).unwrap(),
            commit.to_string()
        );
    }

    #[test]
    fn test_resolve_unknown_ref_fails() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        commit_file(&repo, "a.txt", "a", "initial");

        let err = resolve_ref(&repo, "nonexistent").unwrap_err();
        assert!(matches!(err, UticaError::GitRefResolveFailed { .. }));
    }
}
