//! Shared fixtures for integration tests

use std::path::{Path, PathBuf};

use git2::{Repository, Signature};

/// Initialize a git repository whose working tree holds `files`, committed
/// once and tagged with every name in `tags`. Returns the repo path and the
/// commit SHA.
pub fn git_fixture(
    root: &Path,
    name: &str,
    files: &[(&str, &str)],
    tags: &[&str],
) -> (PathBuf, String) {
    let path = root.join(name);
    let repo = Repository::init(&path).expect("init fixture repository");

    for (file_name, contents) in files {
        let file_path = path.join(file_name);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(file_path, contents).unwrap();
    }

    let sha = commit_all(&repo, "initial");
    let commit = repo.find_commit(git2::Oid::from_str(&sha).unwrap()).unwrap();
    let signature = signature();
    for tag in tags {
        repo.tag(tag, commit.as_object(), &signature, tag, false)
            .unwrap();
    }

    (path, sha)
}

/// Stage everything and commit, returning the new commit SHA
pub fn commit_all(repo: &Repository, message: &str) -> String {
    let mut index = repo.index().unwrap();
    index
        .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
        .unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();

    let signature = signature();
    let parents: Vec<git2::Commit> = repo
        .head()
        .ok()
        .and_then(|head| head.peel_to_commit().ok())
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
    .to_string()
}

fn signature() -> Signature<'static> {
    Signature::now("utica-tests", "tests@example.com").unwrap()
}

/// `file://` URL for a local fixture repository
pub fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}
