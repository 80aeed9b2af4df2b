//! Checkout engine
//!
//! This module handles:
//! - Materializing every source dependency in the lockfile as a working tree
//! - Recursive submodule population at their recorded SHAs
//! - The nested-checkout symlink protocol between dependencies
//!
//! The engine is idempotent: rerunning it over the same lockfile converges
//! to the same on-disk state, replacing stale symlinks as it goes.

use std::path::Path;
use std::sync::Mutex;

use git2::Repository;

use crate::cache::Cache;
use crate::cartfile::{Cartfile, ResolvedCartfile, CARTFILE_NAME};
use crate::dependency::{sanitized_name, DependencyId};
use crate::error::{Result, UticaError};
use crate::events::{EventSink, ProjectEvent};
use crate::git;
use crate::git::MirrorOutcome;
use crate::project::{Project, CHECKOUTS_DIR};

/// Concurrent fetch bound for distinct remotes
fn fetch_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(4)
}

/// Options controlling how working trees are produced
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckoutOptions {
    /// Produce full clones suitable for registration as submodules of the
    /// host project instead of plain tree exports
    pub use_submodules: bool,
}

/// Materialize every source dependency of the lockfile
pub fn checkout_resolved(
    project: &Project,
    resolved: &ResolvedCartfile,
    cache: &Cache,
    options: CheckoutOptions,
    events: &EventSink,
) -> Result<()> {
    let sources: Vec<(DependencyId, String)> = resolved
        .dependencies
        .iter()
        .filter_map(|(dependency, _)| {
            dependency.clone_url().map(|url| (dependency.clone(), url))
        })
        .collect();

    ensure_mirrors(&sources, cache, events)?;

    for (dependency, version) in &resolved.dependencies {
        // Binary dependencies have no checkout; assets install at build time
        if matches!(dependency, DependencyId::Binary(_)) {
            continue;
        }

        let name = dependency.name();
        let work_dir = project.checkout_dir(&name);
        events.post(ProjectEvent::CheckingOut {
            dependency: dependency.clone(),
            revision: version.to_string(),
        });

        let mirror = cache.mirror_path(&name);
        let repo = Repository::open_bare(&mirror).map_err(|e| UticaError::GitOperationFailed {
            message: format!("could not open mirror for {name}: {}", e.message()),
        })?;

        if options.use_submodules {
            clone_working_copy(&mirror, &work_dir, version.commitish())?;
        } else {
            git::checkout_to(&repo, &work_dir, version.commitish())?;
        }

        populate_submodules(&repo, &work_dir, version.commitish(), cache)?;
    }

    link_nested_checkouts(project, resolved)
}

/// Ensure every mirror exists and is current, distinct remotes in parallel
fn ensure_mirrors(
    sources: &[(DependencyId, String)],
    cache: &Cache,
    events: &EventSink,
) -> Result<()> {
    let work: Mutex<Vec<&(DependencyId, String)>> = Mutex::new(sources.iter().rev().collect());
    let failures: Mutex<Vec<UticaError>> = Mutex::new(Vec::new());

    std::thread::scope(|scope| {
        for _ in 0..fetch_concurrency() {
            scope.spawn(|| loop {
                let Some((dependency, url)) = work.lock().unwrap().pop() else {
                    return;
                };
                let mirror = cache.mirror_path(&dependency.name());
                match git::clone_or_fetch(url, &mirror, None) {
                    Ok((_, MirrorOutcome::Cloned)) => {
                        events.post(ProjectEvent::Cloning(dependency.clone()));
                    }
                    Ok((_, MirrorOutcome::Fetched)) => {
                        events.post(ProjectEvent::Fetching(dependency.clone()));
                    }
                    Ok((_, MirrorOutcome::UpToDate)) => {}
                    Err(error) => failures.lock().unwrap().push(error),
                }
            });
        }
    });

    match failures.into_inner().unwrap().into_iter().next() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// Clone from the local mirror into a detached working copy
fn clone_working_copy(mirror: &Path, work_dir: &Path, revision: &str) -> Result<()> {
    let checkout_failed = |reason: String| UticaError::GitCheckoutFailed {
        revision: revision.to_string(),
        reason,
    };

    let repo = if work_dir.join(".git").exists() {
        Repository::open(work_dir).map_err(|e| checkout_failed(e.message().to_string()))?
    } else {
        std::fs::create_dir_all(work_dir).map_err(|e| checkout_failed(e.to_string()))?;
        Repository::clone(&mirror.display().to_string(), work_dir)
            .map_err(|e| checkout_failed(e.message().to_string()))?
    };

    let oid = repo
        .revparse_single(revision)
        .map_err(|e| checkout_failed(e.message().to_string()))?
        .id();
    repo.set_head_detached(oid)
        .and_then(|_| {
            repo.checkout_head(Some(git2::build::CheckoutBuilder::new().force()))
        })
        .map_err(|e| checkout_failed(e.message().to_string()))
}

/// Recursively clone submodules at the SHAs recorded in the parent tree
fn populate_submodules(
    repo: &Repository,
    work_dir: &Path,
    revision: &str,
    cache: &Cache,
) -> Result<()> {
    for submodule in git::submodules_at(repo, revision)? {
        let mirror = cache.mirror_path(&sanitized_name(&submodule.url));
        let (sub_repo, _) = git::clone_or_fetch(&submodule.url, &mirror, Some(&submodule.sha))?;

        let sub_work_dir = work_dir.join(&submodule.path);
        git::checkout_to(&sub_repo, &sub_work_dir, &submodule.sha)?;
        populate_submodules(&sub_repo, &sub_work_dir, &submodule.sha, cache)?;
    }
    Ok(())
}

/// Ensure each dependency sees its own dependencies through
/// `<checkout>/Carthage/Checkouts/<subDep>` symlinks back toward the root
fn link_nested_checkouts(project: &Project, resolved: &ResolvedCartfile) -> Result<()> {
    for (dependency, _) in &resolved.dependencies {
        if matches!(dependency, DependencyId::Binary(_)) {
            continue;
        }
        let name = dependency.name();
        let work_dir = project.checkout_dir(&name);
        let manifest_path = work_dir.join(CARTFILE_NAME);
        if !manifest_path.is_file() {
            continue;
        }

        let nested = match Cartfile::load(&manifest_path) {
            Ok(cartfile) => cartfile,
            // A dependency's own manifest problems are not ours to fix here
            Err(_) => continue,
        };

        let nested_checkouts_dir = work_dir.join(CHECKOUTS_DIR);
        for (sub_dependency, _) in &nested.dependencies {
            if matches!(sub_dependency, DependencyId::Binary(_)) {
                continue;
            }
            link_one(
                &nested_checkouts_dir,
                &sub_dependency.name(),
            )?;
        }
    }
    Ok(())
}

/// Create (or refresh) one nested symlink, honoring committed files
fn link_one(nested_checkouts_dir: &Path, sub_name: &str) -> Result<()> {
    std::fs::create_dir_all(nested_checkouts_dir).map_err(|e| UticaError::FileWriteFailed {
        path: nested_checkouts_dir.display().to_string(),
        reason: e.to_string(),
    })?;

    // The link lives three levels below the root checkouts directory
    let target = Path::new("../../..").join(sub_name);

    if let Some(existing) = case_insensitive_entry(nested_checkouts_dir, sub_name) {
        let metadata = std::fs::symlink_metadata(&existing).map_err(|e| {
            UticaError::FileReadFailed {
                path: existing.display().to_string(),
                reason: e.to_string(),
            }
        })?;
        if !metadata.file_type().is_symlink() {
            // The dependency committed a real file or directory under this
            // name; never overwrite it
            return Ok(());
        }
        std::fs::remove_file(&existing).map_err(|e| UticaError::FileWriteFailed {
            path: existing.display().to_string(),
            reason: e.to_string(),
        })?;
    }

    create_symlink(&target, &nested_checkouts_dir.join(sub_name))
}

fn case_insensitive_entry(directory: &Path, name: &str) -> Option<std::path::PathBuf> {
    let entries = std::fs::read_dir(directory).ok()?;
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        if file_name.to_string_lossy().eq_ignore_ascii_case(name) {
            return Some(entry.path());
        }
    }
    None
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link).map_err(|e| UticaError::FileWriteFailed {
        path: link.display().to_string(),
        reason: e.to_string(),
    })
}

#[cfg(windows)]
fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::windows::fs::symlink_dir(target, link).map_err(|e| UticaError::FileWriteFailed {
        path: link.display().to_string(),
        reason: e.to_string(),
    })
}
