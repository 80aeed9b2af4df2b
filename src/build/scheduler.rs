//! Build scheduling
//!
//! This module handles:
//! - The per-node cache check with ancestor invalidation
//! - The binary installation pass ahead of source builds
//! - Dispatching source builds over a bounded worker pool

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crossbeam_channel::unbounded;

use crate::binary::{assets, github, BinaryProjectClient};
use crate::cache::Cache;
use crate::cartfile::ResolvedCartfile;
use crate::dependency::DependencyId;
use crate::error::{Result, UticaError};
use crate::events::{EventSink, ProjectEvent};
use crate::project::Project;
use crate::resolver::DependencyProvider;

use super::builder::{BuildOutcome, BuiltFramework, FrameworkBuilder};
use super::graph::{self, BuildNode};
use super::version_file::{BuildIdentity, ClaimedFrameworks, FrameworkEntry, VersionFile};
use super::BuildOptions;

/// How one node leaves the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    /// Version file still valid; nothing to do
    Skipped,
    /// Binary assets installed in place of a source build
    Installed,
    /// Needs a source build
    Rebuild,
}

/// Run the full build pipeline over the lockfile
///
/// Raising `cancel` aborts pending work at the next suspension point; builds
/// already in flight run to completion and are reported.
#[allow(clippy::too_many_arguments)]
pub fn build_resolved<P, B>(
    project: &Project,
    cache: &Cache,
    resolved: &ResolvedCartfile,
    provider: &P,
    binary_client: &BinaryProjectClient,
    builder: &B,
    options: &BuildOptions,
    events: &EventSink,
    cancel: &AtomicBool,
) -> Result<()>
where
    P: DependencyProvider,
    B: FrameworkBuilder,
{
    let nodes = graph::build_graph(resolved, provider)?;
    let sorted = graph::topological_sort(nodes)?;
    let sorted = graph::restrict_to(sorted, &options.filter);

    let mut states = cache_check_pass(project, &sorted, options, events)?;
    binary_install_pass(
        project,
        cache,
        binary_client,
        &sorted,
        &mut states,
        options,
        events,
        cancel,
    )?;
    source_build_pass(project, builder, &sorted, &states, options, events, cancel)
}

fn identity_for(node: &BuildNode, options: &BuildOptions) -> BuildIdentity {
    BuildIdentity {
        commitish: node.version.to_string(),
        configuration: options.configuration.clone(),
        toolchain_identifier: options.toolchain.clone().unwrap_or_default(),
        swift_toolchain_version: options.swift_toolchain_version.clone(),
    }
}

/// Framework names recorded by every version file in the build directory,
/// so one artifact's cache check can tell its siblings apart from strays
fn claimed_frameworks(project: &Project) -> ClaimedFrameworks {
    let mut claims = ClaimedFrameworks::new();
    let Ok(entries) = std::fs::read_dir(project.build_dir()) else {
        return claims;
    };
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        if !file_name.starts_with('.') || !file_name.ends_with(".version") {
            continue;
        }
        if let Ok(Some(stored)) = VersionFile::load(&entry.path()) {
            for (platform, names) in stored.recorded_names() {
                claims.entry(platform).or_default().extend(names);
            }
        }
    }
    claims
}

/// Decide skipped vs rebuild per node, invalidating dependents of anything
/// scheduled for rebuild
fn cache_check_pass(
    project: &Project,
    sorted: &[BuildNode],
    options: &BuildOptions,
    events: &EventSink,
) -> Result<Vec<NodeState>> {
    let mut states = Vec::with_capacity(sorted.len());
    let mut rebuilding: HashSet<&DependencyId> = HashSet::new();
    let claims = if options.cache_builds {
        claimed_frameworks(project)
    } else {
        ClaimedFrameworks::new()
    };

    for node in sorted {
        if !options.cache_builds {
            states.push(NodeState::Rebuild);
            rebuilding.insert(&node.dependency);
            continue;
        }

        let ancestor_invalidated = node
            .dependencies
            .iter()
            .any(|dependency| rebuilding.contains(dependency));
        let stored = VersionFile::load(&project.version_file_path(&node.name()))?;

        let valid = !ancestor_invalidated
            && stored.as_ref().is_some_and(|stored| {
                stored.matches(
                    &identity_for(node, options),
                    &options.platforms,
                    &project.build_dir(),
                    &claims,
                )
            });

        if valid {
            events.post(ProjectEvent::SkippedBuildingCached(node.dependency.clone()));
            states.push(NodeState::Skipped);
        } else {
            if stored.is_some() {
                events.post(ProjectEvent::RebuildingCached(node.dependency.clone()));
            } else {
                events.post(ProjectEvent::BuildingUncached(node.dependency.clone()));
            }
            states.push(NodeState::Rebuild);
            rebuilding.insert(&node.dependency);
        }
    }

    Ok(states)
}

/// Try to satisfy rebuild nodes from binaries before any source build runs
#[allow(clippy::too_many_arguments)]
fn binary_install_pass(
    project: &Project,
    cache: &Cache,
    binary_client: &BinaryProjectClient,
    sorted: &[BuildNode],
    states: &mut [NodeState],
    options: &BuildOptions,
    events: &EventSink,
    cancel: &AtomicBool,
) -> Result<()> {
    for (index, node) in sorted.iter().enumerate() {
        if states[index] != NodeState::Rebuild || cancel.load(Ordering::Relaxed) {
            continue;
        }

        match &node.dependency {
            DependencyId::Binary(binary) => {
                events.post(ProjectEvent::DownloadingBinaries {
                    dependency: node.dependency.clone(),
                    revision: node.version.to_string(),
                });

                // A binary dependency with no matching asset is fatal:
                // there is no source to fall back to
                let version = node.version.to_string();
                let binary_project = binary_client.project(binary)?;
                let urls = binary_project.assets_for(&node.version).ok_or_else(|| {
                    UticaError::NoMatchingBinaryAsset {
                        dependency: node.dependency.to_string(),
                        version: version.clone(),
                    }
                })?;

                let installed = assets::install_binary_assets(
                    binary_client,
                    cache,
                    &node.name(),
                    &version,
                    urls,
                    options.use_xcframeworks,
                    &project.build_dir(),
                )?;
                write_version_file_for_paths(project, node, &installed, options)?;
                states[index] = NodeState::Installed;
            }

            DependencyId::Hosted { .. } if options.use_binaries => {
                events.post(ProjectEvent::DownloadingBinaries {
                    dependency: node.dependency.clone(),
                    revision: node.version.to_string(),
                });
                match github::install_release_assets(
                    binary_client,
                    cache,
                    &node.dependency,
                    node.version.commitish(),
                    options.use_xcframeworks,
                    &project.build_dir(),
                ) {
                    Ok(installed) => {
                        write_version_file_for_paths(project, node, &installed, options)?;
                        states[index] = NodeState::Installed;
                    }
                    // Installation failure falls through to a source build
                    Err(error) => {
                        events.post(ProjectEvent::SkippedInstallingBinaries {
                            dependency: node.dependency.clone(),
                            error: error.to_string(),
                        });
                    }
                }
            }

            DependencyId::Hosted { .. } => {
                events.post(ProjectEvent::SkippedDownloadingBinaries {
                    dependency: node.dependency.clone(),
                    reason: "binary downloads are disabled".to_string(),
                });
            }

            DependencyId::Git { .. } => {
                events.post(ProjectEvent::SkippedDownloadingBinaries {
                    dependency: node.dependency.clone(),
                    reason: "binaries are only published for hosted repositories".to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Build the remaining nodes concurrently, honoring dependency order
fn source_build_pass<B: FrameworkBuilder>(
    project: &Project,
    builder: &B,
    sorted: &[BuildNode],
    states: &[NodeState],
    options: &BuildOptions,
    events: &EventSink,
    cancel: &AtomicBool,
) -> Result<()> {
    let pending: Vec<usize> = (0..sorted.len())
        .filter(|&index| states[index] == NodeState::Rebuild)
        .filter(|&index| !matches!(sorted[index].dependency, DependencyId::Binary(_)))
        .collect();
    if pending.is_empty() || cancel.load(Ordering::Relaxed) {
        return Ok(());
    }

    let pending_ids: HashSet<&DependencyId> = pending
        .iter()
        .map(|&index| &sorted[index].dependency)
        .collect();

    // Unmet-prerequisite counts; dependencies outside the pending set are
    // already built, skipped, or installed
    let mut waiting: HashMap<usize, usize> = HashMap::new();
    let mut dependents: HashMap<&DependencyId, Vec<usize>> = HashMap::new();
    for &index in &pending {
        let node = &sorted[index];
        let unmet = node
            .dependencies
            .iter()
            .filter(|dependency| pending_ids.contains(dependency))
            .count();
        waiting.insert(index, unmet);
        for dependency in &node.dependencies {
            dependents.entry(dependency).or_default().push(index);
        }
    }

    let jobs = if options.jobs > 0 {
        options.jobs
    } else {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    };

    let (ready_tx, ready_rx) = unbounded::<usize>();
    let (done_tx, done_rx) = unbounded::<(usize, Result<()>)>();

    let mut outstanding = 0usize;
    let mut dispatched: HashSet<usize> = HashSet::new();
    for (&index, &unmet) in &waiting {
        if unmet == 0 {
            dispatched.insert(index);
            outstanding += 1;
            let _ = ready_tx.send(index);
        }
    }

    let first_error: Mutex<Option<UticaError>> = Mutex::new(None);

    std::thread::scope(|scope| {
        for _ in 0..jobs.min(pending.len()) {
            let ready_rx = ready_rx.clone();
            let done_tx = done_tx.clone();
            scope.spawn(move || {
                while let Ok(index) = ready_rx.recv() {
                    let node = &sorted[index];
                    let result = build_one(project, builder, node, options, events);
                    if done_tx.send((index, result)).is_err() {
                        return;
                    }
                }
            });
        }
        drop(done_tx);

        while outstanding > 0 {
            let Ok((index, result)) = done_rx.recv() else {
                break;
            };
            outstanding -= 1;

            if let Err(error) = result {
                let mut slot = first_error.lock().unwrap();
                if slot.is_none() {
                    *slot = Some(error);
                }
                // Stop dispatching; drain what is already in flight
                continue;
            }

            if first_error.lock().unwrap().is_some() || cancel.load(Ordering::Relaxed) {
                continue;
            }

            // Unblock dependents of the finished node
            if let Some(waiters) = dependents.get(&sorted[index].dependency) {
                for &waiter in waiters {
                    if let Some(unmet) = waiting.get_mut(&waiter) {
                        *unmet = unmet.saturating_sub(1);
                        if *unmet == 0 && !dispatched.contains(&waiter) {
                            dispatched.insert(waiter);
                            outstanding += 1;
                            let _ = ready_tx.send(waiter);
                        }
                    }
                }
            }
        }
        drop(ready_tx);
    });

    match first_error.into_inner().unwrap() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// Build one node and record its fingerprint
fn build_one<B: FrameworkBuilder>(
    project: &Project,
    builder: &B,
    node: &BuildNode,
    options: &BuildOptions,
    events: &EventSink,
) -> Result<()> {
    let checkout_dir = project.checkout_dir(&node.name());
    match builder.build(node, &checkout_dir, &project.build_dir(), options)? {
        BuildOutcome::Skipped { reason } => {
            events.post(ProjectEvent::SkippedBuilding {
                dependency: node.dependency.clone(),
                reason,
            });
            Ok(())
        }
        BuildOutcome::Built(frameworks) => write_version_file(project, node, &frameworks, options),
    }
}

fn write_version_file(
    project: &Project,
    node: &BuildNode,
    frameworks: &[BuiltFramework],
    options: &BuildOptions,
) -> Result<()> {
    let mut platforms: BTreeMap<String, Vec<FrameworkEntry>> = BTreeMap::new();
    for framework in frameworks {
        platforms
            .entry(framework.platform.clone())
            .or_default()
            .push(super::version_file::entry_for_framework(
                &framework.name,
                &framework.binary_path,
            )?);
    }

    let version_file = VersionFile::new(&identity_for(node, options), platforms);
    version_file.write(&project.version_file_path(&node.name()))
}

/// Version file for frameworks installed from archives; the platform is the
/// directory the framework landed in
fn write_version_file_for_paths(
    project: &Project,
    node: &BuildNode,
    installed: &[std::path::PathBuf],
    options: &BuildOptions,
) -> Result<()> {
    let build_dir = project.build_dir();
    let mut frameworks = Vec::new();
    for path in installed {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(name) = file_name.strip_suffix(".framework") else {
            continue;
        };
        let platform = path
            .parent()
            .filter(|parent| *parent != build_dir)
            .and_then(|parent| parent.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or("Mac")
            .to_string();
        let binary_path = path.join(name);
        if !binary_path.is_file() {
            continue;
        }
        frameworks.push(BuiltFramework {
            platform,
            name: name.to_string(),
            binary_path,
        });
    }

    write_version_file(project, node, &frameworks, options)
}
