//! Structured events emitted by the provisioning pipeline
//!
//! The checkout engine and build scheduler report progress as a stream of
//! events over a channel; the CLI renders them. Events for one dependency
//! are totally ordered; no ordering is promised across dependencies.

use std::fmt;

use crossbeam_channel::Sender;

use crate::dependency::DependencyId;

/// One observable step of the provisioning pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectEvent {
    /// Cloning a fresh mirror for the dependency
    Cloning(DependencyId),
    /// Fetching new refs into an existing mirror
    Fetching(DependencyId),
    /// Checking out a working tree at a revision
    CheckingOut {
        dependency: DependencyId,
        revision: String,
    },
    /// Downloading binary assets for a pinned revision
    DownloadingBinaries {
        dependency: DependencyId,
        revision: String,
    },
    /// Binary download was skipped (e.g. the flag is off or assets are local)
    SkippedDownloadingBinaries {
        dependency: DependencyId,
        reason: String,
    },
    /// Build skipped for a non-cache reason (e.g. no shared schemes)
    SkippedBuilding {
        dependency: DependencyId,
        reason: String,
    },
    /// Build skipped because the cached artifacts are still valid
    SkippedBuildingCached(DependencyId),
    /// Version file present but stale, rebuilding
    RebuildingCached(DependencyId),
    /// No version file, building from scratch
    BuildingUncached(DependencyId),
    /// Binary install failed; falling through to a source build
    SkippedInstallingBinaries {
        dependency: DependencyId,
        error: String,
    },
}

impl fmt::Display for ProjectEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectEvent::Cloning(dep) => write!(f, "*** Cloning {dep}"),
            ProjectEvent::Fetching(dep) => write!(f, "*** Fetching {dep}"),
            ProjectEvent::CheckingOut {
                dependency,
                revision,
            } => write!(f, "*** Checking out {dependency} at \"{revision}\""),
            ProjectEvent::DownloadingBinaries {
                dependency,
                revision,
            } => write!(f, "*** Downloading {dependency} binaries at \"{revision}\""),
            ProjectEvent::SkippedDownloadingBinaries { dependency, reason } => {
                write!(f, "*** Skipped downloading {dependency} binaries: {reason}")
            }
            ProjectEvent::SkippedBuilding { dependency, reason } => {
                write!(f, "*** Skipped building {dependency}: {reason}")
            }
            ProjectEvent::SkippedBuildingCached(dep) => {
                write!(f, "*** Valid cache found for {dep}, skipping build")
            }
            ProjectEvent::RebuildingCached(dep) => {
                write!(f, "*** Invalid cache found for {dep}, rebuilding")
            }
            ProjectEvent::BuildingUncached(dep) => {
                write!(f, "*** No cache found for {dep}, building")
            }
            ProjectEvent::SkippedInstallingBinaries { dependency, error } => {
                write!(
                    f,
                    "*** Skipped installing {dependency} binaries: {error}"
                )
            }
        }
    }
}

/// A cloneable handle used by the pipeline to publish events
///
/// Sends are best-effort: a dropped receiver never fails the pipeline.
#[derive(Debug, Clone)]
pub struct EventSink {
    sender: Option<Sender<ProjectEvent>>,
}

impl EventSink {
    pub fn new(sender: Sender<ProjectEvent>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// A sink that discards every event
    #[allow(dead_code)]
    pub fn discard() -> Self {
        Self { sender: None }
    }

    pub fn post(&self, event: ProjectEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }
}
