//! Command implementations behind the CLI verbs

pub mod bootstrap;
pub mod build;
pub mod checkout;
pub mod update;
pub mod validate;
pub mod version;

use std::path::PathBuf;
use std::process::Command;
use std::thread::JoinHandle;

use console::style;

use crate::binary::credentials::Credentials;
use crate::binary::BinaryProjectClient;
use crate::build::BuildOptions;
use crate::cache::Cache;
use crate::cli::SharedBuildArgs;
use crate::error::Result;
use crate::events::{EventSink, ProjectEvent};
use crate::project::Project;

/// Everything a verb needs to locate the project and the shared caches
pub(crate) struct Session {
    pub project: Project,
    pub cache: Cache,
}

pub(crate) fn session(project_directory: Option<PathBuf>) -> Result<Session> {
    let current = std::env::current_dir().map_err(|e| crate::error::UticaError::IoError {
        message: format!("could not determine the working directory: {e}"),
    })?;
    let root = match project_directory {
        Some(directory) if directory.is_absolute() => directory,
        Some(directory) => current.join(directory),
        None => current,
    };
    Ok(Session {
        project: Project::at(root),
        cache: Cache::default_location()?,
    })
}

pub(crate) fn binary_client(use_netrc: bool) -> Result<BinaryProjectClient> {
    let credentials = if use_netrc {
        Some(Credentials::from_user_home()?)
    } else {
        None
    };
    BinaryProjectClient::new(credentials)
}

/// Spawn a printer for the pipeline's event stream
///
/// Skipped-download notices are only shown with `--verbose`. Drop the
/// returned sink (and every clone) before joining the handle.
pub(crate) fn event_printer(verbose: bool) -> (EventSink, JoinHandle<()>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    let handle = std::thread::spawn(move || {
        for event in rx {
            match event {
                ProjectEvent::SkippedDownloadingBinaries { .. } if !verbose => {}
                ProjectEvent::SkippedBuildingCached(_)
                | ProjectEvent::SkippedDownloadingBinaries { .. } => {
                    println!("{}", style(event.to_string()).dim());
                }
                _ => println!("{}", style(event.to_string()).bold()),
            }
        }
    });
    (EventSink::new(tx), handle)
}

pub(crate) fn build_options(shared: &SharedBuildArgs, filter: Vec<String>) -> BuildOptions {
    let platforms = if shared.platforms.is_empty() {
        vec!["Mac".to_string()]
    } else {
        shared.platforms.clone()
    };
    BuildOptions {
        platforms,
        configuration: shared.configuration.clone(),
        toolchain: shared.toolchain.clone(),
        derived_data: shared.derived_data.clone(),
        swift_toolchain_version: swift_toolchain_version(),
        cache_builds: shared.cache_builds,
        use_binaries: !shared.no_use_binaries,
        use_xcframeworks: shared.use_xcframeworks,
        jobs: shared.jobs,
        filter,
    }
}

/// The local Swift toolchain's version line, for version-file identity
pub(crate) fn swift_toolchain_version() -> String {
    Command::new("swift")
        .arg("--version")
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| {
            String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(str::to_string)
        })
        .unwrap_or_default()
}
