//! `utica build` - build the checked-out dependencies

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use crate::build::{self, XcodeBuilder};
use crate::cli::BuildArgs;
use crate::error::Result;
use crate::resolver::ProjectDependencyProvider;

use super::{binary_client, build_options, event_printer, session};

pub fn run(project_directory: Option<PathBuf>, args: BuildArgs, verbose: bool) -> Result<()> {
    let session = session(project_directory)?;
    let resolved = session.project.load_resolved_cartfile()?;

    let client = binary_client(args.shared.use_netrc)?;
    let provider = ProjectDependencyProvider::new(
        session.cache.clone(),
        client,
        session.project.root(),
    );

    let (events, printer) = event_printer(verbose);
    let options = build_options(&args.shared, args.dependencies.clone());
    let cancel = AtomicBool::new(false);
    let outcome = build::build_resolved(
        &session.project,
        &session.cache,
        &resolved,
        &provider,
        provider.binary_client(),
        &XcodeBuilder,
        &options,
        &events,
        &cancel,
    );

    drop(events);
    let _ = printer.join();
    outcome
}
