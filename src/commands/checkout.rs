//! `utica checkout` - materialize the pinned working trees

use std::path::PathBuf;

use crate::checkouts::{checkout_resolved, CheckoutOptions};
use crate::cli::CheckoutArgs;
use crate::error::Result;

use super::{event_printer, session};

pub fn run(project_directory: Option<PathBuf>, args: CheckoutArgs, verbose: bool) -> Result<()> {
    let session = session(project_directory)?;
    let resolved = session.project.load_resolved_cartfile()?;

    let (events, printer) = event_printer(verbose);
    let outcome = checkout_resolved(
        &session.project,
        &resolved,
        &session.cache,
        CheckoutOptions {
            use_submodules: args.use_submodules,
        },
        &events,
    );

    drop(events);
    let _ = printer.join();
    outcome
}
