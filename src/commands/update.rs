//! `utica update` - re-resolve, write the lockfile, then provision

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use crate::build::{self, XcodeBuilder};
use crate::checkouts::{checkout_resolved, CheckoutOptions};
use crate::cli::UpdateArgs;
use crate::error::Result;
use crate::progress::Spinner;
use crate::resolver::{ProjectDependencyProvider, Resolver};

use super::{binary_client, build_options, event_printer, session};

pub fn run(project_directory: Option<PathBuf>, args: UpdateArgs, verbose: bool) -> Result<()> {
    let session = session(project_directory)?;
    let cartfile = session.project.load_combined_cartfile()?;

    let client = binary_client(args.shared.use_netrc)?;
    let provider = ProjectDependencyProvider::new(
        session.cache.clone(),
        client,
        session.project.root(),
    );

    let last_resolved = session.project.load_resolved_cartfile().ok();
    let to_update = (!args.dependencies.is_empty()).then_some(args.dependencies.as_slice());

    let spinner = Spinner::new("Resolving dependency graph");
    let resolved = Resolver::new(&provider).resolve(
        &cartfile.dependencies,
        last_resolved.as_ref(),
        to_update,
    )?;
    spinner.finish();

    resolved.write_to(&session.project.resolved_cartfile_path())?;

    let (events, printer) = event_printer(verbose);
    let mut outcome = Ok(());

    if !args.no_checkout {
        outcome = checkout_resolved(
            &session.project,
            &resolved,
            &session.cache,
            CheckoutOptions {
                use_submodules: args.use_submodules,
            },
            &events,
        );
    }

    if outcome.is_ok() && !args.no_checkout && !args.no_build {
        let options = build_options(&args.shared, Vec::new());
        let cancel = AtomicBool::new(false);
        outcome = build::build_resolved(
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
    }

    drop(events);
    let _ = printer.join();
    outcome
}
