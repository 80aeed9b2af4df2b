//! `utica bootstrap` - provision the versions already pinned in the lockfile
//!
//! With no Cartfile.resolved present, bootstrap first resolves and writes
//! one, exactly as `update` would.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use crate::build::{self, XcodeBuilder};
use crate::checkouts::{checkout_resolved, CheckoutOptions};
use crate::cli::BootstrapArgs;
use crate::error::Result;
use crate::progress::Spinner;
use crate::resolver::{ProjectDependencyProvider, Resolver};

use super::{binary_client, build_options, event_printer, session};

pub fn run(project_directory: Option<PathBuf>, args: BootstrapArgs, verbose: bool) -> Result<()> {
    let session = session(project_directory)?;

    let client = binary_client(args.shared.use_netrc)?;
    let provider = ProjectDependencyProvider::new(
        session.cache.clone(),
        client,
        session.project.root(),
    );

    let resolved = match session.project.load_resolved_cartfile() {
        Ok(resolved) => resolved,
        Err(_) => {
            let cartfile = session.project.load_combined_cartfile()?;
            let spinner = Spinner::new("No Cartfile.resolved found, resolving dependency graph");
            let resolved =
                Resolver::new(&provider).resolve(&cartfile.dependencies, None, None)?;
            spinner.finish();
            resolved.write_to(&session.project.resolved_cartfile_path())?;
            resolved
        }
    };

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

    if outcome.is_ok() && !args.no_build {
        let options = build_options(&args.shared, args.dependencies.clone());
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
