//! Utica - a decentralized dependency manager for frameworks
//!
//! Resolves the dependencies declared in a Cartfile into exact pinned
//! versions, checks out their source at those versions, and builds them into
//! platform frameworks, reusing cached artifacts where the version-file
//! fingerprints still match.

use clap::Parser;

mod binary;
mod build;
mod cache;
mod cartfile;
mod checkouts;
mod cli;
mod commands;
mod dependency;
mod error;
mod events;
mod git;
mod hash;
mod progress;
mod project;
mod resolver;
mod specifier;
mod version;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Bootstrap(args) => {
            commands::bootstrap::run(cli.project_directory, args, cli.verbose)
        }
        Commands::Update(args) => commands::update::run(cli.project_directory, args, cli.verbose),
        Commands::Build(args) => commands::build::run(cli.project_directory, args, cli.verbose),
        Commands::Checkout(args) => {
            commands::checkout::run(cli.project_directory, args, cli.verbose)
        }
        Commands::Validate => commands::validate::run(cli.project_directory),
        Commands::Version => commands::version::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
