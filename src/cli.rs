//! CLI definitions using clap derive API

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Utica - a decentralized dependency manager for frameworks
#[derive(Parser, Debug)]
#[command(
    name = "utica",
    author,
    version,
    about = "A decentralized dependency manager for frameworks",
    long_about = "Utica resolves the dependencies declared in a Cartfile into exact pinned \
                  versions, checks out their source, and builds them into platform frameworks \
                  under Carthage/Build, reusing cached artifacts where possible.",
    after_help = "EXAMPLES:\n    \
                  utica bootstrap --platform iOS\n    \
                  utica update --platform Mac --cache-builds\n    \
                  utica build Alamofire\n    \
                  utica checkout --use-submodules\n    \
                  utica validate"
)]
pub struct Cli {
    /// The directory containing the project's Cartfile (defaults to the
    /// current directory)
    #[arg(long, global = true, value_name = "DIR")]
    pub project_directory: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check out and build the versions already pinned in Cartfile.resolved
    Bootstrap(BootstrapArgs),

    /// Re-resolve the dependency graph, update Cartfile.resolved, then
    /// check out and build
    Update(UpdateArgs),

    /// Build the dependencies checked out under Carthage/Checkouts
    Build(BuildArgs),

    /// Check out the pinned dependency versions without building
    Checkout(CheckoutArgs),

    /// Verify that Cartfile.resolved satisfies the Cartfile constraints
    Validate,

    /// Show version information
    Version,
}

/// Flags shared by every building verb
#[derive(Parser, Debug, Clone)]
pub struct SharedBuildArgs {
    /// Platforms to build for (repeatable)
    #[arg(long = "platform", value_name = "PLATFORM")]
    pub platforms: Vec<String>,

    /// Skip downloading release binaries for hosted dependencies
    #[arg(long)]
    pub no_use_binaries: bool,

    /// Prefer xcframework release assets
    #[arg(long)]
    pub use_xcframeworks: bool,

    /// Reuse artifacts whose version file still matches
    #[arg(long)]
    pub cache_builds: bool,

    /// Consult ~/.netrc for authenticated downloads
    #[arg(long)]
    pub use_netrc: bool,

    /// Concurrent build jobs (defaults to the processor count)
    #[arg(long, default_value_t = 0)]
    pub jobs: usize,

    /// Build configuration
    #[arg(long, default_value = "Release")]
    pub configuration: String,

    /// Xcode toolchain identifier
    #[arg(long)]
    pub toolchain: Option<String>,

    /// Derived data directory passed to the build tool
    #[arg(long, value_name = "DIR")]
    pub derived_data: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct BootstrapArgs {
    #[command(flatten)]
    pub shared: SharedBuildArgs,

    /// Only bootstrap these dependencies (and their dependencies)
    pub dependencies: Vec<String>,

    /// Skip creating checkouts
    #[arg(long)]
    pub no_checkout: bool,

    /// Skip building
    #[arg(long)]
    pub no_build: bool,

    /// Check out dependencies as full clones suitable for submodules
    #[arg(long)]
    pub use_submodules: bool,
}

#[derive(Parser, Debug)]
pub struct UpdateArgs {
    #[command(flatten)]
    pub shared: SharedBuildArgs,

    /// Only update these dependencies; everything else keeps its pinned
    /// version
    pub dependencies: Vec<String>,

    /// Skip creating checkouts after resolution
    #[arg(long)]
    pub no_checkout: bool,

    /// Skip building after resolution
    #[arg(long)]
    pub no_build: bool,

    /// Check out dependencies as full clones suitable for submodules
    #[arg(long)]
    pub use_submodules: bool,
}

#[derive(Parser, Debug)]
pub struct BuildArgs {
    #[command(flatten)]
    pub shared: SharedBuildArgs,

    /// Only build these dependencies (and their dependencies)
    pub dependencies: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct CheckoutArgs {
    /// Check out dependencies as full clones suitable for submodules
    #[arg(long)]
    pub use_submodules: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bootstrap_with_platforms() {
        let cli = Cli::try_parse_from([
            "utica",
            "bootstrap",
            "--platform",
            "iOS",
            "--platform",
            "Mac",
            "--cache-builds",
        ])
        .unwrap();
        match cli.command {
            Commands::Bootstrap(args) => {
                assert_eq!(args.shared.platforms, vec!["iOS", "Mac"]);
                assert!(args.shared.cache_builds);
                assert!(!args.no_build);
            }
            _ => panic!("Expected Bootstrap command"),
        }
    }

    #[test]
    fn test_parse_update_with_dependency_list() {
        let cli = Cli::try_parse_from(["utica", "update", "Alamofire", "--no-build"]).unwrap();
        match cli.command {
            Commands::Update(args) => {
                assert_eq!(args.dependencies, vec!["Alamofire"]);
                assert!(args.no_build);
                assert!(!args.shared.no_use_binaries);
            }
            _ => panic!("Expected Update command"),
        }
    }

    #[test]
    fn test_parse_build_jobs() {
        let cli = Cli::try_parse_from(["utica", "build", "--jobs", "4"]).unwrap();
        match cli.command {
            Commands::Build(args) => assert_eq!(args.shared.jobs, 4),
            _ => panic!("Expected Build command"),
        }
    }

    #[test]
    fn test_parse_global_project_directory() {
        let cli = Cli::try_parse_from([
            "utica",
            "--project-directory",
            "/work/app",
            "validate",
        ])
        .unwrap();
        assert_eq!(cli.project_directory, Some(PathBuf::from("/work/app")));
        assert!(matches!(cli.command, Commands::Validate));
    }

    #[test]
    fn test_parse_version() {
        let cli = Cli::try_parse_from(["utica", "version"]).unwrap();
        assert!(matches!(cli.command, Commands::Version));
    }
}
