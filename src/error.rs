//! Error types and handling for Utica
//!
//! Uses `thiserror` for error definitions and `miette` for pretty diagnostics.
//!
//! Error kinds map onto the failure classes of the pipeline:
//! - parse errors (manifest lines, versions, URLs)
//! - resolution errors (unsatisfiable or conflicting requirements, cycles)
//! - git and network errors
//! - filesystem and subprocess errors
//! - binary archive errors

use miette::Diagnostic;
use thiserror::Error;

/// Main error type for Utica operations
#[derive(Error, Diagnostic, Debug)]
pub enum UticaError {
    // Manifest parse errors
    #[error("Failed to parse the Cartfile line `{line}`: {reason}")]
    #[diagnostic(
        code(utica::cartfile::parse_failed),
        help("Valid entries look like: github \"owner/name\" ~> 1.0.0")
    )]
    CartfileParseFailed { line: String, reason: String },

    #[error("Duplicate dependencies found in Cartfile: {names}")]
    #[diagnostic(
        code(utica::cartfile::duplicate_dependencies),
        help("Declare each dependency in only one of Cartfile and Cartfile.private")
    )]
    DuplicateDependencies { names: String },

    #[error("Invalid version string: {version}")]
    #[diagnostic(code(utica::version::parse_failed))]
    VersionParseFailed { version: String, reason: String },

    // Resolution errors
    #[error("No available version for {dependency} satisfies the requirement: {specifier}")]
    #[diagnostic(
        code(utica::resolver::required_version_not_found),
        help("Relax the version requirement or check that the dependency publishes tagged releases")
    )]
    RequiredVersionNotFound {
        dependency: String,
        specifier: String,
    },

    #[error("Incompatible requirements for {dependency}: {existing} and {new}")]
    #[diagnostic(code(utica::resolver::incompatible_requirements))]
    IncompatibleRequirements {
        dependency: String,
        existing: String,
        new: String,
    },

    #[error("No tagged versions found for {dependency}")]
    #[diagnostic(code(utica::resolver::tagged_version_not_found))]
    TaggedVersionNotFound { dependency: String },

    #[error("Dependency cycle detected: {chain}")]
    #[diagnostic(
        code(utica::resolver::dependency_cycle),
        help("Remove the circular declaration from the Cartfile chain")
    )]
    DependencyCycle { chain: String },

    // Git errors
    #[error("Git operation failed: {message}")]
    #[diagnostic(code(utica::git::operation_failed))]
    GitOperationFailed { message: String },

    #[error("Failed to clone repository: {url}: {reason}")]
    #[diagnostic(
        code(utica::git::clone_failed),
        help("Check that the URL is correct and you have access to the repository")
    )]
    GitCloneFailed { url: String, reason: String },

    #[error("Failed to fetch from {url}: {reason}")]
    #[diagnostic(code(utica::git::fetch_failed))]
    GitFetchFailed { url: String, reason: String },

    #[error("Failed to resolve git ref '{git_ref}': {reason}")]
    #[diagnostic(code(utica::git::ref_resolve_failed))]
    GitRefResolveFailed { git_ref: String, reason: String },

    #[error("Failed to check out revision '{revision}': {reason}")]
    #[diagnostic(code(utica::git::checkout_failed))]
    GitCheckoutFailed { revision: String, reason: String },

    // Network errors
    #[error("Network request failed for {url}: {reason}")]
    #[diagnostic(code(utica::network::request_failed))]
    NetworkFailed { url: String, reason: String },

    #[error("Failed to parse binary dependency manifest at {url}: {reason}")]
    #[diagnostic(
        code(utica::binary::manifest_invalid),
        help("The URL must return JSON mapping versions to framework archive URLs")
    )]
    BinaryManifestInvalid { url: String, reason: String },

    #[error("No binary asset matching the request exists for {dependency} at {version}")]
    #[diagnostic(code(utica::binary::no_matching_asset))]
    NoMatchingBinaryAsset { dependency: String, version: String },

    #[error("Binary archive error: {message}")]
    #[diagnostic(code(utica::binary::archive_invalid))]
    BinaryArchiveFailed { message: String },

    // Filesystem errors
    #[error("Failed to read {path}: {reason}")]
    #[diagnostic(code(utica::fs::read_failed))]
    FileReadFailed { path: String, reason: String },

    #[error("Failed to write {path}: {reason}")]
    #[diagnostic(code(utica::fs::write_failed))]
    FileWriteFailed { path: String, reason: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(utica::fs::io_error))]
    IoError { message: String },

    #[error("Cache operation failed: {message}")]
    #[diagnostic(code(utica::cache::operation_failed))]
    CacheOperationFailed { message: String },

    // Subprocess errors
    #[error("`{command}` exited with a non-zero status:\n{output}")]
    #[diagnostic(code(utica::subprocess::failed))]
    SubprocessFailed { command: String, output: String },

    #[error("Cartfile not found at {path}")]
    #[diagnostic(
        code(utica::project::cartfile_missing),
        help("Run from a directory containing a Cartfile, or pass --project-directory")
    )]
    CartfileMissing { path: String },

    #[error("Cartfile.resolved not found at {path}")]
    #[diagnostic(
        code(utica::project::lockfile_missing),
        help("Run `utica bootstrap` or `utica update` to produce a Cartfile.resolved")
    )]
    ResolvedCartfileMissing { path: String },

    #[error("Cartfile.resolved does not satisfy the declared requirements:\n{details}")]
    #[diagnostic(
        code(utica::project::resolved_invalid),
        help("Run `utica update` to re-resolve the dependency graph")
    )]
    ResolvedCartfileInvalid { details: String },
}

impl From<std::io::Error> for UticaError {
    fn from(err: std::io::Error) -> Self {
        UticaError::IoError {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for UticaError {
    fn from(err: serde_json::Error) -> Self {
        UticaError::IoError {
            message: format!("JSON error: {err}"),
        }
    }
}

impl From<git2::Error> for UticaError {
    fn from(err: git2::Error) -> Self {
        UticaError::GitOperationFailed {
            message: err.message().to_string(),
        }
    }
}

impl From<reqwest::Error> for UticaError {
    fn from(err: reqwest::Error) -> Self {
        UticaError::NetworkFailed {
            url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            reason: err.to_string(),
        }
    }
}

/// Result type alias using miette for error handling
pub type Result<T> = miette::Result<T, UticaError>;
