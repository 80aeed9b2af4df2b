//! Cartfile and Cartfile.resolved models
//!
//! This module handles:
//! - Parsing the line-oriented manifest grammar into dependency declarations
//! - Merging the primary and private manifests with duplicate detection
//! - Reading and atomically writing the pinned lockfile

pub mod scanner;

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use crate::dependency::DependencyId;
use crate::error::{Result, UticaError};
use crate::specifier::VersionSpecifier;
use crate::version::PinnedVersion;

use scanner::{strip_comment, Scanner};

/// The primary manifest file name
pub const CARTFILE_NAME: &str = "Cartfile";

/// The private manifest file name
pub const PRIVATE_CARTFILE_NAME: &str = "Cartfile.private";

/// The lockfile name
pub const RESOLVED_CARTFILE_NAME: &str = "Cartfile.resolved";

/// The human-authored list of declared dependencies and their constraints
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cartfile {
    /// Declarations in the order they were written
    pub dependencies: Vec<(DependencyId, VersionSpecifier)>,
}

impl Cartfile {
    /// Parse manifest text; bare binary paths resolve against `base_directory`
    pub fn from_string(contents: &str, base_directory: &Path) -> Result<Self> {
        let mut cartfile = Cartfile::default();
        let mut seen: HashSet<DependencyId> = HashSet::new();
        let mut duplicates: Vec<DependencyId> = Vec::new();

        for raw_line in contents.lines() {
            let line = strip_comment(raw_line);
            if line.trim().is_empty() {
                continue;
            }

            let (dependency, specifier) = parse_entry(line, base_directory)?;
            if !seen.insert(dependency.clone()) {
                duplicates.push(dependency.clone());
            }
            cartfile.dependencies.push((dependency, specifier));
        }

        if !duplicates.is_empty() {
            return Err(duplicate_error(&duplicates));
        }

        Ok(cartfile)
    }

    /// Read and parse a manifest from disk
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| UticaError::FileReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_string(&contents, base)
    }

    /// Append another manifest's declarations, failing when any DependencyId
    /// appears in both
    pub fn merge(&mut self, other: Cartfile) -> Result<()> {
        let existing: HashSet<DependencyId> = self
            .dependencies
            .iter()
            .map(|(id, _)| id.clone())
            .collect();

        let duplicates: Vec<DependencyId> = other
            .dependencies
            .iter()
            .map(|(id, _)| id.clone())
            .filter(|id| existing.contains(id))
            .collect();
        if !duplicates.is_empty() {
            return Err(duplicate_error(&duplicates));
        }

        self.dependencies.extend(other.dependencies);
        Ok(())
    }

    /// Look up the declared specifier for a dependency
    pub fn specifier_for(&self, dependency: &DependencyId) -> Option<&VersionSpecifier> {
        self.dependencies
            .iter()
            .find(|(id, _)| id == dependency)
            .map(|(_, specifier)| specifier)
    }
}

impl fmt::Display for Cartfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (dependency, specifier) in &self.dependencies {
            write!(
                f,
                "{} \"{}\"",
                dependency.kind(),
                dependency.manifest_identifier()
            )?;
            let rendered = specifier.to_string();
            if !rendered.is_empty() {
                write!(f, " {rendered}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// The machine-written list of exact resolved versions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedCartfile {
    /// Entries in canonical sort order (by DependencyId textual form)
    pub dependencies: Vec<(DependencyId, PinnedVersion)>,
}

impl ResolvedCartfile {
    /// Build from an arbitrary iteration order, normalizing to canonical order
    pub fn new(entries: impl IntoIterator<Item = (DependencyId, PinnedVersion)>) -> Self {
        let mut dependencies: Vec<(DependencyId, PinnedVersion)> = entries.into_iter().collect();
        dependencies.sort_by(|(a, _), (b, _)| a.sort_key().cmp(&b.sort_key()));
        Self { dependencies }
    }

    /// Parse lockfile text
    pub fn from_string(contents: &str, base_directory: &Path) -> Result<Self> {
        let mut entries = Vec::new();
        for raw_line in contents.lines() {
            let line = strip_comment(raw_line);
            if line.trim().is_empty() {
                continue;
            }
            entries.push(parse_resolved_entry(line, base_directory)?);
        }
        Ok(Self::new(entries))
    }

    /// Read and parse a lockfile from disk
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|_| {
            UticaError::ResolvedCartfileMissing {
                path: path.display().to_string(),
            }
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_string(&contents, base)
    }

    /// Look up the pinned version for a dependency
    pub fn version_for(&self, dependency: &DependencyId) -> Option<&PinnedVersion> {
        self.dependencies
            .iter()
            .find(|(id, _)| id == dependency)
            .map(|(_, version)| version)
    }

    /// Write atomically: serialize to a temporary file in the same directory,
    /// then rename into place
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let directory = path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = tempfile::NamedTempFile::new_in(directory).map_err(|e| {
            UticaError::FileWriteFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
        })?;
        use std::io::Write;
        temp.write_all(self.to_string().as_bytes())
            .map_err(|e| UticaError::FileWriteFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        temp.persist(path).map_err(|e| UticaError::FileWriteFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }
}

impl fmt::Display for ResolvedCartfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (dependency, version) in &self.dependencies {
            writeln!(
                f,
                "{} \"{}\" \"{}\"",
                dependency.kind(),
                dependency.manifest_identifier(),
                version
            )?;
        }
        Ok(())
    }
}

fn duplicate_error(duplicates: &[DependencyId]) -> UticaError {
    let names: Vec<String> = duplicates.iter().map(|id| id.to_string()).collect();
    UticaError::DuplicateDependencies {
        names: names.join(", "),
    }
}

fn parse_dependency(
    scanner: &mut Scanner<'_>,
    line: &str,
    base_directory: &Path,
) -> Result<DependencyId> {
    let kind = scanner
        .scan_word()
        .ok_or_else(|| UticaError::CartfileParseFailed {
            line: line.to_string(),
            reason: "expected dependency type `github`, `git`, or `binary`".to_string(),
        })?;

    let identifier = scanner.scan_quoted_after_kind()?;

    let parsed = match kind {
        "github" => DependencyId::from_github_identifier(identifier),
        "git" => Ok(DependencyId::from_git_identifier(identifier)),
        "binary" => DependencyId::from_binary_identifier(identifier, base_directory),
        other => Err(UticaError::CartfileParseFailed {
            line: line.to_string(),
            reason: format!("unexpected dependency type `{other}`"),
        }),
    };

    // Identifier errors carry the offending manifest line verbatim
    parsed.map_err(|error| match error {
        UticaError::CartfileParseFailed { reason, .. } => UticaError::CartfileParseFailed {
            line: line.to_string(),
            reason,
        },
        other => other,
    })
}

fn parse_entry(
    line: &str,
    base_directory: &Path,
) -> Result<(DependencyId, VersionSpecifier)> {
    let mut scanner = Scanner::new(line);
    scanner.skip_whitespace();
    let dependency = parse_dependency(&mut scanner, line, base_directory)?;
    let specifier = scanner.scan_specifier()?;
    Ok((dependency, specifier))
}

fn parse_resolved_entry(
    line: &str,
    base_directory: &Path,
) -> Result<(DependencyId, PinnedVersion)> {
    let mut scanner = Scanner::new(line);
    scanner.skip_whitespace();
    let dependency = parse_dependency(&mut scanner, line, base_directory)?;

    scanner.skip_whitespace();
    let pinned = scanner
        .scan_quoted()
        .ok_or_else(|| UticaError::CartfileParseFailed {
            line: line.to_string(),
            reason: "expected a pinned version after the dependency".to_string(),
        })?;

    Ok((dependency, PinnedVersion::new(pinned)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::Server;
    use crate::version::SemanticVersion;

    fn base() -> &'static Path {
        Path::new("/workspace")
    }

    #[test]
    fn test_parse_simple_manifest() {
        let contents = r#"
github "ReactiveCocoa/ReactiveCocoa" ~> 2.3.1 # GitHub.com
git "https://enterprise.local/ghe/desktop/git-error-translations" # An arbitrary git repo
binary "https://example.com/fw.json" >= 2.3.1
"#;
        let cartfile = Cartfile::from_string(contents, base()).unwrap();
        assert_eq!(cartfile.dependencies.len(), 3);

        let (first_id, first_spec) = &cartfile.dependencies[0];
        assert_eq!(
            *first_id,
            DependencyId::Hosted {
                server: Server::Primary,
                owner: "ReactiveCocoa".to_string(),
                name: "ReactiveCocoa".to_string(),
            }
        );
        assert_eq!(
            *first_spec,
            VersionSpecifier::CompatibleWith(SemanticVersion::parse("2.3.1").unwrap())
        );

        assert!(matches!(cartfile.dependencies[1].0, DependencyId::Git { .. }));
        assert_eq!(cartfile.dependencies[1].1, VersionSpecifier::Any);
    }

    #[test]
    fn test_parse_git_reference_specifier() {
        let cartfile = Cartfile::from_string(
            "github \"owner/name\" \"development\"\n",
            base(),
        )
        .unwrap();
        assert_eq!(
            cartfile.dependencies[0].1,
            VersionSpecifier::GitReference("development".to_string())
        );
    }

    #[test]
    fn test_comment_inside_quotes_is_preserved() {
        let cartfile = Cartfile::from_string("git \"https://example.com/x#y\"\n", base()).unwrap();
        assert_eq!(
            cartfile.dependencies[0].0,
            DependencyId::Git {
                url: "https://example.com/x#y".to_string()
            }
        );
    }

    #[test]
    fn test_duplicates_within_one_manifest_rejected() {
        let contents = "github \"a/b\"\ngithub \"a/b\" ~> 1.0.0\n";
        let err = Cartfile::from_string(contents, base()).unwrap_err();
        assert!(matches!(err, UticaError::DuplicateDependencies { .. }));
    }

    #[test]
    fn test_duplicate_across_spellings_rejected() {
        // The git spelling canonicalizes to the same hosted identity
        let contents = "github \"a/b\"\ngit \"https://github.com/a/b.git\"\n";
        let err = Cartfile::from_string(contents, base()).unwrap_err();
        assert!(matches!(err, UticaError::DuplicateDependencies { .. }));
    }

    #[test]
    fn test_merge_private_detects_duplicates() {
        let mut primary = Cartfile::from_string("github \"a/b\" ~> 1.0.0\n", base()).unwrap();
        let private = Cartfile::from_string("github \"a/b\" ~> 2.0.0\n", base()).unwrap();
        assert!(primary.merge(private).is_err());

        let disjoint = Cartfile::from_string("github \"c/d\"\n", base()).unwrap();
        let mut primary = Cartfile::from_string("github \"a/b\"\n", base()).unwrap();
        primary.merge(disjoint).unwrap();
        assert_eq!(primary.dependencies.len(), 2);
    }

    #[test]
    fn test_round_trip() {
        let contents = concat!(
            "github \"owner/name\" ~> 1.2.3\n",
            "github \"http://ghe.example.com/o/n\" >= 0.4.0\n",
            "git \"https://example.com/project.git\" \"development\"\n",
            "binary \"https://example.com/fw.json\" == 2.0.0\n",
        );
        let parsed = Cartfile::from_string(contents, base()).unwrap();
        let reparsed = Cartfile::from_string(&parsed.to_string(), base()).unwrap();
        assert_eq!(parsed, reparsed);
    }

    #[test]
    fn test_resolved_cartfile_round_trip_and_order() {
        let contents = concat!(
            "github \"zeta/z\" \"3.0.0\"\n",
            "github \"alpha/a\" \"1.2.0\"\n",
            "git \"https://example.com/p.git\" \"8ff4393ede2ca86d5a78edaf62b3a14d90bc2302\"\n",
        );
        let resolved = ResolvedCartfile::from_string(contents, base()).unwrap();
        let rendered = resolved.to_string();

        // Canonical order sorts by textual form: `git "` collates before `github "`
        let lines: Vec<&str> = rendered.lines().collect();
        assert!(lines[0].starts_with("git \"https://example.com/p.git\""));
        assert_eq!(lines[1], "github \"alpha/a\" \"1.2.0\"");
        assert_eq!(lines[2], "github \"zeta/z\" \"3.0.0\"");

        let reparsed = ResolvedCartfile::from_string(&rendered, base()).unwrap();
        assert_eq!(resolved, reparsed);
    }

    #[test]
    fn test_resolved_cartfile_requires_version() {
        let err = ResolvedCartfile::from_string("github \"a/b\"\n", base()).unwrap_err();
        assert!(matches!(err, UticaError::CartfileParseFailed { .. }));
    }

    #[test]
    fn test_atomic_write() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join(RESOLVED_CARTFILE_NAME);
        let resolved = ResolvedCartfile::new([(
            DependencyId::from_github_identifier("a/b").unwrap(),
            PinnedVersion::new("1.0.0"),
        )]);
        resolved.write_to(&path).unwrap();

        let reread = ResolvedCartfile::load(&path).unwrap();
        assert_eq!(reread, resolved);
    }

    #[test]
    fn test_load_missing_lockfile_reports_missing() {
        let temp = tempfile::TempDir::new().unwrap();
        let err = ResolvedCartfile::load(&temp.path().join(RESOLVED_CARTFILE_NAME)).unwrap_err();
        assert!(matches!(err, UticaError::ResolvedCartfileMissing { .. }));
    }
}
