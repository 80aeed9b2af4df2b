//! Version specifiers and their intersection
//!
//! This module handles:
//! - The constraint grammar used in Cartfiles (`~>`, `>=`, `==`, git refs)
//! - The satisfaction predicate against pinned versions
//! - Pairwise intersection used by the resolver to merge requirements

use std::cmp::Ordering;
use std::fmt;

use crate::version::{PinnedVersion, SemanticVersion};

/// A constraint describing which pinned versions are acceptable
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionSpecifier {
    /// Any non-pre-release version
    Any,
    /// `>= v`
    AtLeast(SemanticVersion),
    /// `~> v`
    CompatibleWith(SemanticVersion),
    /// `== v`
    Exactly(SemanticVersion),
    /// A quoted branch name, tag, or commit
    GitReference(String),
}

/// Pre-release versions only satisfy ranges whose bound is a pre-release of
/// the same numeric triple.
fn pre_release_admissible(version: &SemanticVersion, requirement: &SemanticVersion) -> bool {
    !version.is_pre_release()
        || (requirement.is_pre_release() && version.has_same_numeric_components(requirement))
}

fn satisfies_at_least(version: &SemanticVersion, requirement: &SemanticVersion) -> bool {
    version.cmp_precedence(requirement) != Ordering::Less
        && pre_release_admissible(version, requirement)
}

fn satisfies_compatible_with(version: &SemanticVersion, requirement: &SemanticVersion) -> bool {
    let newer = version.cmp_precedence(requirement) != Ordering::Less;

    // Under SemVer any 0.x release may break the exported API, so only
    // same-minor versions are compatible below 1.0.0, and pre-releases are
    // excluded outright.
    if requirement.major == 0 {
        return !version.is_pre_release()
            && version.major == 0
            && version.minor == requirement.minor
            && newer;
    }

    version.major == requirement.major && newer && pre_release_admissible(version, requirement)
}

/// The larger of two bounds under SemVer precedence, with build metadata as
/// the final tie-break so merging stays commutative
fn max_bound<'a>(a: &'a SemanticVersion, b: &'a SemanticVersion) -> &'a SemanticVersion {
    if a.cmp(b) == Ordering::Less {
        b
    } else {
        a
    }
}

impl VersionSpecifier {
    /// Whether `pinned` satisfies this specifier
    ///
    /// Non-semantic pinned versions (branches, commit SHAs) meet every
    /// requirement except a differing `GitReference`.
    pub fn is_satisfied_by(&self, pinned: &PinnedVersion) -> bool {
        if let VersionSpecifier::GitReference(reference) = self {
            return pinned.commitish() == reference;
        }

        let Some(version) = pinned.semantic() else {
            return true;
        };

        match self {
            VersionSpecifier::Any => !version.is_pre_release(),
            VersionSpecifier::AtLeast(requirement) => satisfies_at_least(&version, requirement),
            VersionSpecifier::CompatibleWith(requirement) => {
                satisfies_compatible_with(&version, requirement)
            }
            VersionSpecifier::Exactly(requirement) => version == *requirement,
            VersionSpecifier::GitReference(_) => unreachable!(),
        }
    }

    /// Strictness rank used to attribute blame when requirements conflict:
    /// `Exactly > CompatibleWith > AtLeast > Any`. `GitReference` is
    /// incomparable except to itself.
    pub fn strictness(&self) -> Option<u8> {
        match self {
            VersionSpecifier::Any => Some(0),
            VersionSpecifier::AtLeast(_) => Some(1),
            VersionSpecifier::CompatibleWith(_) => Some(2),
            VersionSpecifier::Exactly(_) => Some(3),
            VersionSpecifier::GitReference(_) => None,
        }
    }
}

/// Intersect two specifiers into one satisfied by exactly the versions that
/// satisfy both, or `None` when no such version can exist
pub fn intersection(lhs: &VersionSpecifier, rhs: &VersionSpecifier) -> Option<VersionSpecifier> {
    use VersionSpecifier::*;

    match (lhs, rhs) {
        (Any, other) | (other, Any) => Some(other.clone()),

        (GitReference(left), GitReference(right)) => {
            (left == right).then(|| lhs.clone())
        }
        // A pinned git reference dominates any version range
        (GitReference(_), _) => Some(lhs.clone()),
        (_, GitReference(_)) => Some(rhs.clone()),

        (AtLeast(x), AtLeast(y)) => Some(AtLeast(max_bound(x, y).clone())),

        (AtLeast(x), CompatibleWith(y)) | (CompatibleWith(y), AtLeast(x)) => {
            satisfies_at_least(y, x).then(|| CompatibleWith(y.clone()))
        }

        (AtLeast(x), Exactly(y)) | (Exactly(y), AtLeast(x)) => {
            satisfies_at_least(y, x).then(|| Exactly(y.clone()))
        }

        (CompatibleWith(x), CompatibleWith(y)) => {
            if x.major != y.major {
                return None;
            }
            if x.major == 0 && x.minor != y.minor {
                return None;
            }
            Some(CompatibleWith(max_bound(x, y).clone()))
        }

        (CompatibleWith(x), Exactly(y)) | (Exactly(y), CompatibleWith(x)) => {
            satisfies_compatible_with(y, x).then(|| Exactly(y.clone()))
        }

        (Exactly(x), Exactly(y)) => (x == y).then(|| Exactly(x.clone())),
    }
}

impl fmt::Display for VersionSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSpecifier::Any => Ok(()),
            VersionSpecifier::AtLeast(v) => write!(f, ">= {v}"),
            VersionSpecifier::CompatibleWith(v) => write!(f, "~> {v}"),
            VersionSpecifier::Exactly(v) => write!(f, "== {v}"),
            VersionSpecifier::GitReference(r) => write!(f, "\"{r}\""),
        }
    }
}
