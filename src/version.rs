//! Semantic version parsing and ordering
//!
//! This module handles:
//! - Strict SemVer 2.0.0 parsing (exactly three numeric components)
//! - Precedence ordering that ignores build metadata
//! - Pinned versions as recorded in Cartfile.resolved

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, UticaError};

/// A semantic version conforming to SemVer 2.0.0
///
/// Equality includes build metadata; precedence ordering does not. Use
/// [`SemanticVersion::cmp_precedence`] when SemVer precedence is what matters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SemanticVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    /// Dot-separated pre-release identifiers, empty when absent
    pub pre_release: Vec<String>,
    /// Dot-separated build metadata identifiers, empty when absent
    pub build_metadata: Vec<String>,
}

impl SemanticVersion {
    /// Create a release version with no pre-release or build metadata
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre_release: Vec::new(),
            build_metadata: Vec::new(),
        }
    }

    /// Parse a version string, accepting an optional leading `v`
    ///
    /// Exactly three dot-separated numeric components are required; a missing
    /// patch component is rejected rather than defaulted.
    pub fn parse(input: &str) -> Result<Self> {
        let fail = |reason: &str| UticaError::VersionParseFailed {
            version: input.to_string(),
            reason: reason.to_string(),
        };

        let s = input.strip_prefix('v').unwrap_or(input);

        let (rest, build) = match s.split_once('+') {
            Some((core, build)) => (core, parse_identifiers(build, true).ok_or_else(|| {
                fail("build metadata must be non-empty dot-separated alphanumeric identifiers")
            })?),
            None => (s, Vec::new()),
        };

        let (core, pre) = match rest.split_once('-') {
            Some((core, pre)) => (core, parse_identifiers(pre, false).ok_or_else(|| {
                fail("pre-release must be non-empty identifiers without leading zeros")
            })?),
            None => (rest, Vec::new()),
        };

        let components: Vec<&str> = core.split('.').collect();
        if components.len() != 3 {
            return Err(fail("expected exactly three numeric components"));
        }

        let mut numbers = [0u64; 3];
        for (slot, component) in numbers.iter_mut().zip(&components) {
            *slot = parse_numeric(component).ok_or_else(|| {
                fail("numeric components must be ASCII decimal without leading zeros")
            })?;
        }

        Ok(Self {
            major: numbers[0],
            minor: numbers[1],
            patch: numbers[2],
            pre_release: pre,
            build_metadata: build,
        })
    }

    /// Whether this version carries pre-release identifiers
    pub fn is_pre_release(&self) -> bool {
        !self.pre_release.is_empty()
    }

    /// Whether `other` has the same (major, minor, patch) triple
    pub fn has_same_numeric_components(&self, other: &Self) -> bool {
        self.major == other.major && self.minor == other.minor && self.patch == other.patch
    }

    /// SemVer precedence: build metadata is ignored entirely
    pub fn cmp_precedence(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then_with(|| self.minor.cmp(&other.minor))
            .then_with(|| self.patch.cmp(&other.patch))
            .then_with(|| cmp_pre_release(&self.pre_release, &other.pre_release))
    }
}

/// Parse one dot-separated identifier list. `allow_leading_zeros` is true for
/// build metadata, false for pre-release (where numeric identifiers must not
/// have leading zeros).
fn parse_identifiers(segment: &str, allow_leading_zeros: bool) -> Option<Vec<String>> {
    if segment.is_empty() {
        return None;
    }
    let mut identifiers = Vec::new();
    for identifier in segment.split('.') {
        if identifier.is_empty() {
            return None;
        }
        if !identifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return None;
        }
        let is_numeric = identifier.chars().all(|c| c.is_ascii_digit());
        if is_numeric && !allow_leading_zeros && identifier.len() > 1 && identifier.starts_with('0')
        {
            return None;
        }
        identifiers.push(identifier.to_string());
    }
    Some(identifiers)
}

/// Parse one numeric core component: ASCII decimal, no leading zeros
fn parse_numeric(component: &str) -> Option<u64> {
    if component.is_empty() || !component.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if component.len() > 1 && component.starts_with('0') {
        return None;
    }
    component.parse().ok()
}

/// SemVer 11.4: a version without pre-release outranks one with; identifier
/// lists compare element-wise with numeric identifiers lower than alphanumeric.
fn cmp_pre_release(a: &[String], b: &[String]) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }

    for (left, right) in a.iter().zip(b.iter()) {
        let ord = match (parse_numeric(left), parse_numeric(right)) {
            (Some(l), Some(r)) => l.cmp(&r),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => left.cmp(right),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }

    a.len().cmp(&b.len())
}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SemanticVersion {
    /// Total order: SemVer precedence, then build metadata lexically so the
    /// order stays consistent with equality
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_precedence(other)
            .then_with(|| self.build_metadata.cmp(&other.build_metadata))
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.pre_release.is_empty() {
            write!(f, "-{}", self.pre_release.join("."))?;
        }
        if !self.build_metadata.is_empty() {
            write!(f, "+{}", self.build_metadata.join("."))?;
        }
        Ok(())
    }
}

/// A version string exactly as recorded in Cartfile.resolved
///
/// Either parses as a [`SemanticVersion`] or is an opaque commit identifier.
/// Ordering prefers semantic ordering; unparseable values collate as `0.0.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PinnedVersion {
    commitish: String,
}

impl PinnedVersion {
    pub fn new(commitish: impl Into<String>) -> Self {
        Self {
            commitish: commitish.into(),
        }
    }

    /// The raw commitish string
    pub fn commitish(&self) -> &str {
        &self.commitish
    }

    /// The semantic interpretation, when the string parses as one
    pub fn semantic(&self) -> Option<SemanticVersion> {
        SemanticVersion::parse(&self.commitish).ok()
    }
}

impl PartialOrd for PinnedVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PinnedVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let zero = SemanticVersion::new(0, 0, 0);
        let left = self.semantic().unwrap_or_else(|| zero.clone());
        let right = other.semantic().unwrap_or(zero);
        left.cmp(&right)
            .then_with(|| self.commitish.cmp(&other.commitish))
    }
}

impl fmt::Display for PinnedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.commitish)
    }
}
