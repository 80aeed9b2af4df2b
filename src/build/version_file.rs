//! Version-file protocol
//!
//! A small JSON document next to each built artifact records the pinned
//! version, the toolchain identity, and a content hash per built framework.
//! A build is skipped when the stored document still describes the current
//! invocation and the artifacts on disk.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, UticaError};
use crate::hash;

/// Framework names claimed per platform, used to separate one artifact's
/// fingerprint from its siblings in the shared build tree
pub type ClaimedFrameworks = BTreeMap<String, BTreeSet<String>>;

/// One built framework: its bundle name and the hash of its binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkEntry {
    pub name: String,
    pub hash: String,
}

/// The identifying strings of one build invocation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BuildIdentity {
    pub commitish: String,
    pub configuration: String,
    pub toolchain_identifier: String,
    pub swift_toolchain_version: String,
}

/// The per-artifact fingerprint driving cache invalidation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct VersionFile {
    /// The pinned version exactly as recorded in the lockfile
    pub commitish: String,
    pub configuration: String,
    #[serde(default)]
    pub toolchain_identifier: String,
    #[serde(default)]
    pub swift_toolchain_version: String,
    /// Framework entries keyed by platform name
    #[serde(flatten)]
    pub platforms: BTreeMap<String, Vec<FrameworkEntry>>,
}

impl VersionFile {
    /// Assemble a fresh fingerprint from built framework binaries
    pub fn new(
        identity: &BuildIdentity,
        platforms: BTreeMap<String, Vec<FrameworkEntry>>,
    ) -> Self {
        Self {
            commitish: identity.commitish.clone(),
            configuration: identity.configuration.clone(),
            toolchain_identifier: identity.toolchain_identifier.clone(),
            swift_toolchain_version: identity.swift_toolchain_version.clone(),
            platforms,
        }
    }

    /// Read a version file; `Ok(None)` when it does not exist
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.is_file() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path).map_err(|e| UticaError::FileReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let parsed = serde_json::from_str(&contents).map_err(|e| UticaError::FileReadFailed {
            path: path.display().to_string(),
            reason: format!("invalid version file: {e}"),
        })?;
        Ok(Some(parsed))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| UticaError::FileWriteFailed {
                path: parent.display().to_string(),
                reason: e.to_string(),
            })?;
        }
        let contents =
            serde_json::to_string_pretty(self).map_err(|e| UticaError::FileWriteFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        std::fs::write(path, contents).map_err(|e| UticaError::FileWriteFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// The recorded framework names, keyed by platform
    pub fn recorded_names(&self) -> ClaimedFrameworks {
        self.platforms
            .iter()
            .map(|(platform, entries)| {
                (
                    platform.clone(),
                    entries.iter().map(|entry| entry.name.clone()).collect(),
                )
            })
            .collect()
    }

    /// Whether this stored fingerprint still covers the current invocation
    ///
    /// The commitish, configuration, and toolchain identity must equal the
    /// current ones, and for every requested platform the recorded
    /// `(name, hash)` set must equal what the on-disk artifacts yield: each
    /// recorded framework's binary must hash to its stored value, and the
    /// platform directory may hold no framework beyond the recorded names
    /// (frameworks claimed by other artifacts' fingerprints excepted). A
    /// platform missing from the file, a framework missing from disk, or a
    /// stray framework on disk is a mismatch.
    pub fn matches(
        &self,
        identity: &BuildIdentity,
        platforms: &[String],
        build_dir: &Path,
        claimed_elsewhere: &ClaimedFrameworks,
    ) -> bool {
        if self.commitish != identity.commitish
            || self.configuration != identity.configuration
            || self.toolchain_identifier != identity.toolchain_identifier
            || self.swift_toolchain_version != identity.swift_toolchain_version
        {
            return false;
        }

        platforms.iter().all(|platform| {
            let Some(entries) = self.platforms.get(platform) else {
                return false;
            };

            let hashes_match = entries.iter().all(|entry| {
                let binary = build_dir
                    .join(platform)
                    .join(format!("{}.framework", entry.name))
                    .join(&entry.name);
                match hash::hash_file(&binary) {
                    Ok(current) => current == entry.hash,
                    Err(_) => false,
                }
            });
            if !hashes_match {
                return false;
            }

            // Anything on disk that neither this fingerprint nor a sibling
            // one accounts for means the artifacts have drifted
            let recorded: BTreeSet<&str> =
                entries.iter().map(|entry| entry.name.as_str()).collect();
            let claimed = claimed_elsewhere.get(platform);
            on_disk_framework_names(build_dir, platform)
                .iter()
                .all(|name| {
                    recorded.contains(name.as_str())
                        || claimed.is_some_and(|names| names.contains(name))
                })
        })
    }
}

/// The `<Name>.framework` bundle names present under one platform directory
fn on_disk_framework_names(build_dir: &Path, platform: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let Ok(entries) = std::fs::read_dir(build_dir.join(platform)) else {
        return names;
    };
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        if let Some(name) = file_name.to_string_lossy().strip_suffix(".framework") {
            names.insert(name.to_string());
        }
    }
    names
}

/// Hash a framework binary into a version-file entry
pub fn entry_for_framework(name: &str, binary_path: &Path) -> Result<FrameworkEntry> {
    Ok(FrameworkEntry {
        name: name.to_string(),
        hash: hash::hash_file(binary_path)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_framework(build_dir: &Path, platform: &str, name: &str, binary: &[u8]) -> std::path::PathBuf {
        let framework = build_dir.join(platform).join(format!("{name}.framework"));
        std::fs::create_dir_all(&framework).unwrap();
        let binary_path = framework.join(name);
        std::fs::write(&binary_path, binary).unwrap();
        binary_path
    }

    fn identity(commitish: &str, configuration: &str) -> BuildIdentity {
        BuildIdentity {
            commitish: commitish.to_string(),
            configuration: configuration.to_string(),
            toolchain_identifier: "com.apple.dt.toolchain.XcodeDefault".to_string(),
            swift_toolchain_version: "5.9".to_string(),
        }
    }

    fn platforms(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn no_claims() -> ClaimedFrameworks {
        ClaimedFrameworks::new()
    }

    fn fingerprint(build_dir: &Path, platform: &str, name: &str, id: &BuildIdentity) -> VersionFile {
        let binary = build_dir
            .join(platform)
            .join(format!("{name}.framework"))
            .join(name);
        let mut map = BTreeMap::new();
        map.insert(
            platform.to_string(),
            vec![entry_for_framework(name, &binary).unwrap()],
        );
        VersionFile::new(id, map)
    }

    #[test]
    fn test_round_trip_serialization() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".Dep.version");

        let mut map = BTreeMap::new();
        map.insert(
            "iOS".to_string(),
            vec![FrameworkEntry {
                name: "Dep".to_string(),
                hash: "abc123".to_string(),
            }],
        );
        let version_file = VersionFile::new(&identity("1.2.0", "Release"), map);
        version_file.write(&path).unwrap();

        // Platform entries flatten to top-level keys beside the identity
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["commitish"], "1.2.0");
        assert_eq!(
            raw["toolchainIdentifier"],
            "com.apple.dt.toolchain.XcodeDefault"
        );
        assert!(raw["iOS"].is_array());

        let reread = VersionFile::load(&path).unwrap().unwrap();
        assert_eq!(reread, version_file);
    }

    #[test]
    fn test_load_missing_is_none() {
        let temp = TempDir::new().unwrap();
        assert!(VersionFile::load(&temp.path().join(".X.version"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_matches_when_nothing_changed() {
        let temp = TempDir::new().unwrap();
        let build_dir = temp.path().join("Build");
        write_framework(&build_dir, "Mac", "Dep", b"binary-v1");

        let id = identity("1.2.0", "Release");
        let stored = fingerprint(&build_dir, "Mac", "Dep", &id);
        assert!(stored.matches(&id, &platforms(&["Mac"]), &build_dir, &no_claims()));
    }

    #[test]
    fn test_mismatch_on_changed_binary() {
        let temp = TempDir::new().unwrap();
        let build_dir = temp.path().join("Build");
        write_framework(&build_dir, "Mac", "Dep", b"binary-v1");

        let id = identity("1.2.0", "Release");
        let stored = fingerprint(&build_dir, "Mac", "Dep", &id);

        write_framework(&build_dir, "Mac", "Dep", b"binary-v2");
        assert!(!stored.matches(&id, &platforms(&["Mac"]), &build_dir, &no_claims()));
    }

    #[test]
    fn test_mismatch_on_identity_fields() {
        let temp = TempDir::new().unwrap();
        let build_dir = temp.path().join("Build");
        write_framework(&build_dir, "Mac", "Dep", b"binary");

        let id = identity("1.2.0", "Release");
        let stored = fingerprint(&build_dir, "Mac", "Dep", &id);

        assert!(!stored.matches(
            &identity("1.3.0", "Release"),
            &platforms(&["Mac"]),
            &build_dir,
            &no_claims()
        ));
        assert!(!stored.matches(
            &identity("1.2.0", "Debug"),
            &platforms(&["Mac"]),
            &build_dir,
            &no_claims()
        ));

        let other_toolchain = BuildIdentity {
            toolchain_identifier: "org.swift.59202312111a".to_string(),
            ..id
        };
        assert!(!stored.matches(&other_toolchain, &platforms(&["Mac"]), &build_dir, &no_claims()));
    }

    #[test]
    fn test_mismatch_on_missing_platform_or_binary() {
        let temp = TempDir::new().unwrap();
        let build_dir = temp.path().join("Build");
        write_framework(&build_dir, "Mac", "Dep", b"binary");

        let id = identity("1.2.0", "Release");
        let stored = fingerprint(&build_dir, "Mac", "Dep", &id);

        // A platform the file never recorded
        assert!(!stored.matches(&id, &platforms(&["Mac", "iOS"]), &build_dir, &no_claims()));

        // The framework vanished from disk
        std::fs::remove_dir_all(build_dir.join("Mac/Dep.framework")).unwrap();
        assert!(!stored.matches(&id, &platforms(&["Mac"]), &build_dir, &no_claims()));
    }

    #[test]
    fn test_mismatch_on_stray_framework() {
        let temp = TempDir::new().unwrap();
        let build_dir = temp.path().join("Build");
        write_framework(&build_dir, "Mac", "Dep", b"binary");

        let id = identity("1.2.0", "Release");
        let stored = fingerprint(&build_dir, "Mac", "Dep", &id);
        assert!(stored.matches(&id, &platforms(&["Mac"]), &build_dir, &no_claims()));

        // A framework the fingerprint never recorded appears on disk
        write_framework(&build_dir, "Mac", "Stray", b"unknown");
        assert!(!stored.matches(&id, &platforms(&["Mac"]), &build_dir, &no_claims()));
    }

    #[test]
    fn test_sibling_claimed_framework_is_not_a_stray() {
        let temp = TempDir::new().unwrap();
        let build_dir = temp.path().join("Build");
        write_framework(&build_dir, "Mac", "Dep", b"binary");
        write_framework(&build_dir, "Mac", "Sibling", b"other artifact");

        let id = identity("1.2.0", "Release");
        let stored = fingerprint(&build_dir, "Mac", "Dep", &id);
        let sibling = fingerprint(&build_dir, "Mac", "Sibling", &id);

        // Unclaimed, the sibling counts as drift; claimed, it does not
        assert!(!stored.matches(&id, &platforms(&["Mac"]), &build_dir, &no_claims()));
        assert!(stored.matches(&id, &platforms(&["Mac"]), &build_dir, &sibling.recorded_names()));
    }

    #[test]
    fn test_recorded_names() {
        let temp = TempDir::new().unwrap();
        let build_dir = temp.path().join("Build");
        write_framework(&build_dir, "Mac", "Dep", b"binary");

        let stored = fingerprint(&build_dir, "Mac", "Dep", &identity("1.0.0", "Release"));
        let names = stored.recorded_names();
        assert!(names.get("Mac").is_some_and(|set| set.contains("Dep")));
    }
}
