//! Dependency resolution
//!
//! This module handles:
//! - The greedy three-phase fixpoint over (candidates, requirements, resolved)
//! - Pinning git references to commit SHAs within one run
//! - Partial updates that hold non-updated dependencies at their locked
//!   versions

pub mod provider;
pub mod requirements;

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::cartfile::ResolvedCartfile;
use crate::dependency::DependencyId;
use crate::error::{Result, UticaError};
use crate::specifier::VersionSpecifier;
use crate::version::PinnedVersion;

pub use provider::{DependencyProvider, ProjectDependencyProvider};
pub use requirements::Requirements;

/// Version admission policy beyond the specifier itself
///
/// The only live policy pins dependencies outside an update set to their
/// previously resolved versions while those still satisfy the current
/// specifier.
#[derive(Debug, Clone, Default)]
enum VersionFilter {
    #[default]
    Permissive,
    PinUnlessUpdated {
        last_resolved: HashMap<DependencyId, PinnedVersion>,
        to_update: HashSet<String>,
    },
}

impl VersionFilter {
    fn permits(
        &self,
        dependency: &DependencyId,
        version: &PinnedVersion,
        specifier: &VersionSpecifier,
    ) -> bool {
        match self {
            VersionFilter::Permissive => true,
            VersionFilter::PinUnlessUpdated {
                last_resolved,
                to_update,
            } => {
                if to_update.contains(&dependency.name()) {
                    return true;
                }
                match last_resolved.get(dependency) {
                    Some(pinned) if specifier.is_satisfied_by(pinned) => version == pinned,
                    // Not previously resolved, or the lock no longer
                    // satisfies the tightened specifier: resolve freely
                    _ => true,
                }
            }
        }
    }
}

/// One fixpoint iteration's input: the requirement set and what is already
/// pinned. Each phase produces a new state rather than mutating in place.
#[derive(Debug, Clone)]
struct ResolverState {
    requirements: Requirements,
    resolved: BTreeMap<DependencyId, PinnedVersion>,
}

/// The greedy constraint resolver
pub struct Resolver<'a, P: DependencyProvider> {
    provider: &'a P,
}

impl<'a, P: DependencyProvider> Resolver<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self { provider }
    }

    /// Resolve the root constraint set into an exact pinned version for
    /// every transitive dependency
    ///
    /// With both `last_resolved` and a non-empty `dependencies_to_update`,
    /// only the named dependencies move; everything else keeps its locked
    /// version for as long as that version satisfies the current
    /// requirements.
    pub fn resolve(
        &self,
        roots: &[(DependencyId, VersionSpecifier)],
        last_resolved: Option<&ResolvedCartfile>,
        dependencies_to_update: Option<&[String]>,
    ) -> Result<ResolvedCartfile> {
        let update_set: HashSet<String> = dependencies_to_update
            .unwrap_or_default()
            .iter()
            .cloned()
            .collect();

        let partial = match last_resolved {
            Some(resolved) if !update_set.is_empty() && !resolved.dependencies.is_empty() => {
                Some(resolved)
            }
            _ => None,
        };

        let (roots, filter) = match partial {
            None => (roots.to_vec(), VersionFilter::Permissive),
            Some(resolved) => {
                let locked: HashMap<DependencyId, PinnedVersion> =
                    resolved.dependencies.iter().cloned().collect();
                let restricted: Vec<(DependencyId, VersionSpecifier)> = roots
                    .iter()
                    .filter(|(dependency, _)| {
                        locked.contains_key(dependency) || update_set.contains(&dependency.name())
                    })
                    .cloned()
                    .collect();
                (
                    restricted,
                    VersionFilter::PinUnlessUpdated {
                        last_resolved: locked,
                        to_update: update_set,
                    },
                )
            }
        };

        // Pin root git references before they enter the requirement set, the
        // same way expand pins child references, so every stored
        // `GitReference` names a commit SHA
        let mut pinned_roots = Vec::with_capacity(roots.len());
        for (dependency, specifier) in roots {
            let specifier = self.pin_git_reference(&dependency, specifier)?;
            pinned_roots.push((dependency, specifier));
        }

        let state = ResolverState {
            requirements: Requirements::from_roots(
                pinned_roots
                    .iter()
                    .map(|(dependency, specifier)| (dependency, specifier)),
            )?,
            resolved: BTreeMap::new(),
        };

        let resolved = self.step(state, &filter)?;
        Ok(ResolvedCartfile::new(resolved))
    }

    /// Rewrite a `GitReference` specifier to the commit SHA it resolves to,
    /// so the graph cannot drift mid-resolution
    fn pin_git_reference(
        &self,
        dependency: &DependencyId,
        specifier: VersionSpecifier,
    ) -> Result<VersionSpecifier> {
        match specifier {
            VersionSpecifier::GitReference(reference) => Ok(VersionSpecifier::GitReference(
                self.provider
                    .resolve_git_reference(dependency, &reference)?
                    .commitish()
                    .to_string(),
            )),
            other => Ok(other),
        }
    }

    /// One recursion of the select → expand → commit fixpoint
    fn step(
        &self,
        state: ResolverState,
        filter: &VersionFilter,
    ) -> Result<BTreeMap<DependencyId, PinnedVersion>> {
        // Select: the best surviving version for every unresolved requirement
        let mut candidates: BTreeMap<DependencyId, PinnedVersion> = BTreeMap::new();
        for (dependency, specifier) in state.requirements.sorted() {
            if state.resolved.contains_key(dependency) {
                continue;
            }
            let version = self.select_candidate(dependency, specifier, filter)?;
            candidates.insert(dependency.clone(), version);
        }

        // Termination: every requirement already has a satisfying resolution
        if candidates.is_empty() {
            return Ok(state.resolved);
        }

        // Expand: pull in each candidate's declarations at its pinned
        // version, pinning child git references as they enter the set
        let mut requirements = state.requirements;
        for (dependency, version) in &candidates {
            for (child, child_specifier) in self.provider.dependencies_for(dependency, version)? {
                let child_specifier = self.pin_git_reference(&child, child_specifier)?;
                requirements.merge(&child, &child_specifier, Some(dependency))?;
            }
        }

        // Commit: keep only resolutions the tightened requirements still
        // admit; anything dropped is re-selected next round
        let mut resolved = state.resolved;
        resolved.extend(candidates);
        resolved.retain(|dependency, version| {
            requirements
                .merged_for(dependency)
                .map_or(true, |specifier| specifier.is_satisfied_by(version))
        });

        self.step(
            ResolverState {
                requirements,
                resolved,
            },
            filter,
        )
    }

    fn select_candidate(
        &self,
        dependency: &DependencyId,
        specifier: &VersionSpecifier,
        filter: &VersionFilter,
    ) -> Result<PinnedVersion> {
        // Git references were pinned to commit SHAs when they entered the
        // requirement set; the reference itself is the selection
        if let VersionSpecifier::GitReference(reference) = specifier {
            return Ok(PinnedVersion::new(reference.clone()));
        }

        let mut viable: Vec<PinnedVersion> = self
            .provider
            .available_versions(dependency)?
            .into_iter()
            .filter(|version| specifier.is_satisfied_by(version))
            .filter(|version| filter.permits(dependency, version, specifier))
            .collect();
        viable.sort();

        viable.pop().ok_or_else(|| UticaError::RequiredVersionNotFound {
            dependency: dependency.to_string(),
            specifier: if specifier.to_string().is_empty() {
                "(any version)".to_string()
            } else {
                specifier.to_string()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::SemanticVersion;
    use std::collections::HashMap;

    /// In-memory backend: versions per dependency plus per-version
    /// declaration lists
    #[derive(Default)]
    struct MemoryProvider {
        versions: HashMap<DependencyId, Vec<PinnedVersion>>,
        graphs: HashMap<(DependencyId, PinnedVersion), Vec<(DependencyId, VersionSpecifier)>>,
        references: HashMap<(DependencyId, String), PinnedVersion>,
    }

    impl MemoryProvider {
        fn publish(&mut self, dependency: &DependencyId, versions: &[&str]) {
            self.versions.insert(
                dependency.clone(),
                versions.iter().map(|v| PinnedVersion::new(*v)).collect(),
            );
        }

        fn declare(
            &mut self,
            dependency: &DependencyId,
            version: &str,
            children: Vec<(DependencyId, VersionSpecifier)>,
        ) {
            self.graphs.insert(
                (dependency.clone(), PinnedVersion::new(version)),
                children,
            );
        }
    }

    impl DependencyProvider for MemoryProvider {
        fn available_versions(&self, dependency: &DependencyId) -> Result<Vec<PinnedVersion>> {
            self.versions.get(dependency).cloned().ok_or_else(|| {
                UticaError::TaggedVersionNotFound {
                    dependency: dependency.to_string(),
                }
            })
        }

        fn resolve_git_reference(
            &self,
            dependency: &DependencyId,
            reference: &str,
        ) -> Result<PinnedVersion> {
            self.references
                .get(&(dependency.clone(), reference.to_string()))
                .cloned()
                .ok_or_else(|| UticaError::GitRefResolveFailed {
                    git_ref: reference.to_string(),
                    reason: "unknown reference".to_string(),
                })
        }

        fn dependencies_for(
            &self,
            dependency: &DependencyId,
            version: &PinnedVersion,
        ) -> Result<Vec<(DependencyId, VersionSpecifier)>> {
            Ok(self
                .graphs
                .get(&(dependency.clone(), version.clone()))
                .cloned()
                .unwrap_or_default())
        }
    }

    fn dep(id: &str) -> DependencyId {
        DependencyId::from_github_identifier(id).unwrap()
    }

    fn v(s: &str) -> SemanticVersion {
        SemanticVersion::parse(s).unwrap()
    }

    fn version_of(resolved: &ResolvedCartfile, dependency: &DependencyId) -> String {
        resolved.version_for(dependency).unwrap().to_string()
    }

    #[test]
    fn test_resolves_highest_satisfying_versions() {
        let a = dep("owner/A");
        let b = dep("owner/B");
        let mut provider = MemoryProvider::default();
        provider.publish(&a, &["1.0.0", "1.2.0"]);
        provider.publish(&b, &["2.0.0", "2.1.0", "2.2.0"]);
        provider.declare(&a, "1.2.0", vec![(b.clone(), VersionSpecifier::AtLeast(v("2.1.0")))]);

        let roots = vec![
            (a.clone(), VersionSpecifier::CompatibleWith(v("1.0.0"))),
            (b.clone(), VersionSpecifier::AtLeast(v("2.0.0"))),
        ];
        let resolved = Resolver::new(&provider).resolve(&roots, None, None).unwrap();

        assert_eq!(version_of(&resolved, &a), "1.2.0");
        assert_eq!(version_of(&resolved, &b), "2.2.0");
    }

    #[test]
    fn test_transitive_constraint_invalidates_earlier_pick() {
        // B resolves to 3.0.0 in round one; A's declaration then caps B, so
        // the commit phase drops it and round two re-selects 2.0.x
        let a = dep("owner/A");
        let b = dep("owner/B");
        let mut provider = MemoryProvider::default();
        provider.publish(&a, &["1.0.0"]);
        provider.publish(&b, &["2.0.0", "2.0.5", "3.0.0"]);
        provider.declare(
            &a,
            "1.0.0",
            vec![(b.clone(), VersionSpecifier::CompatibleWith(v("2.0.0")))],
        );

        let roots = vec![
            (a.clone(), VersionSpecifier::Any),
            (b.clone(), VersionSpecifier::AtLeast(v("2.0.0"))),
        ];
        let resolved = Resolver::new(&provider).resolve(&roots, None, None).unwrap();
        assert_eq!(version_of(&resolved, &b), "2.0.5");
    }

    #[test]
    fn test_required_version_not_found() {
        let a = dep("owner/A");
        let mut provider = MemoryProvider::default();
        provider.publish(&a, &["1.0.0"]);

        let roots = vec![(a.clone(), VersionSpecifier::AtLeast(v("2.0.0")))];
        let err = Resolver::new(&provider).resolve(&roots, None, None).unwrap_err();
        assert!(matches!(err, UticaError::RequiredVersionNotFound { .. }));
    }

    #[test]
    fn test_incompatible_requirements() {
        let a = dep("owner/A");
        let c = dep("owner/C");
        let shared = dep("owner/Shared");
        let mut provider = MemoryProvider::default();
        provider.publish(&a, &["1.0.0"]);
        provider.publish(&c, &["1.0.0"]);
        provider.publish(&shared, &["1.0.0", "2.0.0"]);
        provider.declare(
            &a,
            "1.0.0",
            vec![(shared.clone(), VersionSpecifier::CompatibleWith(v("1.0.0")))],
        );
        provider.declare(
            &c,
            "1.0.0",
            vec![(shared.clone(), VersionSpecifier::CompatibleWith(v("2.0.0")))],
        );

        let roots = vec![
            (a.clone(), VersionSpecifier::Any),
            (c.clone(), VersionSpecifier::Any),
        ];
        let err = Resolver::new(&provider).resolve(&roots, None, None).unwrap_err();
        assert!(matches!(err, UticaError::IncompatibleRequirements { .. }));
    }

    #[test]
    fn test_git_reference_pins_to_sha() {
        let a = dep("owner/A");
        let mut provider = MemoryProvider::default();
        provider.references.insert(
            (a.clone(), "development".to_string()),
            PinnedVersion::new("8ff4393ede2ca86d5a78edaf62b3a14d90bc2302"),
        );

        let roots = vec![(
            a.clone(),
            VersionSpecifier::GitReference("development".to_string()),
        )];
        let resolved = Resolver::new(&provider).resolve(&roots, None, None).unwrap();
        assert_eq!(
            version_of(&resolved, &a),
            "8ff4393ede2ca86d5a78edaf62b3a14d90bc2302"
        );
    }

    #[test]
    fn test_git_reference_commitment_survives_later_rounds() {
        // A is pinned to a branch whose declarations pull in B, forcing a
        // second selection round; the commit phase must keep A's SHA
        let a = dep("owner/A");
        let b = dep("owner/B");
        let sha = "8ff4393ede2ca86d5a78edaf62b3a14d90bc2302";
        let mut provider = MemoryProvider::default();
        provider.references.insert(
            (a.clone(), "development".to_string()),
            PinnedVersion::new(sha),
        );
        provider.publish(&b, &["2.0.0", "2.1.0"]);
        provider.declare(
            &a,
            sha,
            vec![(b.clone(), VersionSpecifier::AtLeast(v("2.1.0")))],
        );

        let roots = vec![(
            a.clone(),
            VersionSpecifier::GitReference("development".to_string()),
        )];
        let resolved = Resolver::new(&provider).resolve(&roots, None, None).unwrap();
        assert_eq!(version_of(&resolved, &a), sha);
        assert_eq!(version_of(&resolved, &b), "2.1.0");
    }

    #[test]
    fn test_partial_update_keeps_locked_version() {
        let a = dep("owner/A");
        let b = dep("owner/B");
        let mut provider = MemoryProvider::default();
        provider.publish(&a, &["1.0.0", "1.5.0"]);
        provider.publish(&b, &["2.0.0", "2.4.0"]);

        let roots = vec![
            (a.clone(), VersionSpecifier::CompatibleWith(v("1.0.0"))),
            (b.clone(), VersionSpecifier::AtLeast(v("2.0.0"))),
        ];
        let last = ResolvedCartfile::new([
            (a.clone(), PinnedVersion::new("1.0.0")),
            (b.clone(), PinnedVersion::new("2.0.0")),
        ]);

        let resolved = Resolver::new(&provider)
            .resolve(&roots, Some(&last), Some(&["A".to_string()]))
            .unwrap();

        // A moves; B stays where the lockfile had it
        assert_eq!(version_of(&resolved, &a), "1.5.0");
        assert_eq!(version_of(&resolved, &b), "2.0.0");
    }

    #[test]
    fn test_partial_update_releases_pin_when_specifier_tightened() {
        let a = dep("owner/A");
        let b = dep("owner/B");
        let mut provider = MemoryProvider::default();
        provider.publish(&a, &["1.0.0"]);
        provider.publish(&b, &["2.0.0", "2.4.0"]);

        // The lockfile predates a tightened Cartfile constraint on B
        let roots = vec![
            (a.clone(), VersionSpecifier::Any),
            (b.clone(), VersionSpecifier::AtLeast(v("2.2.0"))),
        ];
        let last = ResolvedCartfile::new([
            (a.clone(), PinnedVersion::new("1.0.0")),
            (b.clone(), PinnedVersion::new("2.0.0")),
        ]);

        let resolved = Resolver::new(&provider)
            .resolve(&roots, Some(&last), Some(&["A".to_string()]))
            .unwrap();
        assert_eq!(version_of(&resolved, &b), "2.4.0");
    }

    #[test]
    fn test_re_resolution_is_idempotent() {
        let a = dep("owner/A");
        let b = dep("owner/B");
        let mut provider = MemoryProvider::default();
        provider.publish(&a, &["1.0.0", "1.2.0"]);
        provider.publish(&b, &["2.0.0", "2.1.0", "2.2.0"]);
        provider.declare(&a, "1.2.0", vec![(b.clone(), VersionSpecifier::AtLeast(v("2.1.0")))]);

        let roots = vec![
            (a.clone(), VersionSpecifier::CompatibleWith(v("1.0.0"))),
            (b.clone(), VersionSpecifier::AtLeast(v("2.0.0"))),
        ];
        let resolver = Resolver::new(&provider);
        let first = resolver.resolve(&roots, None, None).unwrap();
        let second = resolver.resolve(&roots, Some(&first), None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_resolution_is_sound() {
        // Every resolved version satisfies every reachable constraint on it
        let a = dep("owner/A");
        let b = dep("owner/B");
        let c = dep("owner/C");
        let mut provider = MemoryProvider::default();
        provider.publish(&a, &["1.0.0", "1.1.0"]);
        provider.publish(&b, &["0.4.0", "0.4.9", "0.5.0"]);
        provider.publish(&c, &["3.0.0", "3.2.0"]);
        provider.declare(
            &a,
            "1.1.0",
            vec![
                (b.clone(), VersionSpecifier::CompatibleWith(v("0.4.0"))),
                (c.clone(), VersionSpecifier::AtLeast(v("3.0.0"))),
            ],
        );

        let roots = vec![(a.clone(), VersionSpecifier::Any)];
        let resolved = Resolver::new(&provider).resolve(&roots, None, None).unwrap();

        assert_eq!(version_of(&resolved, &a), "1.1.0");
        assert_eq!(version_of(&resolved, &b), "0.4.9");
        assert_eq!(version_of(&resolved, &c), "3.2.0");

        for (child, specifier) in provider
            .dependencies_for(&a, &PinnedVersion::new("1.1.0"))
            .unwrap()
        {
            assert!(specifier.is_satisfied_by(resolved.version_for(&child).unwrap()));
        }
    }
}
