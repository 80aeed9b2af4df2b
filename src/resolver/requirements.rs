//! Requirement accumulation with blame tracking
//!
//! Every dependency's specifiers are intersected as the graph expands; when
//! an intersection comes up empty the error cites both constraining parents.

use std::collections::HashMap;

use crate::dependency::DependencyId;
use crate::error::{Result, UticaError};
use crate::specifier::{intersection, VersionSpecifier};

/// One recorded constraint and where it came from (`None` = the root Cartfile)
#[derive(Debug, Clone)]
struct Source {
    specifier: VersionSpecifier,
    required_by: Option<DependencyId>,
}

#[derive(Debug, Clone)]
struct Entry {
    merged: VersionSpecifier,
    sources: Vec<Source>,
}

/// The requirement set accumulated during resolution
#[derive(Debug, Clone, Default)]
pub struct Requirements {
    entries: HashMap<DependencyId, Entry>,
}

impl Requirements {
    /// Seed requirements from the root constraint set
    pub fn from_roots<'a, I>(roots: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a DependencyId, &'a VersionSpecifier)>,
    {
        let mut requirements = Requirements::default();
        for (dependency, specifier) in roots {
            requirements.merge(dependency, specifier, None)?;
        }
        Ok(requirements)
    }

    /// Intersect a new constraint into the set
    pub fn merge(
        &mut self,
        dependency: &DependencyId,
        specifier: &VersionSpecifier,
        required_by: Option<&DependencyId>,
    ) -> Result<()> {
        let source = Source {
            specifier: specifier.clone(),
            required_by: required_by.cloned(),
        };

        match self.entries.get_mut(dependency) {
            None => {
                self.entries.insert(
                    dependency.clone(),
                    Entry {
                        merged: specifier.clone(),
                        sources: vec![source],
                    },
                );
            }
            Some(entry) => {
                let Some(merged) = intersection(&entry.merged, specifier) else {
                    // Cite the recorded source that actually conflicts with
                    // the newcomer, preferring the stricter one
                    let blame = entry
                        .sources
                        .iter()
                        .filter(|s| intersection(&s.specifier, specifier).is_none())
                        .max_by_key(|s| s.specifier.strictness())
                        .or_else(|| entry.sources.last())
                        .cloned()
                        .unwrap_or(Source {
                            specifier: entry.merged.clone(),
                            required_by: None,
                        });
                    return Err(UticaError::IncompatibleRequirements {
                        dependency: dependency.to_string(),
                        existing: describe(&blame),
                        new: describe(&source),
                    });
                };
                entry.merged = merged;
                entry.sources.push(source);
            }
        }
        Ok(())
    }

    /// The combined specifier for a dependency, when one is recorded
    pub fn merged_for(&self, dependency: &DependencyId) -> Option<&VersionSpecifier> {
        self.entries.get(dependency).map(|entry| &entry.merged)
    }

    /// All required dependencies with their combined specifiers, in
    /// deterministic order
    pub fn sorted(&self) -> Vec<(&DependencyId, &VersionSpecifier)> {
        let mut entries: Vec<(&DependencyId, &VersionSpecifier)> = self
            .entries
            .iter()
            .map(|(dependency, entry)| (dependency, &entry.merged))
            .collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        entries
    }
}

fn describe(source: &Source) -> String {
    let specifier = if source.specifier.to_string().is_empty() {
        "(any version)".to_string()
    } else {
        source.specifier.to_string()
    };
    match &source.required_by {
        Some(parent) => format!("{specifier} (required by {parent})"),
        None => format!("{specifier} (specified in the Cartfile)"),
    }
}
