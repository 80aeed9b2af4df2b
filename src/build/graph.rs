//! Build graph construction and ordering
//!
//! This module handles:
//! - Deriving a BuildNode per lockfile entry with its direct dependencies
//! - Topological ordering with cycle detection
//! - Restricting the graph to requested dependencies and their closures

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::cartfile::ResolvedCartfile;
use crate::dependency::DependencyId;
use crate::error::{Result, UticaError};
use crate::resolver::DependencyProvider;
use crate::version::PinnedVersion;

/// One entry in the build graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildNode {
    pub dependency: DependencyId,
    pub version: PinnedVersion,
    /// Direct dependencies that are themselves part of the lockfile
    pub dependencies: BTreeSet<DependencyId>,
}

impl BuildNode {
    pub fn name(&self) -> String {
        self.dependency.name()
    }
}

/// Build one node per lockfile entry
///
/// Edges come from each dependency's declarations at its pinned version,
/// restricted to identities present in the lockfile.
pub fn build_graph<P: DependencyProvider>(
    resolved: &ResolvedCartfile,
    provider: &P,
) -> Result<Vec<BuildNode>> {
    let members: HashSet<&DependencyId> =
        resolved.dependencies.iter().map(|(id, _)| id).collect();

    let mut nodes = Vec::with_capacity(resolved.dependencies.len());
    for (dependency, version) in &resolved.dependencies {
        let declared = provider.dependencies_for(dependency, version)?;
        let dependencies: BTreeSet<DependencyId> = declared
            .into_iter()
            .map(|(child, _)| child)
            .filter(|child| members.contains(child))
            .collect();
        nodes.push(BuildNode {
            dependency: dependency.clone(),
            version: version.clone(),
            dependencies,
        });
    }
    Ok(nodes)
}

/// Order nodes so every dependency precedes its dependents; a cycle is a
/// hard error naming the chain
pub fn topological_sort(nodes: Vec<BuildNode>) -> Result<Vec<BuildNode>> {
    let by_id: HashMap<DependencyId, BuildNode> = nodes
        .into_iter()
        .map(|node| (node.dependency.clone(), node))
        .collect();

    let mut order: Vec<DependencyId> = by_id.keys().cloned().collect();
    order.sort();

    let mut sorted = Vec::with_capacity(by_id.len());
    let mut visited: HashSet<DependencyId> = HashSet::new();
    let mut in_progress: Vec<DependencyId> = Vec::new();

    for id in &order {
        visit(id, &by_id, &mut visited, &mut in_progress, &mut sorted)?;
    }
    Ok(sorted)
}

fn visit(
    id: &DependencyId,
    by_id: &HashMap<DependencyId, BuildNode>,
    visited: &mut HashSet<DependencyId>,
    in_progress: &mut Vec<DependencyId>,
    sorted: &mut Vec<BuildNode>,
) -> Result<()> {
    if visited.contains(id) {
        return Ok(());
    }
    if in_progress.contains(id) {
        let mut chain: Vec<String> = in_progress.iter().map(|d| d.to_string()).collect();
        chain.push(id.to_string());
        return Err(UticaError::DependencyCycle {
            chain: chain.join(" -> "),
        });
    }

    let Some(node) = by_id.get(id) else {
        return Ok(());
    };

    in_progress.push(id.clone());
    for child in &node.dependencies {
        visit(child, by_id, visited, in_progress, sorted)?;
    }
    in_progress.pop();

    visited.insert(id.clone());
    sorted.push(node.clone());
    Ok(())
}

/// Restrict a sorted graph to the named dependencies and everything they
/// transitively depend on; an empty filter keeps the whole graph
pub fn restrict_to(sorted: Vec<BuildNode>, names: &[String]) -> Vec<BuildNode> {
    if names.is_empty() {
        return sorted;
    }

    let by_id: HashMap<&DependencyId, &BuildNode> = sorted
        .iter()
        .map(|node| (&node.dependency, node))
        .collect();

    let mut keep: HashSet<DependencyId> = HashSet::new();
    let mut queue: Vec<&DependencyId> = sorted
        .iter()
        .filter(|node| names.contains(&node.name()))
        .map(|node| &node.dependency)
        .collect();

    while let Some(id) = queue.pop() {
        if !keep.insert(id.clone()) {
            continue;
        }
        if let Some(node) = by_id.get(id) {
            queue.extend(node.dependencies.iter());
        }
    }

    sorted
        .into_iter()
        .filter(|node| keep.contains(&node.dependency))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(id: &str) -> DependencyId {
        DependencyId::from_github_identifier(id).unwrap()
    }

    fn node(id: &str, deps: &[&str]) -> BuildNode {
        BuildNode {
            dependency: dep(id),
            version: PinnedVersion::new("1.0.0"),
            dependencies: deps.iter().map(|d| dep(d)).collect(),
        }
    }

    fn names(sorted: &[BuildNode]) -> Vec<String> {
        sorted.iter().map(BuildNode::name).collect()
    }

    #[test]
    fn test_sort_puts_dependencies_first() {
        let sorted = topological_sort(vec![
            node("o/App", &["o/Core", "o/UI"]),
            node("o/UI", &["o/Core"]),
            node("o/Core", &[]),
        ])
        .unwrap();

        let order = names(&sorted);
        let position = |n: &str| order.iter().position(|x| x == n).unwrap();
        assert!(position("Core") < position("UI"));
        assert!(position("UI") < position("App"));
    }

    #[test]
    fn test_sort_detects_cycles() {
        let err = topological_sort(vec![
            node("o/A", &["o/B"]),
            node("o/B", &["o/A"]),
        ])
        .unwrap_err();
        assert!(matches!(err, UticaError::DependencyCycle { .. }));
        assert!(err.to_string().contains("->"));
    }

    #[test]
    fn test_sort_is_deterministic() {
        let build = || {
            topological_sort(vec![
                node("o/C", &[]),
                node("o/A", &[]),
                node("o/B", &[]),
            ])
            .unwrap()
        };
        assert_eq!(names(&build()), names(&build()));
        assert_eq!(names(&build()), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_restrict_keeps_transitive_closure() {
        let sorted = topological_sort(vec![
            node("o/App", &["o/UI"]),
            node("o/UI", &["o/Core"]),
            node("o/Core", &[]),
            node("o/Unrelated", &[]),
        ])
        .unwrap();

        let restricted = restrict_to(sorted, &["UI".to_string()]);
        let order = names(&restricted);
        assert_eq!(order, vec!["Core", "UI"]);
    }

    #[test]
    fn test_restrict_empty_filter_keeps_everything() {
        let sorted = topological_sort(vec![node("o/A", &[]), node("o/B", &[])]).unwrap();
        assert_eq!(restrict_to(sorted, &[]).len(), 2);
    }
}
