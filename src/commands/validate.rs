//! `utica validate` - check Cartfile.resolved against the declared
//! requirements
//!
//! Root constraints come from the Cartfile pair; transitive constraints come
//! from the Cartfiles of dependencies already checked out. Nothing is
//! fetched.

use std::path::PathBuf;

use console::style;

use crate::cartfile::{Cartfile, ResolvedCartfile, CARTFILE_NAME};
use crate::dependency::DependencyId;
use crate::error::{Result, UticaError};
use crate::project::Project;
use crate::specifier::VersionSpecifier;

use super::session;

pub fn run(project_directory: Option<PathBuf>) -> Result<()> {
    let session = session(project_directory)?;
    let cartfile = session.project.load_combined_cartfile()?;
    let resolved = session.project.load_resolved_cartfile()?;

    let mut problems = Vec::new();
    check_constraints(&resolved, &cartfile.dependencies, None, &mut problems);

    for (dependency, _) in &resolved.dependencies {
        if matches!(dependency, DependencyId::Binary(_)) {
            continue;
        }
        let nested = nested_cartfile(&session.project, dependency);
        if let Some(nested) = nested {
            check_constraints(&resolved, &nested.dependencies, Some(dependency), &mut problems);
        }
    }

    if !problems.is_empty() {
        return Err(UticaError::ResolvedCartfileInvalid {
            details: problems.join("\n"),
        });
    }

    println!(
        "{}",
        style("No incompatibilities found in Cartfile.resolved").green()
    );
    Ok(())
}

fn nested_cartfile(project: &Project, dependency: &DependencyId) -> Option<Cartfile> {
    let manifest = project.checkout_dir(&dependency.name()).join(CARTFILE_NAME);
    manifest
        .is_file()
        .then(|| Cartfile::load(&manifest).ok())
        .flatten()
}

fn check_constraints(
    resolved: &ResolvedCartfile,
    constraints: &[(DependencyId, VersionSpecifier)],
    source: Option<&DependencyId>,
    problems: &mut Vec<String>,
) {
    let describe_source = || match source {
        Some(parent) => format!("required by {parent}"),
        None => "specified in the Cartfile".to_string(),
    };

    for (dependency, specifier) in constraints {
        match resolved.version_for(dependency) {
            None => problems.push(format!(
                "{dependency} is missing from Cartfile.resolved ({})",
                describe_source()
            )),
            Some(version) if !specifier.is_satisfied_by(version) => problems.push(format!(
                "{dependency} is pinned to {version}, which does not satisfy {specifier} ({})",
                describe_source()
            )),
            Some(_) => {}
        }
    }
}
