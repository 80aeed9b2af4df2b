//! The external framework builder seam
//!
//! The scheduler drives builds through [`FrameworkBuilder`]; the default
//! implementation shells out to `xcodebuild`. Tests substitute a fake.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Result, UticaError};

use super::graph::BuildNode;
use super::BuildOptions;

/// One framework produced by a build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltFramework {
    pub platform: String,
    pub name: String,
    /// The framework's executable inside its bundle
    pub binary_path: PathBuf,
}

/// What one build invocation produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Built(Vec<BuiltFramework>),
    /// The project cannot be built here (e.g. no shared schemes); the
    /// scheduler downgrades this to an event
    Skipped { reason: String },
}

/// Builds one checked-out dependency into platform frameworks
pub trait FrameworkBuilder: Sync {
    fn build(
        &self,
        node: &BuildNode,
        checkout_dir: &Path,
        build_dir: &Path,
        options: &BuildOptions,
    ) -> Result<BuildOutcome>;
}

/// SDK names per platform label
fn sdk_for_platform(platform: &str) -> &'static str {
    match platform {
        "Mac" => "macosx",
        "iOS" => "iphoneos",
        "tvOS" => "appletvos",
        "watchOS" => "watchos",
        _ => "macosx",
    }
}

/// The production builder: `xcodebuild` per shared scheme and platform
pub struct XcodeBuilder;

impl XcodeBuilder {
    /// Shared schemes reported by `xcodebuild -list`
    fn shared_schemes(&self, checkout_dir: &Path) -> Result<Vec<String>> {
        let output = Command::new("xcodebuild")
            .arg("-list")
            .current_dir(checkout_dir)
            .output()
            .map_err(|e| UticaError::SubprocessFailed {
                command: "xcodebuild -list".to_string(),
                output: e.to_string(),
            })?;
        if !output.status.success() {
            return Ok(Vec::new());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut schemes = Vec::new();
        let mut in_schemes = false;
        for line in stdout.lines() {
            let trimmed = line.trim();
            if trimmed == "Schemes:" {
                in_schemes = true;
                continue;
            }
            if in_schemes {
                if trimmed.is_empty() {
                    break;
                }
                schemes.push(trimmed.to_string());
            }
        }
        Ok(schemes)
    }

    fn run_build(
        &self,
        checkout_dir: &Path,
        scheme: &str,
        platform: &str,
        options: &BuildOptions,
    ) -> Result<()> {
        let mut command = Command::new("xcodebuild");
        command
            .current_dir(checkout_dir)
            .arg("-scheme")
            .arg(scheme)
            .arg("-configuration")
            .arg(&options.configuration)
            .arg("-sdk")
            .arg(sdk_for_platform(platform))
            .arg("build");
        if let Some(toolchain) = &options.toolchain {
            command.arg("-toolchain").arg(toolchain);
        }
        if let Some(derived_data) = &options.derived_data {
            command.arg("-derivedDataPath").arg(derived_data);
        }

        let output = command.output().map_err(|e| UticaError::SubprocessFailed {
            command: format!("{command:?}"),
            output: e.to_string(),
        })?;
        if !output.status.success() {
            return Err(UticaError::SubprocessFailed {
                command: format!("{command:?}"),
                output: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(())
    }

    /// Copy the scheme's products out of derived data into the build tree
    fn collect_products(
        &self,
        derived_data: &Path,
        platform: &str,
        build_dir: &Path,
        options: &BuildOptions,
    ) -> Result<Vec<BuiltFramework>> {
        let sdk = sdk_for_platform(platform);
        let products_dir = if sdk == "macosx" {
            derived_data
                .join("Build/Products")
                .join(&options.configuration)
        } else {
            derived_data
                .join("Build/Products")
                .join(format!("{}-{sdk}", options.configuration))
        };

        let mut built = Vec::new();
        let Ok(entries) = std::fs::read_dir(&products_dir) else {
            return Ok(built);
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(name) = file_name.strip_suffix(".framework") else {
                continue;
            };

            let destination = build_dir.join(platform).join(file_name);
            copy_bundle(&path, &destination)?;
            built.push(BuiltFramework {
                platform: platform.to_string(),
                name: name.to_string(),
                binary_path: destination.join(name),
            });
        }
        Ok(built)
    }
}

impl FrameworkBuilder for XcodeBuilder {
    fn build(
        &self,
        _node: &BuildNode,
        checkout_dir: &Path,
        build_dir: &Path,
        options: &BuildOptions,
    ) -> Result<BuildOutcome> {
        let schemes = self.shared_schemes(checkout_dir)?;
        if schemes.is_empty() {
            return Ok(BuildOutcome::Skipped {
                reason: "project has no shared schemes".to_string(),
            });
        }

        let derived_data = match &options.derived_data {
            Some(path) => path.clone(),
            None => checkout_dir.join(".utica-derived-data"),
        };

        let mut produced: BTreeMap<(String, String), BuiltFramework> = BTreeMap::new();
        for scheme in &schemes {
            for platform in &options.platforms {
                self.run_build(checkout_dir, scheme, platform, options)?;
                for framework in
                    self.collect_products(&derived_data, platform, build_dir, options)?
                {
                    produced.insert(
                        (framework.platform.clone(), framework.name.clone()),
                        framework,
                    );
                }
            }
        }

        Ok(BuildOutcome::Built(produced.into_values().collect()))
    }
}

fn copy_bundle(source: &Path, destination: &Path) -> Result<()> {
    if destination.exists() {
        std::fs::remove_dir_all(destination).map_err(|e| UticaError::FileWriteFailed {
            path: destination.display().to_string(),
            reason: e.to_string(),
        })?;
    }
    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent).map_err(|e| UticaError::FileWriteFailed {
            path: parent.display().to_string(),
            reason: e.to_string(),
        })?;
    }
    copy_dir(source, destination)
}

fn copy_dir(source: &Path, destination: &Path) -> Result<()> {
    std::fs::create_dir_all(destination).map_err(|e| UticaError::FileWriteFailed {
        path: destination.display().to_string(),
        reason: e.to_string(),
    })?;
    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        let target = destination.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(|e| UticaError::FileWriteFailed {
                path: target.display().to_string(),
                reason: e.to_string(),
            })?;
        }
    }
    Ok(())
}
