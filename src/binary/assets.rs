//! Binary asset selection and installation
//!
//! This module handles:
//! - Choosing which release assets to download for a version
//! - The content-addressed download cache layout
//! - Expanding archives and moving frameworks into the build tree

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use url::Url;
use walkdir::WalkDir;

use crate::cache::Cache;
use crate::error::{Result, UticaError};
use crate::hash::sha256_of_url;

use super::BinaryProjectClient;

/// Serializes writes into the shared on-disk asset cache
static CACHE_WRITE_LOCK: Mutex<()> = Mutex::new(());

/// Cache location for one asset:
/// `<cacheRoot>/binaries/<name>/<version>/<base>-<sha256(url)>.<ext>`
pub fn cached_asset_path(cache: &Cache, name: &str, version: &str, url: &Url) -> PathBuf {
    let file_name = asset_file_name(url);
    let digest = sha256_of_url(url.as_str());
    let keyed = match file_name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => format!("{stem}-{digest}.{extension}"),
        _ => format!("{file_name}-{digest}"),
    };
    cache.binary_asset_dir(name, version).join(keyed)
}

fn asset_file_name(url: &Url) -> String {
    url.path()
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("asset")
        .to_string()
}

fn is_xcframework_asset(file_name: &str) -> bool {
    file_name.to_ascii_lowercase().contains("xcframework")
}

/// The grouping key shared by variants of the same asset: the file name with
/// the framework/xcframework token stripped
fn dedup_key(file_name: &str) -> String {
    file_name
        .to_ascii_lowercase()
        .replace("xcframework", "")
        .replace("framework", "")
}

/// Choose the assets to download for one version
///
/// When `prefer_xcframeworks` is set, xcframework-style assets take priority
/// over single-platform ones. Within a priority tier, assets sharing a dedup
/// key collapse to the earliest by file name.
pub fn select_assets(urls: &[Url], prefer_xcframeworks: bool) -> Vec<Url> {
    let tiers: Vec<Vec<Url>> = if prefer_xcframeworks {
        let (xc, rest) = urls
            .iter()
            .cloned()
            .partition(|url| is_xcframework_asset(&asset_file_name(url)));
        vec![xc, rest]
    } else {
        vec![urls.to_vec()]
    };

    let mut taken_keys: HashSet<String> = HashSet::new();
    let mut selected: Vec<Url> = Vec::new();

    for tier in tiers {
        // Earliest by file name wins within each key group
        let mut best: HashMap<String, Url> = HashMap::new();
        let mut key_order: Vec<String> = Vec::new();
        for url in tier {
            let file_name = asset_file_name(&url);
            let key = dedup_key(&file_name);
            if taken_keys.contains(&key) {
                continue;
            }
            match best.get(&key) {
                Some(existing) if asset_file_name(existing) <= file_name => {}
                Some(_) => {
                    best.insert(key, url);
                }
                None => {
                    best.insert(key.clone(), url);
                    key_order.push(key);
                }
            }
        }
        for key in key_order {
            taken_keys.insert(key.clone());
            if let Some(url) = best.remove(&key) {
                selected.push(url);
            }
        }
    }

    selected
}

/// Expand an archive into a destination directory using the platform tools
pub fn expand_archive(archive: &Path, destination: &Path) -> Result<()> {
    std::fs::create_dir_all(destination).map_err(|e| UticaError::FileWriteFailed {
        path: destination.display().to_string(),
        reason: e.to_string(),
    })?;

    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    let mut command = if name.ends_with(".zip") {
        let mut c = Command::new("unzip");
        c.arg("-qq")
            .arg(archive)
            .arg("-d")
            .arg(destination);
        c
    } else if name.ends_with(".tar.gz")
        || name.ends_with(".tgz")
        || name.ends_with(".tar.bz2")
        || name.ends_with(".tar.xz")
        || name.ends_with(".tar")
    {
        let mut c = Command::new("tar");
        c.arg("-xf").arg(archive).arg("-C").arg(destination);
        c
    } else {
        return Err(UticaError::BinaryArchiveFailed {
            message: format!("unrecognized archive type: {}", archive.display()),
        });
    };

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

/// Move the frameworks found under `expanded` into the build directory
///
/// A `Carthage/Build` prefix inside the archive is collapsed so archives
/// shipped with either layout land in the same place. Duplicate destination
/// paths are a hard error, as is an archive with no framework at all.
pub fn install_frameworks(expanded: &Path, build_dir: &Path) -> Result<Vec<PathBuf>> {
    let candidates = enumerate_frameworks(expanded);
    if candidates.is_empty() {
        return Err(UticaError::BinaryArchiveFailed {
            message: format!("no recognizable framework in {}", expanded.display()),
        });
    }

    let mut destinations: HashMap<PathBuf, PathBuf> = HashMap::new();
    for source in &candidates {
        let destination = destination_for(source, expanded, build_dir);
        if let Some(previous) = destinations.insert(destination.clone(), source.clone()) {
            return Err(UticaError::BinaryArchiveFailed {
                message: format!(
                    "archive contains duplicate destination path {} (from {} and {})",
                    destination.display(),
                    previous.display(),
                    source.display()
                ),
            });
        }
    }

    let mut installed = Vec::with_capacity(destinations.len());
    for (destination, source) in destinations {
        move_into_place(&source, &destination)?;
        installed.push(destination);
    }
    installed.sort();
    Ok(installed)
}

/// Find `.framework`/`.xcframework` directories without descending into them
fn enumerate_frameworks(root: &Path) -> Vec<PathBuf> {
    let mut frameworks = Vec::new();
    let mut walker = WalkDir::new(root).into_iter();
    while let Some(Ok(entry)) = walker.next() {
        if !entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name.ends_with(".framework") || name.ends_with(".xcframework") {
            frameworks.push(entry.path().to_path_buf());
            walker.skip_current_dir();
        }
    }
    frameworks
}

fn destination_for(source: &Path, expanded: &Path, build_dir: &Path) -> PathBuf {
    let relative = source.strip_prefix(expanded).unwrap_or(source);
    let components: Vec<&std::ffi::OsStr> =
        relative.iter().collect();
    let trimmed: &[&std::ffi::OsStr] =
        if components.len() > 2 && components[0] == "Carthage" && components[1] == "Build" {
            &components[2..]
        } else {
            &components
        };
    trimmed.iter().fold(build_dir.to_path_buf(), |acc, part| {
        acc.join(part)
    })
}

fn move_into_place(source: &Path, destination: &Path) -> Result<()> {
    let _guard = CACHE_WRITE_LOCK.lock().unwrap();

    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent).map_err(|e| UticaError::FileWriteFailed {
            path: parent.display().to_string(),
            reason: e.to_string(),
        })?;
    }
    if destination.exists() {
        std::fs::remove_dir_all(destination).map_err(|e| UticaError::FileWriteFailed {
            path: destination.display().to_string(),
            reason: e.to_string(),
        })?;
    }

    if std::fs::rename(source, destination).is_ok() {
        return Ok(());
    }

    // Rename across devices fails; fall back to copy + unlink
    copy_dir_recursive(source, destination)?;
    std::fs::remove_dir_all(source).map_err(|e| UticaError::FileWriteFailed {
        path: source.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(())
}

fn copy_dir_recursive(source: &Path, destination: &Path) -> Result<()> {
    std::fs::create_dir_all(destination).map_err(|e| UticaError::FileWriteFailed {
        path: destination.display().to_string(),
        reason: e.to_string(),
    })?;
    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        let target = destination.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(|e| UticaError::FileWriteFailed {
                path: target.display().to_string(),
                reason: e.to_string(),
            })?;
        }
    }
    Ok(())
}

/// Download, expand, and install every selected asset for one version
pub fn install_binary_assets(
    client: &BinaryProjectClient,
    cache: &Cache,
    dependency_name: &str,
    version: &str,
    urls: &[Url],
    prefer_xcframeworks: bool,
    build_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let selected = select_assets(urls, prefer_xcframeworks);
    if selected.is_empty() {
        return Err(UticaError::NoMatchingBinaryAsset {
            dependency: dependency_name.to_string(),
            version: version.to_string(),
        });
    }

    let mut installed = Vec::new();
    for url in selected {
        let archive = cached_asset_path(cache, dependency_name, version, &url);
        client.download(&url, &archive)?;

        let scratch = tempfile::TempDir::new().map_err(|e| UticaError::IoError {
            message: format!("could not create a scratch directory: {e}"),
        })?;
        expand_archive(&archive, scratch.path())?;
        installed.extend(install_frameworks(scratch.path(), build_dir)?);
    }
    Ok(installed)
}
