//! Hosted release assets
//!
//! For hosted dependencies built with `--use-binaries`, a matching release's
//! framework archives can stand in for a source build. Assets cache under
//! `<cacheRoot>/binaries/<name>/<version>/<assetId>-<assetName>`.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use url::Url;

use crate::cache::Cache;
use crate::dependency::{DependencyId, Server};
use crate::error::{Result, UticaError};

use super::assets::{expand_archive, install_frameworks, select_assets};
use super::BinaryProjectClient;

#[derive(Debug, Deserialize)]
struct Release {
    #[serde(default)]
    assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Deserialize)]
struct ReleaseAsset {
    id: u64,
    name: String,
    browser_download_url: String,
}

/// The releases API base for a server
fn api_base(server: &Server) -> String {
    match server {
        Server::Primary => "https://api.github.com".to_string(),
        Server::Enterprise { base_url } => format!("{base_url}/api/v3"),
    }
}

/// Download and install the release assets matching a pinned version
///
/// Fails with [`UticaError::NoMatchingBinaryAsset`] when the release does not
/// exist or carries no framework archive; callers treat that as "fall back
/// to a source build".
pub fn install_release_assets(
    client: &BinaryProjectClient,
    cache: &Cache,
    dependency: &DependencyId,
    version: &str,
    prefer_xcframeworks: bool,
    build_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let DependencyId::Hosted {
        server,
        owner,
        name,
    } = dependency
    else {
        return Err(UticaError::NoMatchingBinaryAsset {
            dependency: dependency.to_string(),
            version: version.to_string(),
        });
    };

    let release_url = Url::parse(&format!(
        "{}/repos/{owner}/{name}/releases/tags/{version}",
        api_base(server)
    ))
    .map_err(|e| UticaError::NetworkFailed {
        url: dependency.to_string(),
        reason: e.to_string(),
    })?;

    let body = client.fetch_bytes(&release_url).map_err(|_| {
        UticaError::NoMatchingBinaryAsset {
            dependency: dependency.to_string(),
            version: version.to_string(),
        }
    })?;
    let release: Release = serde_json::from_slice(&body).map_err(|e| {
        UticaError::BinaryManifestInvalid {
            url: release_url.to_string(),
            reason: e.to_string(),
        }
    })?;

    let archives: Vec<&ReleaseAsset> = release
        .assets
        .iter()
        .filter(|asset| asset.name.to_ascii_lowercase().ends_with(".zip"))
        .collect();

    let urls: Vec<Url> = archives
        .iter()
        .filter_map(|asset| Url::parse(&asset.browser_download_url).ok())
        .collect();
    let selected = select_assets(&urls, prefer_xcframeworks);
    if selected.is_empty() {
        return Err(UticaError::NoMatchingBinaryAsset {
            dependency: dependency.to_string(),
            version: version.to_string(),
        });
    }

    let mut installed = Vec::new();
    for url in selected {
        let Some(asset) = archives
            .iter()
            .find(|asset| asset.browser_download_url == url.as_str())
        else {
            continue;
        };

        let archive_path = cache
            .binary_asset_dir(&dependency.name(), version)
            .join(format!("{}-{}", asset.id, asset.name));
        client.download(&url, &archive_path)?;

        let scratch = tempfile::TempDir::new().map_err(|e| UticaError::IoError {
            message: format!("could not create a scratch directory: {e}"),
        })?;
        expand_archive(&archive_path, scratch.path())?;
        installed.extend(install_frameworks(scratch.path(), build_dir)?);
    }
    Ok(installed)
}
