//! Binary dependency backend
//!
//! This module handles:
//! - Fetching and memoizing the version→assets JSON for binary dependencies
//! - Downloading assets into the content-addressed cache
//! - Credentials and the authenticated→anonymous fallback

pub mod assets;
pub mod credentials;
pub mod github;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::dependency::BinaryUrl;
use crate::error::{Result, UticaError};
use crate::version::{PinnedVersion, SemanticVersion};

use credentials::Credentials;

/// HTTP request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON values are either one asset URL or a list of them
#[derive(Deserialize)]
#[serde(untagged)]
enum RawAssets {
    One(String),
    Many(Vec<String>),
}

/// A parsed binary dependency manifest: versions and their asset URLs
#[derive(Debug, Clone, Default)]
pub struct BinaryProject {
    versions: BTreeMap<SemanticVersion, Vec<Url>>,
}

impl BinaryProject {
    /// Parse the manifest JSON; every key must be a semantic version and
    /// every asset a valid URL
    pub fn from_json(contents: &str, source_url: &Url) -> Result<Self> {
        let invalid = |reason: String| UticaError::BinaryManifestInvalid {
            url: source_url.to_string(),
            reason,
        };

        let raw: BTreeMap<String, RawAssets> =
            serde_json::from_str(contents).map_err(|e| invalid(e.to_string()))?;

        let mut versions = BTreeMap::new();
        for (version_text, raw_assets) in raw {
            let version = SemanticVersion::parse(&version_text)
                .map_err(|e| invalid(format!("invalid version key: {e}")))?;

            let asset_texts = match raw_assets {
                RawAssets::One(url) => vec![url],
                RawAssets::Many(urls) => urls,
            };
            let mut assets = Vec::with_capacity(asset_texts.len());
            for text in asset_texts {
                let url = Url::parse(&text)
                    .map_err(|e| invalid(format!("invalid asset URL `{text}`: {e}")))?;
                assets.push(url);
            }
            if assets.is_empty() {
                return Err(invalid(format!("version {version} lists no assets")));
            }
            versions.insert(version, assets);
        }

        Ok(Self { versions })
    }

    /// Every published version as a pinned version
    pub fn available_versions(&self) -> Vec<PinnedVersion> {
        self.versions
            .keys()
            .map(|version| PinnedVersion::new(version.to_string()))
            .collect()
    }

    /// Asset URLs for a pinned version, when published
    pub fn assets_for(&self, version: &PinnedVersion) -> Option<&[Url]> {
        let semantic = version.semantic()?;
        self.versions.get(&semantic).map(Vec::as_slice)
    }
}

/// HTTP client for binary manifests and assets, memoized per run
pub struct BinaryProjectClient {
    http: reqwest::blocking::Client,
    credentials: Option<Credentials>,
    projects: Mutex<HashMap<Url, BinaryProject>>,
}

impl BinaryProjectClient {
    pub fn new(credentials: Option<Credentials>) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("utica/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| UticaError::NetworkFailed {
                url: String::new(),
                reason: format!("could not construct HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            credentials,
            projects: Mutex::new(HashMap::new()),
        })
    }

    /// Fetch (or reuse) the parsed manifest for a binary dependency
    pub fn project(&self, binary: &BinaryUrl) -> Result<BinaryProject> {
        if let Some(project) = self.projects.lock().unwrap().get(&binary.url) {
            return Ok(project.clone());
        }

        let contents = self.fetch_text(&binary.url)?;
        let project = BinaryProject::from_json(&contents, &binary.url)?;
        self.projects
            .lock()
            .unwrap()
            .insert(binary.url.clone(), project.clone());
        Ok(project)
    }

    fn fetch_text(&self, url: &Url) -> Result<String> {
        let bytes = self.fetch_bytes(url)?;
        String::from_utf8(bytes).map_err(|e| UticaError::BinaryManifestInvalid {
            url: url.to_string(),
            reason: format!("response is not UTF-8: {e}"),
        })
    }

    /// Fetch a URL's contents, honoring `file://` manifests and falling back
    /// once to an anonymous request when an authenticated one is rejected
    pub fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>> {
        if url.scheme() == "file" {
            let path = url
                .to_file_path()
                .map_err(|_| UticaError::NetworkFailed {
                    url: url.to_string(),
                    reason: "invalid file URL".to_string(),
                })?;
            return std::fs::read(&path).map_err(|e| UticaError::FileReadFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            });
        }

        let authorization = self
            .credentials
            .as_ref()
            .zip(url.host_str())
            .and_then(|(credentials, host)| credentials.authorization_for(host));

        match self.request(url, authorization.as_deref()) {
            Ok(bytes) => Ok(bytes),
            Err(UticaError::NetworkFailed { reason, .. })
                if authorization.is_some() && is_auth_failure(&reason) =>
            {
                self.request(url, None)
            }
            Err(other) => Err(other),
        }
    }

    fn request(&self, url: &Url, authorization: Option<&str>) -> Result<Vec<u8>> {
        let network_failed = |reason: String| UticaError::NetworkFailed {
            url: url.to_string(),
            reason,
        };

        let mut request = self.http.get(url.clone());
        if let Some(value) = authorization {
            request = request.header(reqwest::header::AUTHORIZATION, value);
        }

        let response = request.send().map_err(|e| network_failed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(network_failed(format!("HTTP {}", status.as_u16())));
        }

        let bytes = response
            .bytes()
            .map_err(|e| network_failed(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    /// Download a URL to a destination file unless it is already cached
    ///
    /// Writes land in a temporary file first and are renamed into place, with
    /// a copy+unlink fallback when the rename crosses devices.
    pub fn download(&self, url: &Url, destination: &Path) -> Result<bool> {
        if destination.is_file() {
            return Ok(false);
        }

        let bytes = self.fetch_bytes(url)?;

        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent).map_err(|e| UticaError::FileWriteFailed {
                path: parent.display().to_string(),
                reason: e.to_string(),
            })?;
        }

        let mut temp = tempfile::NamedTempFile::new().map_err(|e| UticaError::FileWriteFailed {
            path: destination.display().to_string(),
            reason: e.to_string(),
        })?;
        use std::io::Write;
        temp.write_all(&bytes)
            .map_err(|e| UticaError::FileWriteFailed {
                path: destination.display().to_string(),
                reason: e.to_string(),
            })?;

        match temp.persist(destination) {
            Ok(_) => Ok(true),
            Err(persist_error) => {
                // Rename across devices fails; fall back to copy + unlink
                let temp_path = persist_error.file.path().to_path_buf();
                std::fs::copy(&temp_path, destination).map_err(|e| {
                    UticaError::FileWriteFailed {
                        path: destination.display().to_string(),
                        reason: e.to_string(),
                    }
                })?;
                drop(persist_error.file);
                Ok(true)
            }
        }
    }
}

fn is_auth_failure(reason: &str) -> bool {
    reason.contains("HTTP 401") || reason.contains("HTTP 403")
}
