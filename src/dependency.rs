//! Dependency identities
//!
//! This module handles:
//! - The three dependency kinds (hosted repository, plain git URL, binary JSON)
//! - Canonicalization of primary-host git URLs into hosted identities
//! - Filesystem-safe dependency names, including traversal sanitization

use std::fmt;
use std::path::Path;

use url::Url;

use crate::error::{Result, UticaError};

/// The primary well-known host for `github` entries
pub const PRIMARY_HOST: &str = "github.com";

/// Fullwidth full stop, substituted for sentinel `.` path components
const FULLWIDTH_DOT: char = '\u{FF0E}';

/// Symbol-for-NUL, substituted for embedded NUL bytes
const SYMBOL_NUL: char = '\u{2400}';

/// Which server a hosted repository lives on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Server {
    /// The primary host (github.com)
    Primary,
    /// A self-hosted enterprise instance, identified by its base URL
    Enterprise { base_url: String },
}

impl Server {
    /// Base URL without a trailing slash, e.g. `https://github.com`
    pub fn base_url(&self) -> String {
        match self {
            Server::Primary => format!("https://{PRIMARY_HOST}"),
            Server::Enterprise { base_url } => base_url.clone(),
        }
    }
}

/// The identity of one declared dependency
///
/// Equality is by variant and normalized identifying fields: a `Git` URL
/// recognizable as a primary-host repository is canonicalized to `Hosted`
/// at parse time, so both spellings compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DependencyId {
    /// A repository on a well-known host, addressed as `owner/name`
    Hosted {
        server: Server,
        owner: String,
        name: String,
    },
    /// An arbitrary git URL
    Git { url: String },
    /// A JSON artifact manifest for a binary-only framework
    Binary(BinaryUrl),
}

/// A binary dependency's manifest URL, keeping the user-written spelling
/// around for error messages
#[derive(Debug, Clone)]
pub struct BinaryUrl {
    pub url: Url,
    pub display_url: String,
}

// Identity is the resolved URL alone; the display form is presentation only.
impl PartialEq for BinaryUrl {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for BinaryUrl {}

impl std::hash::Hash for BinaryUrl {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.url.hash(state);
    }
}

impl DependencyId {
    /// Parse a `github` identifier: either `owner/name` on the primary host
    /// or a full URL against an enterprise instance
    pub fn from_github_identifier(identifier: &str) -> Result<Self> {
        let invalid = || UticaError::CartfileParseFailed {
            line: identifier.to_string(),
            reason: format!("invalid GitHub repository identifier \"{identifier}\""),
        };

        if !identifier.contains("://") {
            let parts: Vec<&str> = identifier.split('/').collect();
            if parts.len() == 2 && !parts[0].is_empty() && !parts[1].is_empty() {
                return Ok(DependencyId::Hosted {
                    server: Server::Primary,
                    owner: parts[0].to_string(),
                    name: trim_git_suffix(parts[1]).to_string(),
                });
            }
            return Err(invalid());
        }

        let url = Url::parse(identifier).map_err(|_| invalid())?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid());
        }
        let host = url.host_str().ok_or_else(invalid)?;
        let segments: Vec<&str> = url
            .path()
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        if segments.len() != 2 {
            return Err(invalid());
        }

        let owner = segments[0].to_string();
        let name = trim_git_suffix(segments[1]).to_string();
        let server = if host.eq_ignore_ascii_case(PRIMARY_HOST) {
            Server::Primary
        } else {
            let mut base = format!("{}://{}", url.scheme(), host);
            if let Some(port) = url.port() {
                base.push_str(&format!(":{port}"));
            }
            Server::Enterprise { base_url: base }
        };

        Ok(DependencyId::Hosted {
            server,
            owner,
            name,
        })
    }

    /// Parse a `git` identifier, canonicalizing recognizable primary-host
    /// URLs into hosted identities
    pub fn from_git_identifier(identifier: &str) -> Self {
        if let Some((owner, name)) = parse_primary_host_url(identifier) {
            return DependencyId::Hosted {
                server: Server::Primary,
                owner,
                name,
            };
        }
        DependencyId::Git {
            url: identifier.to_string(),
        }
    }

    /// Parse a `binary` identifier: an `https` or `file` URL, or a bare path
    /// resolved against `base_directory`
    pub fn from_binary_identifier(identifier: &str, base_directory: &Path) -> Result<Self> {
        let invalid = || UticaError::CartfileParseFailed {
            line: identifier.to_string(),
            reason: "invalid URL found for dependency type `binary`".to_string(),
        };

        let url = match Url::parse(identifier) {
            Ok(url) => {
                if !matches!(url.scheme(), "https" | "file") {
                    return Err(invalid());
                }
                url
            }
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let absolute = base_directory.join(identifier);
                Url::from_file_path(&absolute).map_err(|_| invalid())?
            }
            Err(_) => return Err(invalid()),
        };

        Ok(DependencyId::Binary(BinaryUrl {
            url,
            display_url: identifier.to_string(),
        }))
    }

    /// The filesystem-safe label for this dependency
    pub fn name(&self) -> String {
        match self {
            DependencyId::Hosted { name, .. } => name.clone(),
            DependencyId::Git { url } => sanitized_name(url),
            DependencyId::Binary(binary) => {
                let last = binary
                    .url
                    .path()
                    .rsplit('/')
                    .find(|s| !s.is_empty())
                    .unwrap_or_default();
                match last.rsplit_once('.') {
                    Some((stem, _ext)) if !stem.is_empty() => stem.to_string(),
                    _ => last.to_string(),
                }
            }
        }
    }

    /// The Cartfile kind keyword for this dependency
    pub fn kind(&self) -> &'static str {
        match self {
            DependencyId::Hosted { .. } => "github",
            DependencyId::Git { .. } => "git",
            DependencyId::Binary(_) => "binary",
        }
    }

    /// The quoted identifier as written in a Cartfile entry
    pub fn manifest_identifier(&self) -> String {
        match self {
            DependencyId::Hosted {
                server: Server::Primary,
                owner,
                name,
            } => format!("{owner}/{name}"),
            DependencyId::Hosted {
                server: Server::Enterprise { base_url },
                owner,
                name,
            } => format!("{base_url}/{owner}/{name}"),
            DependencyId::Git { url } => url.clone(),
            DependencyId::Binary(binary) => binary.display_url.clone(),
        }
    }

    /// The URL to clone for source dependencies; `None` for binary entries
    pub fn clone_url(&self) -> Option<String> {
        match self {
            DependencyId::Hosted {
                server,
                owner,
                name,
            } => Some(format!("{}/{owner}/{name}.git", server.base_url())),
            DependencyId::Git { url } => Some(url.clone()),
            DependencyId::Binary(_) => None,
        }
    }

    /// Canonical sort key: the textual lockfile form
    pub fn sort_key(&self) -> String {
        format!("{} \"{}\"", self.kind(), self.manifest_identifier())
    }

    /// Key over the identifying fields only (display spellings excluded), so
    /// ordering stays consistent with equality
    fn identity_key(&self) -> String {
        match self {
            DependencyId::Hosted {
                server,
                owner,
                name,
            } => format!("github {}/{owner}/{name}", server.base_url()),
            DependencyId::Git { url } => format!("git {url}"),
            DependencyId::Binary(binary) => format!("binary {}", binary.url),
        }
    }
}

impl PartialOrd for DependencyId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DependencyId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.identity_key().cmp(&other.identity_key())
    }
}

impl fmt::Display for DependencyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.manifest_identifier())
    }
}

fn trim_git_suffix(name: &str) -> &str {
    name.strip_suffix(".git").unwrap_or(name)
}

/// Recognize the three primary-host URL shapes:
/// `ssh://git@<host>:<o>/<n>`, `https://<host>/<o>/<n>`, `git@<host>:<o>/<n>`
fn parse_primary_host_url(url: &str) -> Option<(String, String)> {
    let path = if let Some(rest) = url.strip_prefix("ssh://git@") {
        rest.strip_prefix(PRIMARY_HOST)?.strip_prefix(':')?
    } else if let Some(rest) = url.strip_prefix("https://") {
        rest.strip_prefix(PRIMARY_HOST)?.strip_prefix('/')?
    } else if let Some(rest) = url.strip_prefix("git@") {
        rest.strip_prefix(PRIMARY_HOST)?.strip_prefix(':')?
    } else {
        return None;
    };

    let path = path.trim_end_matches('/');
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return None;
    }

    Some((
        parts[0].to_string(),
        trim_git_suffix(parts[1]).to_string(),
    ))
}

/// Derive a checkout-safe name from an arbitrary git URL
///
/// Takes the last path component, strips a trailing `.git`, and projects out
/// anything with path semantics: NUL bytes become `␀` and a name consisting
/// solely of dots has every dot replaced with `．`, so the result can never
/// escape the checkout root.
pub fn sanitized_name(url: &str) -> String {
    let component = url
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or(url);
    let component = trim_git_suffix(component);

    let replaced: String = component
        .chars()
        .map(|c| if c == '\0' { SYMBOL_NUL } else { c })
        .collect();

    if !replaced.is_empty() && replaced.chars().all(|c| c == '.') {
        return replaced.chars().map(|_| FULLWIDTH_DOT).collect();
    }

    replaced
}
