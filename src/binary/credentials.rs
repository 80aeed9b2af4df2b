//! Netrc-style credentials
//!
//! When `--use-netrc` is set, the user's credentials file is consulted by
//! host and a Basic `Authorization` value is attached to matching requests.

use std::collections::HashMap;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::{Result, UticaError};

/// Parsed credentials keyed by machine name
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    machines: HashMap<String, (String, String)>,
    default: Option<(String, String)>,
}

impl Credentials {
    /// Parse the token stream of a netrc file: `machine <host> login <user>
    /// password <secret>`, with `default` as the catch-all machine
    pub fn from_string(contents: &str) -> Self {
        let mut credentials = Credentials::default();
        let tokens: Vec<&str> = contents.split_whitespace().collect();

        let mut machine: Option<String> = None;
        let mut login: Option<String> = None;
        let mut password: Option<String> = None;
        let mut is_default = false;

        let mut flush = |machine: &mut Option<String>,
                         login: &mut Option<String>,
                         password: &mut Option<String>,
                         is_default: &mut bool,
                         credentials: &mut Credentials| {
            if let (Some(l), Some(p)) = (login.take(), password.take()) {
                if *is_default {
                    credentials.default = Some((l, p));
                } else if let Some(m) = machine.take() {
                    credentials.machines.insert(m, (l, p));
                }
            }
            *machine = None;
            *is_default = false;
        };

        let mut index = 0;
        while index < tokens.len() {
            match tokens[index] {
                "machine" if index + 1 < tokens.len() => {
                    flush(
                        &mut machine,
                        &mut login,
                        &mut password,
                        &mut is_default,
                        &mut credentials,
                    );
                    machine = Some(tokens[index + 1].to_string());
                    index += 2;
                }
                "default" => {
                    flush(
                        &mut machine,
                        &mut login,
                        &mut password,
                        &mut is_default,
                        &mut credentials,
                    );
                    is_default = true;
                    index += 1;
                }
                "login" if index + 1 < tokens.len() => {
                    login = Some(tokens[index + 1].to_string());
                    index += 2;
                }
                "password" if index + 1 < tokens.len() => {
                    password = Some(tokens[index + 1].to_string());
                    index += 2;
                }
                _ => index += 1,
            }
        }
        flush(
            &mut machine,
            &mut login,
            &mut password,
            &mut is_default,
            &mut credentials,
        );

        credentials
    }

    /// Load from the conventional `~/.netrc` location
    pub fn from_user_home() -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| UticaError::FileReadFailed {
            path: "~/.netrc".to_string(),
            reason: "could not determine the home directory".to_string(),
        })?;
        Self::load(&home.join(".netrc"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| UticaError::FileReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_string(&contents))
    }

    /// The `Authorization` header value for a host, when credentials exist
    pub fn authorization_for(&self, host: &str) -> Option<String> {
        let (login, password) = self.machines.get(host).or(self.default.as_ref())?;
        let encoded = STANDARD.encode(format!("{login}:{password}"));
        Some(format!("Basic {encoded}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_machines() {
        let credentials = Credentials::from_string(
            "machine example.com login alice password s3cret\n\
             machine other.com\n  login bob\n  password hunter2\n",
        );
        assert_eq!(
            credentials.authorization_for("example.com"),
            Some(format!("Basic {}", STANDARD.encode("alice:s3cret")))
        );
        assert!(credentials.authorization_for("unknown.com").is_none());
    }

    #[test]
    fn test_default_machine() {
        let credentials =
            Credentials::from_string("machine a.com login u password p\ndefault login d password q");
        assert!(credentials.authorization_for("anything.example").is_some());
    }

    #[test]
    fn test_incomplete_entry_is_ignored() {
        let credentials = Credentials::from_string("machine example.com login alice");
        assert!(credentials.authorization_for("example.com").is_none());
    }
}
