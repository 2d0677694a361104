//! Credential sources for broker user accounts.
//!
//! ```yaml
//! users:
//!   - username: orders-svc
//!     password_env: ORDERS_SVC_PASSWORD
//!     tags: [monitoring]
//!   - username: admin
//!     password: change-me
//!     tags: [administrator]
//! ```
//!
//! `password_env` names an environment variable holding the plaintext. The
//! plaintext only ever leaves this module as input to the password hasher;
//! `Debug` output redacts it.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::ConfigError;

#[derive(Clone, PartialEq, Eq)]
pub struct CredentialSource {
    pub username: String,
    pub password: String,
    pub tags: Vec<String>,
}

impl CredentialSource {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            tags: Vec::new(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSource")
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("tags", &self.tags)
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCredentialFile {
    #[serde(default)]
    users: Vec<RawCredential>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCredential {
    username: String,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    password_env: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

/// Load credential sources from a YAML file, resolving `password_env`
/// against the process environment.
pub fn load_credentials(path: impl AsRef<Path>) -> Result<Vec<CredentialSource>, ConfigError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    credentials_from_str(&raw, &path.display().to_string(), |var| std::env::var(var).ok())
}

/// Parse credential sources; `env` resolves `password_env` names.
pub fn credentials_from_str<F>(
    raw: &str,
    origin: &str,
    env: F,
) -> Result<Vec<CredentialSource>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    // Empty file: no managed users.
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let file: RawCredentialFile = serde_yaml::from_str(raw).map_err(|source| ConfigError::Yaml {
        origin: origin.to_string(),
        source,
    })?;

    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(file.users.len());
    for entry in file.users {
        let username = entry.username.trim().to_string();
        if username.is_empty() {
            return Err(ConfigError::invalid(
                format!("credentials in {origin}"),
                "username must not be empty",
            ));
        }
        if !seen.insert(username.clone()) {
            return Err(ConfigError::invalid(
                format!("credentials in {origin}"),
                format!("duplicate username '{username}'"),
            ));
        }

        let password = match (entry.password, entry.password_env) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::invalid(
                    format!("credentials for '{username}'"),
                    "set either password or password_env, not both",
                ))
            }
            (Some(p), None) => p,
            (None, Some(var)) => match env(&var) {
                Some(v) if !v.trim().is_empty() => v,
                _ => {
                    return Err(ConfigError::MissingSecret {
                        var,
                        purpose: "user password",
                    })
                }
            },
            (None, None) => {
                return Err(ConfigError::invalid(
                    format!("credentials for '{username}'"),
                    "missing password or password_env",
                ))
            }
        };

        let tags = entry
            .tags
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        out.push(CredentialSource {
            username,
            password,
            tags,
        });
    }
    Ok(out)
}
