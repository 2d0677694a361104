//! Broker connection resolution.
//!
//! # Contract
//! - Settings YAML stores only **env var NAMES** (e.g. `"TPK_BROKER_PASSWORD"`).
//! - Callers invoke [`resolve_broker_connection`] once at startup and pass the
//!   returned [`BrokerConnection`] into the adapter constructor.
//! - `Debug` redacts the password. Errors reference the env var NAME, never
//!   the value.
//!
//! ```yaml
//! broker:
//!   keys_env:
//!     url: RABBIT_MGMT_URL
//!     username: RABBIT_MGMT_USER
//!     password: RABBIT_MGMT_PASSWORD
//!   timeout_secs: 10
//! ```

use std::fmt;
use std::time::Duration;

use serde_json::Value;

use crate::{read_str_at, ConfigError};

pub const DEFAULT_URL_VAR: &str = "TPK_BROKER_URL";
pub const DEFAULT_USERNAME_VAR: &str = "TPK_BROKER_USER";
pub const DEFAULT_PASSWORD_VAR: &str = "TPK_BROKER_PASSWORD";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Management API endpoint and credentials.
#[derive(Clone)]
pub struct BrokerConnection {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
}

impl fmt::Debug for BrokerConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConnection")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

struct ConnectionEnvNames {
    url_var: String,
    username_var: String,
    password_var: String,
}

fn parse_env_names(settings: &Value) -> ConnectionEnvNames {
    ConnectionEnvNames {
        url_var: read_str_at(settings, "/broker/keys_env/url")
            .unwrap_or_else(|| DEFAULT_URL_VAR.to_string()),
        username_var: read_str_at(settings, "/broker/keys_env/username")
            .unwrap_or_else(|| DEFAULT_USERNAME_VAR.to_string()),
        password_var: read_str_at(settings, "/broker/keys_env/password")
            .unwrap_or_else(|| DEFAULT_PASSWORD_VAR.to_string()),
    }
}

/// Resolve the broker connection from the process environment.
///
/// `settings` is the merged settings document (`Value::Null` when none was
/// given); it only contributes env var names and the request timeout.
pub fn resolve_broker_connection(settings: &Value) -> Result<BrokerConnection, ConfigError> {
    resolve_broker_connection_with(settings, |var| std::env::var(var).ok())
}

pub fn resolve_broker_connection_with<F>(
    settings: &Value,
    env: F,
) -> Result<BrokerConnection, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let names = parse_env_names(settings);
    let required = |var: &str, purpose: &'static str| -> Result<String, ConfigError> {
        match env(var) {
            Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
            _ => Err(ConfigError::MissingSecret {
                var: var.to_string(),
                purpose,
            }),
        }
    };

    let base_url = required(&names.url_var, "broker management url")?;
    let username = required(&names.username_var, "broker management username")?;
    let password = required(&names.password_var, "broker management password")?;

    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ConfigError::invalid(
            format!("env var '{}'", names.url_var),
            "broker management url must start with http:// or https://",
        ));
    }

    let timeout = match settings.pointer("/broker/timeout_secs") {
        None | Some(Value::Null) => DEFAULT_TIMEOUT,
        Some(v) => match v.as_u64() {
            Some(secs) if secs > 0 => Duration::from_secs(secs),
            _ => {
                return Err(ConfigError::invalid(
                    "/broker/timeout_secs",
                    "must be a positive integer",
                ))
            }
        },
    };

    Ok(BrokerConnection {
        base_url: base_url.trim_end_matches('/').to_string(),
        username,
        password,
        timeout,
    })
}
