//! tpk-config
//!
//! Everything read from disk or the environment before the first broker call:
//!
//! - layered YAML loading with a canonical JSON form and SHA-256 config hash
//! - the topology document (groups + policy descriptors), see [`topology`]
//! - credential sources for broker user accounts, see [`credentials`]
//! - broker connection settings resolved from env var NAMES, see [`secrets`]
//!
//! Every failure here is a [`ConfigError`] and is raised before the broker is
//! contacted.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod credentials;
pub mod secrets;
pub mod topology;

pub use credentials::{load_credentials, CredentialSource};
pub use secrets::{resolve_broker_connection, BrokerConnection};
pub use topology::{load_topology, Group, PolicyDescriptor, TopologyDocument};

/// Known secret-like prefixes. A topology or settings document whose string
/// leaves start with one of these is rejected: those files are meant to be
/// committed, secrets belong in the environment.
const SECRET_PREFIXES: &[&str] = &[
    "sk-",        // Stripe / OpenAI style
    "sk_live",    // Stripe live
    "sk_test",    // Stripe test
    "AKIA",       // AWS access key ID
    "-----BEGIN", // PEM private keys
    "ghp_",       // GitHub PAT
    "gho_",       // GitHub OAuth
    "glpat-",     // GitLab PAT
    "xoxb-",      // Slack bot token
    "xoxp-",      // Slack user token
];

/// Malformed or incomplete configuration input.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid yaml in {origin}: {source}")]
    Yaml {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid document shape in {origin}: {source}")]
    Shape {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("CONFIG_SECRET_DETECTED leaf={pointer} value=REDACTED")]
    SecretLiteral { pointer: String },

    #[error("required env var '{var}' ({purpose}) is not set or empty")]
    MissingSecret { var: String, purpose: &'static str },

    #[error("invalid {context}: {message}")]
    Invalid { context: String, message: String },
}

impl ConfigError {
    pub fn invalid(context: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            context: context.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

pub fn load_layered_yaml<P: AsRef<Path>>(paths: &[P]) -> Result<LoadedConfig, ConfigError> {
    let mut docs: Vec<(String, String)> = Vec::new();
    for p in paths {
        let p = p.as_ref();
        let raw = fs::read_to_string(p).map_err(|source| ConfigError::Read {
            path: p.to_path_buf(),
            source,
        })?;
        docs.push((p.display().to_string(), raw));
    }
    merge_documents(&docs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig, ConfigError> {
    let docs: Vec<(String, String)> = yaml_docs
        .iter()
        .enumerate()
        .map(|(i, raw)| (format!("<inline #{i}>"), raw.to_string()))
        .collect();
    merge_documents(&docs)
}

fn merge_documents(docs: &[(String, String)]) -> Result<LoadedConfig, ConfigError> {
    // Earlier docs are base, later docs override.
    let mut merged = serde_json::json!({});
    for (origin, raw) in docs {
        let v_yaml: serde_yaml::Value =
            serde_yaml::from_str(raw).map_err(|source| ConfigError::Yaml {
                origin: origin.clone(),
                source,
            })?;
        // An empty file parses as null; treat it as an empty layer.
        if v_yaml.is_null() {
            continue;
        }
        let v_json = serde_json::to_value(v_yaml).map_err(|source| ConfigError::Shape {
            origin: origin.clone(),
            source,
        })?;
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    let canonical_json = canonicalize_json(&merged);
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn canonicalize_json(v: &Value) -> String {
    // serde_json::Map is key-ordered (no preserve_order feature), so compact
    // serialization is already canonical.
    v.to_string()
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn enforce_no_secret_literals(v: &Value) -> Result<(), ConfigError> {
    let mut leaves = Vec::new();
    collect_leaf_pointers(v, "", &mut leaves);

    for ptr in leaves {
        if is_entity_name_leaf(&ptr) {
            continue;
        }
        if let Some(s) = v.pointer(&ptr).and_then(Value::as_str) {
            if looks_like_secret(s) {
                return Err(ConfigError::SecretLiteral { pointer: ptr });
            }
        }
    }
    Ok(())
}

/// Group entries and policy names/patterns become broker entity names, which
/// may legitimately share a prefix with a token (`sk-billing.invoices`).
fn is_entity_name_leaf(pointer: &str) -> bool {
    if pointer.starts_with("/groups/") {
        return true;
    }
    let mut parts = pointer.split('/').skip(1);
    matches!(
        (parts.next(), parts.next(), parts.next(), parts.next()),
        (Some("policies"), Some(_), Some("name" | "pattern"), None)
    )
}

fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map.iter() {
                let next = format!("{}/{}", prefix, escape_pointer_token(k));
                collect_leaf_pointers(vv, &next, out);
            }
        }
        Value::Array(arr) => {
            for (i, vv) in arr.iter().enumerate() {
                let next = format!("{}/{}", prefix, i);
                collect_leaf_pointers(vv, &next, out);
            }
        }
        _ => out.push(prefix.to_string()),
    }
}

fn escape_pointer_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    if t.len() < 8 {
        return false;
    }
    SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}

/// Read a non-empty trimmed string at `pointer`.
pub(crate) fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_merge_overrides_leaves_and_keeps_siblings() {
        let merged = load_layered_yaml_from_strings(&[
            "a: {b: 1, c: 2}\nd: [1, 2]",
            "a: {b: 10}\nd: [3]",
        ])
        .unwrap();
        assert_eq!(
            merged.config_json,
            serde_json::json!({"a": {"b": 10, "c": 2}, "d": [3]})
        );
    }

    #[test]
    fn empty_layer_is_ignored() {
        let a = load_layered_yaml_from_strings(&["x: 1", ""]).unwrap();
        let b = load_layered_yaml_from_strings(&["x: 1"]).unwrap();
        assert_eq!(a.config_hash, b.config_hash);
    }

    #[test]
    fn pointer_escaping_handles_slash_keys() {
        let mut out = Vec::new();
        collect_leaf_pointers(&serde_json::json!({"a/b": {"c~d": 1}}), "", &mut out);
        assert_eq!(out, vec!["/a~1b/c~0d".to_string()]);
    }

    #[test]
    fn short_strings_are_never_secrets() {
        assert!(!looks_like_secret("sk-1"));
        assert!(looks_like_secret("sk-live-0123456789"));
    }

    #[test]
    fn entity_names_are_exempt_from_the_secret_scan() {
        let loaded = load_layered_yaml_from_strings(&[
            "groups:\n  billing: [sk-billing.invoices]\npolicies:\n  - name: AKIAreports\n    pattern: \"^sk-billing\\\\.\"\n",
        ])
        .unwrap();
        assert!(loaded.canonical_json.contains("sk-billing.invoices"));

        let err = load_layered_yaml_from_strings(&[
            "policies:\n  - name: p\n    definition: { token: sk-live-0123456789 }\n",
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::SecretLiteral { .. }));
    }

    #[test]
    fn entity_name_leaves_are_recognised_by_pointer() {
        assert!(is_entity_name_leaf("/groups/billing/0"));
        assert!(is_entity_name_leaf("/groups/orders/names/1"));
        assert!(is_entity_name_leaf("/policies/0/name"));
        assert!(is_entity_name_leaf("/policies/3/pattern"));
        assert!(!is_entity_name_leaf("/policies/0/definition/name"));
        assert!(!is_entity_name_leaf("/broker/keys_env/url"));
    }
}
