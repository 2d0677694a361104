//! Topology document: named groups of logical resource names plus policy
//! descriptors.
//!
//! ```yaml
//! groups:
//!   events:
//!     broadcast: true
//!     names: [events]
//!   orders:
//!     names: [order.created, order.paid]
//!     queues: { type: quorum }
//!     single_active_consumer: true
//!     bindings: events
//!   audit: [audit.log]          # names only, all settings default
//! policies:
//!   - name: dlq-ttl
//!     pattern: "^dlq\\."
//!     definition: { message-ttl: 86400000 }
//!     apply-to: queues
//! ```
//!
//! Settings are kept as written (`None` when absent); defaults are applied
//! by the generator.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::{load_layered_yaml, load_layered_yaml_from_strings, ConfigError, LoadedConfig};

/// One named group, resolved from either the list shorthand or the
/// detailed mapping form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    pub names: Vec<String>,
    pub broadcast: bool,
    pub exchange_type: Option<String>,
    pub queue_type: Option<String>,
    pub single_active_consumer: bool,
    pub binding_source: Option<String>,
    pub vhost: Option<String>,
}

impl Group {
    pub fn new<I, S>(name: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            names: names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn broadcast(mut self) -> Self {
        self.broadcast = true;
        self
    }
}

/// Raw policy descriptor; every field except `name` is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyDescriptor {
    pub name: String,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub definition: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default, rename = "apply-to", alias = "apply_to")]
    pub apply_to: Option<String>,
    #[serde(default)]
    pub vhost: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct TopologyDocument {
    /// Groups in name order.
    pub groups: Vec<Group>,
    pub policies: Vec<PolicyDescriptor>,
    /// SHA-256 of the canonical merged document.
    pub config_hash: String,
}

/// Top-level keys other than `groups` and `policies` belong to other
/// consumers of the same file and are ignored.
#[derive(Deserialize)]
struct RawTopology {
    #[serde(default)]
    groups: BTreeMap<String, Value>,
    #[serde(default)]
    policies: Vec<PolicyDescriptor>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct GroupSettings {
    #[serde(default)]
    names: Vec<String>,
    #[serde(default)]
    broadcast: bool,
    #[serde(default)]
    exchanges: Option<TypeSetting>,
    #[serde(default)]
    queues: Option<TypeSetting>,
    #[serde(default)]
    single_active_consumer: bool,
    #[serde(default)]
    bindings: Option<String>,
    #[serde(default)]
    vhost: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TypeSetting {
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Load and merge one or more topology files (later files override).
pub fn load_topology<P: AsRef<Path>>(paths: &[P]) -> Result<TopologyDocument, ConfigError> {
    let loaded = load_layered_yaml(paths)?;
    TopologyDocument::from_loaded(&loaded)
}

impl TopologyDocument {
    pub fn from_yaml_strs(docs: &[&str]) -> Result<Self, ConfigError> {
        let loaded = load_layered_yaml_from_strings(docs)?;
        Self::from_loaded(&loaded)
    }

    pub fn from_loaded(loaded: &LoadedConfig) -> Result<Self, ConfigError> {
        let raw: RawTopology =
            serde_json::from_value(loaded.config_json.clone()).map_err(|source| {
                ConfigError::Shape {
                    origin: "topology".to_string(),
                    source,
                }
            })?;

        let mut groups = Vec::with_capacity(raw.groups.len());
        for (name, value) in raw.groups {
            groups.push(resolve_group(name, value)?);
        }

        for p in &raw.policies {
            if p.name.trim().is_empty() {
                return Err(ConfigError::invalid("policy", "policy name must not be empty"));
            }
        }

        Ok(Self {
            groups,
            policies: raw.policies,
            config_hash: loaded.config_hash.clone(),
        })
    }

    pub fn routing_groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter().filter(|g| !g.broadcast)
    }

    pub fn broadcast_groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter().filter(|g| g.broadcast)
    }
}

fn resolve_group(name: String, value: Value) -> Result<Group, ConfigError> {
    let settings = match value {
        Value::Array(_) => {
            let names: Vec<String> = serde_json::from_value(value).map_err(|source| {
                ConfigError::Shape {
                    origin: format!("group '{name}'"),
                    source,
                }
            })?;
            return Ok(Group::new(name, names));
        }
        Value::Object(_) => serde_json::from_value::<GroupSettings>(value).map_err(|source| {
            ConfigError::Shape {
                origin: format!("group '{name}'"),
                source,
            }
        })?,
        other => {
            return Err(ConfigError::invalid(
                format!("group '{name}'"),
                format!("expected a list of names or a mapping, got {other}"),
            ))
        }
    };

    Ok(Group {
        name,
        names: settings.names,
        broadcast: settings.broadcast,
        exchange_type: settings.exchanges.and_then(|t| t.kind),
        queue_type: settings.queues.and_then(|t| t.kind),
        single_active_consumer: settings.single_active_consumer,
        binding_source: settings.bindings,
        vhost: settings.vhost,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_shorthand_resolves_to_default_group() {
        let doc = TopologyDocument::from_yaml_strs(&["groups:\n  audit: [audit.log, audit.err]"])
            .unwrap();
        assert_eq!(doc.groups, vec![Group::new("audit", ["audit.log", "audit.err"])]);
    }

    #[test]
    fn detailed_group_keeps_settings_as_written() {
        let doc = TopologyDocument::from_yaml_strs(&[r#"
groups:
  orders:
    names: [order.created]
    queues: { type: quorum }
    exchanges: { type: topic }
    single_active_consumer: true
    bindings: events
    vhost: shop
"#])
        .unwrap();
        let g = &doc.groups[0];
        assert_eq!(g.queue_type.as_deref(), Some("quorum"));
        assert_eq!(g.exchange_type.as_deref(), Some("topic"));
        assert!(g.single_active_consumer);
        assert!(!g.broadcast);
        assert_eq!(g.binding_source.as_deref(), Some("events"));
        assert_eq!(g.vhost.as_deref(), Some("shop"));
    }

    #[test]
    fn unknown_group_key_is_rejected() {
        let err = TopologyDocument::from_yaml_strs(&["groups:\n  g:\n    names: [a]\n    brodcast: true"])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Shape { .. }), "{err}");
        assert!(err.to_string().contains("group 'g'"));
    }

    #[test]
    fn scalar_group_is_rejected() {
        let err = TopologyDocument::from_yaml_strs(&["groups:\n  g: 3"]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn policy_apply_to_accepts_both_spellings() {
        let doc = TopologyDocument::from_yaml_strs(&[
            "policies:\n  - name: a\n    apply-to: exchanges\n  - name: b\n    apply_to: all",
        ])
        .unwrap();
        assert_eq!(doc.policies[0].apply_to.as_deref(), Some("exchanges"));
        assert_eq!(doc.policies[1].apply_to.as_deref(), Some("all"));
    }

    #[test]
    fn blank_policy_name_is_rejected() {
        let err = TopologyDocument::from_yaml_strs(&["policies:\n  - name: ' '"]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn broadcast_and_routing_groups_partition() {
        let doc = TopologyDocument::from_yaml_strs(&[
            "groups:\n  a: {names: [x], broadcast: true}\n  b: [y]",
        ])
        .unwrap();
        assert_eq!(doc.broadcast_groups().count(), 1);
        assert_eq!(doc.routing_groups().count(), 1);
    }
}
