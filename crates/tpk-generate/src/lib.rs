//! tpk-generate
//!
//! Expands the topology document and credential sources into the concrete
//! desired entity sets:
//!
//! - routing groups → primary queue + `dlq.` queue per name, one binding per name
//! - broadcast groups → one exchange per name (`fanout`)
//! - policy descriptors → policies with defaults filled in
//! - credential sources → users with deterministic salted password hashes
//!
//! Deterministic, pure logic. No IO.

use std::collections::BTreeSet;

use serde_json::Value;
use tpk_config::{ConfigError, CredentialSource, Group, PolicyDescriptor, TopologyDocument};
use tpk_schemas::{
    ApplyTo, Arguments, Binding, EntityKind, Exchange, ExchangeType, Policy, Queue, User,
    DEFAULT_VHOST, SHA256_HASHING_ALGORITHM,
};

pub mod password;

pub use password::{hash_password, verify_password};

pub const DLQ_PREFIX: &str = "dlq.";
pub const DEFAULT_QUEUE_TYPE: &str = "classic";
pub const DEFAULT_POLICY_PATTERN: &str = "^amq.";

pub const ARG_QUEUE_TYPE: &str = "x-queue-type";
pub const ARG_DEAD_LETTER_EXCHANGE: &str = "x-dead-letter-exchange";
pub const ARG_DEAD_LETTER_ROUTING_KEY: &str = "x-dead-letter-routing-key";
pub const ARG_SINGLE_ACTIVE_CONSUMER: &str = "x-single-active-consumer";

pub fn dlq_name(name: &str) -> String {
    format!("{DLQ_PREFIX}{name}")
}

fn vhost_of(group: &Group) -> &str {
    group.vhost.as_deref().unwrap_or(DEFAULT_VHOST)
}

/// Primary queue and its dead-letter queue for every logical name.
/// Output is always `2 * group.names.len()` queues, primary first.
pub fn queues_for(group: &Group) -> Vec<Queue> {
    let vhost = vhost_of(group);
    let queue_type = group.queue_type.as_deref().unwrap_or(DEFAULT_QUEUE_TYPE);

    let mut out = Vec::with_capacity(group.names.len() * 2);
    for name in &group.names {
        let primary = Queue {
            arguments: primary_queue_arguments(name, queue_type, group.single_active_consumer),
            ..Queue::durable(vhost, name.as_str())
        };
        let dead_letter =
            Queue::durable(vhost, dlq_name(name)).with_argument(ARG_QUEUE_TYPE, queue_type);

        out.push(primary);
        out.push(dead_letter);
    }
    out
}

/// One exchange per logical name. Broadcast groups are always `fanout`.
pub fn exchanges_for(group: &Group) -> Vec<Exchange> {
    let vhost = vhost_of(group);
    let exchange_type = if group.broadcast {
        ExchangeType::Fanout
    } else {
        group
            .exchange_type
            .as_deref()
            .map(ExchangeType::from)
            .unwrap_or_default()
    };

    group
        .names
        .iter()
        .map(|name| Exchange::durable(vhost, name.as_str(), exchange_type.clone()))
        .collect()
}

/// One queue binding per logical name, routed by the name itself.
pub fn bindings_for(group: &Group) -> Vec<Binding> {
    let vhost = vhost_of(group);
    let source = group.binding_source.as_deref().unwrap_or("");

    group
        .names
        .iter()
        .map(|name| Binding::to_queue(vhost, source, name.as_str(), name.as_str()))
        .collect()
}

pub fn policies_from(raw_policies: &[PolicyDescriptor]) -> Vec<Policy> {
    raw_policies
        .iter()
        .map(|p| Policy {
            vhost: p.vhost.clone().unwrap_or_else(|| DEFAULT_VHOST.to_string()),
            name: p.name.clone(),
            pattern: p
                .pattern
                .clone()
                .unwrap_or_else(|| DEFAULT_POLICY_PATTERN.to_string()),
            definition: p.definition.clone().unwrap_or_default(),
            priority: p.priority.unwrap_or(0),
            apply_to: p.apply_to.clone().map(ApplyTo::from).unwrap_or_default(),
        })
        .collect()
}

pub fn users_from(credential_sources: &[CredentialSource], seed: u64) -> Vec<User> {
    credential_sources
        .iter()
        .map(|c| User {
            name: c.username.clone(),
            password_hash: hash_password(&c.password, seed),
            hashing_algorithm: SHA256_HASHING_ALGORITHM.to_string(),
            tags: c.tags.join(","),
        })
        .collect()
}

/// All five desired sets for one run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DesiredTopology {
    pub users: Vec<User>,
    pub policies: Vec<Policy>,
    pub queues: Vec<Queue>,
    pub exchanges: Vec<Exchange>,
    pub bindings: Vec<Binding>,
}

impl DesiredTopology {
    pub fn len_of(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::User => self.users.len(),
            EntityKind::Policy => self.policies.len(),
            EntityKind::Queue => self.queues.len(),
            EntityKind::Exchange => self.exchanges.len(),
            EntityKind::Binding => self.bindings.len(),
        }
    }
}

/// Build and validate the desired state.
///
/// Routing groups contribute queues and bindings, broadcast groups
/// contribute exchanges. Empty or reserved (`amq.`) names and duplicate
/// natural keys within a kind are configuration errors.
pub fn desired_topology(
    document: &TopologyDocument,
    credentials: &[CredentialSource],
    seed: u64,
) -> Result<DesiredTopology, ConfigError> {
    for group in &document.groups {
        validate_group(group)?;
    }

    let mut desired = DesiredTopology {
        users: users_from(credentials, seed),
        policies: policies_from(&document.policies),
        ..DesiredTopology::default()
    };
    for group in document.routing_groups() {
        desired.queues.extend(queues_for(group));
        desired.bindings.extend(bindings_for(group));
    }
    for group in document.broadcast_groups() {
        desired.exchanges.extend(exchanges_for(group));
    }

    ensure_unique(&desired.users, EntityKind::User, |u| u.name.clone())?;
    ensure_unique(&desired.policies, EntityKind::Policy, |p| {
        format!("{}/{}", p.vhost, p.name)
    })?;
    ensure_unique(&desired.queues, EntityKind::Queue, |q| {
        format!("{}/{}", q.vhost, q.name)
    })?;
    ensure_unique(&desired.exchanges, EntityKind::Exchange, |e| {
        format!("{}/{}", e.vhost, e.name)
    })?;
    ensure_unique(&desired.bindings, EntityKind::Binding, |b| {
        format!("{}/{}->{}[{}]", b.vhost, b.source, b.destination, b.properties_key)
    })?;

    Ok(desired)
}

fn validate_group(group: &Group) -> Result<(), ConfigError> {
    let context = || format!("group '{}'", group.name);
    for name in &group.names {
        if name.trim().is_empty() {
            return Err(ConfigError::invalid(context(), "logical names must not be empty"));
        }
        if name.starts_with("amq.") {
            return Err(ConfigError::invalid(
                context(),
                format!("'{name}': the amq. prefix is reserved by the broker"),
            ));
        }
    }
    if let Some(vhost) = &group.vhost {
        if vhost.is_empty() {
            return Err(ConfigError::invalid(context(), "vhost must not be empty"));
        }
    }
    Ok(())
}

fn ensure_unique<T, F>(items: &[T], kind: EntityKind, key: F) -> Result<(), ConfigError>
where
    F: Fn(&T) -> String,
{
    let mut seen = BTreeSet::new();
    for item in items {
        let k = key(item);
        if !seen.insert(k.clone()) {
            return Err(ConfigError::invalid(
                format!("desired {kind} set"),
                format!("'{k}' is declared more than once"),
            ));
        }
    }
    Ok(())
}

/// Arguments of a primary queue: queue type, dead-lettering into its
/// `dlq.` twin through the default exchange, single-active-consumer flag.
pub fn primary_queue_arguments(name: &str, queue_type: &str, single_active: bool) -> Arguments {
    let mut args = Arguments::new();
    args.insert(ARG_QUEUE_TYPE.to_string(), Value::from(queue_type));
    args.insert(ARG_DEAD_LETTER_EXCHANGE.to_string(), Value::from(""));
    args.insert(ARG_DEAD_LETTER_ROUTING_KEY.to_string(), Value::from(dlq_name(name)));
    args.insert(ARG_SINGLE_ACTIVE_CONSUMER.to_string(), Value::from(single_active));
    args
}
