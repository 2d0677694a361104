use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Broker argument / definition map.
///
/// Key-ordered, so two maps compare equal when they hold the same key/value
/// set regardless of the order the keys were declared or returned in. Nested
/// JSON objects are `serde_json::Map`, which is key-ordered as well.
pub type Arguments = BTreeMap<String, Value>;

/// Default virtual host.
pub const DEFAULT_VHOST: &str = "/";

/// Broker identifier for the salted SHA-256 password scheme.
pub const SHA256_HASHING_ALGORITHM: &str = "rabbit_password_hashing_sha256";

// ---------------------------------------------------------------------------
// Kind tag
// ---------------------------------------------------------------------------

/// The five entity kinds, declared in mandatory reconcile order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Policy,
    Queue,
    Exchange,
    Binding,
}

impl EntityKind {
    /// users → policies → queues → exchanges → bindings
    pub const RECONCILE_ORDER: [EntityKind; 5] = [
        EntityKind::User,
        EntityKind::Policy,
        EntityKind::Queue,
        EntityKind::Exchange,
        EntityKind::Binding,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Policy => "policy",
            EntityKind::Queue => "queue",
            EntityKind::Exchange => "exchange",
            EntityKind::Binding => "binding",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// String-backed enums
// ---------------------------------------------------------------------------

/// Exchange routing type. Plugin types (e.g. `x-delayed-message`) land in `Other`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExchangeType {
    Direct,
    Fanout,
    Topic,
    Headers,
    Other(String),
}

impl ExchangeType {
    pub fn as_str(&self) -> &str {
        match self {
            ExchangeType::Direct => "direct",
            ExchangeType::Fanout => "fanout",
            ExchangeType::Topic => "topic",
            ExchangeType::Headers => "headers",
            ExchangeType::Other(s) => s,
        }
    }
}

impl Default for ExchangeType {
    fn default() -> Self {
        ExchangeType::Direct
    }
}

impl From<String> for ExchangeType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "direct" => ExchangeType::Direct,
            "fanout" => ExchangeType::Fanout,
            "topic" => ExchangeType::Topic,
            "headers" => ExchangeType::Headers,
            _ => ExchangeType::Other(s),
        }
    }
}

impl From<&str> for ExchangeType {
    fn from(s: &str) -> Self {
        ExchangeType::from(s.to_string())
    }
}

impl From<ExchangeType> for String {
    fn from(t: ExchangeType) -> Self {
        match t {
            ExchangeType::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ExchangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which resources a policy governs.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ApplyTo {
    Queues,
    Exchanges,
    All,
    /// Newer brokers accept e.g. `classic_queues`, `quorum_queues`, `streams`.
    Other(String),
}

impl ApplyTo {
    pub fn as_str(&self) -> &str {
        match self {
            ApplyTo::Queues => "queues",
            ApplyTo::Exchanges => "exchanges",
            ApplyTo::All => "all",
            ApplyTo::Other(s) => s,
        }
    }
}

impl Default for ApplyTo {
    fn default() -> Self {
        ApplyTo::Queues
    }
}

impl From<String> for ApplyTo {
    fn from(s: String) -> Self {
        match s.as_str() {
            "queues" => ApplyTo::Queues,
            "exchanges" => ApplyTo::Exchanges,
            "all" => ApplyTo::All,
            _ => ApplyTo::Other(s),
        }
    }
}

impl From<ApplyTo> for String {
    fn from(a: ApplyTo) -> Self {
        match a {
            ApplyTo::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

/// What a binding routes into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationType {
    Queue,
    Exchange,
}

impl DestinationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationType::Queue => "queue",
            DestinationType::Exchange => "exchange",
        }
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Queue {
    pub vhost: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Arguments,
    pub auto_delete: bool,
    pub durable: bool,
    #[serde(default)]
    pub exclusive: bool,
}

impl Queue {
    /// Durable, non-exclusive, non-auto-delete queue with no arguments.
    pub fn durable(vhost: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            vhost: vhost.into(),
            name: name.into(),
            arguments: Arguments::new(),
            auto_delete: false,
            durable: true,
            exclusive: false,
        }
    }

    pub fn with_argument(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub vhost: String,
    pub name: String,
    #[serde(rename = "type")]
    pub exchange_type: ExchangeType,
    pub durable: bool,
    pub auto_delete: bool,
    #[serde(default)]
    pub arguments: Arguments,
}

/// Built-in exchanges: the nameless default exchange and the `amq.*` family.
/// The broker owns them; clients can neither declare nor delete them.
pub fn is_builtin_exchange(name: &str) -> bool {
    name.is_empty() || name.starts_with("amq.")
}

impl Exchange {
    pub fn durable(
        vhost: impl Into<String>,
        name: impl Into<String>,
        exchange_type: ExchangeType,
    ) -> Self {
        Self {
            vhost: vhost.into(),
            name: name.into(),
            exchange_type,
            durable: true,
            auto_delete: false,
            arguments: Arguments::new(),
        }
    }
}

/// A routing rule from `source` exchange to `destination`.
///
/// Identity is the key tuple `(vhost, source, destination, destination_type,
/// properties_key)`. `routing_key` and `arguments` are payload only and do
/// not participate in equality.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Binding {
    pub vhost: String,
    pub source: String,
    pub destination: String,
    pub destination_type: DestinationType,
    pub properties_key: String,
    pub routing_key: String,
    #[serde(default)]
    pub arguments: Arguments,
}

impl Binding {
    /// Binding of `destination` queue to `source` with `routing_key` and no
    /// arguments. The properties key equals the routing key, as the broker
    /// assigns it for argument-less bindings.
    pub fn to_queue(
        vhost: impl Into<String>,
        source: impl Into<String>,
        destination: impl Into<String>,
        routing_key: impl Into<String>,
    ) -> Self {
        let routing_key = routing_key.into();
        Self {
            vhost: vhost.into(),
            source: source.into(),
            destination: destination.into(),
            destination_type: DestinationType::Queue,
            properties_key: routing_key.clone(),
            routing_key,
            arguments: Arguments::new(),
        }
    }

    pub fn key(&self) -> (&str, &str, &str, DestinationType, &str) {
        (
            &self.vhost,
            &self.source,
            &self.destination,
            self.destination_type,
            &self.properties_key,
        )
    }
}

impl PartialEq for Binding {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Binding {}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub vhost: String,
    pub name: String,
    pub pattern: String,
    #[serde(default)]
    pub definition: Arguments,
    #[serde(default)]
    pub priority: i64,
    #[serde(rename = "apply-to")]
    pub apply_to: ApplyTo,
}

/// Broker user account. `tags` is kept in canonical comma-joined form.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub password_hash: String,
    pub hashing_algorithm: String,
    pub tags: String,
}

impl User {
    pub fn tag_list(&self) -> Vec<&str> {
        self.tags.split(',').filter(|t| !t.is_empty()).collect()
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("name", &self.name)
            .field("password_hash", &"<REDACTED>")
            .field("hashing_algorithm", &self.hashing_algorithm)
            .field("tags", &self.tags)
            .finish()
    }
}

/// User tags as reported by the broker: older releases return a
/// comma-joined string, newer ones a list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Tags {
    List(Vec<String>),
    Joined(String),
}

impl Tags {
    pub fn joined(&self) -> String {
        match self {
            Tags::List(items) => items.join(","),
            Tags::Joined(s) => s.clone(),
        }
    }
}

impl Default for Tags {
    fn default() -> Self {
        Tags::List(Vec::new())
    }
}

/// User as observed on the broker, before tag normalization.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedUser {
    pub name: String,
    #[serde(default)]
    pub password_hash: String,
    #[serde(default)]
    pub hashing_algorithm: String,
    #[serde(default)]
    pub tags: Tags,
}

impl fmt::Debug for ObservedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservedUser")
            .field("name", &self.name)
            .field("password_hash", &"<REDACTED>")
            .field("hashing_algorithm", &self.hashing_algorithm)
            .field("tags", &self.tags)
            .finish()
    }
}

impl From<ObservedUser> for User {
    fn from(u: ObservedUser) -> Self {
        Self {
            tags: u.tags.joined(),
            name: u.name,
            password_hash: u.password_hash,
            hashing_algorithm: u.hashing_algorithm,
        }
    }
}

impl From<User> for ObservedUser {
    fn from(u: User) -> Self {
        Self {
            tags: Tags::Joined(u.tags),
            name: u.name,
            password_hash: u.password_hash,
            hashing_algorithm: u.hashing_algorithm,
        }
    }
}

// ---------------------------------------------------------------------------
// Sum types
// ---------------------------------------------------------------------------

/// Any desired entity, as handed to an adapter for create/delete.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    User(User),
    Policy(Policy),
    Queue(Queue),
    Exchange(Exchange),
    Binding(Binding),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::User(_) => EntityKind::User,
            Entity::Policy(_) => EntityKind::Policy,
            Entity::Queue(_) => EntityKind::Queue,
            Entity::Exchange(_) => EntityKind::Exchange,
            Entity::Binding(_) => EntityKind::Binding,
        }
    }

    /// Short human label used in logs and error messages.
    pub fn label(&self) -> String {
        match self {
            Entity::User(u) => u.name.clone(),
            Entity::Policy(p) => format!("{}/{}", p.vhost, p.name),
            Entity::Queue(q) => format!("{}/{}", q.vhost, q.name),
            Entity::Exchange(e) => format!("{}/{}", e.vhost, e.name),
            Entity::Binding(b) => format!(
                "{}/{}->{}:{}[{}]",
                b.vhost,
                b.source,
                b.destination_type.as_str(),
                b.destination,
                b.properties_key
            ),
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.label())
    }
}

macro_rules! entity_from {
    ($($ty:ident),*) => {
        $(
            impl From<$ty> for Entity {
                fn from(value: $ty) -> Self {
                    Entity::$ty(value)
                }
            }
        )*
    };
}

entity_from!(User, Policy, Queue, Exchange, Binding);

/// An entity as listed by an adapter. Only users need normalization before
/// comparison; the other kinds are already in canonical form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ObservedEntity {
    User(ObservedUser),
    Policy(Policy),
    Queue(Queue),
    Exchange(Exchange),
    Binding(Binding),
}

impl ObservedEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            ObservedEntity::User(_) => EntityKind::User,
            ObservedEntity::Policy(_) => EntityKind::Policy,
            ObservedEntity::Queue(_) => EntityKind::Queue,
            ObservedEntity::Exchange(_) => EntityKind::Exchange,
            ObservedEntity::Binding(_) => EntityKind::Binding,
        }
    }
}

impl From<Entity> for ObservedEntity {
    fn from(e: Entity) -> Self {
        match e {
            Entity::User(u) => ObservedEntity::User(u.into()),
            Entity::Policy(p) => ObservedEntity::Policy(p),
            Entity::Queue(q) => ObservedEntity::Queue(q),
            Entity::Exchange(x) => ObservedEntity::Exchange(x),
            Entity::Binding(b) => ObservedEntity::Binding(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn argument_maps_compare_independent_of_insertion_order() {
        let a = Queue::durable("/", "q")
            .with_argument("x-queue-type", "classic")
            .with_argument("x-dead-letter-exchange", "");
        let b = Queue::durable("/", "q")
            .with_argument("x-dead-letter-exchange", "")
            .with_argument("x-queue-type", "classic");
        assert_eq!(a, b);
    }

    #[test]
    fn nested_argument_values_compare_by_content() {
        let a: Value = serde_json::from_str(r#"{"a":1,"b":{"c":2,"d":3}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"b":{"d":3,"c":2},"a":1}"#).unwrap();
        assert_eq!(
            Queue::durable("/", "q").with_argument("x", a),
            Queue::durable("/", "q").with_argument("x", b)
        );
    }

    #[test]
    fn binding_equality_ignores_routing_key_and_arguments() {
        let a = Binding::to_queue("/", "ex1", "q1", "q1");
        let mut b = a.clone();
        b.routing_key = "other".to_string();
        b.arguments.insert("x-match".to_string(), json!("all"));
        assert_eq!(a, b);

        let mut c = a.clone();
        c.properties_key = "~".to_string();
        assert_ne!(a, c);
    }

    #[test]
    fn observed_user_tags_normalize_to_joined_form() {
        let observed = ObservedUser {
            name: "svc".to_string(),
            password_hash: "h".to_string(),
            hashing_algorithm: SHA256_HASHING_ALGORITHM.to_string(),
            tags: Tags::List(vec!["administrator".to_string(), "monitoring".to_string()]),
        };
        let user: User = observed.into();
        assert_eq!(user.tags, "administrator,monitoring");
        assert_eq!(user.tag_list(), vec!["administrator", "monitoring"]);
    }

    #[test]
    fn tags_deserialize_from_list_or_string() {
        let list: Tags = serde_json::from_value(json!(["a", "b"])).unwrap();
        let joined: Tags = serde_json::from_value(json!("a,b")).unwrap();
        assert_eq!(list.joined(), joined.joined());
    }

    #[test]
    fn exchange_type_round_trips_unknown_plugin_types() {
        let t: ExchangeType = serde_json::from_value(json!("x-delayed-message")).unwrap();
        assert_eq!(t, ExchangeType::Other("x-delayed-message".to_string()));
        assert_eq!(serde_json::to_value(&t).unwrap(), json!("x-delayed-message"));
        let f: ExchangeType = serde_json::from_value(json!("fanout")).unwrap();
        assert_eq!(f, ExchangeType::Fanout);
    }

    #[test]
    fn user_debug_redacts_password_hash() {
        let u = User {
            name: "svc".to_string(),
            password_hash: "c2VjcmV0".to_string(),
            hashing_algorithm: SHA256_HASHING_ALGORITHM.to_string(),
            tags: String::new(),
        };
        let dbg = format!("{u:?}");
        assert!(!dbg.contains("c2VjcmV0"));
        assert!(dbg.contains("<REDACTED>"));
    }

    #[test]
    fn reconcile_order_is_users_policies_queues_exchanges_bindings() {
        let names: Vec<&str> = EntityKind::RECONCILE_ORDER
            .iter()
            .map(|k| k.as_str())
            .collect();
        assert_eq!(names, ["user", "policy", "queue", "exchange", "binding"]);
    }
}
