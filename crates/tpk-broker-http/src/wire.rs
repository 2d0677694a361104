//! Management API wire format: raw listing structs and request bodies.
//!
//! # Design constraints
//! - Pure, deterministic conversion. No IO.
//! - Unknown fields are ignored (`deny_unknown_fields` is NOT set); listings
//!   carry many statistics fields the reconciler has no use for.
//! - Older brokers serialize an empty argument table as `[]` instead of `{}`;
//!   both decode to an empty map.

use serde::Deserialize;
use serde_json::{json, Value};
use tpk_schemas::{
    Arguments, Binding, DestinationType, Entity, EntityKind, Exchange, ObservedEntity,
    ObservedUser, Policy, Queue,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// The response body is not the JSON array the endpoint documents.
    Malformed { message: String },
    /// An argument table was a non-empty array.
    ArgumentsNotATable { entity: String },
    /// A binding destination type other than `queue` / `exchange`.
    UnknownDestinationType { raw: String },
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed { message } => write!(f, "malformed listing: {message}"),
            Self::ArgumentsNotATable { entity } => {
                write!(f, "'{entity}' has arguments that are not a key/value table")
            }
            Self::UnknownDestinationType { raw } => {
                write!(f, "binding has unrecognised destination_type '{raw}'")
            }
        }
    }
}

impl std::error::Error for WireError {}

// ---------------------------------------------------------------------------
// Raw listing structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawArguments {
    Table(Arguments),
    Legacy(Vec<Value>),
}

impl Default for RawArguments {
    fn default() -> Self {
        RawArguments::Table(Arguments::new())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawQueue {
    vhost: String,
    name: String,
    #[serde(default)]
    durable: bool,
    #[serde(default)]
    auto_delete: bool,
    #[serde(default)]
    exclusive: bool,
    #[serde(default)]
    arguments: RawArguments,
}

#[derive(Debug, Clone, Deserialize)]
struct RawExchange {
    vhost: String,
    name: String,
    #[serde(rename = "type")]
    exchange_type: String,
    #[serde(default)]
    durable: bool,
    #[serde(default)]
    auto_delete: bool,
    #[serde(default)]
    arguments: RawArguments,
}

#[derive(Debug, Clone, Deserialize)]
struct RawBinding {
    vhost: String,
    source: String,
    destination: String,
    destination_type: String,
    #[serde(default)]
    routing_key: String,
    #[serde(default)]
    properties_key: String,
    #[serde(default)]
    arguments: RawArguments,
}

#[derive(Debug, Clone, Deserialize)]
struct RawPolicy {
    vhost: String,
    name: String,
    pattern: String,
    #[serde(rename = "apply-to", default)]
    apply_to: Option<String>,
    #[serde(default)]
    definition: RawArguments,
    #[serde(default)]
    priority: i64,
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

fn table(raw: RawArguments, entity: &str) -> Result<Arguments, WireError> {
    match raw {
        RawArguments::Table(args) => Ok(args),
        RawArguments::Legacy(items) if items.is_empty() => Ok(Arguments::new()),
        RawArguments::Legacy(_) => Err(WireError::ArgumentsNotATable {
            entity: entity.to_string(),
        }),
    }
}

fn destination_type(raw: &str) -> Result<DestinationType, WireError> {
    match raw {
        "queue" => Ok(DestinationType::Queue),
        "exchange" => Ok(DestinationType::Exchange),
        other => Err(WireError::UnknownDestinationType {
            raw: other.to_string(),
        }),
    }
}

pub use tpk_schemas::is_builtin_exchange;

fn parse<T: for<'de> Deserialize<'de>>(body: &str) -> Result<Vec<T>, WireError> {
    serde_json::from_str(body).map_err(|e| WireError::Malformed {
        message: e.to_string(),
    })
}

/// Decode a list endpoint body into observed entities of `kind`.
pub fn decode_listing(kind: EntityKind, body: &str) -> Result<Vec<ObservedEntity>, WireError> {
    match kind {
        EntityKind::Queue => parse::<RawQueue>(body)?
            .into_iter()
            .map(|r| -> Result<ObservedEntity, WireError> {
                let label = format!("{}/{}", r.vhost, r.name);
                Ok(ObservedEntity::Queue(Queue {
                    arguments: table(r.arguments, &label)?,
                    vhost: r.vhost,
                    name: r.name,
                    auto_delete: r.auto_delete,
                    durable: r.durable,
                    exclusive: r.exclusive,
                }))
            })
            .collect(),
        EntityKind::Exchange => parse::<RawExchange>(body)?
            .into_iter()
            .filter(|r| !is_builtin_exchange(&r.name))
            .map(|r| -> Result<ObservedEntity, WireError> {
                let label = format!("{}/{}", r.vhost, r.name);
                Ok(ObservedEntity::Exchange(Exchange {
                    arguments: table(r.arguments, &label)?,
                    vhost: r.vhost,
                    name: r.name,
                    exchange_type: r.exchange_type.into(),
                    durable: r.durable,
                    auto_delete: r.auto_delete,
                }))
            })
            .collect(),
        EntityKind::Binding => parse::<RawBinding>(body)?
            .into_iter()
            .map(|r| -> Result<ObservedEntity, WireError> {
                let label = format!("{}/{}->{}", r.vhost, r.source, r.destination);
                Ok(ObservedEntity::Binding(Binding {
                    destination_type: destination_type(&r.destination_type)?,
                    arguments: table(r.arguments, &label)?,
                    vhost: r.vhost,
                    source: r.source,
                    destination: r.destination,
                    properties_key: r.properties_key,
                    routing_key: r.routing_key,
                }))
            })
            .collect(),
        EntityKind::Policy => parse::<RawPolicy>(body)?
            .into_iter()
            .map(|r| -> Result<ObservedEntity, WireError> {
                let label = format!("{}/{}", r.vhost, r.name);
                Ok(ObservedEntity::Policy(Policy {
                    definition: table(r.definition, &label)?,
                    apply_to: r.apply_to.map(Into::into).unwrap_or_default(),
                    vhost: r.vhost,
                    name: r.name,
                    pattern: r.pattern,
                    priority: r.priority,
                }))
            })
            .collect(),
        EntityKind::User => Ok(parse::<ObservedUser>(body)?
            .into_iter()
            .map(ObservedEntity::User)
            .collect()),
    }
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// JSON body for the create request of `entity`.
pub fn create_body(entity: &Entity) -> Value {
    match entity {
        Entity::Queue(q) => json!({
            "durable": q.durable,
            "auto_delete": q.auto_delete,
            "arguments": q.arguments,
        }),
        Entity::Exchange(e) => json!({
            "type": e.exchange_type.as_str(),
            "durable": e.durable,
            "auto_delete": e.auto_delete,
            "internal": false,
            "arguments": e.arguments,
        }),
        Entity::Binding(b) => json!({
            "routing_key": b.routing_key,
            "arguments": b.arguments,
        }),
        Entity::Policy(p) => json!({
            "pattern": p.pattern,
            "definition": p.definition,
            "priority": p.priority,
            "apply-to": p.apply_to.as_str(),
        }),
        // Comma-joined tags are accepted by every broker release.
        Entity::User(u) => json!({
            "password_hash": u.password_hash,
            "hashing_algorithm": u.hashing_algorithm,
            "tags": u.tags,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpk_schemas::{ApplyTo, ExchangeType, Tags, User};

    #[test]
    fn queue_listing_ignores_statistics_and_accepts_legacy_empty_arguments() {
        let body = r#"[
            {"vhost":"/","name":"orders","durable":true,"auto_delete":false,"exclusive":false,
             "arguments":{"x-queue-type":"classic"},"messages":12,"consumers":1},
            {"vhost":"/","name":"amq.gen-1","durable":false,"auto_delete":true,"exclusive":true,
             "arguments":[]}
        ]"#;
        let listed = decode_listing(EntityKind::Queue, body).unwrap();
        assert_eq!(
            listed[0],
            ObservedEntity::Queue(
                Queue::durable("/", "orders").with_argument("x-queue-type", "classic")
            )
        );
        match &listed[1] {
            ObservedEntity::Queue(q) => {
                assert!(q.arguments.is_empty());
                assert!(q.exclusive);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn exchange_listing_omits_builtin_exchanges() {
        let body = r#"[
            {"vhost":"/","name":"","type":"direct","durable":true,"auto_delete":false,"arguments":{}},
            {"vhost":"/","name":"amq.topic","type":"topic","durable":true,"auto_delete":false,"arguments":{}},
            {"vhost":"/","name":"events","type":"fanout","durable":true,"auto_delete":false,"arguments":{}}
        ]"#;
        let listed = decode_listing(EntityKind::Exchange, body).unwrap();
        assert_eq!(
            listed,
            vec![ObservedEntity::Exchange(Exchange::durable("/", "events", ExchangeType::Fanout))]
        );
    }

    #[test]
    fn binding_listing_keeps_properties_key() {
        let body = r#"[{"source":"events","vhost":"/","destination":"q","destination_type":"queue",
                        "routing_key":"q","arguments":{},"properties_key":"q"}]"#;
        let listed = decode_listing(EntityKind::Binding, body).unwrap();
        match &listed[0] {
            ObservedEntity::Binding(b) => assert_eq!(b.properties_key, "q"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_destination_type_is_an_error() {
        let body = r#"[{"source":"e","vhost":"/","destination":"q","destination_type":"stream"}]"#;
        let err = decode_listing(EntityKind::Binding, body).unwrap_err();
        assert!(matches!(err, WireError::UnknownDestinationType { .. }));
    }

    #[test]
    fn policy_listing_decodes_apply_to() {
        let body = r#"[{"vhost":"/","name":"ttl","pattern":"^dlq\\.","apply-to":"queues",
                        "definition":{"message-ttl":1000},"priority":2}]"#;
        let listed = decode_listing(EntityKind::Policy, body).unwrap();
        match &listed[0] {
            ObservedEntity::Policy(p) => {
                assert_eq!(p.apply_to, ApplyTo::Queues);
                assert_eq!(p.priority, 2);
                assert_eq!(p.definition["message-ttl"], json!(1000));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn user_listing_accepts_both_tag_forms() {
        let body = r#"[
            {"name":"a","password_hash":"h","hashing_algorithm":"rabbit_password_hashing_sha256","tags":["administrator"]},
            {"name":"b","password_hash":"h","hashing_algorithm":"rabbit_password_hashing_sha256","tags":"management"}
        ]"#;
        let listed = decode_listing(EntityKind::User, body).unwrap();
        let tags: Vec<&Tags> = listed
            .iter()
            .map(|e| match e {
                ObservedEntity::User(u) => &u.tags,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(tags[0], &Tags::List(vec!["administrator".to_string()]));
        assert_eq!(tags[1], &Tags::Joined("management".to_string()));
    }

    #[test]
    fn non_array_body_is_malformed() {
        let err = decode_listing(EntityKind::Queue, r#"{"error":"not_authorised"}"#).unwrap_err();
        assert!(matches!(err, WireError::Malformed { .. }));
    }

    #[test]
    fn user_body_sends_hash_never_plaintext_field() {
        let body = create_body(&Entity::User(User {
            name: "svc".to_string(),
            password_hash: "aGFzaA==".to_string(),
            hashing_algorithm: "rabbit_password_hashing_sha256".to_string(),
            tags: "administrator,monitoring".to_string(),
        }));
        assert!(body.get("password").is_none());
        assert_eq!(body["tags"], json!("administrator,monitoring"));
    }

    #[test]
    fn binding_body_carries_routing_key() {
        let body = create_body(&Entity::Binding(Binding::to_queue("/", "ex", "q", "rk")));
        assert_eq!(body, json!({"routing_key": "rk", "arguments": {}}));
    }
}
