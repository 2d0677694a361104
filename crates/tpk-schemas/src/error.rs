use thiserror::Error;

use crate::EntityKind;

/// Adapter operation that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BrokerOp {
    List,
    Create,
    Delete,
}

impl BrokerOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrokerOp::List => "list",
            BrokerOp::Create => "create",
            BrokerOp::Delete => "delete",
        }
    }
}

impl std::fmt::Display for BrokerOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any failure talking to the broker. Never retried; aborts the run.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The broker answered with a non-success status.
    #[error("broker rejected {op} {kind} '{target}': HTTP {status}: {body}")]
    Request {
        op: BrokerOp,
        kind: EntityKind,
        target: String,
        status: u16,
        body: String,
    },

    /// The request never produced a response (connect, TLS, timeout).
    #[error("transport failure during {op} {kind} '{target}': {message}")]
    Transport {
        op: BrokerOp,
        kind: EntityKind,
        target: String,
        message: String,
    },

    /// A list response could not be decoded into entities.
    #[error("undecodable {kind} listing from broker: {message}")]
    Decode { kind: EntityKind, message: String },
}

impl BrokerError {
    pub fn kind(&self) -> EntityKind {
        match self {
            BrokerError::Request { kind, .. }
            | BrokerError::Transport { kind, .. }
            | BrokerError::Decode { kind, .. } => *kind,
        }
    }
}

/// An adapter handed back an entity of a kind other than the one requested.
/// A programming defect in the adapter, never expected at runtime.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unrecognized entity: expected {expected}, adapter returned {found}")]
pub struct UnrecognizedEntity {
    pub expected: EntityKind,
    pub found: EntityKind,
}
