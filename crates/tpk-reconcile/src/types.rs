use std::fmt;

use serde::{Deserialize, Serialize};
use tpk_schemas::{Entity, EntityKind, ObservedEntity, UnrecognizedEntity};

/// Why an observed entity absent from the desired set is left alone.
/// Stable ordering so reports sort deterministically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Queue with an empty name.
    Unnamed,
    /// Name or binding source inside the broker's `amq.` namespace.
    BrokerInternal,
    /// Auto-delete queue: transient, owned by its consumers.
    AutoDelete,
    /// Exclusive queue: owned by a single client connection.
    Exclusive,
    /// Binding on the default exchange; implicit per queue.
    DefaultExchange,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Unnamed => "unnamed",
            SkipReason::BrokerInternal => "broker_internal",
            SkipReason::AutoDelete => "auto_delete",
            SkipReason::Exclusive => "exclusive",
            SkipReason::DefaultExchange => "default_exchange",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-kind hooks the engine needs: kind tag, skip predicate, extraction
/// from adapter listings, and conversion into the adapter's sum type.
pub trait Reconcilable: Clone + PartialEq + fmt::Debug {
    const KIND: EntityKind;

    /// Adapter-side shape before normalization.
    type Observed: Into<Self>;

    /// `Some(reason)` when an observed instance must never be deleted.
    fn skip_reason(&self) -> Option<SkipReason> {
        None
    }

    fn skip(&self) -> bool {
        self.skip_reason().is_some()
    }

    fn from_observed(entity: ObservedEntity) -> Result<Self::Observed, UnrecognizedEntity>;

    fn to_entity(&self) -> Entity;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Skipped<T> {
    pub entity: T,
    pub reason: SkipReason,
}

/// Outcome of diffing one kind: what to delete, what to create, what is
/// deliberately left alone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcilePlan<T> {
    pub kind: EntityKind,
    /// Desired entities missing from the broker, in desired order.
    pub creates: Vec<T>,
    /// Observed entities neither desired nor skipped, in observed order.
    pub deletes: Vec<T>,
    pub skipped: Vec<Skipped<T>>,
    /// Observed entities already equal to a desired one.
    pub unchanged: usize,
}

impl<T> ReconcilePlan<T> {
    pub fn empty(kind: EntityKind) -> Self {
        Self {
            kind,
            creates: Vec::new(),
            deletes: Vec::new(),
            skipped: Vec::new(),
            unchanged: 0,
        }
    }

    /// No create or delete calls needed.
    pub fn is_noop(&self) -> bool {
        self.creates.is_empty() && self.deletes.is_empty()
    }

    pub fn operation_count(&self) -> usize {
        self.creates.len() + self.deletes.len()
    }
}
