//! tpk-reconcile
//!
//! Per-kind topology diff and plan application.
//!
//! - Observed entities equal to a desired one are left untouched
//! - Observed entities matching a skip predicate are never deleted
//! - Everything else observed is deleted; everything desired and missing
//!   is created
//! - Kinds are reconciled users → policies → queues → exchanges → bindings
//!
//! `reconcile` is deterministic, pure logic with no IO. Only `apply_plan`
//! talks to a broker, through the `BrokerAdapter` seam.

mod engine;
mod kinds;
mod types;

pub use engine::{apply_plan, exclude_transient_bindings, reconcile};
pub use kinds::observed_of;
pub use types::*;
