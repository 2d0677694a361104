//! tpk-schemas
//!
//! Broker topology value types shared by every crate in the workspace:
//! the five entity kinds, the `Entity` / `ObservedEntity` sum types, the
//! `BrokerAdapter` trait that live and in-memory brokers implement, and
//! the broker-facing error types.
//!
//! Pure data. No IO.

mod adapter;
mod entities;
mod error;

pub use adapter::BrokerAdapter;
pub use entities::*;
pub use error::{BrokerError, BrokerOp, UnrecognizedEntity};
