use thiserror::Error;
use tpk_config::ConfigError;
use tpk_schemas::{BrokerError, UnrecognizedEntity};

/// Why a run stopped. Config errors happen before any broker call; broker
/// errors abort at the first failing call.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Unrecognized(#[from] UnrecognizedEntity),
}
