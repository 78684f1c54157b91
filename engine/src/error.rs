use ludics_core::InteractionError;
use ludics_types::{AddressError, DesignError, DesignId, StrategyId};
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Design(#[from] DesignError),
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error(transparent)]
    Interaction(#[from] InteractionError),
    #[error("unknown design {0}")]
    UnknownDesign(DesignId),
    #[error("unknown strategy {0}")]
    UnknownStrategy(StrategyId),
    #[error("invalid type: {0}")]
    InvalidType(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("analysis task failed: {0}")]
    Task(String),
}

impl EngineError {
    /// Stable name of the failure, used on the wire.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Design(err) => err.kind(),
            Self::Address(_) => "InvalidAddress",
            Self::Interaction(err) => err.kind(),
            Self::UnknownDesign(_) => "UnknownDesign",
            Self::UnknownStrategy(_) => "UnknownStrategy",
            Self::InvalidType(_) => "InvalidType",
            Self::Store(StoreError::Encoding(_)) => "EncodingFailed",
            Self::Store(_) => "StoreUnavailable",
            Self::Task(_) => "TaskFailed",
        }
    }
}
