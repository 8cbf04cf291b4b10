//! Risk management types

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Risk management errors
#[derive(Debug, Error)]
pub enum RiskError {
    /// A non-closed position already exists for the signal
    #[error("position already open for signal {0}")]
    DuplicateEntry(Uuid),
    /// Maximum concurrent positions reached
    #[error("maximum open positions reached ({0})")]
    MaxPositionsReached(usize),
    /// Opening would exceed the exposure limit
    #[error("exposure limit exceeded: {current} held + {additional} requested > {limit}")]
    MaxExposureExceeded {
        current: Decimal,
        additional: Decimal,
        limit: Decimal,
    },
    /// Referenced position does not exist
    #[error("position {0} not found")]
    PositionNotFound(Uuid),
    /// Referenced position is already closed
    #[error("position {0} is already closed")]
    PositionClosed(Uuid),
    /// Position store failure
    #[error("position store error: {0}")]
    Store(String),
}
