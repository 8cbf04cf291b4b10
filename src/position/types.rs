//! Position types

use crate::signal::Direction;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Shares per standard option contract
pub const CONTRACT_MULTIPLIER: Decimal = dec!(100);

/// Lifecycle state of a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Open,
    Closed,
}

/// A tracked options holding
///
/// Created on an ENTER decision and mutated only by the
/// PositionManager. Closing sets the status; positions are never
/// physically removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Position identifier
    pub id: Uuid,
    /// Identifier of the signal that opened the position
    pub signal_id: Uuid,
    /// Underlying symbol
    pub symbol: String,
    /// Timeframe of the originating signal, used for GEX flip checks
    pub timeframe: String,
    /// Held direction
    pub direction: Direction,
    /// Contract quantity
    pub quantity: i64,
    /// Premium paid per contract at entry
    pub entry_price: Decimal,
    /// Entry timestamp
    pub entry_time: DateTime<Utc>,
    /// Latest observed premium, when a refresh has happened
    pub current_price: Option<Decimal>,
    /// Unrealized P&L at the latest refresh
    pub unrealized_pnl: Option<Decimal>,
    /// Premium at close
    pub exit_price: Option<Decimal>,
    /// Close timestamp
    pub exit_time: Option<DateTime<Utc>>,
    /// Realized P&L once closed
    pub realized_pnl: Option<Decimal>,
    /// Lifecycle state
    pub status: PositionStatus,
}

impl Position {
    /// Whether the position is still open
    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    /// Total premium paid at entry
    pub fn entry_cost(&self) -> Decimal {
        self.entry_price * Decimal::from(self.quantity) * CONTRACT_MULTIPLIER
    }
}
