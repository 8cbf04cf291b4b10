//! Decision types
//!
//! Every intermediate value of a decision is retained on the decision
//! object so failures and surprising outputs are diagnosable after the
//! fact without re-deriving them.

use crate::risk::SizingCalculations;
use crate::signal::Signal;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Entry verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    Enter,
    Reject,
}

/// Exit verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Exit,
    Hold,
}

/// Why a position should be exited, in evaluation priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    ProfitTarget,
    StopLoss,
    GexFlip,
    MaxHoldTime,
}

/// Audit trail of an entry decision
#[derive(Debug, Clone, Default)]
pub struct EntryCalculations {
    /// Starting confidence before adjustments
    pub base_confidence: Decimal,
    /// Trend and regime adjustment
    pub context_adjustment: Decimal,
    /// Dealer-positioning adjustment
    pub positioning_adjustment: Decimal,
    /// Gamma-exposure adjustment, already scaled by effective weight
    pub gex_adjustment: Decimal,
    /// Effective weight of the GEX reading, when one was available
    pub gex_weight: Option<Decimal>,
    /// Sum of base and adjustments before clamping
    pub raw_confidence: Decimal,
    /// Confidence after clamping to [0, 100]
    pub final_confidence: Decimal,
    /// Cross-source confluence score for the signal's symbol/timeframe
    pub confluence_score: Option<Decimal>,
    /// Sizing chain values, when sizing ran
    pub sizing: Option<SizingCalculations>,
    /// Risk-filter size multiplier applied after the sizing chain
    pub risk_size_multiplier: Option<Decimal>,
    /// Quantity after the risk multiplier and final floor
    pub final_size: i64,
}

/// Outcome of evaluating a signal for entry
#[derive(Debug, Clone)]
pub struct EntryDecision {
    pub decision: Entry,
    /// The originating signal
    pub signal: Signal,
    /// Final confidence in [0, 100]
    pub confidence: Decimal,
    /// Final non-negative contract quantity
    pub size: i64,
    /// Human-readable reasoning, one line per consideration
    pub reasoning: Vec<String>,
    /// Full calculation trail
    pub calculations: EntryCalculations,
}

impl EntryDecision {
    /// Whether this decision is an entry
    pub fn is_enter(&self) -> bool {
        self.decision == Entry::Enter
    }
}

/// Audit trail of an exit evaluation
#[derive(Debug, Clone, Default)]
pub struct ExitCalculations {
    /// Fresh unrealized P&L at the evaluated price
    pub unrealized_pnl: Decimal,
    /// P&L as a percent of entry cost
    pub pnl_pct: Decimal,
    /// Hours the position has been held
    pub held_hours: i64,
    pub profit_target_hit: bool,
    pub stop_loss_hit: bool,
    pub gex_flip_against: bool,
    pub max_hold_exceeded: bool,
}

/// Outcome of evaluating a position for exit
#[derive(Debug, Clone)]
pub struct ExitDecision {
    pub decision: Exit,
    /// The position under evaluation
    pub position_id: Uuid,
    /// First matching exit reason, when exiting
    pub reason: Option<ExitReason>,
    /// Human-readable reasoning
    pub reasoning: Vec<String>,
    /// Full calculation trail
    pub calculations: ExitCalculations,
}

impl ExitDecision {
    /// Whether this decision is an exit
    pub fn is_exit(&self) -> bool {
        self.decision == Exit::Exit
    }
}
