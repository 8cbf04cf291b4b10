//! Risk management module
//!
//! Market-condition filters, confidence adjustments, and position sizing.

mod manager;
mod sizing;
mod types;

pub use manager::{FilterChecks, MarketFilterResult, RiskManager};
pub use sizing::{PositionSizingService, SizingCalculations, SizingResult};
pub use types::RiskError;
