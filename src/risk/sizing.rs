//! Position sizing
//!
//! A deterministic multiplier chain produces the contract quantity:
//! base size, then the Kelly multiplier derived from confidence, then
//! the volatility regime multiplier, then the confluence multiplier.
//! Intermediate values stay fractional; the running value is floored to
//! an integer only at the very end and capped at the configured maximum.
//! A result below the minimum is returned as-is for the caller to treat
//! as "do not enter", never silently bumped up.

use crate::config::SizingConfig;
use crate::market::{ContextData, VolatilityRegime};
use crate::signal::ConfluenceCategory;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Every intermediate value of the sizing chain, kept for audit
#[derive(Debug, Clone)]
pub struct SizingCalculations {
    pub base_size: Decimal,
    pub kelly_multiplier: Decimal,
    pub regime_multiplier: Decimal,
    pub confluence_multiplier: Decimal,
    /// Product of the chain before the final floor and cap
    pub raw_size: Decimal,
    pub final_size: i64,
}

/// Result of a sizing calculation
#[derive(Debug, Clone)]
pub struct SizingResult {
    /// Whole-number contract quantity, capped at the configured maximum
    pub size: i64,
    pub calculations: SizingCalculations,
}

/// Computes contract quantities from confidence and market state
#[derive(Debug, Clone)]
pub struct PositionSizingService {
    config: SizingConfig,
}

impl PositionSizingService {
    /// Create a sizing service from configuration
    pub fn new(config: &SizingConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// The quantity below which the caller should not enter
    pub fn min_size(&self) -> i64 {
        self.config.min_size
    }

    /// Run the multiplier chain for one entry decision
    pub fn calculate(
        &self,
        confidence: Decimal,
        context: &ContextData,
        confluence: ConfluenceCategory,
    ) -> SizingResult {
        let base_size = self.config.base_size;
        let kelly_multiplier = self.kelly_multiplier(confidence);
        let regime_multiplier = self.regime_multiplier(context.regime);
        let confluence_multiplier = self.confluence_multiplier(confluence);

        let raw_size = base_size * kelly_multiplier * regime_multiplier * confluence_multiplier;

        let floored = raw_size.floor().to_i64().unwrap_or(0).max(0);
        let final_size = floored.min(self.config.max_size);

        SizingResult {
            size: final_size,
            calculations: SizingCalculations {
                base_size,
                kelly_multiplier,
                regime_multiplier,
                confluence_multiplier,
                raw_size,
                final_size,
            },
        }
    }

    /// Kelly multiplier from confidence
    ///
    /// With win probability p = confidence / 100 and even odds, the
    /// Kelly edge is 2p - 1. A fractional Kelly of that edge scales the
    /// base size up; a non-positive edge contributes nothing rather
    /// than shorting the base.
    fn kelly_multiplier(&self, confidence: Decimal) -> Decimal {
        let win_prob = (confidence / dec!(100)).clamp(Decimal::ZERO, Decimal::ONE);
        let edge = (dec!(2) * win_prob - Decimal::ONE).max(Decimal::ZERO);
        Decimal::ONE + self.config.kelly_fraction * edge
    }

    fn regime_multiplier(&self, regime: VolatilityRegime) -> Decimal {
        match regime {
            VolatilityRegime::Low => self.config.low_regime_multiplier,
            VolatilityRegime::Normal => Decimal::ONE,
            VolatilityRegime::High => self.config.high_regime_multiplier,
        }
    }

    fn confluence_multiplier(&self, confluence: ConfluenceCategory) -> Decimal {
        match confluence {
            ConfluenceCategory::High => self.config.high_confluence_multiplier,
            ConfluenceCategory::Medium => Decimal::ONE,
            ConfluenceCategory::Low => self.config.low_confluence_multiplier,
        }
    }
}
