//! Market-condition filters and confidence adjustments
//!
//! The RiskManager answers two questions per signal: do current market
//! conditions permit an entry at all, and how should confidence shift
//! given trend, regime, dealer positioning, and gamma exposure. All
//! three market filters are always evaluated and reported; only the
//! volatility ceiling gates the entry.

use crate::config::{Config, ConfidenceConfig, ConfigError, RiskConfig};
use crate::market::{ContextData, GexSignal, Trend, VolatilityRegime};
use crate::signal::{Direction, Signal};
use chrono::{Datelike, NaiveTime, Weekday};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Outcome of each market filter; all three are always evaluated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterChecks {
    pub volatility: bool,
    pub market_hours: bool,
    pub trend: bool,
}

/// Result of applying the market filters to a signal
#[derive(Debug, Clone)]
pub struct MarketFilterResult {
    /// False only when the volatility ceiling is breached
    pub passed: bool,
    /// Individual filter outcomes
    pub filters: FilterChecks,
    /// Reason when `passed` is false
    pub rejection_reason: Option<String>,
    /// Size multiplier applied to the final quantity
    pub position_size_multiplier: Decimal,
}

/// Contribution of trend alignment to the context adjustment
const TREND_COMPONENT: Decimal = dec!(8);
/// Contribution of the volatility regime to the context adjustment
const REGIME_COMPONENT: Decimal = dec!(5);

/// Applies market filters and computes confidence adjustments
pub struct RiskManager {
    risk: RiskConfig,
    confidence: ConfidenceConfig,
    open: NaiveTime,
    close: NaiveTime,
    timezone: Tz,
}

impl RiskManager {
    /// Build a risk manager from validated configuration
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            risk: config.risk.clone(),
            confidence: config.confidence.clone(),
            open: config.validation.open_time()?,
            close: config.validation.close_time()?,
            timezone: config.validation.timezone()?,
        })
    }

    /// Evaluate all market filters for a signal
    ///
    /// Every filter is reported regardless of pass or fail. Volatility
    /// above the caution threshold halves the size multiplier; above the
    /// hard ceiling it rejects the entry outright.
    pub fn apply_market_filters(
        &self,
        signal: &Signal,
        context: &ContextData,
    ) -> MarketFilterResult {
        let volatility_ok = context.volatility <= self.risk.max_volatility;

        let local = signal.timestamp.with_timezone(&self.timezone);
        let weekend = matches!(local.weekday(), Weekday::Sat | Weekday::Sun);
        let market_hours_ok = !weekend && local.time() >= self.open && local.time() < self.close;

        let trend_ok = match (signal.direction, context.trend) {
            (_, Trend::Neutral) => true,
            (Direction::Call, Trend::Bullish) => true,
            (Direction::Put, Trend::Bearish) => true,
            _ => false,
        };

        let position_size_multiplier = if context.volatility > self.risk.caution_volatility {
            self.risk.caution_size_factor
        } else {
            Decimal::ONE
        };

        let rejection_reason = if volatility_ok {
            None
        } else {
            Some(format!(
                "volatility {} above ceiling {}",
                context.volatility, self.risk.max_volatility
            ))
        };

        MarketFilterResult {
            passed: volatility_ok,
            filters: FilterChecks {
                volatility: volatility_ok,
                market_hours: market_hours_ok,
                trend: trend_ok,
            },
            rejection_reason,
            position_size_multiplier,
        }
    }

    /// Confidence adjustment from trend alignment and volatility regime
    ///
    /// Counter-trend signals always come out negative, trend-aligned
    /// ones positive; a low regime adds, a high regime subtracts. The
    /// result is clamped to the configured bound.
    pub fn context_adjustment(&self, signal: &Signal, context: &ContextData) -> Decimal {
        let trend_part = match (signal.direction, context.trend) {
            (_, Trend::Neutral) => Decimal::ZERO,
            (Direction::Call, Trend::Bullish) | (Direction::Put, Trend::Bearish) => {
                TREND_COMPONENT
            }
            _ => -TREND_COMPONENT,
        };

        let regime_part = match context.regime {
            VolatilityRegime::Low => REGIME_COMPONENT,
            VolatilityRegime::Normal => Decimal::ZERO,
            VolatilityRegime::High => -REGIME_COMPONENT,
        };

        clamp(
            trend_part + regime_part,
            self.confidence.max_context_adjustment,
        )
    }

    /// Confidence adjustment from dealer-positioning bias
    ///
    /// Bias aligned with the trade direction is positive, opposed is
    /// negative, scaled by the bias magnitude and clamped.
    pub fn positioning_adjustment(&self, signal: &Signal, context: &ContextData) -> Decimal {
        if context.bias == Decimal::ZERO {
            return Decimal::ZERO;
        }

        let aligned = match signal.direction {
            Direction::Call => context.bias > Decimal::ZERO,
            Direction::Put => context.bias < Decimal::ZERO,
        };

        let magnitude =
            context.bias.abs().min(Decimal::ONE) * self.confidence.max_positioning_adjustment;
        let signed = if aligned { magnitude } else { -magnitude };
        clamp(signed, self.confidence.max_positioning_adjustment)
    }

    /// Confidence adjustment from a gamma exposure reading
    ///
    /// Agreement is positive, disagreement negative, scaled by reading
    /// strength and the age-derived effective weight.
    pub fn gex_adjustment(&self, signal: &Signal, gex: &GexSignal, weight: Decimal) -> Decimal {
        let magnitude = gex.strength.min(Decimal::ONE) * self.confidence.max_gex_adjustment * weight;
        let signed = if gex.direction == signal.direction {
            magnitude
        } else {
            -magnitude
        };
        clamp(signed, self.confidence.max_gex_adjustment)
    }
}

fn clamp(value: Decimal, bound: Decimal) -> Decimal {
    value.max(-bound).min(bound)
}
