//! Signal types

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Long call equivalent
    Call,
    /// Long put equivalent
    Put,
}

impl Direction {
    /// The other direction
    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Call => Direction::Put,
            Direction::Put => Direction::Call,
        }
    }

    /// Stable lowercase label used in fingerprints and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Call => "call",
            Direction::Put => "put",
        }
    }
}

/// Origin of an inbound signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    /// TradingView alert webhook
    Tradingview,
    /// Unusual options flow scanner
    OptionsFlow,
    /// Internal momentum scanner
    Momentum,
    /// Manually submitted signal
    Manual,
}

impl SignalSource {
    /// Stable lowercase label used in fingerprints and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalSource::Tradingview => "tradingview",
            SignalSource::OptionsFlow => "options_flow",
            SignalSource::Momentum => "momentum",
            SignalSource::Manual => "manual",
        }
    }

    /// Reliability weight used by confluence scoring
    ///
    /// Weights reflect observed hit rates per source, not recency.
    pub fn reliability_weight(&self) -> Decimal {
        match self {
            SignalSource::Tradingview => dec!(1.0),
            SignalSource::OptionsFlow => dec!(0.9),
            SignalSource::Momentum => dec!(0.7),
            SignalSource::Manual => dec!(0.5),
        }
    }
}

/// Typed side-channel data attached to a signal by upstream producers
///
/// A small fixed set of recognized keys rather than an open map, so
/// validators depend on explicit fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalMetadata {
    /// Agreement score computed by the upstream producer, 0.0 to 1.0
    pub confluence_score: Option<Decimal>,
    /// Whether directional bias agrees across chart timeframes
    pub mtf_aligned: Option<bool>,
}

/// An immutable inbound trading signal
///
/// Created by the normalizer from a raw payload and never mutated
/// afterwards; every downstream stage reads the same value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    /// Unique signal identifier
    pub id: Uuid,
    /// Origin of the signal
    pub source: SignalSource,
    /// Underlying symbol, uppercase
    pub symbol: String,
    /// Trade direction
    pub direction: Direction,
    /// Timeframe label, e.g. "15m"
    pub timeframe: String,
    /// When the producer emitted the signal
    pub timestamp: DateTime<Utc>,
    /// Typed metadata side-channel
    pub metadata: SignalMetadata,
}

impl Signal {
    /// Create a new signal
    pub fn new(
        source: SignalSource,
        symbol: impl Into<String>,
        direction: Direction,
        timeframe: impl Into<String>,
        timestamp: DateTime<Utc>,
        metadata: SignalMetadata,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            symbol: symbol.into(),
            direction,
            timeframe: timeframe.into(),
            timestamp,
            metadata,
        }
    }

    /// Age of the signal relative to `now`
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.timestamp
    }

    /// Deduplication fingerprint
    ///
    /// A deterministic function of (source, symbol, timestamp, direction)
    /// only. Timeframe and metadata never participate.
    pub fn fingerprint(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.source.as_str(),
            self.symbol,
            self.timestamp.to_rfc3339(),
            self.direction.as_str(),
        )
    }
}
