//! Signal normalization
//!
//! Upstream producers deliver heterogeneous JSON shapes: field casing
//! differs, directions arrive as "call"/"long"/"buy", timestamps arrive
//! as epoch seconds, epoch milliseconds, or RFC 3339 strings. The
//! normalizer coerces all of them into the canonical [`Signal`] and
//! rejects payloads missing required fields.

use super::types::{Direction, Signal, SignalMetadata, SignalSource};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

/// Normalization failures
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// A required field was absent from the payload
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    /// A field was present but could not be interpreted
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

/// Raw inbound payload as delivered by the ingress layer
///
/// Every field is optional at the wire level; the normalizer decides
/// what is required.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSignalPayload {
    pub source: Option<String>,
    pub symbol: Option<String>,
    pub direction: Option<String>,
    pub timeframe: Option<String>,
    pub timestamp: Option<RawTimestamp>,
    #[serde(default)]
    pub metadata: Option<RawMetadata>,
}

/// Timestamp as delivered upstream: epoch number or RFC 3339 string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Epoch(i64),
    Text(String),
}

/// Optional metadata bag; unrecognized keys are ignored
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMetadata {
    pub confluence_score: Option<Decimal>,
    pub mtf_aligned: Option<bool>,
}

/// Coerces raw payloads into canonical signals
#[derive(Debug, Clone, Default)]
pub struct SignalNormalizer;

/// Epoch values at or above this are treated as milliseconds
const EPOCH_MILLIS_CUTOFF: i64 = 100_000_000_000;

impl SignalNormalizer {
    /// Create a new normalizer
    pub fn new() -> Self {
        Self
    }

    /// Normalize a raw payload into a [`Signal`]
    pub fn normalize(&self, raw: &RawSignalPayload) -> Result<Signal, NormalizeError> {
        let source = parse_source(
            raw.source
                .as_deref()
                .ok_or(NormalizeError::MissingField("source"))?,
        )?;

        let symbol = raw
            .symbol
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(NormalizeError::MissingField("symbol"))?
            .to_uppercase();

        let direction = parse_direction(
            raw.direction
                .as_deref()
                .ok_or(NormalizeError::MissingField("direction"))?,
        )?;

        let timeframe = raw
            .timeframe
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(NormalizeError::MissingField("timeframe"))?
            .to_lowercase();

        let timestamp = parse_timestamp(
            raw.timestamp
                .as_ref()
                .ok_or(NormalizeError::MissingField("timestamp"))?,
        )?;

        let metadata = raw
            .metadata
            .as_ref()
            .map(|m| SignalMetadata {
                confluence_score: m.confluence_score,
                mtf_aligned: m.mtf_aligned,
            })
            .unwrap_or_default();

        Ok(Signal::new(
            source, symbol, direction, timeframe, timestamp, metadata,
        ))
    }
}

fn parse_source(value: &str) -> Result<SignalSource, NormalizeError> {
    match value.trim().to_lowercase().as_str() {
        "tradingview" | "tv" => Ok(SignalSource::Tradingview),
        "options_flow" | "optionsflow" | "flow" => Ok(SignalSource::OptionsFlow),
        "momentum" | "scanner" => Ok(SignalSource::Momentum),
        "manual" => Ok(SignalSource::Manual),
        other => Err(NormalizeError::InvalidValue {
            field: "source",
            value: other.to_string(),
        }),
    }
}

fn parse_direction(value: &str) -> Result<Direction, NormalizeError> {
    match value.trim().to_lowercase().as_str() {
        "call" | "calls" | "long" | "buy" | "bullish" => Ok(Direction::Call),
        "put" | "puts" | "short" | "sell" | "bearish" => Ok(Direction::Put),
        other => Err(NormalizeError::InvalidValue {
            field: "direction",
            value: other.to_string(),
        }),
    }
}

fn parse_timestamp(value: &RawTimestamp) -> Result<DateTime<Utc>, NormalizeError> {
    match value {
        RawTimestamp::Epoch(n) => {
            let result = if n.abs() >= EPOCH_MILLIS_CUTOFF {
                Utc.timestamp_millis_opt(*n).single()
            } else {
                Utc.timestamp_opt(*n, 0).single()
            };
            result.ok_or_else(|| NormalizeError::InvalidValue {
                field: "timestamp",
                value: n.to_string(),
            })
        }
        RawTimestamp::Text(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| NormalizeError::InvalidValue {
                field: "timestamp",
                value: s.clone(),
            }),
    }
}
