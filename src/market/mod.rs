//! Market data module
//!
//! Context snapshots, gamma exposure readings, and the collaborator
//! traits the decision engine fetches them through. Concrete HTTP
//! clients live in [`client`]; the TTL cache and GEX service wrap the
//! traits so tests can substitute stubs.

mod client;
mod context;
mod gex;
mod quote;
mod retry;

pub use client::{GexClient, HttpContextClient, HttpQuoteProvider};
pub use context::ContextCache;
pub use gex::{FlipResult, GexService};
pub use quote::{QuoteProvider, QuoteService};
pub use retry::with_retry;

use crate::signal::Direction;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// External fetch failures
#[derive(Debug, Error)]
pub enum FetchError {
    /// A single attempt exceeded its deadline
    #[error("request timed out after {0} s")]
    Timeout(u64),
    /// The upstream responded with an error
    #[error("upstream error: {0}")]
    Upstream(String),
    /// Every retry attempt failed
    #[error("retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
    /// Every provider in a fallback chain failed
    #[error("all providers failed: {0}")]
    AllProvidersFailed(String),
}

/// Market trend classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

/// Coarse volatility regime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolatilityRegime {
    Low,
    Normal,
    High,
}

/// A snapshot of current market conditions
///
/// Owned by [`ContextCache`]; replaced wholesale on refresh, never
/// partially mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextData {
    /// Volatility index level (VIX-style)
    pub volatility: Decimal,
    /// Current trend classification
    pub trend: Trend,
    /// Signed dealer-positioning bias; positive favors calls
    pub bias: Decimal,
    /// Volatility regime derived from the index level
    pub regime: VolatilityRegime,
    /// When the snapshot was produced upstream
    pub as_of: DateTime<Utc>,
}

/// A point-in-time gamma exposure reading for a symbol and timeframe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GexSignal {
    /// Underlying symbol
    pub symbol: String,
    /// Timeframe label
    pub timeframe: String,
    /// Implied direction of the positioning
    pub direction: Direction,
    /// Signal strength, 0.0 to 1.0
    pub strength: Decimal,
    /// When the reading was taken
    pub timestamp: DateTime<Utc>,
}

impl GexSignal {
    /// Age of the reading relative to `now`
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.timestamp
    }
}

/// Fetches the current market context snapshot
#[async_trait]
pub trait ContextFetcher: Send + Sync {
    /// Fetch a fresh snapshot; no side effects expected
    async fn fetch_context(&self) -> Result<ContextData, FetchError>;
}

/// Reads gamma exposure signals for a symbol and timeframe
#[async_trait]
pub trait GexReader: Send + Sync {
    /// Return readings ordered most-recent-first
    async fn read_signals(
        &self,
        symbol: &str,
        timeframe: &str,
    ) -> Result<Vec<GexSignal>, FetchError>;
}
