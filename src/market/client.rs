//! HTTP clients for upstream market-data providers
//!
//! Thin reqwest wrappers that map provider JSON into the crate's market
//! types. Response shapes are tolerant: optional fields get sensible
//! defaults, malformed rows are skipped with a log line rather than
//! failing the whole response.

use super::{ContextData, ContextFetcher, FetchError, GexReader, GexSignal, Trend, VolatilityRegime};
use crate::signal::Direction;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::time::Duration;

use super::quote::QuoteProvider;

fn build_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .expect("Failed to create HTTP client")
}

/// Fetches market context snapshots over HTTP
pub struct HttpContextClient {
    url: String,
    client: Client,
}

impl HttpContextClient {
    /// Create a client for the given endpoint
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            url: url.into(),
            client: build_client(timeout_secs),
        }
    }
}

/// Raw context response
#[derive(Debug, Deserialize)]
struct ContextDto {
    volatility: Decimal,
    trend: Option<String>,
    bias: Option<Decimal>,
    regime: Option<String>,
    as_of: Option<String>,
}

#[async_trait]
impl ContextFetcher for HttpContextClient {
    async fn fetch_context(&self) -> Result<ContextData, FetchError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| FetchError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Upstream(format!(
                "context provider returned {}",
                response.status()
            )));
        }

        let dto: ContextDto = response
            .json()
            .await
            .map_err(|e| FetchError::Upstream(e.to_string()))?;

        Ok(convert_context(dto))
    }
}

fn convert_context(dto: ContextDto) -> ContextData {
    let regime = dto
        .regime
        .as_deref()
        .and_then(parse_regime)
        .unwrap_or_else(|| regime_from_volatility(dto.volatility));

    ContextData {
        volatility: dto.volatility,
        trend: dto.trend.as_deref().and_then(parse_trend).unwrap_or(Trend::Neutral),
        bias: dto.bias.unwrap_or(Decimal::ZERO),
        regime,
        as_of: dto
            .as_of
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now),
    }
}

fn parse_trend(value: &str) -> Option<Trend> {
    match value.to_lowercase().as_str() {
        "bullish" | "up" => Some(Trend::Bullish),
        "bearish" | "down" => Some(Trend::Bearish),
        "neutral" | "flat" => Some(Trend::Neutral),
        _ => None,
    }
}

fn parse_regime(value: &str) -> Option<VolatilityRegime> {
    match value.to_lowercase().as_str() {
        "low" => Some(VolatilityRegime::Low),
        "normal" | "mid" => Some(VolatilityRegime::Normal),
        "high" => Some(VolatilityRegime::High),
        _ => None,
    }
}

fn regime_from_volatility(volatility: Decimal) -> VolatilityRegime {
    if volatility < dec!(15) {
        VolatilityRegime::Low
    } else if volatility > dec!(25) {
        VolatilityRegime::High
    } else {
        VolatilityRegime::Normal
    }
}

/// Reads gamma exposure signals over HTTP
pub struct GexClient {
    url: String,
    client: Client,
}

impl GexClient {
    /// Create a client for the given endpoint
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            url: url.into(),
            client: build_client(timeout_secs),
        }
    }
}

/// Raw gamma exposure row
#[derive(Debug, Deserialize)]
struct GexDto {
    direction: String,
    strength: Option<Decimal>,
    timestamp: String,
}

#[async_trait]
impl GexReader for GexClient {
    async fn read_signals(
        &self,
        symbol: &str,
        timeframe: &str,
    ) -> Result<Vec<GexSignal>, FetchError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("symbol", symbol), ("timeframe", timeframe)])
            .send()
            .await
            .map_err(|e| FetchError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Upstream(format!(
                "gex provider returned {}",
                response.status()
            )));
        }

        let rows: Vec<GexDto> = response
            .json()
            .await
            .map_err(|e| FetchError::Upstream(e.to_string()))?;

        let mut signals = Vec::with_capacity(rows.len());
        for row in rows {
            match convert_gex(symbol, timeframe, &row) {
                Some(signal) => signals.push(signal),
                None => {
                    tracing::debug!(symbol, ?row, "Skipping malformed GEX row");
                }
            }
        }
        // Callers require most-recent-first ordering.
        signals.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(signals)
    }
}

fn convert_gex(symbol: &str, timeframe: &str, row: &GexDto) -> Option<GexSignal> {
    let direction = match row.direction.to_lowercase().as_str() {
        "call" | "positive" => Direction::Call,
        "put" | "negative" => Direction::Put,
        _ => return None,
    };
    let timestamp = DateTime::parse_from_rfc3339(&row.timestamp)
        .ok()?
        .with_timezone(&Utc);

    Some(GexSignal {
        symbol: symbol.to_string(),
        timeframe: timeframe.to_string(),
        direction,
        strength: row.strength.unwrap_or(dec!(0.5)),
        timestamp,
    })
}

/// Fetches option premiums over HTTP
pub struct HttpQuoteProvider {
    name: String,
    url: String,
    client: Client,
}

impl HttpQuoteProvider {
    /// Create a provider for the given endpoint
    pub fn new(name: impl Into<String>, url: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            client: build_client(timeout_secs),
        }
    }
}

/// Raw quote response
#[derive(Debug, Deserialize)]
struct QuoteDto {
    premium: Decimal,
}

#[async_trait]
impl QuoteProvider for HttpQuoteProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn latest_premium(
        &self,
        symbol: &str,
        direction: Direction,
    ) -> Result<Decimal, FetchError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("symbol", symbol), ("right", direction.as_str())])
            .send()
            .await
            .map_err(|e| FetchError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Upstream(format!(
                "quote provider returned {}",
                response.status()
            )));
        }

        let dto: QuoteDto = response
            .json()
            .await
            .map_err(|e| FetchError::Upstream(e.to_string()))?;

        if dto.premium <= Decimal::ZERO {
            return Err(FetchError::Upstream(format!(
                "non-positive premium {} for {}",
                dto.premium, symbol
            )));
        }

        Ok(dto.premium)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_context_full() {
        let dto = ContextDto {
            volatility: dec!(22),
            trend: Some("bullish".to_string()),
            bias: Some(dec!(0.4)),
            regime: Some("normal".to_string()),
            as_of: Some("2026-03-02T15:00:00Z".to_string()),
        };

        let context = convert_context(dto);
        assert_eq!(context.trend, Trend::Bullish);
        assert_eq!(context.bias, dec!(0.4));
        assert_eq!(context.regime, VolatilityRegime::Normal);
    }

    #[test]
    fn test_convert_context_defaults() {
        let dto = ContextDto {
            volatility: dec!(12),
            trend: None,
            bias: None,
            regime: None,
            as_of: None,
        };

        let context = convert_context(dto);
        assert_eq!(context.trend, Trend::Neutral);
        assert_eq!(context.bias, Decimal::ZERO);
        // Regime falls back to the volatility-derived classification.
        assert_eq!(context.regime, VolatilityRegime::Low);
    }

    #[test]
    fn test_regime_from_volatility_bands() {
        assert_eq!(regime_from_volatility(dec!(10)), VolatilityRegime::Low);
        assert_eq!(regime_from_volatility(dec!(20)), VolatilityRegime::Normal);
        assert_eq!(regime_from_volatility(dec!(30)), VolatilityRegime::High);
    }

    #[test]
    fn test_parse_trend_variants() {
        assert_eq!(parse_trend("Bullish"), Some(Trend::Bullish));
        assert_eq!(parse_trend("down"), Some(Trend::Bearish));
        assert_eq!(parse_trend("flat"), Some(Trend::Neutral));
        assert_eq!(parse_trend("sideways-ish"), None);
    }

    #[test]
    fn test_convert_gex_row() {
        let row = GexDto {
            direction: "put".to_string(),
            strength: Some(dec!(0.8)),
            timestamp: "2026-03-02T15:00:00Z".to_string(),
        };

        let signal = convert_gex("SPY", "15m", &row).unwrap();
        assert_eq!(signal.direction, Direction::Put);
        assert_eq!(signal.strength, dec!(0.8));
        assert_eq!(signal.symbol, "SPY");
    }

    #[test]
    fn test_convert_gex_unknown_direction() {
        let row = GexDto {
            direction: "sideways".to_string(),
            strength: None,
            timestamp: "2026-03-02T15:00:00Z".to_string(),
        };
        assert!(convert_gex("SPY", "15m", &row).is_none());
    }

    #[test]
    fn test_convert_gex_bad_timestamp() {
        let row = GexDto {
            direction: "call".to_string(),
            strength: None,
            timestamp: "not-a-time".to_string(),
        };
        assert!(convert_gex("SPY", "15m", &row).is_none());
    }

    #[test]
    fn test_convert_gex_default_strength() {
        let row = GexDto {
            direction: "call".to_string(),
            strength: None,
            timestamp: "2026-03-02T15:00:00Z".to_string(),
        };
        let signal = convert_gex("SPY", "15m", &row).unwrap();
        assert_eq!(signal.strength, dec!(0.5));
    }
}
