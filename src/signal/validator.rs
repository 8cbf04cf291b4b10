//! Signal validation
//!
//! Five acceptance checks run in a fixed order with early return:
//! cooldown, market hours, MTF alignment, confluence, time filters.
//! The first failure determines the rejection reason; later checks are
//! not evaluated and stay false in the result.

use super::types::{Direction, Signal};
use crate::config::{ConfigError, ValidationConfig};
use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Outcome of the five ordered checks
///
/// A check left at `false` either failed or was never reached; the
/// rejection reason disambiguates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationChecks {
    pub cooldown: bool,
    pub market_hours: bool,
    pub mtf: bool,
    pub confluence: bool,
    pub time_filters: bool,
}

/// Per-signal validation outcome
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Individual check outcomes in evaluation order
    pub checks: ValidationChecks,
    /// Whether every check passed
    pub valid: bool,
    /// Reason from the first failing check, if any
    pub rejection_reason: Option<String>,
    /// Diagnostic data per check
    pub details: HashMap<&'static str, Value>,
}

impl ValidationResult {
    fn rejected(
        checks: ValidationChecks,
        reason: String,
        details: HashMap<&'static str, Value>,
    ) -> Self {
        Self {
            checks,
            valid: false,
            rejection_reason: Some(reason),
            details,
        }
    }
}

/// Ordered, short-circuiting signal validator
pub struct SignalValidator {
    cooldown: Duration,
    open: NaiveTime,
    close: NaiveTime,
    timezone: Tz,
    max_age: Duration,
    min_confluence: Decimal,
    require_mtf: bool,
    /// Last accepted timestamp per (symbol, direction); check and record
    /// happen under one lock
    last_seen: Mutex<HashMap<(String, Direction), DateTime<Utc>>>,
}

impl SignalValidator {
    /// Build a validator from validated configuration
    pub fn new(config: &ValidationConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            cooldown: Duration::seconds(config.cooldown_secs as i64),
            open: config.open_time()?,
            close: config.close_time()?,
            timezone: config.timezone()?,
            max_age: Duration::seconds(config.max_signal_age_secs as i64),
            min_confluence: config.min_confluence_score,
            require_mtf: config.require_mtf_alignment,
            last_seen: Mutex::new(HashMap::new()),
        })
    }

    /// Validate a signal against the current clock
    pub async fn validate(&self, signal: &Signal) -> ValidationResult {
        self.validate_at(signal, Utc::now()).await
    }

    /// Clock-injected variant of [`validate`](Self::validate)
    pub async fn validate_at(&self, signal: &Signal, now: DateTime<Utc>) -> ValidationResult {
        let mut checks = ValidationChecks::default();
        let mut details: HashMap<&'static str, Value> = HashMap::new();

        // 1. Cooldown per (symbol, direction)
        {
            let key = (signal.symbol.clone(), signal.direction);
            let mut last_seen = self.last_seen.lock().await;
            if let Some(previous) = last_seen.get(&key) {
                let elapsed = signal.timestamp - *previous;
                details.insert(
                    "cooldown",
                    json!({
                        "previous": previous.to_rfc3339(),
                        "elapsed_secs": elapsed.num_seconds(),
                    }),
                );
                if elapsed < self.cooldown {
                    return ValidationResult::rejected(
                        checks,
                        format!(
                            "cooldown active for {} {}",
                            signal.symbol,
                            signal.direction.as_str()
                        ),
                        details,
                    );
                }
            } else {
                details.insert("cooldown", json!({ "previous": null }));
            }
            last_seen.insert(key, signal.timestamp);
        }
        checks.cooldown = true;

        // 2. Market hours in the exchange time zone
        let local = signal.timestamp.with_timezone(&self.timezone);
        let local_time = local.time();
        details.insert(
            "market_hours",
            json!({
                "local_time": local_time.format("%H:%M:%S").to_string(),
                "weekday": local.weekday().to_string(),
            }),
        );
        let weekend = matches!(local.weekday(), Weekday::Sat | Weekday::Sun);
        if weekend || local_time < self.open || local_time >= self.close {
            return ValidationResult::rejected(
                checks,
                "outside market hours".to_string(),
                details,
            );
        }
        checks.market_hours = true;

        // 3. Multi-timeframe alignment from metadata
        details.insert("mtf", json!({ "aligned": signal.metadata.mtf_aligned }));
        if self.require_mtf && signal.metadata.mtf_aligned == Some(false) {
            return ValidationResult::rejected(
                checks,
                "multi-timeframe alignment broken".to_string(),
                details,
            );
        }
        checks.mtf = true;

        // 4. Upstream confluence score from metadata
        details.insert(
            "confluence",
            json!({ "score": signal.metadata.confluence_score.map(|s| s.to_string()) }),
        );
        if let Some(score) = signal.metadata.confluence_score {
            if score < self.min_confluence {
                return ValidationResult::rejected(
                    checks,
                    format!(
                        "confluence score {} below minimum {}",
                        score, self.min_confluence
                    ),
                    details,
                );
            }
        }
        checks.confluence = true;

        // 5. Signal age
        let age = signal.age(now);
        details.insert("time_filters", json!({ "age_secs": age.num_seconds() }));
        if age > self.max_age {
            return ValidationResult::rejected(
                checks,
                format!("signal too old: {}s", age.num_seconds()),
                details,
            );
        }
        checks.time_filters = true;

        ValidationResult {
            checks,
            valid: true,
            rejection_reason: None,
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::types::{SignalMetadata, SignalSource};
    use rust_decimal_macros::dec;

    // Monday 2026-03-02, 10:00 Eastern (EST, UTC-5) = 15:00 UTC.
    fn market_open_ts() -> DateTime<Utc> {
        "2026-03-02T15:00:00Z".parse().unwrap()
    }

    fn make_signal(timestamp: DateTime<Utc>, metadata: SignalMetadata) -> Signal {
        Signal::new(
            SignalSource::Tradingview,
            "SPY",
            Direction::Call,
            "15m",
            timestamp,
            metadata,
        )
    }

    fn validator() -> SignalValidator {
        SignalValidator::new(&ValidationConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_valid_signal_passes_all_checks() {
        let v = validator();
        let ts = market_open_ts();
        let signal = make_signal(
            ts,
            SignalMetadata {
                confluence_score: Some(dec!(0.8)),
                mtf_aligned: Some(true),
            },
        );

        let result = v.validate_at(&signal, ts + Duration::seconds(10)).await;
        assert!(result.valid);
        assert!(result.rejection_reason.is_none());
        assert!(result.checks.cooldown);
        assert!(result.checks.market_hours);
        assert!(result.checks.mtf);
        assert!(result.checks.confluence);
        assert!(result.checks.time_filters);
    }

    #[tokio::test]
    async fn test_cooldown_rejects_rapid_repeat() {
        let v = validator();
        let ts = market_open_ts();
        let first = make_signal(ts, SignalMetadata::default());
        let second = make_signal(ts + Duration::seconds(60), SignalMetadata::default());

        assert!(v.validate_at(&first, ts).await.valid);

        let result = v
            .validate_at(&second, ts + Duration::seconds(60))
            .await;
        assert!(!result.valid);
        assert!(!result.checks.cooldown);
        // Subsequent checks never ran.
        assert!(!result.checks.market_hours);
        assert!(result.rejection_reason.unwrap().contains("cooldown"));
    }

    #[tokio::test]
    async fn test_cooldown_allows_after_window() {
        let v = validator();
        let ts = market_open_ts();
        let first = make_signal(ts, SignalMetadata::default());
        let later = make_signal(ts + Duration::seconds(600), SignalMetadata::default());

        assert!(v.validate_at(&first, ts).await.valid);
        let result = v
            .validate_at(&later, ts + Duration::seconds(600))
            .await;
        assert!(result.valid);
    }

    #[tokio::test]
    async fn test_cooldown_is_per_symbol_and_direction() {
        let v = validator();
        let ts = market_open_ts();
        let call = make_signal(ts, SignalMetadata::default());
        let mut put = make_signal(ts + Duration::seconds(5), SignalMetadata::default());
        put.direction = Direction::Put;

        assert!(v.validate_at(&call, ts).await.valid);
        // Opposite direction has its own cooldown key.
        assert!(v.validate_at(&put, ts + Duration::seconds(5)).await.valid);
    }

    #[tokio::test]
    async fn test_overnight_signal_outside_market_hours() {
        let v = validator();
        // 03:00 Eastern = 08:00 UTC on the same Monday.
        let ts: DateTime<Utc> = "2026-03-02T08:00:00Z".parse().unwrap();
        let signal = make_signal(
            ts,
            SignalMetadata {
                confluence_score: Some(dec!(0.9)),
                mtf_aligned: Some(true),
            },
        );

        let result = v.validate_at(&signal, ts).await;
        assert!(!result.valid);
        assert!(result.checks.cooldown);
        assert!(!result.checks.market_hours);
        assert_eq!(result.rejection_reason.unwrap(), "outside market hours");
    }

    #[tokio::test]
    async fn test_weekend_rejected() {
        let v = validator();
        // Saturday 2026-03-07, 10:00 Eastern.
        let ts: DateTime<Utc> = "2026-03-07T15:00:00Z".parse().unwrap();
        let signal = make_signal(ts, SignalMetadata::default());

        let result = v.validate_at(&signal, ts).await;
        assert!(!result.valid);
        assert_eq!(result.rejection_reason.unwrap(), "outside market hours");
    }

    #[tokio::test]
    async fn test_broken_mtf_alignment_rejected() {
        let v = validator();
        let ts = market_open_ts();
        let signal = make_signal(
            ts,
            SignalMetadata {
                confluence_score: Some(dec!(0.9)),
                mtf_aligned: Some(false),
            },
        );

        let result = v.validate_at(&signal, ts).await;
        assert!(!result.valid);
        assert!(result.checks.market_hours);
        assert!(!result.checks.mtf);
        assert!(result.rejection_reason.unwrap().contains("alignment"));
    }

    #[tokio::test]
    async fn test_missing_mtf_metadata_passes() {
        let v = validator();
        let ts = market_open_ts();
        let signal = make_signal(ts, SignalMetadata::default());

        let result = v.validate_at(&signal, ts).await;
        assert!(result.valid);
    }

    #[tokio::test]
    async fn test_low_confluence_rejected() {
        let v = validator();
        let ts = market_open_ts();
        let signal = make_signal(
            ts,
            SignalMetadata {
                confluence_score: Some(dec!(0.2)),
                mtf_aligned: Some(true),
            },
        );

        let result = v.validate_at(&signal, ts).await;
        assert!(!result.valid);
        assert!(result.checks.mtf);
        assert!(!result.checks.confluence);
        assert!(result.rejection_reason.unwrap().contains("confluence"));
    }

    #[tokio::test]
    async fn test_stale_signal_rejected() {
        let v = validator();
        let ts = market_open_ts();
        let signal = make_signal(
            ts,
            SignalMetadata {
                confluence_score: Some(dec!(0.9)),
                mtf_aligned: Some(true),
            },
        );

        let result = v.validate_at(&signal, ts + Duration::seconds(301)).await;
        assert!(!result.valid);
        assert!(result.checks.confluence);
        assert!(!result.checks.time_filters);
        assert!(result.rejection_reason.unwrap().contains("too old"));
    }

    #[tokio::test]
    async fn test_first_failing_check_wins() {
        let v = validator();
        // Fails market hours, MTF, confluence, and age all at once; the
        // reported reason must come from market hours (first in order
        // after cooldown passes).
        let ts: DateTime<Utc> = "2026-03-02T08:00:00Z".parse().unwrap();
        let signal = make_signal(
            ts,
            SignalMetadata {
                confluence_score: Some(dec!(0.1)),
                mtf_aligned: Some(false),
            },
        );

        let result = v.validate_at(&signal, ts + Duration::seconds(9000)).await;
        assert_eq!(result.rejection_reason.unwrap(), "outside market hours");
    }

    #[tokio::test]
    async fn test_details_populated_for_evaluated_checks() {
        let v = validator();
        let ts = market_open_ts();
        let signal = make_signal(ts, SignalMetadata::default());

        let result = v.validate_at(&signal, ts).await;
        assert!(result.details.contains_key("cooldown"));
        assert!(result.details.contains_key("market_hours"));
        assert!(result.details.contains_key("time_filters"));
    }
}
