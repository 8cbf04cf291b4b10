//! Gamma exposure service
//!
//! Wraps a [`GexReader`] with staleness handling, age-based weighting,
//! and directional flip detection. GEX is a degradable input: reader
//! failures and empty result sets surface as "no reading available",
//! never as errors the decision path has to handle.

use super::{with_retry, FetchError, GexReader, GexSignal};
use crate::config::{FetchConfig, GexConfig};
use crate::signal::Direction;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Outcome of flip detection between the two most recent readings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlipResult {
    /// Whether direction changed between the two latest readings
    pub has_flipped: bool,
    /// Direction of the latest reading, when present
    pub current_direction: Option<Direction>,
    /// Direction of the reading before it, when present
    pub previous_direction: Option<Direction>,
}

impl FlipResult {
    fn none() -> Self {
        Self {
            has_flipped: false,
            current_direction: None,
            previous_direction: None,
        }
    }
}

/// Staleness, weighting, and flip detection over gamma exposure readings
pub struct GexService {
    reader: Arc<dyn GexReader>,
    fetch_policy: FetchConfig,
    stale_threshold: Duration,
    stale_weight_reduction: Decimal,
}

impl GexService {
    /// Create a service over `reader` with the configured thresholds
    pub fn new(reader: Arc<dyn GexReader>, config: &GexConfig, fetch_policy: FetchConfig) -> Self {
        Self {
            reader,
            fetch_policy,
            stale_threshold: Duration::hours(config.stale_threshold_hours),
            stale_weight_reduction: config.stale_weight_reduction,
        }
    }

    /// Latest reading for a symbol and timeframe, if any
    ///
    /// Reader failures are absorbed: callers treat absence as "no GEX
    /// input available", not an error.
    pub async fn latest_signal(&self, symbol: &str, timeframe: &str) -> Option<GexSignal> {
        self.read(symbol, timeframe)
            .await
            .and_then(|mut readings| {
                if readings.is_empty() {
                    None
                } else {
                    Some(readings.remove(0))
                }
            })
    }

    /// Whether a reading is older than the staleness threshold
    pub fn is_stale(&self, signal: &GexSignal) -> bool {
        self.is_stale_at(signal, Utc::now())
    }

    /// Clock-injected variant of [`is_stale`](Self::is_stale)
    pub fn is_stale_at(&self, signal: &GexSignal, now: DateTime<Utc>) -> bool {
        signal.age(now) > self.stale_threshold
    }

    /// Contribution weight of a reading
    ///
    /// Purely a function of age: fresh readings weigh 1.0, stale
    /// readings weigh `1 - stale_weight_reduction`. Direction and
    /// strength never affect the weight.
    pub fn effective_weight(&self, signal: &GexSignal) -> Decimal {
        self.effective_weight_at(signal, Utc::now())
    }

    /// Clock-injected variant of [`effective_weight`](Self::effective_weight)
    pub fn effective_weight_at(&self, signal: &GexSignal, now: DateTime<Utc>) -> Decimal {
        if self.is_stale_at(signal, now) {
            Decimal::ONE - self.stale_weight_reduction
        } else {
            Decimal::ONE
        }
    }

    /// Detect a directional flip between the two most recent readings
    ///
    /// Fewer than two readings means no flip.
    pub async fn detect_flip(&self, symbol: &str, timeframe: &str) -> FlipResult {
        let readings = match self.read(symbol, timeframe).await {
            Some(readings) => readings,
            None => return FlipResult::none(),
        };

        let mut latest_two = readings.iter().take(2);
        let (current, previous) = match (latest_two.next(), latest_two.next()) {
            (Some(current), Some(previous)) => (current, previous),
            _ => return FlipResult::none(),
        };

        FlipResult {
            has_flipped: current.direction != previous.direction,
            current_direction: Some(current.direction),
            previous_direction: Some(previous.direction),
        }
    }

    async fn read(&self, symbol: &str, timeframe: &str) -> Option<Vec<GexSignal>> {
        let reader = Arc::clone(&self.reader);
        let result: Result<Vec<GexSignal>, FetchError> =
            with_retry(&self.fetch_policy, "gex readings", || {
                let reader = Arc::clone(&reader);
                let symbol = symbol.to_string();
                let timeframe = timeframe.to_string();
                async move { reader.read_signals(&symbol, &timeframe).await }
            })
            .await;

        match result {
            Ok(readings) => Some(readings),
            Err(e) => {
                tracing::warn!(symbol, timeframe, error = %e, "GEX readings unavailable");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use tokio::sync::Mutex;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn reading(direction: Direction, at: i64) -> GexSignal {
        GexSignal {
            symbol: "SPY".to_string(),
            timeframe: "15m".to_string(),
            direction,
            strength: dec!(0.6),
            timestamp: ts(at),
        }
    }

    struct StubReader {
        readings: Mutex<Result<Vec<GexSignal>, String>>,
    }

    impl StubReader {
        fn with(readings: Vec<GexSignal>) -> Self {
            Self {
                readings: Mutex::new(Ok(readings)),
            }
        }

        fn failing() -> Self {
            Self {
                readings: Mutex::new(Err("feed offline".to_string())),
            }
        }
    }

    #[async_trait]
    impl GexReader for StubReader {
        async fn read_signals(
            &self,
            _symbol: &str,
            _timeframe: &str,
        ) -> Result<Vec<GexSignal>, FetchError> {
            self.readings
                .lock()
                .await
                .clone()
                .map_err(FetchError::Upstream)
        }
    }

    fn service(reader: StubReader) -> GexService {
        GexService::new(
            Arc::new(reader),
            &GexConfig::default(),
            FetchConfig {
                timeout_secs: 1,
                max_attempts: 1,
                initial_backoff_ms: 1,
            },
        )
    }

    #[tokio::test]
    async fn test_latest_signal_returns_head() {
        let svc = service(StubReader::with(vec![
            reading(Direction::Put, 100),
            reading(Direction::Call, 0),
        ]));

        let latest = svc.latest_signal("SPY", "15m").await.unwrap();
        assert_eq!(latest.direction, Direction::Put);
        assert_eq!(latest.timestamp, ts(100));
    }

    #[tokio::test]
    async fn test_latest_signal_empty_is_none() {
        let svc = service(StubReader::with(vec![]));
        assert!(svc.latest_signal("SPY", "15m").await.is_none());
    }

    #[tokio::test]
    async fn test_reader_failure_is_absorbed() {
        let svc = service(StubReader::failing());
        assert!(svc.latest_signal("SPY", "15m").await.is_none());
        let flip = svc.detect_flip("SPY", "15m").await;
        assert!(!flip.has_flipped);
    }

    #[tokio::test]
    async fn test_staleness_boundary() {
        let svc = service(StubReader::with(vec![]));
        let signal = reading(Direction::Call, 0);

        // Exactly at the 4h threshold: not stale. One second past: stale.
        let at_threshold = ts(4 * 3600);
        let past_threshold = ts(4 * 3600 + 1);
        assert!(!svc.is_stale_at(&signal, at_threshold));
        assert!(svc.is_stale_at(&signal, past_threshold));
    }

    #[tokio::test]
    async fn test_effective_weight_depends_only_on_age() {
        let svc = service(StubReader::with(vec![]));

        for direction in [Direction::Call, Direction::Put] {
            for strength in [dec!(0.1), dec!(0.9)] {
                let mut signal = reading(direction, 0);
                signal.strength = strength;

                assert_eq!(svc.effective_weight_at(&signal, ts(3600)), dec!(1.0));
                assert_eq!(
                    svc.effective_weight_at(&signal, ts(5 * 3600)),
                    dec!(0.5),
                    "stale weight for {direction:?} strength {strength}"
                );
            }
        }
    }

    #[tokio::test]
    async fn test_detect_flip_put_after_call() {
        let svc = service(StubReader::with(vec![
            reading(Direction::Put, 100),
            reading(Direction::Call, 0),
        ]));

        let flip = svc.detect_flip("SPY", "15m").await;
        assert!(flip.has_flipped);
        assert_eq!(flip.current_direction, Some(Direction::Put));
        assert_eq!(flip.previous_direction, Some(Direction::Call));
    }

    #[tokio::test]
    async fn test_no_flip_when_direction_unchanged() {
        let svc = service(StubReader::with(vec![
            reading(Direction::Call, 100),
            reading(Direction::Call, 0),
        ]));

        let flip = svc.detect_flip("SPY", "15m").await;
        assert!(!flip.has_flipped);
        assert_eq!(flip.current_direction, Some(Direction::Call));
    }

    #[tokio::test]
    async fn test_single_reading_is_no_flip() {
        let svc = service(StubReader::with(vec![reading(Direction::Put, 0)]));

        let flip = svc.detect_flip("SPY", "15m").await;
        assert!(!flip.has_flipped);
        assert_eq!(flip.current_direction, None);
        assert_eq!(flip.previous_direction, None);
    }
}
