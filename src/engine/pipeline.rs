//! Signal pipeline
//!
//! Drives a raw payload through normalize, validate, deduplicate,
//! decide, and execute. Each stage failure is isolated: the signal gets
//! a structured failure tagged with the stage, and other in-flight
//! signals are unaffected. Every signal receives a tracking id at
//! ingestion that appears in each stage's logs.

use super::orchestrator::DecisionOrchestrator;
use super::types::EntryDecision;
use crate::position::PositionManager;
use crate::market::QuoteService;
use crate::signal::{
    DeduplicationCache, RawSignalPayload, Signal, SignalNormalizer, SignalValidator,
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Pipeline stage, used to tag failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Normalize,
    Validate,
    Deduplicate,
    Decide,
    Execute,
}

impl PipelineStage {
    /// Stable label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Normalize => "normalize",
            PipelineStage::Validate => "validate",
            PipelineStage::Deduplicate => "deduplicate",
            PipelineStage::Decide => "decide",
            PipelineStage::Execute => "execute",
        }
    }
}

/// Structured outcome of processing one raw payload
#[derive(Debug)]
pub struct PipelineOutcome {
    /// True when the pipeline produced a decision (enter or reject)
    pub success: bool,
    /// Tracking id assigned at ingestion
    pub tracking_id: Uuid,
    /// Stage where a failure occurred, when unsuccessful
    pub stage: Option<PipelineStage>,
    /// Failure description, when unsuccessful
    pub failure_reason: Option<String>,
    /// The decision, when one was reached
    pub decision: Option<EntryDecision>,
}

impl PipelineOutcome {
    fn failure(tracking_id: Uuid, stage: PipelineStage, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        metrics::counter!("gexflow_signals_failed_total", "stage" => stage.as_str())
            .increment(1);
        tracing::info!(
            tracking_id = %tracking_id,
            stage = stage.as_str(),
            reason = %reason,
            "Signal failed pipeline stage"
        );
        Self {
            success: false,
            tracking_id,
            stage: Some(stage),
            failure_reason: Some(reason),
            decision: None,
        }
    }

    fn decided(tracking_id: Uuid, decision: EntryDecision) -> Self {
        Self {
            success: true,
            tracking_id,
            stage: None,
            failure_reason: None,
            decision: Some(decision),
        }
    }
}

/// Signals older than this many hours no longer feed confluence scoring
const RECENT_WINDOW_HOURS: i64 = 1;

/// End-to-end driver from raw payload to position
pub struct SignalPipeline {
    normalizer: SignalNormalizer,
    validator: Arc<SignalValidator>,
    dedup: Arc<DeduplicationCache>,
    orchestrator: Arc<DecisionOrchestrator>,
    quotes: Arc<QuoteService>,
    positions: Arc<PositionManager>,
    /// Rolling window of accepted signals feeding confluence
    recent: Mutex<Vec<Signal>>,
}

impl SignalPipeline {
    /// Wire the pipeline from its collaborators
    pub fn new(
        validator: Arc<SignalValidator>,
        dedup: Arc<DeduplicationCache>,
        orchestrator: Arc<DecisionOrchestrator>,
        quotes: Arc<QuoteService>,
        positions: Arc<PositionManager>,
    ) -> Self {
        Self {
            normalizer: SignalNormalizer::new(),
            validator,
            dedup,
            orchestrator,
            quotes,
            positions,
            recent: Mutex::new(Vec::new()),
        }
    }

    /// Process one raw payload to a structured outcome
    ///
    /// Never panics and never returns an error: expected rejections and
    /// infrastructure failures both surface as tagged outcome values.
    pub async fn process(&self, raw: &RawSignalPayload) -> PipelineOutcome {
        self.process_at(raw, Utc::now()).await
    }

    /// Clock-injected variant of [`process`](Self::process)
    pub async fn process_at(&self, raw: &RawSignalPayload, now: DateTime<Utc>) -> PipelineOutcome {
        let tracking_id = Uuid::new_v4();
        let started = std::time::Instant::now();
        metrics::counter!("gexflow_signals_total").increment(1);

        let outcome = self.run_stages(raw, tracking_id, now).await;

        metrics::histogram!("gexflow_pipeline_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        outcome
    }

    async fn run_stages(
        &self,
        raw: &RawSignalPayload,
        tracking_id: Uuid,
        now: DateTime<Utc>,
    ) -> PipelineOutcome {
        // Normalize
        let signal = match self.normalizer.normalize(raw) {
            Ok(signal) => signal,
            Err(e) => {
                return PipelineOutcome::failure(tracking_id, PipelineStage::Normalize, e.to_string())
            }
        };
        tracing::debug!(
            tracking_id = %tracking_id,
            signal_id = %signal.id,
            symbol = %signal.symbol,
            direction = signal.direction.as_str(),
            "Normalized signal"
        );

        // Validate
        let validation = self.validator.validate_at(&signal, now).await;
        if !validation.valid {
            let reason = validation
                .rejection_reason
                .unwrap_or_else(|| "validation failed".to_string());
            return PipelineOutcome::failure(tracking_id, PipelineStage::Validate, reason);
        }

        // Deduplicate
        if self.dedup.check_and_record_at(&signal, now).await {
            return PipelineOutcome::failure(
                tracking_id,
                PipelineStage::Deduplicate,
                "duplicate signal",
            );
        }

        // Record into the confluence window and snapshot peers.
        let recent = {
            let mut recent = self.recent.lock().await;
            recent.retain(|s| now - s.timestamp < Duration::hours(RECENT_WINDOW_HOURS));
            let snapshot = recent.clone();
            recent.push(signal.clone());
            snapshot
        };

        // Decide
        let decision = self.orchestrator.decide_entry(&signal, &recent).await;
        if !decision.is_enter() {
            tracing::info!(
                tracking_id = %tracking_id,
                signal_id = %signal.id,
                reasoning = ?decision.reasoning,
                "Entry rejected"
            );
            metrics::counter!("gexflow_entries_rejected_total").increment(1);
            return PipelineOutcome::decided(tracking_id, decision);
        }

        // Execute: price the entry and open the position.
        let premium = match self
            .quotes
            .fetch_premium(&signal.symbol, signal.direction)
            .await
        {
            Ok(premium) => premium,
            Err(e) => {
                return PipelineOutcome::failure(tracking_id, PipelineStage::Execute, e.to_string())
            }
        };

        match self
            .positions
            .open_position(&signal, premium, decision.size)
            .await
        {
            Ok(position) => {
                metrics::counter!("gexflow_entries_total").increment(1);
                if let Ok(open) = self.positions.open_positions().await {
                    metrics::gauge!("gexflow_open_positions").set(open.len() as f64);
                }
                tracing::info!(
                    tracking_id = %tracking_id,
                    position_id = %position.id,
                    size = decision.size,
                    premium = %premium,
                    "Entered position"
                );
                PipelineOutcome::decided(tracking_id, decision)
            }
            Err(e) => PipelineOutcome::failure(tracking_id, PipelineStage::Execute, e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, FetchConfig};
    use crate::market::{
        ContextCache, ContextData, ContextFetcher, FetchError, GexReader, GexService, GexSignal,
        QuoteProvider, Trend, VolatilityRegime,
    };
    use crate::position::InMemoryPositionStore;
    use crate::risk::{PositionSizingService, RiskManager};
    use crate::signal::Direction;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    // Monday 2026-03-02, 10:00 Eastern.
    fn market_open_ts() -> DateTime<Utc> {
        "2026-03-02T15:00:00Z".parse().unwrap()
    }

    struct StubContext;

    #[async_trait]
    impl ContextFetcher for StubContext {
        async fn fetch_context(&self) -> Result<ContextData, FetchError> {
            Ok(ContextData {
                volatility: dec!(18),
                trend: Trend::Bullish,
                bias: dec!(0.5),
                regime: VolatilityRegime::Normal,
                as_of: Utc::now(),
            })
        }
    }

    struct StubGex;

    #[async_trait]
    impl GexReader for StubGex {
        async fn read_signals(
            &self,
            symbol: &str,
            timeframe: &str,
        ) -> Result<Vec<GexSignal>, FetchError> {
            Ok(vec![GexSignal {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
                direction: Direction::Call,
                strength: dec!(0.8),
                timestamp: Utc::now(),
            }])
        }
    }

    struct StubQuotes {
        premium: Option<Decimal>,
    }

    #[async_trait]
    impl QuoteProvider for StubQuotes {
        fn name(&self) -> &str {
            "stub"
        }

        async fn latest_premium(
            &self,
            _symbol: &str,
            _direction: Direction,
        ) -> Result<Decimal, FetchError> {
            self.premium
                .ok_or_else(|| FetchError::Upstream("quotes down".to_string()))
        }
    }

    fn build_pipeline(config: &Config, premium: Option<Decimal>) -> SignalPipeline {
        let fetch = FetchConfig {
            timeout_secs: 1,
            max_attempts: 1,
            initial_backoff_ms: 1,
        };
        let cache = Arc::new(ContextCache::new(
            Arc::new(StubContext),
            &config.cache,
            fetch.clone(),
        ));
        let gex = Arc::new(GexService::new(Arc::new(StubGex), &config.gex, fetch.clone()));
        let risk = Arc::new(RiskManager::new(config).unwrap());
        let sizing = Arc::new(PositionSizingService::new(&config.sizing));
        let orchestrator = Arc::new(DecisionOrchestrator::new(cache, gex, risk, sizing, config));
        let quotes = Arc::new(QuoteService::new(
            vec![Arc::new(StubQuotes { premium }) as Arc<dyn QuoteProvider>],
            fetch,
        ));
        let positions = Arc::new(PositionManager::new(
            Arc::new(InMemoryPositionStore::new()),
            &config.risk,
        ));

        SignalPipeline::new(
            Arc::new(SignalValidator::new(&config.validation).unwrap()),
            Arc::new(DeduplicationCache::new(&config.cache)),
            orchestrator,
            quotes,
            positions,
        )
    }

    fn raw_payload(timestamp: &str) -> RawSignalPayload {
        serde_json::from_str(&format!(
            r#"{{
                "source": "tradingview",
                "symbol": "SPY",
                "direction": "call",
                "timeframe": "15m",
                "timestamp": "{timestamp}",
                "metadata": {{"confluence_score": 0.8, "mtf_aligned": true}}
            }}"#
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn test_accepted_signal_opens_position() {
        let pipeline = build_pipeline(&Config::default(), Some(dec!(2.50)));
        let now = market_open_ts() + Duration::seconds(5);

        let outcome = pipeline
            .process_at(&raw_payload("2026-03-02T15:00:00Z"), now)
            .await;

        assert!(outcome.success);
        assert!(outcome.stage.is_none());
        let decision = outcome.decision.unwrap();
        assert!(decision.is_enter());
        assert_eq!(pipeline.positions.open_positions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_payload_fails_normalize() {
        let pipeline = build_pipeline(&Config::default(), Some(dec!(2.50)));
        let raw: RawSignalPayload =
            serde_json::from_str(r#"{"source": "tradingview", "symbol": "SPY"}"#).unwrap();

        let outcome = pipeline.process_at(&raw, market_open_ts()).await;
        assert!(!outcome.success);
        assert_eq!(outcome.stage, Some(PipelineStage::Normalize));
        assert!(outcome.failure_reason.unwrap().contains("direction"));
    }

    #[tokio::test]
    async fn test_overnight_signal_fails_validate() {
        let pipeline = build_pipeline(&Config::default(), Some(dec!(2.50)));
        // 03:00 Eastern.
        let now: DateTime<Utc> = "2026-03-02T08:00:05Z".parse().unwrap();

        let outcome = pipeline
            .process_at(&raw_payload("2026-03-02T08:00:00Z"), now)
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.stage, Some(PipelineStage::Validate));
        assert_eq!(outcome.failure_reason.unwrap(), "outside market hours");
    }

    #[tokio::test]
    async fn test_duplicate_fails_deduplicate() {
        let mut config = Config::default();
        // Disable the cooldown so the repeat reaches the dedup stage.
        config.validation.cooldown_secs = 0;
        let pipeline = build_pipeline(&config, Some(dec!(2.50)));
        let now = market_open_ts() + Duration::seconds(5);
        let raw = raw_payload("2026-03-02T15:00:00Z");

        let first = pipeline.process_at(&raw, now).await;
        assert!(first.success);

        let second = pipeline
            .process_at(&raw, now + Duration::seconds(10))
            .await;
        assert!(!second.success);
        assert_eq!(second.stage, Some(PipelineStage::Deduplicate));
        assert_eq!(second.failure_reason.unwrap(), "duplicate signal");

        // Distinct tracking ids per submission.
        assert_ne!(first.tracking_id, second.tracking_id);
    }

    #[tokio::test]
    async fn test_quote_outage_fails_execute() {
        let pipeline = build_pipeline(&Config::default(), None);
        let now = market_open_ts() + Duration::seconds(5);

        let outcome = pipeline
            .process_at(&raw_payload("2026-03-02T15:00:00Z"), now)
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.stage, Some(PipelineStage::Execute));
        // The decision stage itself succeeded; no position was opened.
        assert!(pipeline.positions.open_positions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_does_not_block_next_signal() {
        let pipeline = build_pipeline(&Config::default(), Some(dec!(2.50)));
        let now = market_open_ts() + Duration::seconds(5);

        let bad: RawSignalPayload = serde_json::from_str(r#"{"symbol": "SPY"}"#).unwrap();
        let failed = pipeline.process_at(&bad, now).await;
        assert!(!failed.success);

        let ok = pipeline
            .process_at(&raw_payload("2026-03-02T15:00:00Z"), now)
            .await;
        assert!(ok.success);
    }
}
