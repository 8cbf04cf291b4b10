//! Run command implementation
//!
//! Wires the full pipeline against the configured HTTP providers and
//! feeds it raw signal payloads as JSON lines from a file or stdin,
//! standing in for the webhook ingress.

use crate::config::Config;
use crate::engine::{DecisionOrchestrator, SignalPipeline};
use crate::market::{
    ContextCache, ContextFetcher, GexClient, GexReader, GexService, HttpContextClient,
    HttpQuoteProvider, QuoteProvider, QuoteService,
};
use crate::position::{InMemoryPositionStore, PositionManager};
use crate::risk::{PositionSizingService, RiskManager};
use crate::signal::{DeduplicationCache, RawSignalPayload, SignalValidator};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Read JSON-lines payloads from this file instead of stdin
    #[arg(short, long)]
    pub input: Option<PathBuf>,
}

impl RunArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let pipeline = build_pipeline(config)?;

        let reader: Box<dyn AsyncRead + Unpin> = match &self.input {
            Some(path) => Box::new(tokio::fs::File::open(path).await?),
            None => Box::new(tokio::io::stdin()),
        };
        let mut lines = BufReader::new(reader).lines();

        tracing::info!("Pipeline ready, waiting for signals");

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let raw: RawSignalPayload = match serde_json::from_str(&line) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unparseable payload line");
                    continue;
                }
            };

            let outcome = pipeline.process(&raw).await;
            match (&outcome.decision, &outcome.stage) {
                (Some(decision), _) => {
                    tracing::info!(
                        tracking_id = %outcome.tracking_id,
                        decision = ?decision.decision,
                        confidence = %decision.confidence,
                        size = decision.size,
                        "Processed signal"
                    );
                }
                (None, Some(stage)) => {
                    tracing::info!(
                        tracking_id = %outcome.tracking_id,
                        stage = stage.as_str(),
                        reason = outcome.failure_reason.as_deref().unwrap_or(""),
                        "Signal did not reach a decision"
                    );
                }
                (None, None) => {}
            }
        }

        tracing::info!("Input exhausted, shutting down");
        Ok(())
    }
}

/// Construct every service once and wire the pipeline
///
/// All collaborators are built here at startup and passed in
/// explicitly; nothing holds hidden global state.
pub fn build_pipeline(config: &Config) -> anyhow::Result<SignalPipeline> {
    let timeout = config.fetch.timeout_secs;

    let context_fetcher: Arc<dyn ContextFetcher> =
        Arc::new(HttpContextClient::new(&config.providers.context_url, timeout));
    let context_cache = Arc::new(ContextCache::new(
        context_fetcher,
        &config.cache,
        config.fetch.clone(),
    ));

    let gex_reader: Arc<dyn GexReader> =
        Arc::new(GexClient::new(&config.providers.gex_url, timeout));
    let gex = Arc::new(GexService::new(gex_reader, &config.gex, config.fetch.clone()));

    let quote_providers: Vec<Arc<dyn QuoteProvider>> = config
        .providers
        .quote_urls
        .iter()
        .enumerate()
        .map(|(i, url)| {
            Arc::new(HttpQuoteProvider::new(format!("quotes-{}", i + 1), url, timeout))
                as Arc<dyn QuoteProvider>
        })
        .collect();
    let quotes = Arc::new(QuoteService::new(quote_providers, config.fetch.clone()));

    let risk = Arc::new(RiskManager::new(config)?);
    let sizing = Arc::new(PositionSizingService::new(&config.sizing));
    let orchestrator = Arc::new(DecisionOrchestrator::new(
        context_cache,
        gex,
        risk,
        sizing,
        config,
    ));

    let positions = Arc::new(PositionManager::new(
        Arc::new(InMemoryPositionStore::new()),
        &config.risk,
    ));

    Ok(SignalPipeline::new(
        Arc::new(SignalValidator::new(&config.validation)?),
        Arc::new(DeduplicationCache::new(&config.cache)),
        orchestrator,
        quotes,
        positions,
    ))
}
