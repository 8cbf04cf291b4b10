//! Quote provider fallback chain
//!
//! One capability, several implementations: providers are tried in the
//! configured order and the first success wins. Only when every provider
//! fails does the caller see an aggregated failure.

use super::{with_retry, FetchError};
use crate::config::FetchConfig;
use crate::signal::Direction;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Fetches the current option premium for a symbol and direction
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Provider name for logs and failure aggregation
    fn name(&self) -> &str;

    /// Latest per-contract premium in dollars
    async fn latest_premium(
        &self,
        symbol: &str,
        direction: Direction,
    ) -> Result<Decimal, FetchError>;
}

/// Ordered fallback chain over [`QuoteProvider`] implementations
pub struct QuoteService {
    providers: Vec<Arc<dyn QuoteProvider>>,
    fetch_policy: FetchConfig,
}

impl QuoteService {
    /// Create a chain; providers are tried first to last
    pub fn new(providers: Vec<Arc<dyn QuoteProvider>>, fetch_policy: FetchConfig) -> Self {
        Self {
            providers,
            fetch_policy,
        }
    }

    /// Fetch a premium, falling back through the chain
    pub async fn fetch_premium(
        &self,
        symbol: &str,
        direction: Direction,
    ) -> Result<Decimal, FetchError> {
        let mut failures = Vec::new();

        for provider in &self.providers {
            let result = with_retry(&self.fetch_policy, provider.name(), || {
                let provider = Arc::clone(provider);
                let symbol = symbol.to_string();
                async move { provider.latest_premium(&symbol, direction).await }
            })
            .await;

            match result {
                Ok(premium) => return Ok(premium),
                Err(e) => {
                    tracing::warn!(
                        provider = provider.name(),
                        symbol,
                        error = %e,
                        "Quote provider failed, trying next"
                    );
                    failures.push(format!("{}: {}", provider.name(), e));
                }
            }
        }

        Err(FetchError::AllProvidersFailed(failures.join("; ")))
    }
}
