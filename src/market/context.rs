//! Market context cache
//!
//! A TTL cache over the single current [`ContextData`] snapshot. Callers
//! never trigger redundant fetches: while one refresh is in flight,
//! concurrent callers wait on it and all receive the same result. A
//! failed refresh falls back to a recent stale value when one exists.

use super::{with_retry, ContextData, ContextFetcher, FetchError};
use crate::config::{CacheConfig, FetchConfig};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

struct CachedContext {
    data: ContextData,
    fetched_at: DateTime<Utc>,
}

/// TTL cache with coalesced refresh and stale fallback
pub struct ContextCache {
    fetcher: Arc<dyn ContextFetcher>,
    fetch_policy: FetchConfig,
    ttl: Duration,
    stale_ceiling: Duration,
    cached: RwLock<Option<CachedContext>>,
    /// Held for the duration of one upstream refresh; concurrent callers
    /// queue here instead of fetching again
    refresh: Mutex<()>,
}

impl ContextCache {
    /// Create a cache over `fetcher` with the configured windows
    pub fn new(
        fetcher: Arc<dyn ContextFetcher>,
        cache_config: &CacheConfig,
        fetch_policy: FetchConfig,
    ) -> Self {
        Self {
            fetcher,
            fetch_policy,
            ttl: Duration::seconds(cache_config.context_ttl_secs as i64),
            stale_ceiling: Duration::seconds(cache_config.stale_fallback_secs as i64),
            cached: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    /// Return the current market context
    ///
    /// Serves from cache while fresh; otherwise refreshes once and
    /// shares the result with every caller waiting on the refresh.
    pub async fn get_context(&self) -> Result<ContextData, FetchError> {
        if let Some(data) = self.fresh_value(Utc::now()).await {
            return Ok(data);
        }

        let _guard = self.refresh.lock().await;

        // Another caller may have completed the refresh while we waited.
        if let Some(data) = self.fresh_value(Utc::now()).await {
            return Ok(data);
        }

        let fetcher = Arc::clone(&self.fetcher);
        let result = with_retry(&self.fetch_policy, "market context", || {
            let fetcher = Arc::clone(&fetcher);
            async move { fetcher.fetch_context().await }
        })
        .await;

        match result {
            Ok(data) => {
                let mut cached = self.cached.write().await;
                *cached = Some(CachedContext {
                    data: data.clone(),
                    fetched_at: Utc::now(),
                });
                Ok(data)
            }
            Err(e) => {
                let cached = self.cached.read().await;
                if let Some(entry) = cached.as_ref() {
                    let age = Utc::now() - entry.fetched_at;
                    if age <= self.stale_ceiling {
                        tracing::warn!(
                            error = %e,
                            stale_secs = age.num_seconds(),
                            "Context refresh failed, serving stale snapshot"
                        );
                        return Ok(entry.data.clone());
                    }
                }
                Err(e)
            }
        }
    }

    async fn fresh_value(&self, now: DateTime<Utc>) -> Option<ContextData> {
        let cached = self.cached.read().await;
        cached
            .as_ref()
            .filter(|entry| now - entry.fetched_at < self.ttl)
            .map(|entry| entry.data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{Trend, VolatilityRegime};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    struct StubFetcher {
        calls: AtomicU32,
        fail: AtomicBool,
        delay_ms: u64,
    }

    impl StubFetcher {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail: AtomicBool::new(false),
                delay_ms: 0,
            }
        }

        fn slow(delay_ms: u64) -> Self {
            Self {
                delay_ms,
                ..Self::new()
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ContextFetcher for StubFetcher {
        async fn fetch_context(&self) -> Result<ContextData, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.delay_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(FetchError::Upstream("provider down".to_string()));
            }
            Ok(ContextData {
                volatility: dec!(22),
                trend: Trend::Bullish,
                bias: dec!(0.3),
                regime: VolatilityRegime::Normal,
                as_of: Utc::now(),
            })
        }
    }

    fn fast_fetch_policy() -> FetchConfig {
        FetchConfig {
            timeout_secs: 1,
            max_attempts: 1,
            initial_backoff_ms: 1,
        }
    }

    fn cache_config(ttl_secs: u64, stale_secs: u64) -> CacheConfig {
        CacheConfig {
            context_ttl_secs: ttl_secs,
            stale_fallback_secs: stale_secs,
            ..CacheConfig::default()
        }
    }

    #[tokio::test]
    async fn test_fresh_value_served_without_fetch() {
        let fetcher = Arc::new(StubFetcher::new());
        let cache = ContextCache::new(
            Arc::clone(&fetcher) as Arc<dyn ContextFetcher>,
            &cache_config(60, 300),
            fast_fetch_policy(),
        );

        cache.get_context().await.unwrap();
        cache.get_context().await.unwrap();
        cache.get_context().await.unwrap();

        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_value_triggers_refetch() {
        let fetcher = Arc::new(StubFetcher::new());
        let cache = ContextCache::new(
            Arc::clone(&fetcher) as Arc<dyn ContextFetcher>,
            &cache_config(0, 300),
            fast_fetch_policy(),
        );

        cache.get_context().await.unwrap();
        cache.get_context().await.unwrap();

        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let fetcher = Arc::new(StubFetcher::slow(50));
        let cache = Arc::new(ContextCache::new(
            Arc::clone(&fetcher) as Arc<dyn ContextFetcher>,
            &cache_config(60, 300),
            fast_fetch_policy(),
        ));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move { cache.get_context().await }));
        }

        let mut snapshots = Vec::new();
        for handle in handles {
            snapshots.push(handle.await.unwrap().unwrap());
        }

        // Exactly one upstream fetch; every caller saw the same snapshot.
        assert_eq!(fetcher.calls(), 1);
        let first = &snapshots[0];
        for snapshot in &snapshots {
            assert_eq!(snapshot.as_of, first.as_of);
            assert_eq!(snapshot.volatility, first.volatility);
        }
    }

    #[tokio::test]
    async fn test_stale_fallback_on_fetch_failure() {
        let fetcher = Arc::new(StubFetcher::new());
        let cache = ContextCache::new(
            Arc::clone(&fetcher) as Arc<dyn ContextFetcher>,
            &cache_config(0, 300),
            fast_fetch_policy(),
        );

        let first = cache.get_context().await.unwrap();
        fetcher.fail.store(true, Ordering::SeqCst);

        // TTL is zero so a refresh is attempted and fails; the cached
        // value is younger than the fallback ceiling and is served.
        let second = cache.get_context().await.unwrap();
        assert_eq!(second.as_of, first.as_of);
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_failure_with_no_cache_propagates() {
        let fetcher = Arc::new(StubFetcher::new());
        fetcher.fail.store(true, Ordering::SeqCst);
        let cache = ContextCache::new(
            Arc::clone(&fetcher) as Arc<dyn ContextFetcher>,
            &cache_config(60, 300),
            fast_fetch_policy(),
        );

        let result = cache.get_context().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_failure_with_too_old_cache_propagates() {
        let fetcher = Arc::new(StubFetcher::new());
        // Stale ceiling of zero: the cached value is immediately unusable
        // as a fallback.
        let cache = ContextCache::new(
            Arc::clone(&fetcher) as Arc<dyn ContextFetcher>,
            &cache_config(0, 0),
            fast_fetch_policy(),
        );

        cache.get_context().await.unwrap();
        fetcher.fail.store(true, Ordering::SeqCst);

        let result = cache.get_context().await;
        assert!(result.is_err());
    }
}
