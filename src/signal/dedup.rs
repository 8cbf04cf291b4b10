//! Short-window duplicate suppression
//!
//! Producers re-fire alerts on reconnects and retries, so an identical
//! signal often arrives more than once within seconds. The cache keys on
//! the signal fingerprint (source, symbol, timestamp, direction) and
//! suppresses repeats inside the duplicate window while letting genuinely
//! new signals through.

use super::types::Signal;
use crate::config::CacheConfig;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Fingerprint-based duplicate suppression with a sliding window
pub struct DeduplicationCache {
    /// Window within which a repeat fingerprint is a duplicate
    window: Duration,
    /// Entries older than this are purged entirely
    expiry: Duration,
    /// Fingerprint to last-seen time; check and record happen under one lock
    seen: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl DeduplicationCache {
    /// Create a cache from the configured windows
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            window: Duration::seconds(config.dedup_window_secs as i64),
            expiry: Duration::seconds(config.dedup_expiry_secs as i64),
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Check whether `signal` is a duplicate, recording it if not
    ///
    /// The check and the record are atomic: two near-simultaneous
    /// duplicates cannot both pass.
    pub async fn check_and_record(&self, signal: &Signal) -> bool {
        self.check_and_record_at(signal, Utc::now()).await
    }

    /// Clock-injected variant of [`check_and_record`](Self::check_and_record)
    pub async fn check_and_record_at(&self, signal: &Signal, now: DateTime<Utc>) -> bool {
        let fingerprint = signal.fingerprint();
        let mut seen = self.seen.lock().await;

        seen.retain(|_, last_seen| now - *last_seen < self.expiry);

        let duplicate = matches!(
            seen.get(&fingerprint),
            Some(last_seen) if now - *last_seen <= self.window
        );
        if !duplicate {
            seen.insert(fingerprint, now);
        }
        duplicate
    }

    /// Number of fingerprints currently tracked
    pub async fn len(&self) -> usize {
        self.seen.lock().await.len()
    }

    /// Whether the cache is empty
    pub async fn is_empty(&self) -> bool {
        self.seen.lock().await.is_empty()
    }
}
