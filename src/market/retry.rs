//! Bounded retry for external fetches
//!
//! Every upstream call runs under a per-attempt deadline and retries
//! with exponential backoff. Exhaustion returns a typed error; callers
//! never hang on a dead provider. Retries apply only to external
//! fetches, never to local validation or cache logic.

use super::FetchError;
use crate::config::FetchConfig;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};

/// Run `op` with per-attempt timeouts and exponential backoff
///
/// `label` names the operation in logs.
pub async fn with_retry<T, F, Fut>(
    policy: &FetchConfig,
    label: &str,
    mut op: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let deadline = Duration::from_secs(policy.timeout_secs);
    let mut backoff = Duration::from_millis(policy.initial_backoff_ms);
    let mut last_error = String::new();

    for attempt in 1..=policy.max_attempts {
        let result = match timeout(deadline, op()).await {
            Ok(inner) => inner,
            Err(_) => Err(FetchError::Timeout(policy.timeout_secs)),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::warn!(
                    operation = label,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "Fetch attempt failed"
                );
                last_error = e.to_string();
            }
        }

        if attempt < policy.max_attempts {
            sleep(backoff).await;
            backoff *= 2;
        }
    }

    Err(FetchError::RetriesExhausted {
        attempts: policy.max_attempts,
        last_error,
    })
}
