//! Per-provider throttling state and bounded retry.
//!
//! [`RateLimitGovernor`] wraps every catalog call. When a catalog reports
//! throttling the governor records a deadline for that provider, waits it out
//! (when the wait is short enough) and retries, up to the configured number
//! of attempts. A provider stays blocked until its deadline passes; waits
//! longer than `max_wait` are not slept through, the call is skipped instead.
//!
//! The governor is an explicit object so runners can share one instance or
//! keep isolated ones.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use mediasync_common::Provider;
use parking_lot::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use super::provider::{AdapterError, Lookup, RateLimitInfo};
use crate::config::RateLimitConfig;

/// Throttling state of one provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitState {
    pub is_limited: bool,
    /// Backoff recorded when the provider was last throttled.
    pub retry_after: Option<Duration>,
    /// When the provider may be called again. `None` means "unknown", in
    /// which case retries back off exponentially.
    pub reset_time: Option<Instant>,
}

/// Tracks throttled providers and retries throttled calls.
pub struct RateLimitGovernor {
    config: RateLimitConfig,
    states: Mutex<HashMap<Provider, RateLimitState>>,
}

impl RateLimitGovernor {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Current state of `provider`.
    pub fn state(&self, provider: Provider) -> RateLimitState {
        self.states
            .lock()
            .get(&provider)
            .copied()
            .unwrap_or_default()
    }

    /// Whether `provider` is still inside a throttling window.
    pub fn is_limited(&self, provider: Provider) -> bool {
        let state = self.state(provider);
        state.is_limited && state.reset_time.map_or(true, |t| Instant::now() < t)
    }

    /// Forget any throttling recorded for `provider`.
    pub fn clear(&self, provider: Provider) {
        self.states.lock().remove(&provider);
    }

    /// Mark `provider` as throttled for `backoff`, or for an unknown period
    /// when `backoff` is `None` or zero.
    pub fn mark_limited(&self, provider: Provider, backoff: Option<Duration>) {
        let backoff = backoff.filter(|b| !b.is_zero());
        let state = RateLimitState {
            is_limited: true,
            retry_after: backoff,
            reset_time: backoff.map(|b| Instant::now() + b),
        };
        self.states.lock().insert(provider, state);
    }

    /// Record a throttled response, falling back to the provider's default
    /// backoff when the catalog gave no explicit wait.
    fn record(&self, info: &RateLimitInfo) -> Option<Duration> {
        let backoff = info
            .retry_after
            .unwrap_or_else(|| self.config.backoff_for(info.provider));
        self.mark_limited(info.provider, Some(backoff));
        self.state(info.provider).retry_after
    }

    /// How long to wait before attempt number `attempt` (1-based), if the
    /// provider is throttled at all. Expired windows are cleared here.
    fn pending_wait(&self, provider: Provider, attempt: u32) -> Option<Duration> {
        let state = self.state(provider);
        if !state.is_limited {
            return None;
        }

        match state.reset_time {
            Some(reset) => {
                let now = Instant::now();
                if now >= reset {
                    self.clear(provider);
                    None
                } else {
                    Some(reset - now)
                }
            }
            None => Some(Duration::from_secs(1u64 << (attempt - 1).min(16))),
        }
    }

    /// Run a catalog call under throttling control.
    ///
    /// Adapter errors are returned immediately without retry. A throttled
    /// lookup is retried until `max_attempts` is reached, then returned as
    /// [`Lookup::RateLimited`]. Any other lookup clears the provider's state.
    pub async fn call<F, Fut>(&self, provider: Provider, mut op: F) -> Result<Lookup, AdapterError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Lookup, AdapterError>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last = RateLimitInfo {
            provider,
            retry_after: None,
        };

        for attempt in 1..=max_attempts {
            if let Some(wait) = self.pending_wait(provider, attempt) {
                if wait > self.config.max_wait() {
                    debug!(
                        provider = %provider,
                        wait_secs = wait.as_secs(),
                        "Provider throttled beyond max wait; skipping call"
                    );
                    return Ok(Lookup::rate_limited(provider, Some(wait)));
                }

                debug!(
                    provider = %provider,
                    attempt,
                    wait_ms = wait.as_millis() as u64,
                    "Waiting for provider backoff"
                );
                sleep(wait).await;
            }

            match op().await? {
                Lookup::RateLimited(info) => {
                    let backoff = self.record(&info);
                    warn!(
                        provider = %provider,
                        attempt,
                        max_attempts,
                        backoff_secs = backoff.map(|b| b.as_secs()),
                        "Provider rate limited"
                    );
                    last = info;
                }
                other => {
                    self.clear(provider);
                    return Ok(other);
                }
            }
        }

        Ok(Lookup::RateLimited(last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::provider::UpdateCandidate;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn governor() -> RateLimitGovernor {
        RateLimitGovernor::new(RateLimitConfig::default())
    }

    fn found(provider: Provider) -> Lookup {
        Lookup::Found(UpdateCandidate::new(provider, "Dune"))
    }

    #[tokio::test(start_paused = true)]
    async fn retries_after_provider_backoff() {
        let governor = governor();
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result = governor
            .call(Provider::Tmdb, || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Ok(Lookup::rate_limited(Provider::Tmdb, None))
                } else {
                    Ok(found(Provider::Tmdb))
                }
            })
            .await
            .unwrap();

        assert_eq!(result, found(Provider::Tmdb));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_secs(20));
        assert!(!governor.state(Provider::Tmdb).is_limited);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_retry_after_wins() {
        let governor = governor();
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        governor
            .call(Provider::Tmdb, || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Ok(Lookup::rate_limited(Provider::Tmdb, Some(Duration::from_secs(2))))
                } else {
                    Ok(Lookup::NotFound)
                }
            })
            .await
            .unwrap();

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_returns_rate_limited() {
        let governor = governor();
        let calls = AtomicU32::new(0);

        let result = governor
            .call(Provider::Tmdb, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Lookup::rate_limited(Provider::Tmdb, None))
            })
            .await
            .unwrap();

        assert!(matches!(result, Lookup::RateLimited(info) if info.provider == Provider::Tmdb));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(governor.is_limited(Provider::Tmdb));
    }

    #[tokio::test(start_paused = true)]
    async fn daily_quota_blocks_without_sleeping() {
        let governor = governor();
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let first = governor
            .call(Provider::Omdb, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Lookup::rate_limited(Provider::Omdb, None))
            })
            .await
            .unwrap();
        assert!(matches!(first, Lookup::RateLimited(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let second = governor
            .call(Provider::Omdb, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(found(Provider::Omdb))
            })
            .await
            .unwrap();
        assert!(matches!(second, Lookup::RateLimited(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_window_is_cleared() {
        let governor = governor();
        governor.mark_limited(Provider::Tmdb, Some(Duration::from_secs(10)));
        assert!(governor.is_limited(Provider::Tmdb));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(!governor.is_limited(Provider::Tmdb));

        let started = Instant::now();
        let result = governor
            .call(Provider::Tmdb, || async { Ok(Lookup::NotFound) })
            .await
            .unwrap();
        assert_eq!(result, Lookup::NotFound);
        assert!(started.elapsed() < Duration::from_millis(1));
        assert_eq!(governor.state(Provider::Tmdb), RateLimitState::default());
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_window_backs_off_exponentially() {
        let config = RateLimitConfig {
            backoff_secs: BTreeMap::from([(Provider::Tmdb, 0)]),
            ..RateLimitConfig::default()
        };
        let governor = RateLimitGovernor::new(config);
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        governor
            .call(Provider::Tmdb, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Lookup::rate_limited(Provider::Tmdb, None))
            })
            .await
            .unwrap();

        // 2^1 + 2^2 seconds before attempts two and three.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(6));
        assert!(elapsed < Duration::from_secs(7));
        assert_eq!(governor.state(Provider::Tmdb).reset_time, None);
    }

    #[tokio::test(start_paused = true)]
    async fn adapter_errors_are_not_retried() {
        let governor = governor();
        let calls = AtomicU32::new(0);

        let err = governor
            .call(Provider::Trakt, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AdapterError::NotImplemented(Provider::Trakt))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AdapterError::NotImplemented(Provider::Trakt)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn providers_are_tracked_independently() {
        let governor = governor();
        governor.mark_limited(Provider::Omdb, Some(Duration::from_secs(3600)));

        let result = governor
            .call(Provider::Tmdb, || async { Ok(found(Provider::Tmdb)) })
            .await
            .unwrap();

        assert!(matches!(result, Lookup::Found(_)));
        assert!(governor.is_limited(Provider::Omdb));
        assert!(!governor.is_limited(Provider::Tmdb));
    }
}
