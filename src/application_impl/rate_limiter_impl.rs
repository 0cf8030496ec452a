use crate::application_port::{RateLimitError, RateLimiter};
use crate::domain_model::{Admission, RateLimitPolicy};
use crate::domain_port::{Clock, RateLimitStore};
use chrono::Duration;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Fixed-window limiter with a block penalty on top of a [`RateLimitStore`].
///
/// Store failures admit the request.
pub struct RealRateLimiter {
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
    policy: RateLimitPolicy,
}

impl RealRateLimiter {
    pub fn new(
        store: Arc<dyn RateLimitStore>,
        clock: Arc<dyn Clock>,
        policy: RateLimitPolicy,
    ) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    pub async fn evict_idle(&self, idle_for: Duration) -> usize {
        match self.store.evict_idle(self.clock.now(), idle_for).await {
            Ok(evicted) => evicted,
            Err(e) => {
                error!("rate limit eviction failed: {}", e);
                0
            }
        }
    }

    /// Periodically drop counters idle for `idle_for` until `cancel` fires.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        every: std::time::Duration,
        idle_for: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        let evicted = self.evict_idle(idle_for).await;
                        if evicted > 0 {
                            debug!(evicted, "rate limit counters evicted");
                        }
                    }
                }
            }
        })
    }
}

#[async_trait::async_trait]
impl RateLimiter for RealRateLimiter {
    async fn check(&self, key: &str) -> Result<(), RateLimitError> {
        match self.store.hit(key, self.clock.now(), &self.policy).await {
            Ok(Admission::Admitted { .. }) => Ok(()),
            Ok(Admission::Rejected { retry_after }) => {
                let retry_after_secs = retry_after_secs(retry_after);
                warn!(key, retry_after_secs, "rate limited");
                Err(RateLimitError::Limited { retry_after_secs })
            }
            Err(e) => {
                error!(key, "rate limit store failed, admitting: {}", e);
                Ok(())
            }
        }
    }
}

/// Whole seconds, rounded up, never zero.
fn retry_after_secs(retry_after: Duration) -> u64 {
    let millis = retry_after.num_milliseconds().max(1);
    ((millis + 999) / 1000) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_port::{ManualClock, RateLimitStoreError};
    use crate::infra_memory::MemoryRateLimitStore;
    use chrono::{DateTime, Utc};

    struct BrokenStore;

    #[async_trait::async_trait]
    impl RateLimitStore for BrokenStore {
        async fn hit(
            &self,
            _key: &str,
            _now: DateTime<Utc>,
            _policy: &RateLimitPolicy,
        ) -> Result<Admission, RateLimitStoreError> {
            Err(RateLimitStoreError::Store("connection refused".to_string()))
        }

        async fn evict_idle(
            &self,
            _now: DateTime<Utc>,
            _idle_for: Duration,
        ) -> Result<usize, RateLimitStoreError> {
            Err(RateLimitStoreError::Store("connection refused".to_string()))
        }
    }

    fn limiter(store: Arc<dyn RateLimitStore>) -> (RealRateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));
        let policy = RateLimitPolicy {
            max_requests: 10,
            window: Duration::seconds(10),
            block: Duration::seconds(60),
        };
        (RealRateLimiter::new(store, clock.clone(), policy), clock)
    }

    #[tokio::test]
    async fn eleventh_check_in_window_is_limited_then_recovers() {
        let (limiter, clock) = limiter(Arc::new(MemoryRateLimitStore::new()));

        for _ in 0..10 {
            limiter.check("10.0.0.1").await.unwrap();
            clock.advance(Duration::milliseconds(500));
        }
        let limited = limiter.check("10.0.0.1").await;
        assert!(matches!(
            limited,
            Err(RateLimitError::Limited {
                retry_after_secs: 60
            })
        ));

        clock.advance(Duration::seconds(30));
        assert!(matches!(
            limiter.check("10.0.0.1").await,
            Err(RateLimitError::Limited {
                retry_after_secs: 30
            })
        ));

        clock.advance(Duration::seconds(31));
        limiter.check("10.0.0.1").await.unwrap();
        for _ in 0..9 {
            limiter.check("10.0.0.1").await.unwrap();
        }
        assert!(limiter.check("10.0.0.1").await.is_err());
    }

    #[tokio::test]
    async fn store_failure_admits() {
        let (limiter, _) = limiter(Arc::new(BrokenStore));

        for _ in 0..20 {
            limiter.check("10.0.0.1").await.unwrap();
        }
        assert_eq!(limiter.evict_idle(Duration::seconds(1)).await, 0);
    }

    #[tokio::test]
    async fn sweeper_stops_on_cancel() {
        let (limiter, _) = limiter(Arc::new(MemoryRateLimitStore::new()));
        let cancel = CancellationToken::new();

        let handle = Arc::new(limiter).spawn_sweeper(
            std::time::Duration::from_millis(10),
            Duration::seconds(30),
            cancel.clone(),
        );
        cancel.cancel();

        handle.await.unwrap();
    }

    #[test]
    fn retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::milliseconds(1)), 1);
        assert_eq!(retry_after_secs(Duration::seconds(60)), 60);
        assert_eq!(retry_after_secs(Duration::milliseconds(59_001)), 60);
        assert_eq!(retry_after_secs(Duration::zero()), 1);
    }
}
