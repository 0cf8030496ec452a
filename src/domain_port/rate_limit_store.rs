use crate::domain_model::*;
use chrono::{DateTime, Duration, Utc};

#[async_trait::async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Record one admission check for `key` at `now` and report the outcome.
    /// Must be atomic per key.
    async fn hit(
        &self,
        key: &str,
        now: DateTime<Utc>,
        policy: &RateLimitPolicy,
    ) -> Result<Admission, RateLimitStoreError>;

    /// Drop state for keys idle for at least `idle_for`. Returns how many were dropped.
    async fn evict_idle(
        &self,
        now: DateTime<Utc>,
        idle_for: Duration,
    ) -> Result<usize, RateLimitStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RateLimitStoreError {
    #[error("infra error: {0}")]
    Store(String),
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}
