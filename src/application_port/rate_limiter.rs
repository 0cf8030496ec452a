#[derive(Debug, Clone, thiserror::Error)]
pub enum RateLimitError {
    #[error("rate limited, retry after {retry_after_secs}s")]
    Limited { retry_after_secs: u64 },
}

/// Admission gate run before authentication.
#[async_trait::async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check(&self, key: &str) -> Result<(), RateLimitError>;
}
