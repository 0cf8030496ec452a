use crate::domain_model::*;
use crate::domain_port::*;
use anyhow::anyhow;
use chrono::{DateTime, Duration, Utc};
use redis::Script;
use redis::aio::ConnectionManager;

const RATE_LIMIT_HIT: &str = include_str!("rate_limit_hit.lua");

/// Counters shared by every instance pointing at the same Redis. The whole
/// check runs in one Lua script, and idle keys expire on their own.
pub struct RedisRateLimitStore {
    conn: ConnectionManager,
    prefix: String,
    idle_ttl: Duration,
    script: Script,
}

impl RedisRateLimitStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>, idle_ttl: Duration) -> Self {
        RedisRateLimitStore {
            conn,
            prefix: prefix.into(),
            idle_ttl,
            script: Script::new(RATE_LIMIT_HIT),
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }
}

#[async_trait::async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn hit(
        &self,
        key: &str,
        now: DateTime<Utc>,
        policy: &RateLimitPolicy,
    ) -> Result<Admission, RateLimitStoreError> {
        let key = self.key(key);
        let mut conn = self.conn.clone();
        let idle_ttl_ms = self
            .idle_ttl
            .num_milliseconds()
            .max(policy.window.num_milliseconds());

        let (status, value): (i64, i64) = self
            .script
            .key(&key)
            .arg(now.timestamp_millis())
            .arg(policy.max_requests)
            .arg(policy.window.num_milliseconds())
            .arg(policy.block.num_milliseconds())
            .arg(idle_ttl_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| RateLimitStoreError::Store(e.to_string()))?;

        match status {
            1 => Ok(Admission::Admitted {
                count: u32::try_from(value).map_err(|e| anyhow!(e))?,
            }),
            0 => Ok(Admission::Rejected {
                retry_after: Duration::milliseconds(value),
            }),
            _ => Err(RateLimitStoreError::InternalError(anyhow!(
                "unknown script status"
            ))),
        }
    }

    async fn evict_idle(
        &self,
        _now: DateTime<Utc>,
        _idle_for: Duration,
    ) -> Result<usize, RateLimitStoreError> {
        // Keys carry a PEXPIRE, Redis drops them itself.
        Ok(0)
    }
}
