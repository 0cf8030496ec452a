use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

/// Process-local counters. Each key is updated under its DashMap entry lock,
/// so concurrent checks for one key never lose an increment.
pub struct MemoryRateLimitStore {
    states: DashMap<String, RateLimiterState>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self {
            states: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl Default for MemoryRateLimitStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn hit(
        &self,
        key: &str,
        now: DateTime<Utc>,
        policy: &RateLimitPolicy,
    ) -> Result<Admission, RateLimitStoreError> {
        let mut state = self
            .states
            .entry(key.to_owned())
            .or_insert_with(|| RateLimiterState::new(now));
        Ok(state.hit(now, policy))
    }

    async fn evict_idle(
        &self,
        now: DateTime<Utc>,
        idle_for: Duration,
    ) -> Result<usize, RateLimitStoreError> {
        let before = self.states.len();
        self.states.retain(|_, state| !state.is_idle(now, idle_for));
        Ok(before.saturating_sub(self.states.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let store = MemoryRateLimitStore::new();
        let policy = RateLimitPolicy::default();
        for _ in 0..11 {
            store.hit("10.0.0.1", at(0), &policy).await.unwrap();
        }

        assert!(matches!(
            store.hit("10.0.0.1", at(1), &policy).await.unwrap(),
            Admission::Rejected { .. }
        ));
        assert_eq!(
            store.hit("10.0.0.2", at(1), &policy).await.unwrap(),
            Admission::Admitted { count: 1 }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_hits_never_under_count() {
        let store = Arc::new(MemoryRateLimitStore::new());
        let policy = RateLimitPolicy::default();

        let mut handles = Vec::new();
        for _ in 0..64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.hit("10.0.0.1", at(0), &policy).await.unwrap()
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if let Admission::Admitted { .. } = handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, policy.max_requests);
    }

    #[tokio::test]
    async fn idle_keys_are_evicted_blocked_keys_kept() {
        let store = MemoryRateLimitStore::new();
        let policy = RateLimitPolicy::default();
        store.hit("quiet", at(0), &policy).await.unwrap();
        for _ in 0..11 {
            store.hit("noisy", at(0), &policy).await.unwrap();
        }

        let evicted = store.evict_idle(at(40), Duration::seconds(30)).await.unwrap();

        assert_eq!(evicted, 1);
        assert_eq!(store.len(), 1);
        assert!(matches!(
            store.hit("noisy", at(41), &policy).await.unwrap(),
            Admission::Rejected { .. }
        ));
    }
}
