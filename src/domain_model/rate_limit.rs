use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    pub max_requests: u32,
    pub window: Duration,
    pub block: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::seconds(10),
            block: Duration::seconds(60),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Admission {
    Admitted { count: u32 },
    Rejected { retry_after: Duration },
}

/// Fixed-window counter for one key.
#[derive(Debug, Clone)]
pub struct RateLimiterState {
    pub count: u32,
    pub window_start: DateTime<Utc>,
    pub blocked_until: Option<DateTime<Utc>>,
    pub last_seen: DateTime<Utc>,
}

impl RateLimiterState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            window_start: now,
            blocked_until: None,
            last_seen: now,
        }
    }

    /// Applies one admission check at `now`.
    ///
    /// A blocked key is rejected without touching its counter. Once the block
    /// or the window has elapsed a fresh window starts with this request.
    pub fn hit(&mut self, now: DateTime<Utc>, policy: &RateLimitPolicy) -> Admission {
        self.last_seen = now;

        if let Some(until) = self.blocked_until {
            if now < until {
                return Admission::Rejected {
                    retry_after: until - now,
                };
            }
            self.blocked_until = None;
            self.count = 0;
        }

        if self.count == 0 || now - self.window_start >= policy.window {
            self.window_start = now;
            self.count = 1;
            return Admission::Admitted { count: 1 };
        }

        self.count += 1;
        if self.count > policy.max_requests {
            self.blocked_until = Some(now + policy.block);
            return Admission::Rejected {
                retry_after: policy.block,
            };
        }

        Admission::Admitted { count: self.count }
    }

    pub fn is_idle(&self, now: DateTime<Utc>, idle_for: Duration) -> bool {
        let blocked = self.blocked_until.is_some_and(|until| now < until);
        !blocked && now - self.last_seen >= idle_for
    }
}
