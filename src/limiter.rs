// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Fixed-window rate limiter for the guarded intake endpoints.
//!
//! Each key owns a counter in a shared store. The first request of a
//! fresh window creates the entry; requests inside the window increment
//! it; once the window elapses the next request resets it to a count of
//! one. A request that would exceed the limit is rejected and the
//! counter is left untouched, so rejected attempts never bleed into
//! future windows.
//!
//! Windows are fixed, not sliding. The store and the clock are injected
//! so tests can drive window expiry without sleeping.

use crate::config::RateRule;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Result of a rate limit check.
#[derive(Debug, Clone)]
pub enum RateLimitOutcome {
    /// Request is admitted
    Allowed {
        /// Remaining requests in the current window
        remaining: u32,
        /// Time until the window resets
        reset_in: Duration,
    },
    /// Request is rejected
    RateLimited {
        /// Time until the current window expires
        retry_after: Duration,
    },
}

impl RateLimitOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitOutcome::Allowed { .. })
    }
}

/// Time source for window bookkeeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Shared counter store: get-and-increment by key with expiry.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Apply the window state machine for `key` and report the outcome.
    ///
    /// Implementations must serialize the read-increment-write per key;
    /// concurrent callers may never jointly admit more than
    /// `max_requests` in one window.
    async fn check_and_increment(
        &self,
        key: &str,
        window: Duration,
        max_requests: u32,
    ) -> RateLimitOutcome;

    /// Drop entries whose window has elapsed. Returns how many were
    /// removed.
    async fn purge_expired(&self) -> usize;
}

/// Counter state for one key.
#[derive(Debug)]
struct WindowEntry {
    count: u32,
    window_start: Instant,
    window: Duration,
}

/// In-memory counter store.
pub struct MemoryCounterStore {
    entries: RwLock<HashMap<String, WindowEntry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn check_and_increment(
        &self,
        key: &str,
        window: Duration,
        max_requests: u32,
    ) -> RateLimitOutcome {
        if max_requests == 0 {
            return RateLimitOutcome::RateLimited {
                retry_after: window,
            };
        }

        let now = self.clock.now();
        // The write lock spans the whole read-increment-write, which is
        // what keeps concurrent same-key callers from jointly exceeding
        // the limit.
        let mut entries = self.entries.write().await;

        match entries.get_mut(key) {
            Some(entry) if now.duration_since(entry.window_start) >= entry.window => {
                entry.count = 1;
                entry.window_start = now;
                entry.window = window;
                RateLimitOutcome::Allowed {
                    remaining: max_requests.saturating_sub(1),
                    reset_in: window,
                }
            }
            Some(entry) => {
                let elapsed = now.duration_since(entry.window_start);
                let left = entry.window.saturating_sub(elapsed);
                if entry.count < max_requests {
                    entry.count += 1;
                    RateLimitOutcome::Allowed {
                        remaining: max_requests - entry.count,
                        reset_in: left,
                    }
                } else {
                    RateLimitOutcome::RateLimited { retry_after: left }
                }
            }
            None => {
                entries.insert(
                    key.to_string(),
                    WindowEntry {
                        count: 1,
                        window_start: now,
                        window,
                    },
                );
                RateLimitOutcome::Allowed {
                    remaining: max_requests.saturating_sub(1),
                    reset_in: window,
                }
            }
        }
    }

    async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.window_start) < entry.window);
        before - entries.len()
    }
}

/// Rate limiter over an injected counter store.
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
}

impl RateLimiter {
    /// Create a limiter over the given store.
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Create a limiter over a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCounterStore::new()))
    }

    /// Check and count one request for `key` under `rule`.
    pub async fn check_and_increment(&self, key: &str, rule: &RateRule) -> RateLimitOutcome {
        let outcome = self
            .store
            .check_and_increment(key, rule.window(), rule.max_requests)
            .await;
        if let RateLimitOutcome::RateLimited { retry_after } = &outcome {
            debug!(key = %key, retry_after_secs = retry_after.as_secs(), "Rate limit exceeded");
        }
        outcome
    }

    /// Drop expired windows (called periodically from a background task).
    pub async fn cleanup(&self) -> usize {
        self.store.purge_expired().await
    }
}

/// Compose the store key for an action and a principal (user or IP).
pub fn action_key(action: &str, principal: &str) -> String {
    format!("{action}:{principal}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Clock that only moves when told to.
    struct ManualClock {
        start: Instant,
        advanced: Mutex<Duration>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                start: Instant::now(),
                advanced: Mutex::new(Duration::ZERO),
            }
        }

        fn advance(&self, by: Duration) {
            *self.advanced.lock().unwrap() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.start + *self.advanced.lock().unwrap()
        }
    }

    fn rule(window_secs: u64, max_requests: u32) -> RateRule {
        RateRule {
            window_secs,
            max_requests,
        }
    }

    #[tokio::test]
    async fn admits_up_to_max_then_rejects() {
        let limiter = RateLimiter::in_memory();
        let rule = rule(60, 5);

        for i in 0..5 {
            let outcome = limiter.check_and_increment("report:alice", &rule).await;
            assert!(outcome.is_allowed(), "request {} should be admitted", i + 1);
        }

        let outcome = limiter.check_and_increment("report:alice", &rule).await;
        assert!(!outcome.is_allowed(), "sixth request should be rejected");
    }

    #[tokio::test]
    async fn remaining_counts_down() {
        let limiter = RateLimiter::in_memory();
        let rule = rule(60, 3);

        for expected in [2u32, 1, 0] {
            match limiter.check_and_increment("feature:10.0.0.1", &rule).await {
                RateLimitOutcome::Allowed { remaining, .. } => assert_eq!(remaining, expected),
                RateLimitOutcome::RateLimited { .. } => panic!("should not be limited"),
            }
        }
    }

    #[tokio::test]
    async fn window_expiry_resets_counter() {
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(MemoryCounterStore::with_clock(clock.clone()));
        let limiter = RateLimiter::new(store);
        let rule = rule(60, 2);

        assert!(limiter.check_and_increment("k", &rule).await.is_allowed());
        assert!(limiter.check_and_increment("k", &rule).await.is_allowed());
        assert!(!limiter.check_and_increment("k", &rule).await.is_allowed());

        clock.advance(Duration::from_secs(60));
        assert!(
            limiter.check_and_increment("k", &rule).await.is_allowed(),
            "fresh window should admit even after exhaustion"
        );
    }

    #[tokio::test]
    async fn rejection_does_not_consume_budget() {
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(MemoryCounterStore::with_clock(clock.clone()));
        let limiter = RateLimiter::new(store);
        let rule = rule(60, 1);

        assert!(limiter.check_and_increment("k", &rule).await.is_allowed());
        // Hammer the exhausted window; none of these may mutate.
        for _ in 0..10 {
            assert!(!limiter.check_and_increment("k", &rule).await.is_allowed());
        }

        clock.advance(Duration::from_secs(60));
        match limiter.check_and_increment("k", &rule).await {
            RateLimitOutcome::Allowed { remaining, .. } => assert_eq!(remaining, 0),
            RateLimitOutcome::RateLimited { .. } => {
                panic!("rejections must not count against the new window")
            }
        }
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let limiter = RateLimiter::in_memory();
        let rule = rule(60, 1);

        assert!(limiter.check_and_increment("report:a", &rule).await.is_allowed());
        assert!(!limiter.check_and_increment("report:a", &rule).await.is_allowed());
        assert!(limiter.check_and_increment("report:b", &rule).await.is_allowed());
    }

    #[tokio::test]
    async fn retry_after_shrinks_as_window_ages() {
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(MemoryCounterStore::with_clock(clock.clone()));
        let limiter = RateLimiter::new(store);
        let rule = rule(60, 1);

        assert!(limiter.check_and_increment("k", &rule).await.is_allowed());
        clock.advance(Duration::from_secs(45));
        match limiter.check_and_increment("k", &rule).await {
            RateLimitOutcome::RateLimited { retry_after } => {
                assert_eq!(retry_after, Duration::from_secs(15));
            }
            RateLimitOutcome::Allowed { .. } => panic!("should be limited"),
        }
    }

    #[tokio::test]
    async fn cleanup_drops_only_expired_windows() {
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(MemoryCounterStore::with_clock(clock.clone()));
        let limiter = RateLimiter::new(store.clone());

        limiter.check_and_increment("old", &rule(30, 5)).await;
        clock.advance(Duration::from_secs(31));
        limiter.check_and_increment("fresh", &rule(60, 5)).await;

        assert_eq!(limiter.cleanup().await, 1);
        // "fresh" must keep its count across the purge.
        match limiter.check_and_increment("fresh", &rule(60, 5)).await {
            RateLimitOutcome::Allowed { remaining, .. } => assert_eq!(remaining, 3),
            RateLimitOutcome::RateLimited { .. } => panic!("should not be limited"),
        }
    }

    #[tokio::test]
    async fn zero_limit_admits_nothing() {
        let limiter = RateLimiter::in_memory();
        assert!(!limiter.check_and_increment("k", &rule(60, 0)).await.is_allowed());
    }

    #[test]
    fn action_key_format() {
        assert_eq!(action_key("report", "alice"), "report:alice");
        assert_eq!(action_key("feature", "203.0.113.9"), "feature:203.0.113.9");
    }
}
