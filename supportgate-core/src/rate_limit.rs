//! Rate limiter (C2, §4.2).
//!
//! Two independent sliding windows per key: 100 events / 60s and
//! 1000 events / 3600s. Grounded on the teacher's `TokenBucketLimiter`,
//! generalized from a single provider-wide window to a per-key map so one
//! limiter instance can serve every tenant and API key concurrently.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const MINUTE_WINDOW: Duration = Duration::from_secs(60);
const MINUTE_LIMIT: usize = 100;
const HOUR_WINDOW: Duration = Duration::from_secs(3600);
const HOUR_LIMIT: usize = 1000;

struct KeyWindows {
    minute: VecDeque<Instant>,
    hour: VecDeque<Instant>,
}

impl KeyWindows {
    fn new() -> Self {
        Self {
            minute: VecDeque::new(),
            hour: VecDeque::new(),
        }
    }

    fn prune(&mut self, now: Instant) {
        let minute_cutoff = now.checked_sub(MINUTE_WINDOW).unwrap_or(now);
        while self.minute.front().is_some_and(|t| *t < minute_cutoff) {
            self.minute.pop_front();
        }
        let hour_cutoff = now.checked_sub(HOUR_WINDOW).unwrap_or(now);
        while self.hour.front().is_some_and(|t| *t < hour_cutoff) {
            self.hour.pop_front();
        }
    }

    /// `None` if empty within the last hour, i.e. this key can be swept.
    fn last_seen_within_hour(&self, now: Instant) -> bool {
        self.hour
            .back()
            .is_some_and(|t| now.duration_since(*t) < HOUR_WINDOW)
    }
}

/// A dual-window sliding-rate limiter keyed by tenant, API key, or IP (§4.2).
/// Window lengths are fixed; the per-window event caps are operator-configured
/// (`RATE_LIMIT_MINUTE`/`RATE_LIMIT_HOUR`, §6).
pub struct RateLimiter {
    windows: Mutex<HashMap<String, KeyWindows>>,
    minute_limit: usize,
    hour_limit: usize,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_limits(MINUTE_LIMIT, HOUR_LIMIT)
    }

    pub fn with_limits(minute_limit: usize, hour_limit: usize) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            minute_limit,
            hour_limit,
        }
    }

    /// Check whether `key` may proceed now. If not, records nothing and
    /// returns the hint for how long to wait; if allowed, records the event
    /// and returns `(true, None)`.
    pub fn allow(&self, key: &str) -> (bool, Option<Duration>) {
        let now = Instant::now();
        let mut guard = self.windows.lock().expect("rate limiter mutex poisoned");
        let entry = guard.entry(key.to_string()).or_insert_with(KeyWindows::new);
        entry.prune(now);

        if entry.minute.len() >= self.minute_limit {
            let oldest = *entry.minute.front().expect("len >= limit > 0");
            let retry_after = MINUTE_WINDOW.saturating_sub(now.duration_since(oldest));
            return (false, Some(retry_after));
        }
        if entry.hour.len() >= self.hour_limit {
            let oldest = *entry.hour.front().expect("len >= limit > 0");
            let retry_after = HOUR_WINDOW.saturating_sub(now.duration_since(oldest));
            return (false, Some(retry_after));
        }

        entry.minute.push_back(now);
        entry.hour.push_back(now);
        (true, None)
    }

    /// Remaining events this key may spend this minute/hour, for the
    /// `X-RateLimit-*` response headers (§4.13). Does not mutate state.
    pub fn remaining(&self, key: &str) -> (usize, usize) {
        let now = Instant::now();
        let mut guard = self.windows.lock().expect("rate limiter mutex poisoned");
        let entry = guard.entry(key.to_string()).or_insert_with(KeyWindows::new);
        entry.prune(now);
        (
            self.minute_limit.saturating_sub(entry.minute.len()),
            self.hour_limit.saturating_sub(entry.hour.len()),
        )
    }

    pub fn minute_limit(&self) -> usize {
        self.minute_limit
    }

    pub fn hour_limit(&self) -> usize {
        self.hour_limit
    }

    /// Drop keys with no recorded event in the last hour (§4.2: "a
    /// background sweep drops keys with no timestamps within the last
    /// hour"). Call periodically from a background task.
    pub fn sweep(&self) {
        let now = Instant::now();
        let mut guard = self.windows.lock().expect("rate limiter mutex poisoned");
        guard.retain(|_, w| {
            w.prune(now);
            w.last_seen_within_hour(now)
        });
    }

    /// Number of distinct keys currently tracked. Exposed for the admin CLI.
    pub fn tracked_key_count(&self) -> usize {
        self.windows.lock().expect("rate limiter mutex poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_under_limit() {
        let limiter = RateLimiter::new();
        for _ in 0..MINUTE_LIMIT {
            assert!(limiter.allow("tenant-a").0);
        }
    }

    #[test]
    fn test_minute_window_blocks_after_limit() {
        let limiter = RateLimiter::new();
        for _ in 0..MINUTE_LIMIT {
            limiter.allow("tenant-a");
        }
        let (allowed, retry_after) = limiter.allow("tenant-a");
        assert!(!allowed);
        assert!(retry_after.unwrap() <= MINUTE_WINDOW);
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::new();
        for _ in 0..MINUTE_LIMIT {
            limiter.allow("tenant-a");
        }
        assert!(limiter.allow("tenant-b").0);
    }

    #[test]
    fn test_sweep_drops_stale_keys() {
        let limiter = RateLimiter::new();
        limiter.allow("tenant-a");
        assert_eq!(limiter.tracked_key_count(), 1);
        // Can't fast-forward `Instant` in a unit test; confirm the key with a
        // recent event survives a sweep.
        limiter.sweep();
        assert_eq!(limiter.tracked_key_count(), 1);
    }

    #[test]
    fn test_with_limits_overrides_defaults() {
        let limiter = RateLimiter::with_limits(2, 1000);
        assert!(limiter.allow("tenant-a").0);
        assert!(limiter.allow("tenant-a").0);
        assert!(!limiter.allow("tenant-a").0);
    }

    #[test]
    fn test_remaining_reflects_consumed_events() {
        let limiter = RateLimiter::with_limits(5, 50);
        limiter.allow("tenant-a");
        limiter.allow("tenant-a");
        let (remaining_minute, remaining_hour) = limiter.remaining("tenant-a");
        assert_eq!(remaining_minute, 3);
        assert_eq!(remaining_hour, 48);
    }
}
