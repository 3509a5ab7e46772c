//! Sliding-window rate limiting for login attempts.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::warn;

/// In-memory sliding-window attempt counter, keyed by client identity.
///
/// Each key holds a time-ordered record of attempt timestamps. A call
/// evicts everything older than the window from the front, then admits the
/// attempt only if fewer than the configured maximum remain. Denied
/// attempts are not recorded. State is process-local and resets on
/// restart.
pub struct RateLimiter {
    max_attempts: usize,
    window: Duration,
    attempts: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    /// Create a limiter allowing `max_attempts` per `window` per key.
    pub fn new(max_attempts: usize, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Check whether an attempt from `key` is admitted, recording it if so.
    pub fn allow(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut attempts = self
            .attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let record = attempts.entry(key.to_string()).or_default();

        while let Some(&oldest) = record.front() {
            if now.duration_since(oldest) > self.window {
                record.pop_front();
            } else {
                break;
            }
        }

        if record.len() >= self.max_attempts {
            warn!(key = %key, attempts = record.len(), "login attempts rate limited");
            return false;
        }
        record.push_back(now);
        true
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn admits_up_to_the_limit_then_denies() {
        let limiter = RateLimiter::new(5, Duration::from_secs(300));
        let results: Vec<bool> = (0..6).map(|_| limiter.allow("10.0.0.1")).collect();
        assert_eq!(results, [true, true, true, true, true, false]);
    }

    #[test]
    fn window_expiry_readmits() {
        let limiter = RateLimiter::new(2, Duration::from_millis(100));
        assert!(limiter.allow("k"));
        assert!(limiter.allow("k"));
        assert!(!limiter.allow("k"));

        thread::sleep(Duration::from_millis(150));
        assert!(limiter.allow("k"));
    }

    #[test]
    fn keys_are_tracked_independently() {
        let limiter = RateLimiter::new(1, Duration::from_secs(300));
        assert!(limiter.allow("a"));
        assert!(!limiter.allow("a"));
        assert!(limiter.allow("b"));
        assert_eq!(limiter.tracked_keys(), 2);
    }

    #[test]
    fn denied_attempts_are_not_recorded() {
        let limiter = RateLimiter::new(1, Duration::from_millis(100));
        assert!(limiter.allow("k"));
        // Hammering while denied must not extend the lockout.
        for _ in 0..10 {
            assert!(!limiter.allow("k"));
        }
        thread::sleep(Duration::from_millis(150));
        assert!(limiter.allow("k"));
    }

    #[test]
    fn concurrent_calls_respect_the_limit() {
        let limiter = Arc::new(RateLimiter::new(100, Duration::from_secs(300)));
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                thread::spawn(move || (0..10).filter(|_| limiter.allow("shared")).count())
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 100);
        assert!(!limiter.allow("shared"));
    }
}
