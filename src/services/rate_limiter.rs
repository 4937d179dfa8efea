//! Login throttling.
//!
//! Tracks failed-login windows per email so credential stuffing gets cut
//! off after a handful of attempts. Rate limiting is in-memory and resets
//! on process restart. Safe to share via `Arc<RateLimiter>` across async
//! tasks.

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::Mutex;

/// Login attempts allowed per window before the email is blocked.
pub const LOGIN_MAX_ATTEMPTS: usize = 5;
/// Window length for login throttling, in seconds.
pub const LOGIN_WINDOW_SECS: u64 = 900;

/// In-memory rate limiter — tracks per-key attempt timestamps.
pub struct RateLimiter {
    attempts: Mutex<HashMap<String, Vec<Instant>>>,
    max_attempts: usize,
    window_secs: u64,
}

impl RateLimiter {
    pub fn new(max_attempts: usize, window_secs: u64) -> Self {
        Self {
            attempts: Mutex::new(HashMap::new()),
            max_attempts,
            window_secs,
        }
    }

    /// Limiter with the standard login quota.
    pub fn for_login() -> Self {
        Self::new(LOGIN_MAX_ATTEMPTS, LOGIN_WINDOW_SECS)
    }

    /// Check `key` against the limit. Returns `true` if the request is allowed,
    /// `false` if it is rate-limited. Records the attempt on `true`.
    pub fn check_and_record(&self, key: &str) -> bool {
        let mut attempts = self.attempts.lock();
        let now = Instant::now();
        let window = std::time::Duration::from_secs(self.window_secs);

        let entry = attempts.entry(key.to_string()).or_default();
        entry.retain(|t| now.duration_since(*t) < window);

        if entry.len() >= self.max_attempts {
            return false;
        }
        entry.push(now);
        true
    }

    /// Remove entries that have expired (call periodically to free memory).
    pub fn cleanup(&self) {
        let mut attempts = self.attempts.lock();
        let now = Instant::now();
        let window = std::time::Duration::from_secs(self.window_secs);
        attempts.retain(|_, entries| {
            entries.retain(|t| now.duration_since(*t) < window);
            !entries.is_empty()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limiter_allows_within_limit() {
        let l = RateLimiter::new(3, 60);
        assert!(l.check_and_record("a@b.com"));
        assert!(l.check_and_record("a@b.com"));
        assert!(l.check_and_record("a@b.com"));
    }

    #[test]
    fn rate_limiter_blocks_over_limit() {
        let l = RateLimiter::new(3, 60);
        l.check_and_record("a@b.com");
        l.check_and_record("a@b.com");
        l.check_and_record("a@b.com");
        assert!(!l.check_and_record("a@b.com"));
    }

    #[test]
    fn rate_limiter_keys_are_independent() {
        let l = RateLimiter::new(2, 60);
        l.check_and_record("user1@b.com");
        l.check_and_record("user1@b.com");
        assert!(!l.check_and_record("user1@b.com")); // blocked

        assert!(l.check_and_record("user2@b.com")); // independent
    }

    #[test]
    fn login_limiter_uses_standard_quota() {
        let l = RateLimiter::for_login();
        for _ in 0..LOGIN_MAX_ATTEMPTS {
            assert!(l.check_and_record("a@b.com"));
        }
        assert!(!l.check_and_record("a@b.com"));
    }
}
