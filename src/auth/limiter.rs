use std::collections::HashMap;
use std::sync::Mutex;

use time::{Duration, OffsetDateTime};

pub const MAX_FAILURES: u32 = 5;
pub const WINDOW: Duration = Duration::minutes(15);

struct Window {
    count: u32,
    started_at: OffsetDateTime,
}

/// Process-local brake on login attempts, keyed by login. Coarse on
/// purpose: windows reset lazily, concurrent increments may race, and the
/// whole table dies with the process. A secondary defense, not the sole
/// brute-force control.
pub struct LoginLimiter {
    attempts: Mutex<HashMap<String, Window>>,
}

impl LoginLimiter {
    pub fn new() -> Self {
        Self {
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// True when the login has exhausted its failures for the current
    /// window. An elapsed window is dropped on first sight.
    pub fn is_blocked(&self, login: &str, now: OffsetDateTime) -> bool {
        let mut attempts = self.attempts.lock().unwrap();
        let expired = matches!(attempts.get(login), Some(w) if now - w.started_at >= WINDOW);
        if expired {
            attempts.remove(login);
            return false;
        }
        attempts
            .get(login)
            .map_or(false, |w| w.count >= MAX_FAILURES)
    }

    pub fn record_failure(&self, login: &str, now: OffsetDateTime) {
        let mut attempts = self.attempts.lock().unwrap();
        match attempts.get_mut(login) {
            Some(w) if now - w.started_at < WINDOW => w.count += 1,
            _ => {
                attempts.insert(
                    login.to_string(),
                    Window {
                        count: 1,
                        started_at: now,
                    },
                );
            }
        }
    }

    pub fn clear(&self, login: &str) {
        self.attempts.lock().unwrap().remove(login);
    }
}

impl Default for LoginLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2026-03-01 12:00 UTC);

    #[test]
    fn blocks_after_five_failures() {
        let limiter = LoginLimiter::new();
        for _ in 0..4 {
            limiter.record_failure("alice", NOW);
        }
        assert!(!limiter.is_blocked("alice", NOW));
        limiter.record_failure("alice", NOW);
        assert!(limiter.is_blocked("alice", NOW));
    }

    #[test]
    fn window_resets_lazily_after_expiry() {
        let limiter = LoginLimiter::new();
        for _ in 0..MAX_FAILURES {
            limiter.record_failure("bob", NOW);
        }
        assert!(limiter.is_blocked("bob", NOW + Duration::minutes(14)));
        assert!(!limiter.is_blocked("bob", NOW + WINDOW));
        // A failure after the window starts a fresh count.
        limiter.record_failure("bob", NOW + WINDOW);
        assert!(!limiter.is_blocked("bob", NOW + WINDOW));
    }

    #[test]
    fn success_clears_the_counter() {
        let limiter = LoginLimiter::new();
        for _ in 0..MAX_FAILURES {
            limiter.record_failure("carol", NOW);
        }
        assert!(limiter.is_blocked("carol", NOW));
        limiter.clear("carol");
        assert!(!limiter.is_blocked("carol", NOW));
    }

    #[test]
    fn logins_are_tracked_independently() {
        let limiter = LoginLimiter::new();
        for _ in 0..MAX_FAILURES {
            limiter.record_failure("dave", NOW);
        }
        assert!(limiter.is_blocked("dave", NOW));
        assert!(!limiter.is_blocked("erin", NOW));
    }
}
