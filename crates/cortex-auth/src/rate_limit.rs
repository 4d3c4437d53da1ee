//! Sliding-window throttle for failed authentication attempts.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Tracks failed attempts per identifier (e.g. `tenant:email`) inside
/// a sliding window. Once the limit is reached, further attempts are
/// throttled until old failures age out.
pub struct FailureThrottle {
    max_attempts: u32,
    window: Duration,
    attempts: Mutex<HashMap<String, Vec<DateTime<Utc>>>>,
}

impl FailureThrottle {
    pub fn new(max_attempts: u32, window_secs: u64) -> Self {
        Self {
            max_attempts,
            window: Duration::seconds(window_secs as i64),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// True when the identifier has exhausted its attempt budget.
    pub fn is_throttled(&self, identifier: &str) -> bool {
        let cutoff = Utc::now() - self.window;
        let mut attempts = self.attempts.lock().expect("throttle lock poisoned");
        match attempts.get_mut(identifier) {
            Some(entries) => {
                entries.retain(|t| *t > cutoff);
                entries.len() >= self.max_attempts as usize
            }
            None => false,
        }
    }

    pub fn record_failure(&self, identifier: &str) {
        let mut attempts = self.attempts.lock().expect("throttle lock poisoned");
        attempts
            .entry(identifier.to_string())
            .or_default()
            .push(Utc::now());
    }

    /// Clear the counter after a successful authentication.
    pub fn reset(&self, identifier: &str) {
        let mut attempts = self.attempts.lock().expect("throttle lock poisoned");
        attempts.remove(identifier);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttles_after_limit() {
        let throttle = FailureThrottle::new(3, 3600);
        assert!(!throttle.is_throttled("a@x"));
        for _ in 0..3 {
            throttle.record_failure("a@x");
        }
        assert!(throttle.is_throttled("a@x"));
        // Other identifiers are unaffected.
        assert!(!throttle.is_throttled("b@x"));
    }

    #[test]
    fn reset_clears_counter() {
        let throttle = FailureThrottle::new(2, 3600);
        throttle.record_failure("a@x");
        throttle.record_failure("a@x");
        assert!(throttle.is_throttled("a@x"));
        throttle.reset("a@x");
        assert!(!throttle.is_throttled("a@x"));
    }
}
