//! Authentication configuration.

/// Configuration for the access control service.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Session lifetime in seconds (default: 7200 = 2 hours).
    pub session_ttl_secs: u64,
    /// Optional pepper prepended to passwords before Argon2id
    /// verification. Must match the pepper used at hash time.
    pub pepper: Option<String>,
    /// Minimum password length for policy enforcement.
    pub min_password_length: usize,
    /// Failed logins allowed per identifier before throttling.
    pub max_failed_attempts: u32,
    /// Sliding window for the failed-login counter, in seconds.
    pub failure_window_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: 7_200,
            pepper: None,
            min_password_length: 12,
            max_failed_attempts: 5,
            failure_window_secs: 3_600,
        }
    }
}
