//! Authentication error types.

use cortex_core::error::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong email or password. Deliberately indistinct.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is suspended")]
    AccountSuspended,

    #[error("session expired")]
    SessionExpired,

    #[error("session revoked")]
    SessionRevoked,

    /// Session issued before a password rotation.
    #[error("session superseded")]
    SessionSuperseded,

    #[error("too many failed attempts")]
    Throttled,

    #[error("password does not meet policy: {0}")]
    WeakPassword(String),

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<AuthError> for CoreError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials
            | AuthError::AccountSuspended
            | AuthError::SessionExpired
            | AuthError::SessionRevoked
            | AuthError::SessionSuperseded => CoreError::Unauthorized,
            AuthError::Throttled => CoreError::RateLimited,
            AuthError::WeakPassword(msg) => CoreError::Validation {
                field: "password".into(),
                message: msg,
            },
            AuthError::Crypto(msg) => CoreError::Internal(msg),
        }
    }
}
