//! Error taxonomy for the Cortex control plane.
//!
//! This is the closed set of error kinds that crosses component
//! boundaries. Layer-specific errors (database, auth, provider) convert
//! into it; the HTTP surface performs the final mapping to status codes.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Input failed a declared constraint. Carries the offending field.
    #[error("validation failed on {field}: {message}")]
    Validation { field: String, message: String },

    /// No session, invalid session, or revoked session. No further
    /// detail is leaked to callers.
    #[error("unauthorized")]
    Unauthorized,

    /// Authenticated but lacking a permission. Carries the missing tag.
    #[error("missing permission: {permission}")]
    Forbidden { permission: String },

    /// Subject does not exist in tenant scope. A subject owned by
    /// another tenant reports the same kind (anti-enumeration).
    #[error("not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// Uniqueness or precondition violation.
    #[error("conflict: {entity}")]
    Conflict { entity: String },

    /// A tenant limit was hit.
    #[error("quota exceeded: {dimension}")]
    QuotaExceeded {
        dimension: String,
        retry_after_secs: Option<u64>,
    },

    /// Per-caller throttle engaged.
    #[error("rate limited")]
    RateLimited,

    /// A downstream dependency is transiently down.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn conflict(entity: impl Into<String>) -> Self {
        Self::Conflict {
            entity: entity.into(),
        }
    }

    pub fn quota(dimension: impl Into<String>, retry_after_secs: Option<u64>) -> Self {
        Self::QuotaExceeded {
            dimension: dimension.into(),
            retry_after_secs,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
