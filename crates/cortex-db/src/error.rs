//! Database-specific error types and conversions.

use cortex_core::error::CoreError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("record decode failed: {0}")]
    Decode(String),

    #[error("record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("conflict on {entity}")]
    Conflict { entity: String },
}

impl From<DbError> for CoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => CoreError::NotFound { entity, id },
            DbError::Conflict { entity } => CoreError::Conflict { entity },
            DbError::Surreal(e) => CoreError::Unavailable(e.to_string()),
            other => CoreError::Internal(other.to_string()),
        }
    }
}
