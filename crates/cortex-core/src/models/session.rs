//! Session domain model.
//!
//! Session tokens are opaque to clients; only a SHA-256 hash of the
//! raw token is persisted. Revocation is immediate and single-use.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    /// The user's password version at issue time. A mismatch against
    /// the current user record invalidates the session.
    pub password_version: u32,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSession {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub password_version: u32,
    pub expires_at: DateTime<Utc>,
}
