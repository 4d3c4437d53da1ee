//! Audit log domain model. Append-only; entries are never mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    User,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
    Denied,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub actor: Uuid,
    pub actor_type: ActorType,
    /// Action tag, e.g. `user.create` or `agent.control`.
    pub action: String,
    /// The entity acted upon, e.g. `user:3f2a…` or `agent:sales`.
    pub subject: String,
    pub outcome: AuditOutcome,
    pub detail: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuditEvent {
    pub tenant_id: Uuid,
    pub actor: Uuid,
    pub actor_type: ActorType,
    pub action: String,
    pub subject: String,
    pub outcome: AuditOutcome,
    pub detail: serde_json::Value,
}
