//! Collaboration domain model.
//!
//! A collaboration is an orchestrated sequence of tasks across agent
//! kinds. It references its child tasks weakly, by id; tasks never
//! back-reference collaborations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::agent::AgentKind;
use super::task::TaskState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaborationStatus {
    Pending,
    InProgress,
    Succeeded,
    Partial,
    Failed,
}

impl CollaborationStatus {
    /// Aggregate child task states into a collaboration status.
    ///
    /// An empty task flow is `Pending`, not an error.
    pub fn aggregate(states: &[TaskState]) -> CollaborationStatus {
        if states.is_empty() {
            return CollaborationStatus::Pending;
        }
        let any_open = states.iter().any(|s| !s.is_terminal());
        if any_open {
            return CollaborationStatus::InProgress;
        }
        let succeeded = states
            .iter()
            .filter(|s| **s == TaskState::Succeeded)
            .count();
        if succeeded == states.len() {
            CollaborationStatus::Succeeded
        } else if succeeded > 0 {
            CollaborationStatus::Partial
        } else {
            CollaborationStatus::Failed
        }
    }
}

/// One step of a collaboration's task flow, in submission order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollabStep {
    pub agent_kind: AgentKind,
    pub task_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collaboration {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub orchestrator: Uuid,
    pub participants: Vec<AgentKind>,
    pub goal: String,
    pub task_flow: Vec<CollabStep>,
    pub status: CollaborationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCollaboration {
    pub tenant_id: Uuid,
    pub orchestrator: Uuid,
    pub participants: Vec<AgentKind>,
    pub goal: String,
}
