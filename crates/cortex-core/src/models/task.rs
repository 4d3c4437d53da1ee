//! Task domain model and state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::agent::AgentKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskState {
    /// Legal transitions: `queued → running → (succeeded | failed |
    /// cancelled)` or `queued → cancelled`. Terminal states are
    /// immutable.
    pub fn can_transition_to(&self, to: TaskState) -> bool {
        matches!(
            (self, to),
            (TaskState::Queued, TaskState::Running)
                | (TaskState::Queued, TaskState::Cancelled)
                | (TaskState::Running, TaskState::Succeeded)
                | (TaskState::Running, TaskState::Failed)
                | (TaskState::Running, TaskState::Cancelled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Failed | TaskState::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Queued => "queued",
            TaskState::Running => "running",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
            TaskState::Cancelled => "cancelled",
        }
    }
}

/// How a failure is classified by the dispatcher. Transient causes are
/// retried with backoff; permanent and cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Transient,
    Permanent,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskError {
    pub class: ErrorClass,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub agent_kind: AgentKind,
    pub submitted_by: Uuid,
    pub payload: serde_json::Value,
    /// Higher runs first; ties break by submission time.
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
    pub state: TaskState,
    pub attempt_count: u32,
    /// Set when this task is a resubmission of a terminally-failed one.
    pub parent_id: Option<Uuid>,
    pub result: Option<serde_json::Value>,
    pub error: Option<TaskError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTask {
    /// Caller-supplied id for idempotent submission; generated when
    /// absent. Re-submitting an existing id is a conflict.
    #[serde(default)]
    pub id: Option<Uuid>,
    pub tenant_id: Uuid,
    pub agent_kind: AgentKind,
    pub submitted_by: Uuid,
    pub payload: serde_json::Value,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

/// Fields a dispatcher may patch alongside a state transition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    pub attempt_count: Option<u32>,
    pub result: Option<serde_json::Value>,
    pub error: Option<TaskError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_transitions() {
        assert!(TaskState::Queued.can_transition_to(TaskState::Running));
        assert!(TaskState::Queued.can_transition_to(TaskState::Cancelled));
        assert!(TaskState::Running.can_transition_to(TaskState::Succeeded));
        assert!(TaskState::Running.can_transition_to(TaskState::Failed));
        assert!(TaskState::Running.can_transition_to(TaskState::Cancelled));
    }

    #[test]
    fn terminal_states_are_immutable() {
        for terminal in [TaskState::Succeeded, TaskState::Failed, TaskState::Cancelled] {
            assert!(terminal.is_terminal());
            for to in [
                TaskState::Queued,
                TaskState::Running,
                TaskState::Succeeded,
                TaskState::Failed,
                TaskState::Cancelled,
            ] {
                assert!(!terminal.can_transition_to(to));
            }
        }
    }

    #[test]
    fn queued_cannot_skip_to_succeeded() {
        assert!(!TaskState::Queued.can_transition_to(TaskState::Succeeded));
        assert!(!TaskState::Queued.can_transition_to(TaskState::Failed));
    }
}
