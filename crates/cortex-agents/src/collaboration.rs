//! Multi-agent collaboration coordination.
//!
//! A collaboration is an ordered list of steps the orchestrator grows
//! one task at a time. Step ordering is orchestrator-driven: adding a
//! step never waits on earlier steps, and a failed step never cancels
//! its siblings — the orchestrator decides what to submit next.

use cortex_core::error::CoreResult;
use cortex_core::models::agent::AgentKind;
use cortex_core::models::collaboration::{
    CollabStep, Collaboration, CollaborationStatus, CreateCollaboration,
};
use cortex_core::models::task::{CreateTask, Task};
use cortex_core::repository::{CollaborationRepository, TaskRepository, TenantRepository};
use tracing::warn;
use uuid::Uuid;

use crate::dispatch::TaskService;

pub struct CollaborationCoordinator<C, T, Ten> {
    collabs: C,
    service: TaskService<T, Ten>,
}

impl<C, T, Ten> CollaborationCoordinator<C, T, Ten>
where
    C: CollaborationRepository,
    T: TaskRepository + Clone + 'static,
    Ten: TenantRepository + Clone + 'static,
{
    pub fn new(collabs: C, service: TaskService<T, Ten>) -> Self {
        Self { collabs, service }
    }

    /// Create a collaboration with an empty task flow.
    pub async fn initiate(&self, input: CreateCollaboration) -> CoreResult<Collaboration> {
        self.collabs.create(input).await
    }

    /// Append a step: submit the underlying task and record it in the
    /// flow. Returns the submitted task.
    pub async fn add_step(
        &self,
        tenant_id: Uuid,
        collab_id: Uuid,
        agent_kind: AgentKind,
        payload: serde_json::Value,
        actor: Uuid,
        priority: i32,
    ) -> CoreResult<Task> {
        // Tenant-scoped existence check before any task is created.
        self.collabs.get(tenant_id, collab_id).await?;

        let task = self
            .service
            .submit(CreateTask {
                id: None,
                tenant_id,
                agent_kind,
                submitted_by: actor,
                payload,
                priority,
                deadline: None,
                parent_id: None,
            })
            .await?;

        self.collabs
            .add_step(
                tenant_id,
                collab_id,
                CollabStep {
                    agent_kind,
                    task_id: task.id,
                },
            )
            .await?;

        Ok(task)
    }

    /// Delegate a task to another agent kind, optionally attributed to
    /// a collaboration. Permission checks happen at the surface.
    pub async fn delegate(
        &self,
        tenant_id: Uuid,
        actor: Uuid,
        to_agent: AgentKind,
        payload: serde_json::Value,
        in_collab: Option<Uuid>,
    ) -> CoreResult<Task> {
        match in_collab {
            Some(collab_id) => {
                self.add_step(tenant_id, collab_id, to_agent, payload, actor, 0)
                    .await
            }
            None => {
                self.service
                    .submit(CreateTask {
                        id: None,
                        tenant_id,
                        agent_kind: to_agent,
                        submitted_by: actor,
                        payload,
                        priority: 0,
                        deadline: None,
                        parent_id: None,
                    })
                    .await
            }
        }
    }

    /// Aggregate child task states into the collaboration status and
    /// persist it. An empty flow is `pending`, never an error.
    pub async fn status(
        &self,
        tenant_id: Uuid,
        collab_id: Uuid,
    ) -> CoreResult<(Collaboration, CollaborationStatus)> {
        let collab = self.collabs.get(tenant_id, collab_id).await?;

        let mut states = Vec::with_capacity(collab.task_flow.len());
        for step in &collab.task_flow {
            match self.service.get_task(tenant_id, step.task_id).await {
                Ok(task) => states.push(task.state),
                Err(e) => {
                    // Steps reference tasks weakly; a missing record is
                    // logged and skipped rather than failing the view.
                    warn!(
                        collab_id = %collab_id,
                        task_id = %step.task_id,
                        error = %e,
                        "collaboration step task missing"
                    );
                }
            }
        }

        let status = CollaborationStatus::aggregate(&states);
        if status != collab.status {
            self.collabs
                .update_status(tenant_id, collab_id, status)
                .await?;
        }

        Ok((collab, status))
    }
}
