//! SurrealDB implementation of [`TaskRepository`].
//!
//! State transitions are compare-and-set: the stored state must still
//! match the expected one or the transition fails with a conflict.
//! This is what makes "a task leaves the queue exactly once" hold even
//! with a racing cancel.

use chrono::{DateTime, Utc};
use cortex_core::error::CoreResult;
use cortex_core::models::agent::AgentKind;
use cortex_core::models::task::{CreateTask, Task, TaskError, TaskPatch, TaskState};
use cortex_core::repository::{PaginatedResult, Pagination, TaskFilter, TaskRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct TaskRow {
    tenant_id: String,
    agent_kind: String,
    submitted_by: String,
    payload: serde_json::Value,
    priority: i32,
    created_at: DateTime<Utc>,
    deadline: Option<DateTime<Utc>>,
    state: String,
    attempt_count: u32,
    parent_id: Option<String>,
    result: Option<serde_json::Value>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, SurrealValue)]
struct TaskRowWithId {
    record_id: String,
    tenant_id: String,
    agent_kind: String,
    submitted_by: String,
    payload: serde_json::Value,
    priority: i32,
    created_at: DateTime<Utc>,
    deadline: Option<DateTime<Utc>>,
    state: String,
    attempt_count: u32,
    parent_id: Option<String>,
    result: Option<serde_json::Value>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn parse_state(s: &str) -> Result<TaskState, DbError> {
    match s {
        "queued" => Ok(TaskState::Queued),
        "running" => Ok(TaskState::Running),
        "succeeded" => Ok(TaskState::Succeeded),
        "failed" => Ok(TaskState::Failed),
        "cancelled" => Ok(TaskState::Cancelled),
        other => Err(DbError::Decode(format!("unknown task state: {other}"))),
    }
}

fn parse_kind(s: &str) -> Result<AgentKind, DbError> {
    AgentKind::parse(s).ok_or_else(|| DbError::Decode(format!("unknown agent kind: {s}")))
}

#[allow(clippy::too_many_arguments)]
fn build_task(
    id: Uuid,
    tenant_id: &str,
    agent_kind: &str,
    submitted_by: &str,
    payload: serde_json::Value,
    priority: i32,
    created_at: DateTime<Utc>,
    deadline: Option<DateTime<Utc>>,
    state: &str,
    attempt_count: u32,
    parent_id: Option<String>,
    result: Option<serde_json::Value>,
    error: Option<serde_json::Value>,
) -> Result<Task, DbError> {
    let tenant_id = Uuid::parse_str(tenant_id)
        .map_err(|e| DbError::Decode(format!("invalid tenant UUID: {e}")))?;
    let submitted_by = Uuid::parse_str(submitted_by)
        .map_err(|e| DbError::Decode(format!("invalid submitter UUID: {e}")))?;
    let parent_id = parent_id
        .map(|p| Uuid::parse_str(&p))
        .transpose()
        .map_err(|e| DbError::Decode(format!("invalid parent UUID: {e}")))?;
    let error: Option<TaskError> = error
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| DbError::Decode(format!("task error blob: {e}")))?;
    Ok(Task {
        id,
        tenant_id,
        agent_kind: parse_kind(agent_kind)?,
        submitted_by,
        payload,
        priority,
        created_at,
        deadline,
        state: parse_state(state)?,
        attempt_count,
        parent_id,
        result,
        error,
    })
}

impl TaskRow {
    fn into_task(self, id: Uuid) -> Result<Task, DbError> {
        build_task(
            id,
            &self.tenant_id,
            &self.agent_kind,
            &self.submitted_by,
            self.payload,
            self.priority,
            self.created_at,
            self.deadline,
            &self.state,
            self.attempt_count,
            self.parent_id,
            self.result,
            self.error,
        )
    }
}

impl TaskRowWithId {
    fn try_into_task(self) -> Result<Task, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Decode(format!("invalid UUID: {e}")))?;
        build_task(
            id,
            &self.tenant_id,
            &self.agent_kind,
            &self.submitted_by,
            self.payload,
            self.priority,
            self.created_at,
            self.deadline,
            &self.state,
            self.attempt_count,
            self.parent_id,
            self.result,
            self.error,
        )
    }
}

/// SurrealDB implementation of the Task repository.
#[derive(Clone)]
pub struct SurrealTaskRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTaskRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn exists(&self, id: Uuid) -> Result<bool, DbError> {
        let mut result = self
            .db
            .query("SELECT count() AS total FROM type::record('task', $id) GROUP ALL")
            .bind(("id", id.to_string()))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
    }
}

impl<C: Connection> TaskRepository for SurrealTaskRepository<C> {
    async fn create(&self, input: CreateTask) -> CoreResult<Task> {
        let id = input.id.unwrap_or_else(Uuid::new_v4);
        if self.exists(id).await? {
            return Err(DbError::Conflict {
                entity: format!("task {id}"),
            }
            .into());
        }

        let id_str = id.to_string();
        let result = self
            .db
            .query(
                "CREATE type::record('task', $id) SET \
                 tenant_id = $tenant_id, \
                 agent_kind = $agent_kind, \
                 submitted_by = $submitted_by, \
                 payload = $payload, \
                 priority = $priority, \
                 deadline = $deadline, \
                 state = 'queued', \
                 attempt_count = 0, \
                 parent_id = $parent_id, \
                 result = NONE, \
                 error = NONE",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("agent_kind", input.agent_kind.as_str().to_string()))
            .bind(("submitted_by", input.submitted_by.to_string()))
            .bind(("payload", input.payload))
            .bind(("priority", input.priority))
            .bind(("deadline", input.deadline))
            .bind(("parent_id", input.parent_id.map(|p| p.to_string())))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(DbError::from)?;
        let rows: Vec<TaskRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "task".into(),
            id: id_str,
        })?;

        Ok(row.into_task(id)?)
    }

    async fn get(&self, tenant_id: Uuid, id: Uuid) -> CoreResult<Task> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT * FROM type::record('task', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TaskRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "task".into(),
            id: id_str,
        })?;

        Ok(row.into_task(id)?)
    }

    async fn transition(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        from: TaskState,
        to: TaskState,
        patch: TaskPatch,
    ) -> CoreResult<Task> {
        if !from.can_transition_to(to) {
            return Err(DbError::Conflict {
                entity: format!("task {id} transition {} -> {}", from.as_str(), to.as_str()),
            }
            .into());
        }

        let id_str = id.to_string();

        let mut sets = vec!["state = $to"];
        if patch.attempt_count.is_some() {
            sets.push("attempt_count = $attempt_count");
        }
        if patch.result.is_some() {
            sets.push("result = $result");
        }
        if patch.error.is_some() {
            sets.push("error = $error");
        }

        let query = format!(
            "UPDATE type::record('task', $id) SET {} \
             WHERE tenant_id = $tenant_id AND state = $from",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("from", from.as_str().to_string()))
            .bind(("to", to.as_str().to_string()));

        if let Some(attempt_count) = patch.attempt_count {
            builder = builder.bind(("attempt_count", attempt_count));
        }
        if let Some(result) = patch.result {
            builder = builder.bind(("result", result));
        }
        if let Some(ref error) = patch.error {
            let blob = serde_json::to_value(error).map_err(|e| DbError::Decode(e.to_string()))?;
            builder = builder.bind(("error", blob));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::from)?;
        let rows: Vec<TaskRow> = result.take(0).map_err(DbError::from)?;

        match rows.into_iter().next() {
            Some(row) => Ok(row.into_task(id)?),
            None => {
                // Nothing matched: the record is gone, belongs to a
                // different tenant, or the precondition failed.
                match self.get(tenant_id, id).await {
                    Ok(_) => Err(DbError::Conflict {
                        entity: format!("task {id} state precondition"),
                    }
                    .into()),
                    Err(e) => Err(e),
                }
            }
        }
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        filter: TaskFilter,
        pagination: Pagination,
    ) -> CoreResult<PaginatedResult<Task>> {
        let mut clauses = vec!["tenant_id = $tenant_id".to_string()];
        if let Some(kind) = filter.agent_kind {
            clauses.push(format!("agent_kind = '{}'", kind.as_str()));
        }
        if let Some(state) = filter.state {
            clauses.push(format!("state = '{}'", state.as_str()));
        }
        let where_clause = clauses.join(" AND ");

        let mut count_result = self
            .db
            .query(format!(
                "SELECT count() AS total FROM task WHERE {where_clause} GROUP ALL"
            ))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(format!(
                "SELECT meta::id(id) AS record_id, * FROM task \
                 WHERE {where_clause} \
                 ORDER BY created_at ASC LIMIT $limit START $offset"
            ))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TaskRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_task())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn count_since(&self, tenant_id: Uuid, since: DateTime<Utc>) -> CoreResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM task \
                 WHERE tenant_id = $tenant_id AND created_at >= $since \
                 GROUP ALL",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("since", since))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }
}
