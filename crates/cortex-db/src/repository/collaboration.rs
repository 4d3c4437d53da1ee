//! SurrealDB implementation of [`CollaborationRepository`].

use chrono::{DateTime, Utc};
use cortex_core::error::CoreResult;
use cortex_core::models::agent::AgentKind;
use cortex_core::models::collaboration::{
    CollabStep, Collaboration, CollaborationStatus, CreateCollaboration,
};
use cortex_core::repository::CollaborationRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

#[derive(Debug, SurrealValue)]
struct CollabRow {
    tenant_id: String,
    orchestrator: String,
    participants: Vec<String>,
    goal: String,
    task_flow: Vec<serde_json::Value>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_status(s: &str) -> Result<CollaborationStatus, DbError> {
    match s {
        "pending" => Ok(CollaborationStatus::Pending),
        "in_progress" => Ok(CollaborationStatus::InProgress),
        "succeeded" => Ok(CollaborationStatus::Succeeded),
        "partial" => Ok(CollaborationStatus::Partial),
        "failed" => Ok(CollaborationStatus::Failed),
        other => Err(DbError::Decode(format!(
            "unknown collaboration status: {other}"
        ))),
    }
}

fn status_to_string(s: CollaborationStatus) -> &'static str {
    match s {
        CollaborationStatus::Pending => "pending",
        CollaborationStatus::InProgress => "in_progress",
        CollaborationStatus::Succeeded => "succeeded",
        CollaborationStatus::Partial => "partial",
        CollaborationStatus::Failed => "failed",
    }
}

impl CollabRow {
    fn into_collaboration(self, id: Uuid) -> Result<Collaboration, DbError> {
        let tenant_id = Uuid::parse_str(&self.tenant_id)
            .map_err(|e| DbError::Decode(format!("invalid tenant UUID: {e}")))?;
        let orchestrator = Uuid::parse_str(&self.orchestrator)
            .map_err(|e| DbError::Decode(format!("invalid orchestrator UUID: {e}")))?;
        let participants = self
            .participants
            .iter()
            .map(|p| {
                AgentKind::parse(p).ok_or_else(|| DbError::Decode(format!("unknown kind: {p}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let task_flow = self
            .task_flow
            .into_iter()
            .map(|v| {
                serde_json::from_value::<CollabStep>(v)
                    .map_err(|e| DbError::Decode(format!("task flow step: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Collaboration {
            id,
            tenant_id,
            orchestrator,
            participants,
            goal: self.goal,
            task_flow,
            status: parse_status(&self.status)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the Collaboration repository.
#[derive(Clone)]
pub struct SurrealCollaborationRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealCollaborationRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> CollaborationRepository for SurrealCollaborationRepository<C> {
    async fn create(&self, input: CreateCollaboration) -> CoreResult<Collaboration> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let participants: Vec<String> = input
            .participants
            .iter()
            .map(|p| p.as_str().to_string())
            .collect();

        let result = self
            .db
            .query(
                "CREATE type::record('collaboration', $id) SET \
                 tenant_id = $tenant_id, \
                 orchestrator = $orchestrator, \
                 participants = $participants, \
                 goal = $goal, \
                 task_flow = [], \
                 status = 'pending'",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("orchestrator", input.orchestrator.to_string()))
            .bind(("participants", participants))
            .bind(("goal", input.goal))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(DbError::from)?;
        let rows: Vec<CollabRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "collaboration".into(),
            id: id_str,
        })?;

        Ok(row.into_collaboration(id)?)
    }

    async fn get(&self, tenant_id: Uuid, id: Uuid) -> CoreResult<Collaboration> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT * FROM type::record('collaboration', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CollabRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "collaboration".into(),
            id: id_str,
        })?;

        Ok(row.into_collaboration(id)?)
    }

    async fn add_step(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        step: CollabStep,
    ) -> CoreResult<Collaboration> {
        let id_str = id.to_string();
        let step_blob = serde_json::to_value(&step).map_err(|e| DbError::Decode(e.to_string()))?;

        let result = self
            .db
            .query(
                "UPDATE type::record('collaboration', $id) SET \
                 task_flow += $step, \
                 updated_at = time::now() \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("step", step_blob))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(DbError::from)?;
        let rows: Vec<CollabRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "collaboration".into(),
            id: id_str,
        })?;

        Ok(row.into_collaboration(id)?)
    }

    async fn update_status(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        status: CollaborationStatus,
    ) -> CoreResult<()> {
        self.db
            .query(
                "UPDATE type::record('collaboration', $id) SET \
                 status = $status, \
                 updated_at = time::now() \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("status", status_to_string(status).to_string()))
            .await
            .map_err(DbError::from)?;
        Ok(())
    }

    async fn archive_completed(&self, older_than: DateTime<Utc>) -> CoreResult<u64> {
        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM collaboration \
                 WHERE status IN ['succeeded', 'partial', 'failed'] \
                 AND updated_at < $cutoff GROUP ALL",
            )
            .bind(("cutoff", older_than))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = rows.first().map(|r| r.total).unwrap_or(0);

        self.db
            .query(
                "DELETE collaboration \
                 WHERE status IN ['succeeded', 'partial', 'failed'] \
                 AND updated_at < $cutoff",
            )
            .bind(("cutoff", older_than))
            .await
            .map_err(DbError::from)?;

        Ok(total)
    }
}
