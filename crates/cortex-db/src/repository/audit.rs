//! SurrealDB implementation of [`AuditLogRepository`]. Append-only.

use chrono::{DateTime, Utc};
use cortex_core::error::CoreResult;
use cortex_core::models::audit::{ActorType, AuditEvent, AuditOutcome, CreateAuditEvent};
use cortex_core::repository::{AuditFilter, AuditLogRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct AuditRow {
    tenant_id: String,
    actor: String,
    actor_type: String,
    action: String,
    subject: String,
    outcome: String,
    detail: serde_json::Value,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct AuditRowWithId {
    record_id: String,
    tenant_id: String,
    actor: String,
    actor_type: String,
    action: String,
    subject: String,
    outcome: String,
    detail: serde_json::Value,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn parse_actor_type(s: &str) -> Result<ActorType, DbError> {
    match s {
        "user" => Ok(ActorType::User),
        "system" => Ok(ActorType::System),
        other => Err(DbError::Decode(format!("unknown actor type: {other}"))),
    }
}

fn actor_type_to_string(a: ActorType) -> &'static str {
    match a {
        ActorType::User => "user",
        ActorType::System => "system",
    }
}

fn parse_outcome(s: &str) -> Result<AuditOutcome, DbError> {
    match s {
        "success" => Ok(AuditOutcome::Success),
        "failure" => Ok(AuditOutcome::Failure),
        "denied" => Ok(AuditOutcome::Denied),
        other => Err(DbError::Decode(format!("unknown audit outcome: {other}"))),
    }
}

fn outcome_to_string(o: AuditOutcome) -> &'static str {
    match o {
        AuditOutcome::Success => "success",
        AuditOutcome::Failure => "failure",
        AuditOutcome::Denied => "denied",
    }
}

fn build_event(
    id: Uuid,
    tenant_id: &str,
    actor: &str,
    actor_type: &str,
    action: String,
    subject: String,
    outcome: &str,
    detail: serde_json::Value,
    timestamp: DateTime<Utc>,
) -> Result<AuditEvent, DbError> {
    let tenant_id = Uuid::parse_str(tenant_id)
        .map_err(|e| DbError::Decode(format!("invalid tenant UUID: {e}")))?;
    let actor =
        Uuid::parse_str(actor).map_err(|e| DbError::Decode(format!("invalid actor UUID: {e}")))?;
    Ok(AuditEvent {
        id,
        tenant_id,
        actor,
        actor_type: parse_actor_type(actor_type)?,
        action,
        subject,
        outcome: parse_outcome(outcome)?,
        detail,
        timestamp,
    })
}

/// SurrealDB implementation of the audit log repository.
#[derive(Clone)]
pub struct SurrealAuditLogRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAuditLogRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AuditLogRepository for SurrealAuditLogRepository<C> {
    async fn append(&self, input: CreateAuditEvent) -> CoreResult<AuditEvent> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('audit_event', $id) SET \
                 tenant_id = $tenant_id, \
                 actor = $actor, \
                 actor_type = $actor_type, \
                 action = $action, \
                 subject = $subject, \
                 outcome = $outcome, \
                 detail = $detail",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("actor", input.actor.to_string()))
            .bind(("actor_type", actor_type_to_string(input.actor_type).to_string()))
            .bind(("action", input.action))
            .bind(("subject", input.subject))
            .bind(("outcome", outcome_to_string(input.outcome).to_string()))
            .bind(("detail", input.detail))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(DbError::from)?;
        let rows: Vec<AuditRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "audit_event".into(),
            id: id_str,
        })?;

        Ok(build_event(
            id,
            &row.tenant_id,
            &row.actor,
            &row.actor_type,
            row.action,
            row.subject,
            &row.outcome,
            row.detail,
            row.timestamp,
        )?)
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        filter: AuditFilter,
        pagination: Pagination,
    ) -> CoreResult<PaginatedResult<AuditEvent>> {
        let mut clauses = vec!["tenant_id = $tenant_id".to_string()];
        if filter.actor.is_some() {
            clauses.push("actor = $actor".to_string());
        }
        if filter.action.is_some() {
            clauses.push("action = $action".to_string());
        }
        if filter.from.is_some() {
            clauses.push("timestamp >= $from".to_string());
        }
        if filter.to.is_some() {
            clauses.push("timestamp < $to".to_string());
        }
        let where_clause = clauses.join(" AND ");

        let mut count_query = self
            .db
            .query(format!(
                "SELECT count() AS total FROM audit_event WHERE {where_clause} GROUP ALL"
            ))
            .bind(("tenant_id", tenant_id.to_string()));
        if let Some(actor) = filter.actor {
            count_query = count_query.bind(("actor", actor.to_string()));
        }
        if let Some(ref action) = filter.action {
            count_query = count_query.bind(("action", action.clone()));
        }
        if let Some(from) = filter.from {
            count_query = count_query.bind(("from", from));
        }
        if let Some(to) = filter.to {
            count_query = count_query.bind(("to", to));
        }
        let mut count_result = count_query.await.map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut list_query = self
            .db
            .query(format!(
                "SELECT meta::id(id) AS record_id, * FROM audit_event \
                 WHERE {where_clause} \
                 ORDER BY timestamp DESC LIMIT $limit START $offset"
            ))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .bind(("tenant_id", tenant_id.to_string()));
        if let Some(actor) = filter.actor {
            list_query = list_query.bind(("actor", actor.to_string()));
        }
        if let Some(ref action) = filter.action {
            list_query = list_query.bind(("action", action.clone()));
        }
        if let Some(from) = filter.from {
            list_query = list_query.bind(("from", from));
        }
        if let Some(to) = filter.to {
            list_query = list_query.bind(("to", to));
        }
        let mut result = list_query.await.map_err(DbError::from)?;

        let rows: Vec<AuditRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| {
                let id = Uuid::parse_str(&row.record_id)
                    .map_err(|e| DbError::Decode(format!("invalid UUID: {e}")))?;
                build_event(
                    id,
                    &row.tenant_id,
                    &row.actor,
                    &row.actor_type,
                    row.action,
                    row.subject,
                    &row.outcome,
                    row.detail,
                    row.timestamp,
                )
            })
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
