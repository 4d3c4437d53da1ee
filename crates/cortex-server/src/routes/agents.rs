//! Agent task submission, status, control, and task lookup.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use cortex_auth::Subject;
use cortex_core::error::CoreError;
use cortex_core::models::agent::{AgentKind, ControlOp};
use cortex_core::models::audit::{ActorType, AuditOutcome, CreateAuditEvent};
use cortex_core::models::role::Permission;
use cortex_core::models::task::CreateTask;
use cortex_core::repository::AuditLogRepository;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ApiError, Envelope, ok};
use crate::state::{AppState, bearer_token};

fn parse_kind(state: &AppState, raw: &str) -> Result<AgentKind, ApiError> {
    AgentKind::parse(raw)
        .ok_or_else(|| state.fail(CoreError::validation("kind", "unknown agent kind")))
}

#[derive(Debug, Deserialize)]
pub struct SubmitTaskRequest {
    pub payload: serde_json::Value,
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub deadline: Option<chrono::DateTime<chrono::Utc>>,
}

pub async fn submit_task(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    headers: HeaderMap,
    Json(body): Json<SubmitTaskRequest>,
) -> Result<Json<Envelope>, ApiError> {
    let tenant_id = state
        .tenant_from_headers(&headers)
        .map_err(|e| state.fail(e))?;
    let token = bearer_token(&headers).map_err(|e| state.fail(e))?;
    let kind = parse_kind(&state, &kind)?;

    let ctx = state
        .auth
        .validate(token, tenant_id, Permission::AgentSubmit, Subject::None)
        .await
        .map_err(|e| state.fail(e))?;

    let task = state
        .tasks
        .submit(CreateTask {
            id: body.id,
            tenant_id,
            agent_kind: kind,
            submitted_by: ctx.user_id,
            payload: body.payload,
            priority: body.priority.unwrap_or(0),
            deadline: body.deadline,
            parent_id: None,
        })
        .await
        .map_err(|e| state.fail(e))?;

    let data =
        serde_json::to_value(&task).map_err(|e| state.fail(CoreError::Internal(e.to_string())))?;
    Ok(ok("task submitted", data))
}

pub async fn status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Envelope>, ApiError> {
    let tenant_id = state
        .tenant_from_headers(&headers)
        .map_err(|e| state.fail(e))?;
    let token = bearer_token(&headers).map_err(|e| state.fail(e))?;
    state
        .auth
        .resolve_session(token, tenant_id)
        .await
        .map_err(|e| state.fail(e))?;

    let descriptors = state.tasks.registry().describe_all(tenant_id);
    let data = serde_json::to_value(&descriptors)
        .map_err(|e| state.fail(CoreError::Internal(e.to_string())))?;
    Ok(ok("agent status", serde_json::json!({ "agents": data })))
}

#[derive(Debug, Deserialize)]
pub struct ControlRequest {
    pub op: ControlOp,
}

pub async fn control(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    headers: HeaderMap,
    Json(body): Json<ControlRequest>,
) -> Result<Json<Envelope>, ApiError> {
    let tenant_id = state
        .tenant_from_headers(&headers)
        .map_err(|e| state.fail(e))?;
    let token = bearer_token(&headers).map_err(|e| state.fail(e))?;
    let kind = parse_kind(&state, &kind)?;

    let ctx = state
        .auth
        .validate(token, tenant_id, Permission::AgentControl, Subject::None)
        .await
        .map_err(|e| state.fail(e))?;

    let descriptor = state
        .tasks
        .registry()
        .control(tenant_id, kind, body.op)
        .await
        .map_err(|e| state.fail(e))?;

    state
        .audit
        .append(CreateAuditEvent {
            tenant_id,
            actor: ctx.user_id,
            actor_type: ActorType::User,
            action: "agent.control".into(),
            subject: format!("agent:{}", kind.as_str()),
            outcome: AuditOutcome::Success,
            detail: serde_json::json!({ "op": body.op }),
        })
        .await
        .map_err(|e| state.fail(e))?;

    let data = serde_json::to_value(&descriptor)
        .map_err(|e| state.fail(CoreError::Internal(e.to_string())))?;
    Ok(ok("control applied", data))
}

pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Envelope>, ApiError> {
    let tenant_id = state
        .tenant_from_headers(&headers)
        .map_err(|e| state.fail(e))?;
    let token = bearer_token(&headers).map_err(|e| state.fail(e))?;

    state
        .auth
        .resolve_session(token, tenant_id)
        .await
        .map_err(|e| state.fail(e))?;

    // Tenant-scoped fetch first: a task owned by another tenant is a
    // plain not-found, indistinguishable from a missing one.
    let task = state
        .tasks
        .get_task(tenant_id, id)
        .await
        .map_err(|e| state.fail(e))?;

    state
        .auth
        .validate(
            token,
            tenant_id,
            Permission::TaskViewOwn,
            Subject::Owner(task.submitted_by),
        )
        .await
        .map_err(|e| state.fail(e))?;

    let data =
        serde_json::to_value(&task).map_err(|e| state.fail(CoreError::Internal(e.to_string())))?;
    Ok(ok("task", data))
}
