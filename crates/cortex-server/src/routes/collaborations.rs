//! Collaboration and delegation endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use cortex_auth::Subject;
use cortex_core::error::CoreError;
use cortex_core::models::agent::AgentKind;
use cortex_core::models::collaboration::CreateCollaboration;
use cortex_core::models::role::Permission;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ApiError, Envelope, ok};
use crate::state::{AppState, bearer_token};

#[derive(Debug, Deserialize)]
pub struct InitiateRequest {
    pub participants: Vec<String>,
    pub goal: String,
}

pub async fn initiate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<InitiateRequest>,
) -> Result<Json<Envelope>, ApiError> {
    let tenant_id = state
        .tenant_from_headers(&headers)
        .map_err(|e| state.fail(e))?;
    let token = bearer_token(&headers).map_err(|e| state.fail(e))?;

    let ctx = state
        .auth
        .validate(token, tenant_id, Permission::CollabInitiate, Subject::None)
        .await
        .map_err(|e| state.fail(e))?;

    let participants = body
        .participants
        .iter()
        .map(|raw| {
            AgentKind::parse(raw).ok_or_else(|| {
                state.fail(CoreError::validation("participants", "unknown agent kind"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let collab = state
        .coordinator
        .initiate(CreateCollaboration {
            tenant_id,
            orchestrator: ctx.user_id,
            participants,
            goal: body.goal,
        })
        .await
        .map_err(|e| state.fail(e))?;

    let data = serde_json::to_value(&collab)
        .map_err(|e| state.fail(CoreError::Internal(e.to_string())))?;
    Ok(ok("collaboration initiated", data))
}

#[derive(Debug, Deserialize)]
pub struct AddStepRequest {
    pub agent_kind: String,
    pub payload: serde_json::Value,
    #[serde(default)]
    pub priority: Option<i32>,
}

pub async fn add_step(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<AddStepRequest>,
) -> Result<Json<Envelope>, ApiError> {
    let tenant_id = state
        .tenant_from_headers(&headers)
        .map_err(|e| state.fail(e))?;
    let token = bearer_token(&headers).map_err(|e| state.fail(e))?;

    let ctx = state
        .auth
        .validate(token, tenant_id, Permission::CollabInitiate, Subject::None)
        .await
        .map_err(|e| state.fail(e))?;

    let kind = AgentKind::parse(&body.agent_kind)
        .ok_or_else(|| state.fail(CoreError::validation("agent_kind", "unknown agent kind")))?;

    let task = state
        .coordinator
        .add_step(
            tenant_id,
            id,
            kind,
            body.payload,
            ctx.user_id,
            body.priority.unwrap_or(0),
        )
        .await
        .map_err(|e| state.fail(e))?;

    let data =
        serde_json::to_value(&task).map_err(|e| state.fail(CoreError::Internal(e.to_string())))?;
    Ok(ok("step added", data))
}

pub async fn status(
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

    let (collab, status) = state
        .coordinator
        .status(tenant_id, id)
        .await
        .map_err(|e| state.fail(e))?;

    let collab_blob = serde_json::to_value(&collab)
        .map_err(|e| state.fail(CoreError::Internal(e.to_string())))?;
    Ok(ok(
        "collaboration status",
        serde_json::json!({
            "collaboration": collab_blob,
            "status": status,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct DelegateRequest {
    pub to_agent: String,
    pub payload: serde_json::Value,
    #[serde(default)]
    pub collaboration_id: Option<Uuid>,
}

pub async fn delegate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<DelegateRequest>,
) -> Result<Json<Envelope>, ApiError> {
    let tenant_id = state
        .tenant_from_headers(&headers)
        .map_err(|e| state.fail(e))?;
    let token = bearer_token(&headers).map_err(|e| state.fail(e))?;

    // Delegation is allowed with either collab.initiate or
    // agent.submit; the denied audit names the weaker permission.
    let ctx = state
        .auth
        .resolve_session(token, tenant_id)
        .await
        .map_err(|e| state.fail(e))?;
    if !ctx.role.has(Permission::CollabInitiate) && !ctx.role.has(Permission::AgentSubmit) {
        state
            .auth
            .validate(token, tenant_id, Permission::AgentSubmit, Subject::None)
            .await
            .map_err(|e| state.fail(e))?;
    }

    let kind = AgentKind::parse(&body.to_agent)
        .ok_or_else(|| state.fail(CoreError::validation("to_agent", "unknown agent kind")))?;

    let task = state
        .coordinator
        .delegate(
            tenant_id,
            ctx.user_id,
            kind,
            body.payload,
            body.collaboration_id,
        )
        .await
        .map_err(|e| state.fail(e))?;

    let data =
        serde_json::to_value(&task).map_err(|e| state.fail(CoreError::Internal(e.to_string())))?;
    Ok(ok("task delegated", data))
}
