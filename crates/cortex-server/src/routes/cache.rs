//! Cache statistics and prefix invalidation.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use cortex_auth::Subject;
use cortex_core::error::CoreError;
use cortex_core::models::audit::{ActorType, AuditOutcome, CreateAuditEvent};
use cortex_core::models::role::Permission;
use cortex_core::repository::AuditLogRepository;
use serde::Deserialize;

use crate::error::{ApiError, Envelope, ok};
use crate::state::{AppState, bearer_token};

pub async fn stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Envelope>, ApiError> {
    let tenant_id = state
        .tenant_from_headers(&headers)
        .map_err(|e| state.fail(e))?;
    let token = bearer_token(&headers).map_err(|e| state.fail(e))?;
    state
        .auth
        .validate(token, tenant_id, Permission::InsightRead, Subject::None)
        .await
        .map_err(|e| state.fail(e))?;

    let stats = state.cache.stats();
    let data = serde_json::to_value(&stats)
        .map_err(|e| state.fail(CoreError::Internal(e.to_string())))?;
    Ok(ok("cache statistics", data))
}

#[derive(Debug, Deserialize)]
pub struct ClearRequest {
    /// Key prefix within the tenant's namespace; empty clears all of
    /// the tenant's entries.
    #[serde(default)]
    pub prefix: String,
}

pub async fn clear(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ClearRequest>,
) -> Result<Json<Envelope>, ApiError> {
    let tenant_id = state
        .tenant_from_headers(&headers)
        .map_err(|e| state.fail(e))?;
    let token = bearer_token(&headers).map_err(|e| state.fail(e))?;

    let ctx = state
        .auth
        .validate(token, tenant_id, Permission::CacheClear, Subject::None)
        .await
        .map_err(|e| state.fail(e))?;

    let removed = state.cache.scoped(tenant_id).invalidate(&body.prefix);

    state
        .audit
        .append(CreateAuditEvent {
            tenant_id,
            actor: ctx.user_id,
            actor_type: ActorType::User,
            action: "cache.clear".into(),
            subject: format!("cache:{}", body.prefix),
            outcome: AuditOutcome::Success,
            detail: serde_json::json!({ "removed": removed }),
        })
        .await
        .map_err(|e| state.fail(e))?;

    Ok(ok(
        "cache invalidated",
        serde_json::json!({ "removed": removed }),
    ))
}
