//! Authentication and user management endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use cortex_auth::Subject;
use cortex_core::models::role::{Permission, Role};
use cortex_core::models::user::CreateUser;
use cortex_core::error::CoreError;
use serde::Deserialize;

use crate::error::{ApiError, Envelope, ok};
use crate::state::{AppState, bearer_token};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Envelope>, ApiError> {
    let tenant_id = state
        .tenant_from_headers(&headers)
        .map_err(|e| state.fail(e))?;

    let issued = state
        .auth
        .authenticate(tenant_id, &body.email, &body.password)
        .await
        .map_err(|e| state.fail(e))?;

    Ok(ok(
        "authenticated",
        serde_json::json!({
            "token": issued.token,
            "expires_at": issued.session.expires_at,
            "user_id": issued.session.user_id,
        }),
    ))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Envelope>, ApiError> {
    let token = bearer_token(&headers).map_err(|e| state.fail(e))?;
    state.auth.revoke(token).await.map_err(|e| state.fail(e))?;
    Ok(ok("session revoked", serde_json::json!({})))
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub role: String,
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateUserRequest>,
) -> Result<Json<Envelope>, ApiError> {
    let tenant_id = state
        .tenant_from_headers(&headers)
        .map_err(|e| state.fail(e))?;
    let token = bearer_token(&headers).map_err(|e| state.fail(e))?;

    let ctx = state
        .auth
        .validate(token, tenant_id, Permission::UserManage, Subject::None)
        .await
        .map_err(|e| state.fail(e))?;

    let role = Role::parse(&body.role)
        .ok_or_else(|| state.fail(CoreError::validation("role", "unknown role")))?;

    let user = state
        .auth
        .create_user(
            ctx.user_id,
            CreateUser {
                tenant_id,
                email: body.email,
                password: body.password,
                role,
            },
        )
        .await
        .map_err(|e| state.fail(e))?;

    Ok(ok(
        "user created",
        serde_json::json!({
            "id": user.id,
            "email": user.email,
            "role": user.role,
            "status": user.status,
        }),
    ))
}
