//! Insights endpoints: performance summaries and on-demand analysis.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use cortex_auth::Subject;
use cortex_core::error::CoreError;
use cortex_core::models::role::Permission;
use serde::Deserialize;

use crate::error::{ApiError, Envelope, ok};
use crate::state::{AppState, bearer_token};

const MAX_WINDOW_HOURS: i64 = 24 * 90;

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    #[serde(default)]
    pub hours: Option<i64>,
}

fn window_hours(state: &AppState, hours: Option<i64>) -> Result<i64, ApiError> {
    let hours = hours.unwrap_or(24);
    if !(1..=MAX_WINDOW_HOURS).contains(&hours) {
        return Err(state.fail(CoreError::validation(
            "hours",
            format!("must be between 1 and {MAX_WINDOW_HOURS}"),
        )));
    }
    Ok(hours)
}

pub async fn summary(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<WindowQuery>,
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

    let hours = window_hours(&state, query.hours)?;
    let to = Utc::now();
    let from = to - Duration::hours(hours);

    let summary = state
        .insights
        .summarize(tenant_id, from, to)
        .await
        .map_err(|e| state.fail(e))?;
    let recent = state.insights.recent(tenant_id, from);

    let summary_blob = serde_json::to_value(&summary)
        .map_err(|e| state.fail(CoreError::Internal(e.to_string())))?;
    let insights_blob = serde_json::to_value(&recent)
        .map_err(|e| state.fail(CoreError::Internal(e.to_string())))?;
    Ok(ok(
        "performance summary",
        serde_json::json!({
            "summary": summary_blob,
            "insights": insights_blob,
        }),
    ))
}

pub async fn analyze(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<WindowQuery>,
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

    let hours = window_hours(&state, body.hours)?;
    let to = Utc::now();
    let from = to - Duration::hours(hours);

    let insights = state
        .insights
        .analyze(tenant_id, from, to)
        .await
        .map_err(|e| state.fail(e))?;

    let data = serde_json::to_value(&insights)
        .map_err(|e| state.fail(CoreError::Internal(e.to_string())))?;
    Ok(ok(
        "analysis complete",
        serde_json::json!({
            "insights_generated": insights.len(),
            "insights": data,
        }),
    ))
}
