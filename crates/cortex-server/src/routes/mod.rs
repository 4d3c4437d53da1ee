//! HTTP routes — a thin decode/encode layer over the services.
//!
//! Handlers authenticate, resolve the tenant explicitly, translate
//! the request into service calls, and map errors onto the envelope.
//! No business logic lives here.

mod agents;
mod auth;
mod cache;
mod collaborations;
mod insights;
mod tenants;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Json, Router, extract::State};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::{Envelope, ok};
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/users", post(auth::create_user))
        .route("/tenants", post(tenants::create).get(tenants::list))
        .route("/tenants/reseller", post(tenants::create_reseller))
        .route("/agents/{kind}/tasks", post(agents::submit_task))
        .route("/agents/status", get(agents::status))
        .route("/agents/{kind}/control", post(agents::control))
        .route("/tasks/{id}", get(agents::get_task))
        .route("/collaborations", post(collaborations::initiate))
        .route("/collaborations/{id}/steps", post(collaborations::add_step))
        .route("/collaborations/{id}", get(collaborations::status))
        .route("/delegate", post(collaborations::delegate))
        .route("/insights/summary", get(insights::summary))
        .route("/insights/analyze", post(insights::analyze))
        .route("/cache/stats", get(cache::stats))
        .route("/cache/clear", post(cache::clear))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Envelope> {
    let uptime = (chrono::Utc::now() - state.started_at).num_seconds();
    ok(
        "ok",
        serde_json::json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_secs": uptime,
        }),
    )
}
