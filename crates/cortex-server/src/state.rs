//! Shared application state — the composition root's output.
//!
//! Process-wide state lives here and in the configuration; every
//! component below this takes its dependencies explicitly.

use std::sync::Arc;

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use cortex_agents::{CollaborationCoordinator, TaskService};
use cortex_auth::AccessControlService;
use cortex_cache::Cache;
use cortex_core::error::{CoreError, CoreResult};
use cortex_db::{
    SurrealAuditLogRepository, SurrealCollaborationRepository, SurrealMetricRepository,
    SurrealSessionRepository, SurrealTaskRepository, SurrealTenantRepository,
    SurrealUserRepository,
};
use cortex_insights::InsightsEngine;
use surrealdb::engine::remote::ws::Client;
use uuid::Uuid;

use crate::config::Config;
use crate::error::ApiError;

pub type Auth = AccessControlService<
    SurrealUserRepository<Client>,
    SurrealSessionRepository<Client>,
    SurrealAuditLogRepository<Client>,
>;
pub type Tasks = TaskService<SurrealTaskRepository<Client>, SurrealTenantRepository<Client>>;
pub type Coordinator = CollaborationCoordinator<
    SurrealCollaborationRepository<Client>,
    SurrealTaskRepository<Client>,
    SurrealTenantRepository<Client>,
>;
pub type Insights = InsightsEngine<SurrealMetricRepository<Client>>;

pub struct AppState {
    pub config: Config,
    pub auth: Auth,
    pub tenants: SurrealTenantRepository<Client>,
    pub audit: SurrealAuditLogRepository<Client>,
    pub tasks: Tasks,
    pub coordinator: Coordinator,
    pub insights: Insights,
    pub cache: Arc<Cache>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Wrap a component error for the HTTP surface; free-form detail
    /// is only exposed in development.
    pub fn fail(&self, error: impl Into<CoreError>) -> ApiError {
        ApiError::new(error, self.config.environment.is_development())
    }

    /// Resolve the tenant for a request from the `X-Tenant` header.
    /// Absent means the configured default tenant, which only exists
    /// in single-tenant deployments. Tenant identity is never inferred
    /// from the user alone.
    pub fn tenant_from_headers(&self, headers: &HeaderMap) -> CoreResult<Uuid> {
        match headers.get("x-tenant") {
            Some(value) => {
                let raw = value
                    .to_str()
                    .map_err(|_| CoreError::validation("x-tenant", "header is not valid text"))?;
                Uuid::parse_str(raw)
                    .map_err(|_| CoreError::validation("x-tenant", "header is not a UUID"))
            }
            None => self
                .default_tenant()
                .ok_or_else(|| CoreError::validation("x-tenant", "header is required")),
        }
    }

    fn default_tenant(&self) -> Option<Uuid> {
        self.config.default_tenant
    }
}

/// Extract the opaque bearer token from `Authorization`.
pub fn bearer_token(headers: &HeaderMap) -> CoreResult<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or(CoreError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc123"),
        );
        assert_eq!(bearer_token(&headers).unwrap(), "abc123");
    }

    #[test]
    fn missing_or_malformed_bearer_is_unauthorized() {
        let headers = HeaderMap::new();
        assert!(matches!(
            bearer_token(&headers),
            Err(CoreError::Unauthorized)
        ));

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Basic abc123"),
        );
        assert!(matches!(
            bearer_token(&headers),
            Err(CoreError::Unauthorized)
        ));
    }
}
