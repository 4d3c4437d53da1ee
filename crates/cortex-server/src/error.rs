//! Error-to-HTTP mapping and the response envelope.
//!
//! Every response shares `{success, message, data}`. Error kinds map
//! onto fixed status codes; structured fields that are part of the
//! contract (missing permission, exceeded quota dimension) are always
//! present, while free-form detail is exposed only in development.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cortex_core::error::CoreError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Envelope {
    pub success: bool,
    pub message: String,
    pub data: serde_json::Value,
}

/// A successful envelope with payload.
pub fn ok(message: impl Into<String>, data: serde_json::Value) -> Json<Envelope> {
    Json(Envelope {
        success: true,
        message: message.into(),
        data,
    })
}

#[derive(Debug)]
pub struct ApiError {
    error: CoreError,
    expose_detail: bool,
}

impl ApiError {
    pub fn new(error: impl Into<CoreError>, expose_detail: bool) -> Self {
        Self {
            error: error.into(),
            expose_detail,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, mut data) = match &self.error {
            CoreError::Validation { field, .. } => (
                StatusCode::BAD_REQUEST,
                "validation failed".to_string(),
                serde_json::json!({ "field": field }),
            ),
            CoreError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized".to_string(),
                serde_json::json!({}),
            ),
            CoreError::Forbidden { permission } => (
                StatusCode::FORBIDDEN,
                "forbidden".to_string(),
                serde_json::json!({ "missing": permission }),
            ),
            CoreError::NotFound { entity, .. } => (
                StatusCode::NOT_FOUND,
                format!("{entity} not found"),
                serde_json::json!({}),
            ),
            CoreError::Conflict { .. } => (
                StatusCode::CONFLICT,
                "conflict".to_string(),
                serde_json::json!({}),
            ),
            CoreError::QuotaExceeded {
                dimension,
                retry_after_secs,
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                "quota exceeded".to_string(),
                serde_json::json!({
                    "dimension": dimension,
                    "retry_after_secs": retry_after_secs,
                }),
            ),
            CoreError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate limited".to_string(),
                serde_json::json!({}),
            ),
            CoreError::Unavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service unavailable".to_string(),
                serde_json::json!({}),
            ),
            CoreError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
                serde_json::json!({}),
            ),
        };

        if self.expose_detail
            && let Some(obj) = data.as_object_mut()
        {
            obj.insert(
                "detail".into(),
                serde_json::Value::String(self.error.to_string()),
            );
        }

        let body = Json(Envelope {
            success: false,
            message,
            data,
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: CoreError) -> StatusCode {
        ApiError::new(err, false).into_response().status()
    }

    #[test]
    fn taxonomy_maps_to_status_codes() {
        assert_eq!(
            status_of(CoreError::validation("f", "m")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(CoreError::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(CoreError::Forbidden {
                permission: "agent.submit".into()
            }),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(CoreError::not_found("task", "x")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(CoreError::conflict("tenant")),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(CoreError::quota("tasks_per_day", Some(60))),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_of(CoreError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_of(CoreError::Unavailable("db".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(CoreError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
