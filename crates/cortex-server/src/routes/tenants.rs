//! Tenant provisioning endpoints. All of them require the platform
//! administrator role.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use cortex_auth::{AuthContext, Subject, token};
use cortex_core::error::{CoreError, CoreResult};
use cortex_core::models::audit::{ActorType, AuditOutcome, CreateAuditEvent};
use cortex_core::models::role::{Permission, Role};
use cortex_core::models::tenant::{
    Branding, CreateResellerPackage, CreateTenant, SubscriptionTier, TenantStatus,
    reseller_feature_flags,
};
use cortex_core::models::user::CreateUser;
use cortex_core::repository::{AuditLogRepository, Pagination, TenantFilter, TenantRepository};
use serde::Deserialize;
use tracing::warn;

use crate::error::{ApiError, Envelope, ok};
use crate::state::{AppState, bearer_token};

async fn require_super_admin(
    state: &AppState,
    headers: &HeaderMap,
    permission: Permission,
) -> CoreResult<AuthContext> {
    let tenant_id = state.tenant_from_headers(headers)?;
    let token = bearer_token(headers)?;
    let ctx = state
        .auth
        .validate(token, tenant_id, permission, Subject::None)
        .await?;
    if ctx.role != Role::SuperAdmin {
        return Err(CoreError::Forbidden {
            permission: permission.as_str().into(),
        });
    }
    Ok(ctx)
}

#[derive(Debug, Deserialize)]
pub struct CreateTenantRequest {
    pub display_name: String,
    pub primary_domain: String,
    pub tier: String,
    #[serde(default)]
    pub branding: Option<Branding>,
    #[serde(default)]
    pub feature_flags: Option<std::collections::BTreeMap<String, bool>>,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateTenantRequest>,
) -> Result<Json<Envelope>, ApiError> {
    let ctx = require_super_admin(&state, &headers, Permission::TenantWrite)
        .await
        .map_err(|e| state.fail(e))?;

    let tier = SubscriptionTier::parse(&body.tier)
        .ok_or_else(|| state.fail(CoreError::validation("tier", "unknown subscription tier")))?;

    let tenant = state
        .tenants
        .create(CreateTenant {
            display_name: body.display_name,
            primary_domain: body.primary_domain,
            tier,
            branding: body.branding,
            feature_flags: body.feature_flags,
        })
        .await
        .map_err(|e| state.fail(e))?;

    // The audit event is part of the mutation; a failed append rolls
    // the tenant row back rather than leaving it unaudited.
    let audited = state
        .audit
        .append(CreateAuditEvent {
            tenant_id: ctx.tenant_id,
            actor: ctx.user_id,
            actor_type: ActorType::User,
            action: "tenant.create".into(),
            subject: format!("tenant:{}", tenant.id),
            outcome: AuditOutcome::Success,
            detail: serde_json::json!({ "domain": tenant.primary_domain }),
        })
        .await;
    if let Err(e) = audited {
        if let Err(cleanup) = state.tenants.remove(tenant.id).await {
            warn!(error = %cleanup, "tenant rollback compensation failed");
        }
        return Err(state.fail(e));
    }

    let data = serde_json::to_value(&tenant)
        .map_err(|e| state.fail(CoreError::Internal(e.to_string())))?;
    Ok(ok("tenant created", data))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Envelope>, ApiError> {
    require_super_admin(&state, &headers, Permission::TenantRead)
        .await
        .map_err(|e| state.fail(e))?;

    let status = match query.status.as_deref() {
        Some(raw) => Some(
            TenantStatus::parse(raw)
                .ok_or_else(|| state.fail(CoreError::validation("status", "unknown status")))?,
        ),
        None => None,
    };

    let page = state
        .tenants
        .list(
            TenantFilter { status },
            Pagination {
                offset: query.offset.unwrap_or(0),
                limit: query.limit.unwrap_or(50),
            },
        )
        .await
        .map_err(|e| state.fail(e))?;

    let items = serde_json::to_value(&page.items)
        .map_err(|e| state.fail(CoreError::Internal(e.to_string())))?;
    Ok(ok(
        "tenants listed",
        serde_json::json!({
            "tenants": items,
            "total": page.total,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct ResellerRequest {
    pub display_name: String,
    pub primary_domain: String,
    #[serde(default)]
    pub branding: Option<Branding>,
}

pub async fn create_reseller(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ResellerRequest>,
) -> Result<Json<Envelope>, ApiError> {
    let ctx = require_super_admin(&state, &headers, Permission::TenantWrite)
        .await
        .map_err(|e| state.fail(e))?;

    let input = CreateResellerPackage {
        display_name: body.display_name,
        primary_domain: body.primary_domain,
        branding: body.branding,
    };

    let tenant = state
        .tenants
        .create(CreateTenant {
            display_name: input.display_name,
            primary_domain: input.primary_domain.clone(),
            tier: SubscriptionTier::Professional,
            branding: input.branding,
            feature_flags: Some(reseller_feature_flags()),
        })
        .await
        .map_err(|e| state.fail(e))?;

    // Generated credential material: an API user whose password is
    // returned exactly once. Any later failure deletes the partial
    // tenant row.
    let api_key = format!("Api9!{}", token::generate_session_token());
    let api_email = format!("api@{}", input.primary_domain);
    let provisioned = state
        .auth
        .create_user(
            ctx.user_id,
            CreateUser {
                tenant_id: tenant.id,
                email: api_email.clone(),
                password: api_key.clone(),
                role: Role::ApiUser,
            },
        )
        .await;
    if let Err(e) = provisioned {
        if let Err(cleanup) = state.tenants.remove(tenant.id).await {
            warn!(error = %cleanup, "reseller rollback compensation failed");
        }
        return Err(state.fail(e));
    }

    let audited = state
        .audit
        .append(CreateAuditEvent {
            tenant_id: ctx.tenant_id,
            actor: ctx.user_id,
            actor_type: ActorType::User,
            action: "tenant.create_reseller".into(),
            subject: format!("tenant:{}", tenant.id),
            outcome: AuditOutcome::Success,
            detail: serde_json::json!({ "domain": tenant.primary_domain }),
        })
        .await;
    if let Err(e) = audited {
        if let Err(cleanup) = state.tenants.remove(tenant.id).await {
            warn!(error = %cleanup, "reseller rollback compensation failed");
        }
        return Err(state.fail(e));
    }

    let tenant_blob = serde_json::to_value(&tenant)
        .map_err(|e| state.fail(CoreError::Internal(e.to_string())))?;
    Ok(ok(
        "reseller package created",
        serde_json::json!({
            "tenant": tenant_blob,
            "api_email": api_email,
            "api_key": api_key,
        }),
    ))
}
