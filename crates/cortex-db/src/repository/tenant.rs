//! SurrealDB implementation of [`TenantRepository`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use cortex_core::error::CoreResult;
use cortex_core::models::tenant::{
    Branding, CreateTenant, SubscriptionTier, Tenant, TenantStatus, UpdateTenant,
};
use cortex_core::repository::{PaginatedResult, Pagination, TenantFilter, TenantRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct TenantRow {
    display_name: String,
    primary_domain: String,
    branding: serde_json::Value,
    tier: String,
    feature_flags: serde_json::Value,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct TenantRowWithId {
    record_id: String,
    display_name: String,
    primary_domain: String,
    branding: serde_json::Value,
    tier: String,
    feature_flags: serde_json::Value,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn parse_status(s: &str) -> Result<TenantStatus, DbError> {
    match s {
        "active" => Ok(TenantStatus::Active),
        "suspended" => Ok(TenantStatus::Suspended),
        other => Err(DbError::Decode(format!("unknown tenant status: {other}"))),
    }
}

fn status_to_string(s: &TenantStatus) -> &'static str {
    match s {
        TenantStatus::Active => "active",
        TenantStatus::Suspended => "suspended",
    }
}

fn parse_tier(s: &str) -> Result<SubscriptionTier, DbError> {
    SubscriptionTier::parse(s).ok_or_else(|| DbError::Decode(format!("unknown tier: {s}")))
}

fn decode_branding(value: serde_json::Value) -> Result<Branding, DbError> {
    serde_json::from_value(value).map_err(|e| DbError::Decode(format!("branding blob: {e}")))
}

fn decode_flags(value: serde_json::Value) -> Result<BTreeMap<String, bool>, DbError> {
    serde_json::from_value(value).map_err(|e| DbError::Decode(format!("feature flags: {e}")))
}

impl TenantRow {
    fn into_tenant(self, id: Uuid) -> Result<Tenant, DbError> {
        Ok(Tenant {
            id,
            display_name: self.display_name,
            primary_domain: self.primary_domain,
            branding: decode_branding(self.branding)?,
            tier: parse_tier(&self.tier)?,
            feature_flags: decode_flags(self.feature_flags)?,
            status: parse_status(&self.status)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl TenantRowWithId {
    fn try_into_tenant(self) -> Result<Tenant, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Decode(format!("invalid UUID: {e}")))?;
        Ok(Tenant {
            id,
            display_name: self.display_name,
            primary_domain: self.primary_domain,
            branding: decode_branding(self.branding)?,
            tier: parse_tier(&self.tier)?,
            feature_flags: decode_flags(self.feature_flags)?,
            status: parse_status(&self.status)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the Tenant repository.
#[derive(Clone)]
pub struct SurrealTenantRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTenantRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// True when an *active* tenant already claims the domain.
    async fn domain_taken(&self, domain: &str) -> Result<bool, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM tenant \
                 WHERE primary_domain = $domain AND status = 'active' \
                 GROUP ALL",
            )
            .bind(("domain", domain.to_string()))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
    }
}

impl<C: Connection> TenantRepository for SurrealTenantRepository<C> {
    async fn create(&self, input: CreateTenant) -> CoreResult<Tenant> {
        if self.domain_taken(&input.primary_domain).await? {
            return Err(DbError::Conflict {
                entity: format!("tenant domain {}", input.primary_domain),
            }
            .into());
        }

        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let branding = serde_json::to_value(input.branding.unwrap_or_default())
            .map_err(|e| DbError::Decode(e.to_string()))?;
        let feature_flags = serde_json::to_value(input.feature_flags.unwrap_or_default())
            .map_err(|e| DbError::Decode(e.to_string()))?;

        let result = self
            .db
            .query(
                "CREATE type::record('tenant', $id) SET \
                 display_name = $display_name, \
                 primary_domain = $primary_domain, \
                 branding = $branding, \
                 tier = $tier, \
                 feature_flags = $feature_flags, \
                 status = 'active'",
            )
            .bind(("id", id_str.clone()))
            .bind(("display_name", input.display_name))
            .bind(("primary_domain", input.primary_domain))
            .bind(("branding", branding))
            .bind(("tier", input.tier.as_str().to_string()))
            .bind(("feature_flags", feature_flags))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(DbError::from)?;
        let rows: Vec<TenantRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "tenant".into(),
            id: id_str,
        })?;

        Ok(row.into_tenant(id)?)
    }

    async fn get_by_id(&self, id: Uuid) -> CoreResult<Tenant> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('tenant', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "tenant".into(),
            id: id_str,
        })?;

        Ok(row.into_tenant(id)?)
    }

    async fn get_by_domain(&self, domain: &str) -> CoreResult<Tenant> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM tenant \
                 WHERE primary_domain = $domain AND status = 'active'",
            )
            .bind(("domain", domain.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "tenant".into(),
            id: format!("domain={domain}"),
        })?;

        Ok(row.try_into_tenant()?)
    }

    async fn update(&self, id: Uuid, input: UpdateTenant) -> CoreResult<Tenant> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.display_name.is_some() {
            sets.push("display_name = $display_name");
        }
        if input.branding.is_some() {
            sets.push("branding = $branding");
        }
        if input.tier.is_some() {
            sets.push("tier = $tier");
        }
        if input.feature_flags.is_some() {
            sets.push("feature_flags = $feature_flags");
        }
        if input.status.is_some() {
            sets.push("status = $status");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('tenant', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));
        if let Some(display_name) = input.display_name {
            builder = builder.bind(("display_name", display_name));
        }
        if let Some(branding) = input.branding {
            let blob =
                serde_json::to_value(branding).map_err(|e| DbError::Decode(e.to_string()))?;
            builder = builder.bind(("branding", blob));
        }
        if let Some(tier) = input.tier {
            builder = builder.bind(("tier", tier.as_str().to_string()));
        }
        if let Some(flags) = input.feature_flags {
            let blob = serde_json::to_value(flags).map_err(|e| DbError::Decode(e.to_string()))?;
            builder = builder.bind(("feature_flags", blob));
        }
        if let Some(ref status) = input.status {
            builder = builder.bind(("status", status_to_string(status).to_string()));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<TenantRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "tenant".into(),
            id: id_str,
        })?;

        Ok(row.into_tenant(id)?)
    }

    async fn list(
        &self,
        filter: TenantFilter,
        pagination: Pagination,
    ) -> CoreResult<PaginatedResult<Tenant>> {
        let status_clause = match filter.status {
            Some(ref s) => format!("WHERE status = '{}'", status_to_string(s)),
            None => String::new(),
        };

        let mut count_result = self
            .db
            .query(format!(
                "SELECT count() AS total FROM tenant {status_clause} GROUP ALL"
            ))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(format!(
                "SELECT meta::id(id) AS record_id, * FROM tenant {status_clause} \
                 ORDER BY created_at ASC LIMIT $limit START $offset"
            ))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_tenant())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn remove(&self, id: Uuid) -> CoreResult<()> {
        self.db
            .query("DELETE type::record('tenant', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;
        Ok(())
    }
}
