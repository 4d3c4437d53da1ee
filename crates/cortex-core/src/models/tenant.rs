//! Tenant domain model.
//!
//! Tenants provide full data isolation: users, agents, tasks,
//! collaborations, cache entries, and telemetry are all scoped to a
//! tenant. Tenants are never deleted while referenced; they are
//! suspended instead.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    Active,
    Suspended,
}

impl TenantStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(TenantStatus::Active),
            "suspended" => Some(TenantStatus::Suspended),
            _ => None,
        }
    }
}

/// Subscription tier. Each tier maps to a fixed quota bundle; tier
/// changes take effect on the next task dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    Starter,
    Professional,
    Enterprise,
}

/// Per-tenant limits derived from the subscription tier.
///
/// `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaBundle {
    pub max_agents: Option<u32>,
    pub max_users: Option<u32>,
    pub tasks_per_day: u64,
    pub cache_entries: u64,
    pub concurrent_tasks_per_agent: u32,
}

impl SubscriptionTier {
    /// The authoritative quota bundle for each tier.
    pub fn quotas(&self) -> QuotaBundle {
        match self {
            SubscriptionTier::Starter => QuotaBundle {
                max_agents: Some(3),
                max_users: Some(10),
                tasks_per_day: 5_000,
                cache_entries: 1_000,
                concurrent_tasks_per_agent: 2,
            },
            SubscriptionTier::Professional => QuotaBundle {
                max_agents: Some(10),
                max_users: Some(50),
                tasks_per_day: 25_000,
                cache_entries: 10_000,
                concurrent_tasks_per_agent: 8,
            },
            SubscriptionTier::Enterprise => QuotaBundle {
                max_agents: None,
                max_users: None,
                tasks_per_day: 100_000,
                cache_entries: 100_000,
                concurrent_tasks_per_agent: 32,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Starter => "starter",
            SubscriptionTier::Professional => "professional",
            SubscriptionTier::Enterprise => "enterprise",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "starter" => Some(SubscriptionTier::Starter),
            "professional" => Some(SubscriptionTier::Professional),
            "enterprise" => Some(SubscriptionTier::Enterprise),
            _ => None,
        }
    }
}

/// White-label branding. The core treats the known fields as a schema
/// and preserves anything else verbatim in `extra` so that frontend
/// additions survive round-trips.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Branding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_color: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub display_name: String,
    /// Unique across active tenants.
    pub primary_domain: String,
    pub branding: Branding,
    pub tier: SubscriptionTier,
    pub feature_flags: BTreeMap<String, bool>,
    pub status: TenantStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTenant {
    pub display_name: String,
    pub primary_domain: String,
    pub tier: SubscriptionTier,
    #[serde(default)]
    pub branding: Option<Branding>,
    #[serde(default)]
    pub feature_flags: Option<BTreeMap<String, bool>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTenant {
    pub display_name: Option<String>,
    pub branding: Option<Branding>,
    pub tier: Option<SubscriptionTier>,
    pub feature_flags: Option<BTreeMap<String, bool>>,
    pub status: Option<TenantStatus>,
}

/// Input for reseller package creation: tenant creation sugar with a
/// fixed feature bundle and generated API credential material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResellerPackage {
    pub display_name: String,
    pub primary_domain: String,
    #[serde(default)]
    pub branding: Option<Branding>,
}

/// A provisioned reseller package. `api_key` is returned exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResellerPackage {
    pub tenant: Tenant,
    pub api_key: String,
}

/// The feature flags every reseller tenant starts with.
pub fn reseller_feature_flags() -> BTreeMap<String, bool> {
    BTreeMap::from([
        ("white_label".to_string(), true),
        ("custom_branding".to_string(), true),
        ("api_access".to_string(), true),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_quotas_match_catalogue() {
        let starter = SubscriptionTier::Starter.quotas();
        assert_eq!(starter.tasks_per_day, 5_000);
        assert_eq!(starter.concurrent_tasks_per_agent, 2);

        let enterprise = SubscriptionTier::Enterprise.quotas();
        assert_eq!(enterprise.max_agents, None);
        assert_eq!(enterprise.cache_entries, 100_000);
    }

    #[test]
    fn branding_preserves_unknown_fields() {
        let raw = serde_json::json!({
            "company_name": "Acme",
            "accent_font": "Inter"
        });
        let branding: Branding = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(branding.company_name.as_deref(), Some("Acme"));
        assert_eq!(
            branding.extra.get("accent_font"),
            Some(&serde_json::Value::String("Inter".into()))
        );
        // Round-trip keeps the unknown field.
        let back = serde_json::to_value(&branding).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn tier_parse_roundtrip() {
        for tier in [
            SubscriptionTier::Starter,
            SubscriptionTier::Professional,
            SubscriptionTier::Enterprise,
        ] {
            assert_eq!(SubscriptionTier::parse(tier.as_str()), Some(tier));
        }
        assert_eq!(SubscriptionTier::parse("platinum"), None);
    }
}
