//! Integration tests for the Tenant repository using in-memory
//! SurrealDB.

use cortex_core::error::CoreError;
use cortex_core::models::tenant::{
    Branding, CreateTenant, SubscriptionTier, TenantStatus, UpdateTenant,
};
use cortex_core::repository::{Pagination, TenantFilter, TenantRepository};
use cortex_db::SurrealTenantRepository;
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;

async fn setup() -> Surreal<surrealdb::engine::local::Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    cortex_db::run_migrations(&db).await.unwrap();
    db
}

fn input(domain: &str) -> CreateTenant {
    CreateTenant {
        display_name: "Acme".into(),
        primary_domain: domain.into(),
        tier: SubscriptionTier::Professional,
        branding: None,
        feature_flags: None,
    }
}

#[tokio::test]
async fn create_and_get_roundtrip() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    let branding: Branding = serde_json::from_value(serde_json::json!({
        "company_name": "Acme",
        "primary_color": "#112233",
        "footer_note": "kept verbatim"
    }))
    .unwrap();

    let created = repo
        .create(CreateTenant {
            branding: Some(branding.clone()),
            ..input("acme.example")
        })
        .await
        .unwrap();
    assert_eq!(created.status, TenantStatus::Active);
    assert_eq!(created.tier, SubscriptionTier::Professional);

    let fetched = repo.get_by_id(created.id).await.unwrap();
    assert_eq!(fetched.primary_domain, "acme.example");
    // Branding is stored and returned verbatim, unknown fields included.
    assert_eq!(fetched.branding, branding);

    let by_domain = repo.get_by_domain("acme.example").await.unwrap();
    assert_eq!(by_domain.id, created.id);
}

#[tokio::test]
async fn domain_is_unique_across_active_tenants() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    repo.create(input("shared.example")).await.unwrap();
    let err = repo.create(input("shared.example")).await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict { .. }));
}

#[tokio::test]
async fn suspended_tenant_frees_its_domain() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    let first = repo.create(input("recycled.example")).await.unwrap();
    repo.update(
        first.id,
        UpdateTenant {
            status: Some(TenantStatus::Suspended),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    // Uniqueness holds over active tenants only.
    let second = repo.create(input("recycled.example")).await.unwrap();
    assert_ne!(first.id, second.id);
}

#[tokio::test]
async fn tier_change_is_visible_on_next_read() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    let tenant = repo.create(input("upgrade.example")).await.unwrap();
    repo.update(
        tenant.id,
        UpdateTenant {
            tier: Some(SubscriptionTier::Enterprise),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let fetched = repo.get_by_id(tenant.id).await.unwrap();
    assert_eq!(fetched.tier, SubscriptionTier::Enterprise);
    assert_eq!(fetched.tier.quotas().tasks_per_day, 100_000);
}

#[tokio::test]
async fn list_filters_by_status() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    let a = repo.create(input("a.example")).await.unwrap();
    let b = repo.create(input("b.example")).await.unwrap();
    repo.update(
        b.id,
        UpdateTenant {
            status: Some(TenantStatus::Suspended),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let active = repo
        .list(
            TenantFilter {
                status: Some(TenantStatus::Active),
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(active.total, 1);
    assert_eq!(active.items[0].id, a.id);

    let all = repo
        .list(TenantFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(all.total, 2);
}

#[tokio::test]
async fn remove_is_a_hard_delete_for_compensation() {
    let db = setup().await;
    let repo = SurrealTenantRepository::new(db);

    let tenant = repo.create(input("doomed.example")).await.unwrap();
    repo.remove(tenant.id).await.unwrap();

    let err = repo.get_by_id(tenant.id).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
}
