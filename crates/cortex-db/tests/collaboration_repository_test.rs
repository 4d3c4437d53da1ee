//! Integration tests for the Collaboration repository.

use chrono::{Duration, Utc};
use cortex_core::error::CoreError;
use cortex_core::models::agent::AgentKind;
use cortex_core::models::collaboration::{
    CollabStep, CollaborationStatus, CreateCollaboration,
};
use cortex_core::models::tenant::{CreateTenant, SubscriptionTier};
use cortex_core::repository::{CollaborationRepository, TenantRepository};
use cortex_db::{SurrealCollaborationRepository, SurrealTenantRepository};
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use uuid::Uuid;

async fn setup() -> (Surreal<surrealdb::engine::local::Db>, Uuid) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    cortex_db::run_migrations(&db).await.unwrap();

    let tenants = SurrealTenantRepository::new(db.clone());
    let tenant = tenants
        .create(CreateTenant {
            display_name: "Test Tenant".into(),
            primary_domain: "test.example".into(),
            tier: SubscriptionTier::Professional,
            branding: None,
            feature_flags: None,
        })
        .await
        .unwrap();

    (db, tenant.id)
}

fn collab(tenant_id: Uuid) -> CreateCollaboration {
    CreateCollaboration {
        tenant_id,
        orchestrator: Uuid::new_v4(),
        participants: vec![AgentKind::Content, AgentKind::Analytics],
        goal: "quarterly review".into(),
    }
}

#[tokio::test]
async fn create_starts_pending_with_empty_flow() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealCollaborationRepository::new(db);

    let created = repo.create(collab(tenant_id)).await.unwrap();
    assert_eq!(created.status, CollaborationStatus::Pending);
    assert!(created.task_flow.is_empty());
    assert_eq!(
        created.participants,
        vec![AgentKind::Content, AgentKind::Analytics]
    );

    let fetched = repo.get(tenant_id, created.id).await.unwrap();
    assert_eq!(fetched.goal, "quarterly review");
}

#[tokio::test]
async fn steps_append_in_order() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealCollaborationRepository::new(db);
    let created = repo.create(collab(tenant_id)).await.unwrap();

    let first = Uuid::new_v4();
    let second = Uuid::new_v4();
    repo.add_step(
        tenant_id,
        created.id,
        CollabStep {
            agent_kind: AgentKind::Content,
            task_id: first,
        },
    )
    .await
    .unwrap();
    let updated = repo
        .add_step(
            tenant_id,
            created.id,
            CollabStep {
                agent_kind: AgentKind::Analytics,
                task_id: second,
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.task_flow.len(), 2);
    assert_eq!(updated.task_flow[0].task_id, first);
    assert_eq!(updated.task_flow[1].task_id, second);
}

#[tokio::test]
async fn status_update_roundtrips() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealCollaborationRepository::new(db);
    let created = repo.create(collab(tenant_id)).await.unwrap();

    repo.update_status(tenant_id, created.id, CollaborationStatus::Partial)
        .await
        .unwrap();
    let fetched = repo.get(tenant_id, created.id).await.unwrap();
    assert_eq!(fetched.status, CollaborationStatus::Partial);
}

#[tokio::test]
async fn other_tenants_cannot_see_it() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealCollaborationRepository::new(db);
    let created = repo.create(collab(tenant_id)).await.unwrap();

    let err = repo.get(Uuid::new_v4(), created.id).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
}

#[tokio::test]
async fn archive_removes_only_old_completed_flows() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealCollaborationRepository::new(db);

    let finished = repo.create(collab(tenant_id)).await.unwrap();
    repo.update_status(tenant_id, finished.id, CollaborationStatus::Succeeded)
        .await
        .unwrap();
    let open = repo.create(collab(tenant_id)).await.unwrap();

    // Nothing is old enough yet.
    let archived = repo
        .archive_completed(Utc::now() - Duration::days(30))
        .await
        .unwrap();
    assert_eq!(archived, 0);

    // With a future cutoff the completed one goes, the pending stays.
    let archived = repo
        .archive_completed(Utc::now() + Duration::seconds(5))
        .await
        .unwrap();
    assert_eq!(archived, 1);
    assert!(repo.get(tenant_id, finished.id).await.is_err());
    assert!(repo.get(tenant_id, open.id).await.is_ok());
}
