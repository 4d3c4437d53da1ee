//! Integration tests for the Task repository: compare-and-set
//! transitions, duplicate rejection, and tenant scoping.

use chrono::{Duration, Utc};
use cortex_core::error::CoreError;
use cortex_core::models::agent::AgentKind;
use cortex_core::models::task::{
    CreateTask, ErrorClass, TaskError, TaskPatch, TaskState,
};
use cortex_core::models::tenant::{CreateTenant, SubscriptionTier};
use cortex_core::repository::{
    Pagination, TaskFilter, TaskRepository, TenantRepository,
};
use cortex_db::{SurrealTaskRepository, SurrealTenantRepository};
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

fn new_task(tenant_id: Uuid) -> CreateTask {
    CreateTask {
        id: None,
        tenant_id,
        agent_kind: AgentKind::Sales,
        submitted_by: Uuid::new_v4(),
        payload: serde_json::json!({ "operation": "qualify_lead" }),
        priority: 0,
        deadline: None,
        parent_id: None,
    }
}

#[tokio::test]
async fn create_starts_queued() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealTaskRepository::new(db);

    let task = repo.create(new_task(tenant_id)).await.unwrap();
    assert_eq!(task.state, TaskState::Queued);
    assert_eq!(task.attempt_count, 0);
    assert!(task.result.is_none());
    assert!(task.error.is_none());

    let fetched = repo.get(tenant_id, task.id).await.unwrap();
    assert_eq!(fetched.id, task.id);
    assert_eq!(fetched.agent_kind, AgentKind::Sales);
}

#[tokio::test]
async fn duplicate_id_is_a_conflict() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealTaskRepository::new(db);

    let id = Uuid::new_v4();
    let mut input = new_task(tenant_id);
    input.id = Some(id);
    repo.create(input.clone()).await.unwrap();

    let err = repo.create(input).await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict { .. }));
}

#[tokio::test]
async fn transition_follows_the_state_machine() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealTaskRepository::new(db);
    let task = repo.create(new_task(tenant_id)).await.unwrap();

    let running = repo
        .transition(
            tenant_id,
            task.id,
            TaskState::Queued,
            TaskState::Running,
            TaskPatch::default(),
        )
        .await
        .unwrap();
    assert_eq!(running.state, TaskState::Running);

    let done = repo
        .transition(
            tenant_id,
            task.id,
            TaskState::Running,
            TaskState::Succeeded,
            TaskPatch {
                attempt_count: Some(1),
                result: Some(serde_json::json!({ "score": 87 })),
                error: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(done.state, TaskState::Succeeded);
    assert_eq!(done.attempt_count, 1);
    assert_eq!(done.result, Some(serde_json::json!({ "score": 87 })));
}

#[tokio::test]
async fn stale_precondition_is_a_conflict() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealTaskRepository::new(db);
    let task = repo.create(new_task(tenant_id)).await.unwrap();

    // Cancel wins the race.
    repo.transition(
        tenant_id,
        task.id,
        TaskState::Queued,
        TaskState::Cancelled,
        TaskPatch::default(),
    )
    .await
    .unwrap();

    // The dispatcher's claim then fails.
    let err = repo
        .transition(
            tenant_id,
            task.id,
            TaskState::Queued,
            TaskState::Running,
            TaskPatch::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict { .. }));
}

#[tokio::test]
async fn illegal_transitions_are_rejected() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealTaskRepository::new(db);
    let task = repo.create(new_task(tenant_id)).await.unwrap();

    // queued -> succeeded skips running.
    let err = repo
        .transition(
            tenant_id,
            task.id,
            TaskState::Queued,
            TaskState::Succeeded,
            TaskPatch::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict { .. }));

    // Terminal states are immutable.
    repo.transition(
        tenant_id,
        task.id,
        TaskState::Queued,
        TaskState::Cancelled,
        TaskPatch::default(),
    )
    .await
    .unwrap();
    let err = repo
        .transition(
            tenant_id,
            task.id,
            TaskState::Cancelled,
            TaskState::Running,
            TaskPatch::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict { .. }));
}

#[tokio::test]
async fn error_blob_roundtrips() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealTaskRepository::new(db);
    let task = repo.create(new_task(tenant_id)).await.unwrap();

    repo.transition(
        tenant_id,
        task.id,
        TaskState::Queued,
        TaskState::Running,
        TaskPatch::default(),
    )
    .await
    .unwrap();
    repo.transition(
        tenant_id,
        task.id,
        TaskState::Running,
        TaskState::Failed,
        TaskPatch {
            attempt_count: Some(5),
            result: None,
            error: Some(TaskError {
                class: ErrorClass::Transient,
                message: "provider unavailable".into(),
            }),
        },
    )
    .await
    .unwrap();

    let fetched = repo.get(tenant_id, task.id).await.unwrap();
    assert_eq!(fetched.state, TaskState::Failed);
    assert_eq!(fetched.attempt_count, 5);
    let error = fetched.error.unwrap();
    assert_eq!(error.class, ErrorClass::Transient);
}

#[tokio::test]
async fn other_tenants_cannot_see_the_task() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealTaskRepository::new(db);
    let task = repo.create(new_task(tenant_id)).await.unwrap();

    let other_tenant = Uuid::new_v4();
    let err = repo.get(other_tenant, task.id).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
}

#[tokio::test]
async fn count_since_bounds_the_daily_window() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealTaskRepository::new(db);

    for _ in 0..3 {
        repo.create(new_task(tenant_id)).await.unwrap();
    }

    let past = Utc::now() - Duration::hours(1);
    assert_eq!(repo.count_since(tenant_id, past).await.unwrap(), 3);

    let future = Utc::now() + Duration::hours(1);
    assert_eq!(repo.count_since(tenant_id, future).await.unwrap(), 0);

    // Another tenant's window is empty.
    assert_eq!(repo.count_since(Uuid::new_v4(), past).await.unwrap(), 0);
}

#[tokio::test]
async fn list_filters_by_kind_and_state() {
    let (db, tenant_id) = setup().await;
    let repo = SurrealTaskRepository::new(db);

    let sales = repo.create(new_task(tenant_id)).await.unwrap();
    let mut content = new_task(tenant_id);
    content.agent_kind = AgentKind::Content;
    repo.create(content).await.unwrap();

    let filtered = repo
        .list(
            tenant_id,
            TaskFilter {
                agent_kind: Some(AgentKind::Sales),
                state: Some(TaskState::Queued),
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(filtered.total, 1);
    assert_eq!(filtered.items[0].id, sales.id);
}
