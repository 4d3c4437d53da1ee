//! End-to-end dispatcher tests: submission, retry with backoff,
//! provider fallback, quotas, control operations, and collaboration
//! aggregation — all against in-memory SurrealDB and scripted
//! providers.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use cortex_agents::{
    AgentRegistry, CollaborationCoordinator, DispatchConfig, TaskService, spawn_metric_writer,
};
use cortex_cache::{Cache, CacheConfig};
use cortex_core::error::CoreError;
use cortex_core::models::agent::{AgentKind, ControlOp};
use cortex_core::models::collaboration::{CollaborationStatus, CreateCollaboration};
use cortex_core::models::metric::names;
use cortex_core::models::task::{CreateTask, ErrorClass, Task, TaskState};
use cortex_core::models::tenant::{CreateTenant, SubscriptionTier};
use cortex_core::repository::{MetricRepository, TenantRepository};
use cortex_db::{
    SurrealCollaborationRepository, SurrealMetricRepository, SurrealTaskRepository,
    SurrealTenantRepository,
};
use cortex_providers::{
    Capability, CannedProvider, ModelEntry, ModelProvider, ModelRegistry, ProviderError,
    ProviderRouter, ScriptedProvider,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

type Service = TaskService<SurrealTaskRepository<Db>, SurrealTenantRepository<Db>>;

struct Harness {
    service: Service,
    metric_repo: SurrealMetricRepository<Db>,
    collab_repo: SurrealCollaborationRepository<Db>,
    tenant_id: Uuid,
    user_id: Uuid,
    shutdown: CancellationToken,
}

fn entry(name: &str, provider_id: &str, caps: &[Capability], cost: u32) -> ModelEntry {
    ModelEntry {
        name: name.into(),
        provider_id: provider_id.into(),
        capabilities: BTreeSet::from_iter(caps.iter().copied()),
        context_window: 8_192,
        cost_weight: cost,
        available: true,
    }
}

/// Spin up in-memory DB, migrations, a tenant, and a task service
/// wired to the given catalogue and providers.
async fn harness(
    tier: SubscriptionTier,
    entries: Vec<ModelEntry>,
    providers: Vec<Arc<dyn ModelProvider>>,
) -> Harness {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    cortex_db::run_migrations(&db).await.unwrap();

    let tenants = SurrealTenantRepository::new(db.clone());
    let tenant = tenants
        .create(CreateTenant {
            display_name: "Test Tenant".into(),
            primary_domain: "test.example".into(),
            tier,
            branding: None,
            feature_flags: None,
        })
        .await
        .unwrap();

    let registry = Arc::new(ModelRegistry::new(entries, "safe-default").unwrap());
    let mut router = ProviderRouter::new(registry);
    for provider in providers {
        router = router.with_provider(provider);
    }

    let shutdown = CancellationToken::new();
    let metric_repo = SurrealMetricRepository::new(db.clone());
    let (sink, _writer) = spawn_metric_writer(metric_repo.clone(), 1_024, shutdown.clone());

    let service = TaskService::new(
        SurrealTaskRepository::new(db.clone()),
        tenants,
        Arc::new(AgentRegistry::with_default_agents()),
        Arc::new(router),
        Arc::new(Cache::new(CacheConfig::default())),
        sink,
        DispatchConfig::default(),
        shutdown.clone(),
    );

    Harness {
        service,
        metric_repo,
        collab_repo: SurrealCollaborationRepository::new(db),
        tenant_id: tenant.id,
        user_id: Uuid::new_v4(),
        shutdown,
    }
}

fn content_task(h: &Harness) -> CreateTask {
    CreateTask {
        id: None,
        tenant_id: h.tenant_id,
        agent_kind: AgentKind::Content,
        submitted_by: h.user_id,
        payload: serde_json::json!({ "format": "blog_post", "topic": "launch" }),
        priority: 0,
        deadline: None,
        parent_id: None,
    }
}

async fn wait_terminal(h: &Harness, id: Uuid) -> Task {
    for _ in 0..200 {
        let task = h.service.get_task(h.tenant_id, id).await.unwrap();
        if task.state.is_terminal() {
            return task;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("task {id} did not reach a terminal state");
}

#[tokio::test]
async fn submit_and_complete_happy_path() {
    let h = harness(
        SubscriptionTier::Professional,
        vec![entry("safe-default", "canned", &[Capability::Text], 0)],
        vec![Arc::new(CannedProvider::new("canned"))],
    )
    .await;

    let task = h.service.submit(content_task(&h)).await.unwrap();
    assert_eq!(task.state, TaskState::Queued);

    let done = wait_terminal(&h, task.id).await;
    assert_eq!(done.state, TaskState::Succeeded);
    assert_eq!(done.attempt_count, 1);
    let result = done.result.unwrap();
    assert!(result.get("draft").is_some());

    h.shutdown.cancel();
}

#[tokio::test]
async fn transient_failures_retry_with_backoff_then_succeed() {
    let scripted = Arc::new(ScriptedProvider::new(
        "scripted",
        vec![
            Err(ProviderError::Unavailable("warming up".into())),
            Err(ProviderError::Unavailable("still warming".into())),
        ],
    ));
    let h = harness(
        SubscriptionTier::Professional,
        vec![entry("safe-default", "scripted", &[Capability::Text], 0)],
        vec![scripted.clone()],
    )
    .await;

    let started = Instant::now();
    let task = h.service.submit(content_task(&h)).await.unwrap();
    let done = wait_terminal(&h, task.id).await;
    let elapsed = started.elapsed();

    assert_eq!(done.state, TaskState::Succeeded);
    assert_eq!(done.attempt_count, 3);
    assert_eq!(scripted.call_count(), 3);
    // Two backoff sleeps: 500 ms + 1000 ms, each with ±20% jitter.
    assert!(
        elapsed >= Duration::from_millis(1200),
        "retries completed too fast: {elapsed:?}"
    );

    h.shutdown.cancel();
}

#[tokio::test]
async fn fallback_to_safe_default_records_metric() {
    let flaky = Arc::new(ScriptedProvider::new(
        "flaky",
        vec![Err(ProviderError::Unavailable("maintenance".into()))],
    ));
    let h = harness(
        SubscriptionTier::Professional,
        vec![
            entry("primary", "flaky", &[Capability::Text], 1),
            entry("safe-default", "canned", &[Capability::Text], 0),
        ],
        vec![flaky, Arc::new(CannedProvider::new("canned"))],
    )
    .await;

    let task = h.service.submit(content_task(&h)).await.unwrap();
    let done = wait_terminal(&h, task.id).await;
    assert_eq!(done.state, TaskState::Succeeded);
    // No dispatcher retry: the chain absorbed the failure.
    assert_eq!(done.attempt_count, 1);

    // The fallback sample lands asynchronously through the sink.
    let mut fallbacks = Vec::new();
    for _ in 0..100 {
        fallbacks = h
            .metric_repo
            .query(
                h.tenant_id,
                Some(names::PROVIDER_FALLBACK),
                Utc::now() - chrono::Duration::hours(1),
                Utc::now() + chrono::Duration::hours(1),
            )
            .await
            .unwrap();
        if !fallbacks.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert_eq!(fallbacks.len(), 1);
    assert_eq!(fallbacks[0].labels.get("from").map(String::as_str), Some("primary"));
    assert_eq!(
        fallbacks[0].labels.get("to").map(String::as_str),
        Some("safe-default")
    );

    h.shutdown.cancel();
}

#[tokio::test]
async fn rejections_fail_permanently_without_retry() {
    let strict = Arc::new(ScriptedProvider::new(
        "strict",
        vec![Err(ProviderError::Rejected("prompt too odd".into()))],
    ));
    let h = harness(
        SubscriptionTier::Professional,
        vec![entry("safe-default", "strict", &[Capability::Text], 0)],
        vec![strict.clone()],
    )
    .await;

    let task = h.service.submit(content_task(&h)).await.unwrap();
    let done = wait_terminal(&h, task.id).await;

    assert_eq!(done.state, TaskState::Failed);
    assert_eq!(done.attempt_count, 1);
    assert_eq!(strict.call_count(), 1);
    assert_eq!(done.error.unwrap().class, ErrorClass::Permanent);

    h.shutdown.cancel();
}

#[tokio::test]
async fn past_deadline_is_rejected_without_a_record() {
    let h = harness(
        SubscriptionTier::Professional,
        vec![entry("safe-default", "canned", &[Capability::Text], 0)],
        vec![Arc::new(CannedProvider::new("canned"))],
    )
    .await;

    let err = h
        .service
        .submit(CreateTask {
            deadline: Some(Utc::now() - chrono::Duration::seconds(5)),
            ..content_task(&h)
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));

    h.shutdown.cancel();
}

#[tokio::test]
async fn invalid_payload_is_rejected_at_submit() {
    let h = harness(
        SubscriptionTier::Professional,
        vec![entry("safe-default", "canned", &[Capability::Text], 0)],
        vec![Arc::new(CannedProvider::new("canned"))],
    )
    .await;

    let err = h
        .service
        .submit(CreateTask {
            payload: serde_json::json!({ "format": "carrier_pigeon", "topic": "x" }),
            ..content_task(&h)
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));

    h.shutdown.cancel();
}

#[tokio::test]
async fn duplicate_submission_is_a_conflict() {
    let h = harness(
        SubscriptionTier::Professional,
        vec![entry("safe-default", "canned", &[Capability::Text], 0)],
        vec![Arc::new(CannedProvider::new("canned"))],
    )
    .await;

    let id = Uuid::new_v4();
    h.service
        .submit(CreateTask {
            id: Some(id),
            ..content_task(&h)
        })
        .await
        .unwrap();

    let err = h
        .service
        .submit(CreateTask {
            id: Some(id),
            ..content_task(&h)
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict { .. }));

    h.shutdown.cancel();
}

#[tokio::test]
async fn full_queue_fails_fast_with_quota() {
    let h = harness(
        SubscriptionTier::Starter, // concurrent quota = 2
        vec![entry("safe-default", "canned", &[Capability::Text], 0)],
        vec![Arc::new(CannedProvider::new("canned"))],
    )
    .await;

    // Pause before anything drains.
    h.service
        .registry()
        .control(h.tenant_id, AgentKind::Content, ControlOp::Pause)
        .await
        .unwrap();

    h.service.submit(content_task(&h)).await.unwrap();
    h.service.submit(content_task(&h)).await.unwrap();
    let err = h.service.submit(content_task(&h)).await.unwrap_err();
    match err {
        CoreError::QuotaExceeded { dimension, .. } => {
            assert_eq!(dimension, "concurrent_tasks");
        }
        other => panic!("expected quota error, got {other:?}"),
    }

    h.shutdown.cancel();
}

#[tokio::test]
async fn paused_agent_stalls_then_resumes() {
    let h = harness(
        SubscriptionTier::Professional,
        vec![entry("safe-default", "canned", &[Capability::Text], 0)],
        vec![Arc::new(CannedProvider::new("canned"))],
    )
    .await;

    h.service
        .registry()
        .control(h.tenant_id, AgentKind::Content, ControlOp::Pause)
        .await
        .unwrap();

    let task = h.service.submit(content_task(&h)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    let still = h.service.get_task(h.tenant_id, task.id).await.unwrap();
    assert_eq!(still.state, TaskState::Queued);

    h.service
        .registry()
        .control(h.tenant_id, AgentKind::Content, ControlOp::Resume)
        .await
        .unwrap();
    let done = wait_terminal(&h, task.id).await;
    assert_eq!(done.state, TaskState::Succeeded);

    h.shutdown.cancel();
}

#[tokio::test]
async fn queued_task_can_be_cancelled() {
    let h = harness(
        SubscriptionTier::Professional,
        vec![entry("safe-default", "canned", &[Capability::Text], 0)],
        vec![Arc::new(CannedProvider::new("canned"))],
    )
    .await;

    h.service
        .registry()
        .control(h.tenant_id, AgentKind::Content, ControlOp::Pause)
        .await
        .unwrap();

    let task = h.service.submit(content_task(&h)).await.unwrap();
    let cancelled = h.service.cancel(h.tenant_id, task.id).await.unwrap();
    assert_eq!(cancelled.state, TaskState::Cancelled);

    // Resuming must not revive it.
    h.service
        .registry()
        .control(h.tenant_id, AgentKind::Content, ControlOp::Resume)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    let after = h.service.get_task(h.tenant_id, task.id).await.unwrap();
    assert_eq!(after.state, TaskState::Cancelled);

    h.shutdown.cancel();
}

#[tokio::test]
async fn tasks_are_invisible_across_tenants() {
    let h = harness(
        SubscriptionTier::Professional,
        vec![entry("safe-default", "canned", &[Capability::Text], 0)],
        vec![Arc::new(CannedProvider::new("canned"))],
    )
    .await;

    let task = h.service.submit(content_task(&h)).await.unwrap();
    let err = h
        .service
        .get_task(Uuid::new_v4(), task.id)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));

    h.shutdown.cancel();
}

#[tokio::test]
async fn resubmit_links_fresh_task_to_parent() {
    let strict = Arc::new(ScriptedProvider::new(
        "strict",
        vec![Err(ProviderError::Fatal("boom".into()))],
    ));
    let h = harness(
        SubscriptionTier::Professional,
        vec![entry("safe-default", "strict", &[Capability::Text], 0)],
        vec![strict],
    )
    .await;

    let task = h.service.submit(content_task(&h)).await.unwrap();
    let failed = wait_terminal(&h, task.id).await;
    assert_eq!(failed.state, TaskState::Failed);

    let fresh = h
        .service
        .resubmit(h.tenant_id, failed.id, h.user_id)
        .await
        .unwrap();
    assert_ne!(fresh.id, failed.id);
    assert_eq!(fresh.parent_id, Some(failed.id));
    let done = wait_terminal(&h, fresh.id).await;
    // The script is exhausted, so the retry succeeds.
    assert_eq!(done.state, TaskState::Succeeded);

    h.shutdown.cancel();
}

#[tokio::test]
async fn collaboration_aggregates_partial_outcomes() {
    // Text goes to the canned safe default; reasoning hits a provider
    // that rejects every request, which fails permanently without
    // falling back.
    let strict = Arc::new(ScriptedProvider::new(
        "strict",
        vec![
            Err(ProviderError::Rejected("no".into())),
            Err(ProviderError::Rejected("still no".into())),
        ],
    ));
    let h = harness(
        SubscriptionTier::Professional,
        vec![
            entry("reason-pro", "strict", &[Capability::Reasoning], 1),
            entry("safe-default", "canned", &[Capability::Text], 0),
        ],
        vec![strict, Arc::new(CannedProvider::new("canned"))],
    )
    .await;

    let coordinator =
        CollaborationCoordinator::new(h.collab_repo.clone(), h.service.clone());

    let collab = coordinator
        .initiate(CreateCollaboration {
            tenant_id: h.tenant_id,
            orchestrator: h.user_id,
            participants: vec![AgentKind::Content, AgentKind::Analytics],
            goal: "quarterly campaign review".into(),
        })
        .await
        .unwrap();

    // Empty flow aggregates to pending, not an error.
    let (_, status) = coordinator.status(h.tenant_id, collab.id).await.unwrap();
    assert_eq!(status, CollaborationStatus::Pending);

    let content_step = coordinator
        .add_step(
            h.tenant_id,
            collab.id,
            AgentKind::Content,
            serde_json::json!({ "format": "blog_post", "topic": "review" }),
            h.user_id,
            0,
        )
        .await
        .unwrap();
    let analytics_step = coordinator
        .add_step(
            h.tenant_id,
            collab.id,
            AgentKind::Analytics,
            serde_json::json!({ "metric_name": "visits", "values": [1.0, 2.0, 3.0] }),
            h.user_id,
            0,
        )
        .await
        .unwrap();

    let content_done = wait_terminal(&h, content_step.id).await;
    let analytics_done = wait_terminal(&h, analytics_step.id).await;
    assert_eq!(content_done.state, TaskState::Succeeded);
    assert_eq!(analytics_done.state, TaskState::Failed);

    let (_, status) = coordinator.status(h.tenant_id, collab.id).await.unwrap();
    assert_eq!(status, CollaborationStatus::Partial);

    h.shutdown.cancel();
}

#[tokio::test]
async fn delegation_submits_an_attributed_task() {
    let h = harness(
        SubscriptionTier::Professional,
        vec![entry("safe-default", "canned", &[Capability::Text], 0)],
        vec![Arc::new(CannedProvider::new("canned"))],
    )
    .await;
    let coordinator =
        CollaborationCoordinator::new(h.collab_repo.clone(), h.service.clone());

    let task = coordinator
        .delegate(
            h.tenant_id,
            h.user_id,
            AgentKind::Marketing,
            serde_json::json!({
                "operation": "recommend_channels",
                "goal": "grow signups",
            }),
            None,
        )
        .await
        .unwrap();
    assert_eq!(task.agent_kind, AgentKind::Marketing);
    assert_eq!(task.submitted_by, h.user_id);

    let done = wait_terminal(&h, task.id).await;
    assert_eq!(done.state, TaskState::Succeeded);

    h.shutdown.cancel();
}
