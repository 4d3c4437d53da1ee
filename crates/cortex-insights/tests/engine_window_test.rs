//! Integration tests for the insights engine over a real metric
//! repository (in-memory SurrealDB).

use chrono::{Duration, Utc};
use cortex_core::models::agent::AgentKind;
use cortex_core::models::metric::{MetricSample, names};
use cortex_core::repository::MetricRepository;
use cortex_db::SurrealMetricRepository;
use cortex_insights::{InsightKind, InsightsConfig, InsightsEngine};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> (SurrealMetricRepository<Db>, Uuid) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    cortex_db::run_migrations(&db).await.unwrap();
    (SurrealMetricRepository::new(db), Uuid::new_v4())
}

fn exec_sample(tenant_id: Uuid, kind: AgentKind, ms: f64) -> MetricSample {
    MetricSample::new(tenant_id, names::TASK_EXEC_MS, ms).for_agent(kind)
}

fn outcome_sample(tenant_id: Uuid, kind: AgentKind, state: &str) -> MetricSample {
    MetricSample::new(tenant_id, names::TASK_OUTCOME, 1.0)
        .for_agent(kind)
        .label("state", state)
}

#[tokio::test]
async fn summary_aggregates_per_agent() {
    let (repo, tenant_id) = setup().await;

    for ms in [100.0, 150.0, 200.0, 250.0] {
        repo.append(exec_sample(tenant_id, AgentKind::Sales, ms))
            .await
            .unwrap();
    }
    for _ in 0..3 {
        repo.append(outcome_sample(tenant_id, AgentKind::Sales, "succeeded"))
            .await
            .unwrap();
    }
    repo.append(outcome_sample(tenant_id, AgentKind::Sales, "failed"))
        .await
        .unwrap();

    let engine = InsightsEngine::new(repo, InsightsConfig::default());
    let summary = engine
        .summarize(
            tenant_id,
            Utc::now() - Duration::hours(1),
            Utc::now() + Duration::minutes(1),
        )
        .await
        .unwrap();

    assert_eq!(summary.agents.len(), 1);
    let sales = &summary.agents[0];
    assert_eq!(sales.kind, AgentKind::Sales);
    assert_eq!(sales.task_count, 4);
    assert_eq!(sales.success_count, 3);
    assert!((sales.success_rate - 0.75).abs() < 1e-9);
    assert_eq!(sales.p50_latency_ms, 150.0);
    assert_eq!(sales.p95_latency_ms, 250.0);
}

#[tokio::test]
async fn latency_outlier_is_flagged_as_anomaly() {
    let (repo, tenant_id) = setup().await;

    // Eleven steady samples and one wild outlier.
    for _ in 0..11 {
        repo.append(exec_sample(tenant_id, AgentKind::Content, 100.0))
            .await
            .unwrap();
    }
    repo.append(exec_sample(tenant_id, AgentKind::Content, 10_000.0))
        .await
        .unwrap();

    let engine = InsightsEngine::new(repo, InsightsConfig::default());
    let insights = engine
        .analyze(
            tenant_id,
            Utc::now() - Duration::hours(1),
            Utc::now() + Duration::minutes(1),
        )
        .await
        .unwrap();

    let anomaly = insights
        .iter()
        .find(|i| i.kind == InsightKind::Anomaly && i.agent_kind == Some(AgentKind::Content))
        .expect("latency anomaly expected");
    assert!(anomaly.confidence > 0.0 && anomaly.confidence <= 1.0);
    assert!(anomaly.title.contains("latency"));

    // Products are stored and retrievable afterwards.
    let recent = engine.recent(tenant_id, Utc::now() - Duration::minutes(5));
    assert!(!recent.is_empty());
}

#[tokio::test]
async fn elevated_failure_rate_is_flagged() {
    let (repo, tenant_id) = setup().await;

    for _ in 0..6 {
        repo.append(outcome_sample(tenant_id, AgentKind::Operations, "failed"))
            .await
            .unwrap();
    }
    for _ in 0..6 {
        repo.append(outcome_sample(tenant_id, AgentKind::Operations, "succeeded"))
            .await
            .unwrap();
    }

    let engine = InsightsEngine::new(repo, InsightsConfig::default());
    let insights = engine
        .analyze(
            tenant_id,
            Utc::now() - Duration::hours(1),
            Utc::now() + Duration::minutes(1),
        )
        .await
        .unwrap();

    assert!(
        insights
            .iter()
            .any(|i| i.kind == InsightKind::Anomaly && i.title.contains("failure rate")),
        "expected a failure-rate anomaly, got {insights:?}"
    );
}

#[tokio::test]
async fn frequent_fallbacks_suggest_a_provider_check() {
    let (repo, tenant_id) = setup().await;

    for _ in 0..4 {
        repo.append(outcome_sample(tenant_id, AgentKind::Sales, "succeeded"))
            .await
            .unwrap();
        repo.append(
            MetricSample::new(tenant_id, names::PROVIDER_FALLBACK, 1.0)
                .for_agent(AgentKind::Sales)
                .label("from", "primary")
                .label("to", "safe-default"),
        )
        .await
        .unwrap();
    }

    let engine = InsightsEngine::new(repo, InsightsConfig::default());
    let insights = engine
        .analyze(
            tenant_id,
            Utc::now() - Duration::hours(1),
            Utc::now() + Duration::minutes(1),
        )
        .await
        .unwrap();

    let recommendation = insights
        .iter()
        .find(|i| i.kind == InsightKind::Recommendation && i.title.contains("fallback"))
        .expect("fallback recommendation expected");
    assert!(
        recommendation
            .recommendations
            .iter()
            .any(|r| r.contains("provider"))
    );
}

#[tokio::test]
async fn empty_window_produces_no_insights() {
    let (repo, tenant_id) = setup().await;
    let engine = InsightsEngine::new(repo, InsightsConfig::default());

    let summary = engine
        .summarize(
            tenant_id,
            Utc::now() - Duration::hours(1),
            Utc::now(),
        )
        .await
        .unwrap();
    assert!(summary.agents.is_empty());

    let insights = engine
        .analyze(tenant_id, Utc::now() - Duration::hours(1), Utc::now())
        .await
        .unwrap();
    assert!(insights.is_empty());
}
