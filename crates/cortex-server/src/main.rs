//! Cortex Server — application entry point and composition root.
//!
//! Exit codes: 0 normal, 1 configuration error, 2 persistence
//! unreachable at startup. Everything long-running shares one
//! cancellation token and is joined before exit.

mod config;
mod error;
mod routes;
mod state;

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use cortex_agents::{
    AgentRegistry, CollaborationCoordinator, DispatchConfig, TaskService, spawn_metric_writer,
};
use cortex_auth::{AccessControlService, AuthConfig};
use cortex_cache::{Cache, CacheConfig, spawn_sweeper};
use cortex_db::{
    DbManager, SurrealAuditLogRepository, SurrealCollaborationRepository,
    SurrealMetricRepository, SurrealSessionRepository, SurrealTaskRepository,
    SurrealTenantRepository, SurrealUserRepository, run_migrations,
};
use cortex_core::repository::CollaborationRepository;
use cortex_insights::{InsightsConfig, InsightsEngine};
use cortex_providers::{Capability, CannedProvider, ModelEntry, ModelRegistry, ProviderRouter};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::state::AppState;

const COLLAB_RETENTION_DAYS: i64 = 30;

/// The stock model catalogue. Entries are served by the in-process
/// canned provider until external providers are wired in through
/// [`cortex_providers::ModelProvider`].
fn default_model_catalogue() -> Vec<ModelEntry> {
    let entry = |name: &str, caps: &[Capability], context_window: u32, cost_weight: u32| ModelEntry {
        name: name.into(),
        provider_id: "canned".into(),
        capabilities: BTreeSet::from_iter(caps.iter().copied()),
        context_window,
        cost_weight,
        available: true,
    };

    vec![
        entry(
            "reason-xl",
            &[Capability::Reasoning, Capability::Text],
            128_000,
            8,
        ),
        entry("general-standard", &[Capability::Text], 32_000, 3),
        entry(
            "code-assist",
            &[Capability::Code, Capability::Text],
            64_000,
            5,
        ),
        entry(
            "vision-analyst",
            &[Capability::Vision, Capability::Multimodal, Capability::Text],
            64_000,
            6,
        ),
        entry(
            "context-max",
            &[Capability::LongContext, Capability::Text],
            200_000,
            7,
        ),
        entry("safe-default", &[Capability::Text], 8_000, 0),
    ]
}

#[tokio::main]
async fn main() {
    std::process::exit(run().await);
}

async fn run() -> i32 {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                "cortex=info"
                    .parse()
                    .expect("static directive always parses"),
            ),
        )
        .json()
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return 1;
        }
    };

    let manager = match DbManager::connect(&config.db).await {
        Ok(manager) => manager,
        Err(e) => {
            error!(error = %e, "persistence unreachable at startup");
            return 2;
        }
    };
    let db = manager.db();
    if let Err(e) = run_migrations(&db).await {
        error!(error = %e, "schema migration failed");
        return 2;
    }

    let shutdown = CancellationToken::new();

    let users = SurrealUserRepository::with_pepper(db.clone(), config.token_secret.clone());
    let sessions = SurrealSessionRepository::new(db.clone());
    let audit = SurrealAuditLogRepository::new(db.clone());
    let tenants = SurrealTenantRepository::new(db.clone());
    let task_repo = SurrealTaskRepository::new(db.clone());
    let collab_repo = SurrealCollaborationRepository::new(db.clone());
    let metric_repo = SurrealMetricRepository::new(db.clone());

    let auth = AccessControlService::new(
        users,
        sessions,
        audit.clone(),
        AuthConfig {
            session_ttl_secs: config.session_ttl_secs,
            pepper: Some(config.token_secret.clone()),
            ..Default::default()
        },
    );

    let model_registry = match ModelRegistry::new(default_model_catalogue(), "safe-default") {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            eprintln!("configuration error: {e}");
            return 1;
        }
    };
    let provider_router = Arc::new(
        ProviderRouter::new(model_registry).with_provider(Arc::new(CannedProvider::new("canned"))),
    );

    let cache = Arc::new(Cache::new(CacheConfig::default()));
    let sweeper = spawn_sweeper(cache.clone(), shutdown.clone());
    let (metric_sink, metric_writer) =
        spawn_metric_writer(metric_repo.clone(), 1_024, shutdown.clone());

    // Completed collaborations age out after the retention window.
    let retention = {
        let repo = collab_repo.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(3_600));
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let cutoff = Utc::now() - chrono::Duration::days(COLLAB_RETENTION_DAYS);
                        match repo.archive_completed(cutoff).await {
                            Ok(0) => {}
                            Ok(n) => info!(archived = n, "archived completed collaborations"),
                            Err(e) => error!(error = %e, "collaboration archival failed"),
                        }
                    }
                }
            }
        })
    };

    let tasks = TaskService::new(
        task_repo,
        tenants.clone(),
        Arc::new(AgentRegistry::with_default_agents()),
        provider_router,
        cache.clone(),
        metric_sink,
        DispatchConfig::default(),
        shutdown.clone(),
    );
    let coordinator = CollaborationCoordinator::new(collab_repo, tasks.clone());
    let insights = InsightsEngine::new(metric_repo, InsightsConfig::default());

    let app_state = Arc::new(AppState {
        auth,
        tenants,
        audit,
        tasks: tasks.clone(),
        coordinator,
        insights,
        cache,
        started_at: Utc::now(),
        config: config.clone(),
    });

    let app = routes::router(app_state);
    let listener = match tokio::net::TcpListener::bind(&config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("configuration error: cannot bind {}: {e}", config.bind_addr);
            return 1;
        }
    };
    info!(addr = %config.bind_addr, "cortex server listening");

    let serve_shutdown = shutdown.clone();
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
            serve_shutdown.cancel();
        })
        .await;
    if let Err(e) = result {
        error!(error = %e, "server error");
    }

    // One shutdown signal; every long-running flow honours it and is
    // joined before exit.
    shutdown.cancel();
    tasks.shutdown().await;
    if let Err(e) = sweeper.await {
        error!(error = %e, "cache sweeper join failed");
    }
    if let Err(e) = metric_writer.await {
        error!(error = %e, "metric writer join failed");
    }
    if let Err(e) = retention.await {
        error!(error = %e, "retention loop join failed");
    }

    info!("cortex server stopped");
    0
}
