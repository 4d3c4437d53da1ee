//! Task submission and the dispatch loop.
//!
//! One worker loop exists per `(tenant, agent kind)` queue. Submission
//! persists the task in `queued` state before returning; the worker
//! claims tasks with a compare-and-set transition, executes them with
//! deadline and cancellation signals, and retries transient provider
//! failures with exponential backoff. Retries never happen anywhere
//! else.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveTime, Utc};
use cortex_cache::Cache;
use cortex_core::error::{CoreError, CoreResult};
use cortex_core::models::agent::AgentKind;
use cortex_core::models::metric::{MetricSample, names};
use cortex_core::models::task::{
    CreateTask, ErrorClass, Task, TaskError, TaskPatch, TaskState,
};
use cortex_core::models::tenant::{Tenant, TenantStatus};
use cortex_core::repository::{TaskRepository, TenantRepository};
use cortex_providers::{ProviderError, ProviderRouter};
use rand::Rng;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::agent::{Agent, AgentContext};
use crate::error::AgentError;
use crate::metrics::MetricSink;
use crate::queue::AgentQueue;
use crate::registry::{AgentRegistry, AgentRuntime};

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Total attempts per execution, including the first.
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_factor: f64,
    pub backoff_cap: Duration,
    /// Jitter fraction applied to each delay (±).
    pub jitter: f64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base: Duration::from_millis(500),
            backoff_factor: 2.0,
            backoff_cap: Duration::from_secs(30),
            jitter: 0.2,
        }
    }
}

impl DispatchConfig {
    /// Delay before the retry following failed attempt `attempt`
    /// (1-based): `base * factor^(attempt-1)`, capped, with ±jitter.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self.backoff_base.as_millis() as f64
            * self.backoff_factor.powi(attempt.saturating_sub(1) as i32);
        let capped = exp.min(self.backoff_cap.as_millis() as f64);
        let jittered = if self.jitter > 0.0 {
            let spread = capped * self.jitter;
            let offset = rand::rng().random_range(-spread..=spread);
            (capped + offset).max(0.0)
        } else {
            capped
        };
        Duration::from_millis(jittered as u64)
    }
}

struct Inner<T, Ten> {
    tasks: T,
    tenants: Ten,
    registry: Arc<AgentRegistry>,
    router: Arc<ProviderRouter>,
    cache: Arc<Cache>,
    metrics: MetricSink,
    config: DispatchConfig,
    queues: Mutex<HashMap<(Uuid, AgentKind), Arc<AgentQueue>>>,
    workers: Mutex<HashMap<(Uuid, AgentKind), JoinHandle<()>>>,
    shutdown: CancellationToken,
}

/// Tenant-aware task router: quota-checked submission plus the
/// per-agent dispatch loops.
pub struct TaskService<T, Ten> {
    inner: Arc<Inner<T, Ten>>,
}

impl<T, Ten> Clone for TaskService<T, Ten> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, Ten> TaskService<T, Ten>
where
    T: TaskRepository + Clone + 'static,
    Ten: TenantRepository + Clone + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tasks: T,
        tenants: Ten,
        registry: Arc<AgentRegistry>,
        router: Arc<ProviderRouter>,
        cache: Arc<Cache>,
        metrics: MetricSink,
        config: DispatchConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                tasks,
                tenants,
                registry,
                router,
                cache,
                metrics,
                config,
                queues: Mutex::new(HashMap::new()),
                workers: Mutex::new(HashMap::new()),
                shutdown,
            }),
        }
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.inner.registry
    }

    /// Submit a task. The task is persisted in `queued` state before
    /// this returns; quota violations fail fast without a record.
    pub async fn submit(&self, input: CreateTask) -> CoreResult<Task> {
        let tenant = self.inner.tenants.get_by_id(input.tenant_id).await?;
        if tenant.status != TenantStatus::Active {
            return Err(CoreError::Forbidden {
                permission: "tenant.active".into(),
            });
        }

        let now = Utc::now();
        if let Some(deadline) = input.deadline
            && deadline <= now
        {
            return Err(CoreError::validation("deadline", "deadline is in the past"));
        }

        let agent = self.inner.registry.agent(input.agent_kind)?;
        agent.validate(&input.payload).map_err(CoreError::from)?;

        let quotas = tenant.tier.quotas();
        let day_start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
        let used_today = self
            .inner
            .tasks
            .count_since(input.tenant_id, day_start)
            .await?;
        if used_today >= quotas.tasks_per_day {
            let next_window = day_start + chrono::Duration::days(1);
            return Err(CoreError::quota(
                "tasks_per_day",
                Some((next_window - now).num_seconds().max(0) as u64),
            ));
        }

        let queue = self.queue_for(&tenant, input.agent_kind);
        let Some(reservation) = queue.reserve() else {
            return Err(CoreError::quota("concurrent_tasks", Some(1)));
        };

        let tenant_id = input.tenant_id;
        let kind = input.agent_kind;
        let task = self.inner.tasks.create(input).await?;
        reservation.commit(task.clone());
        self.ensure_worker(tenant_id, kind);

        debug!(task_id = %task.id, kind = kind.as_str(), "task queued");
        Ok(task)
    }

    pub async fn get_task(&self, tenant_id: Uuid, id: Uuid) -> CoreResult<Task> {
        self.inner.tasks.get(tenant_id, id).await
    }

    /// Cancel a queued task. The dispatcher's claim transition loses
    /// the race and skips it.
    pub async fn cancel(&self, tenant_id: Uuid, id: Uuid) -> CoreResult<Task> {
        self.inner
            .tasks
            .transition(
                tenant_id,
                id,
                TaskState::Queued,
                TaskState::Cancelled,
                TaskPatch {
                    error: Some(TaskError {
                        class: ErrorClass::Cancelled,
                        message: "cancelled by user".into(),
                    }),
                    ..Default::default()
                },
            )
            .await
    }

    /// Resubmit a terminally-failed task as a fresh record linked via
    /// `parent_id`.
    pub async fn resubmit(&self, tenant_id: Uuid, id: Uuid, actor: Uuid) -> CoreResult<Task> {
        let task = self.inner.tasks.get(tenant_id, id).await?;
        if task.state != TaskState::Failed {
            return Err(CoreError::conflict(format!(
                "task {id} is not in a failed state"
            )));
        }
        self.submit(CreateTask {
            id: None,
            tenant_id,
            agent_kind: task.agent_kind,
            submitted_by: actor,
            payload: task.payload,
            priority: task.priority,
            deadline: None,
            parent_id: Some(task.id),
        })
        .await
    }

    /// Cancel the shutdown token and join every worker loop.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let workers: Vec<JoinHandle<()>> = {
            let mut map = self.inner.workers.lock().expect("worker map poisoned");
            map.drain().map(|(_, handle)| handle).collect()
        };
        for handle in workers {
            if let Err(e) = handle.await {
                warn!(error = %e, "worker join failed");
            }
        }
        self.inner.registry.stop_all();
    }

    fn queue_for(&self, tenant: &Tenant, kind: AgentKind) -> Arc<AgentQueue> {
        let capacity = tenant.tier.quotas().concurrent_tasks_per_agent as usize;
        let mut queues = self.inner.queues.lock().expect("queue map poisoned");
        queues
            .entry((tenant.id, kind))
            .or_insert_with(|| Arc::new(AgentQueue::new(capacity)))
            .clone()
    }

    fn ensure_worker(&self, tenant_id: Uuid, kind: AgentKind) {
        let mut workers = self.inner.workers.lock().expect("worker map poisoned");
        if workers.contains_key(&(tenant_id, kind)) {
            return;
        }
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            worker_loop(inner, tenant_id, kind).await;
        });
        workers.insert((tenant_id, kind), handle);
    }
}

async fn worker_loop<T, Ten>(inner: Arc<Inner<T, Ten>>, tenant_id: Uuid, kind: AgentKind)
where
    T: TaskRepository + Clone + 'static,
    Ten: TenantRepository + Clone + 'static,
{
    let queue = {
        let queues = inner.queues.lock().expect("queue map poisoned");
        match queues.get(&(tenant_id, kind)) {
            Some(queue) => queue.clone(),
            None => return,
        }
    };
    let runtime = inner.registry.runtime(tenant_id, kind);
    let agent = match inner.registry.agent(kind) {
        Ok(agent) => agent,
        Err(_) => return,
    };
    let shutdown = inner.shutdown.clone();

    loop {
        if !wait_dispatchable(&runtime, &shutdown).await {
            return;
        }

        // Tier changes take effect here, on the next dispatch.
        let limit = match inner.tenants.get_by_id(tenant_id).await {
            Ok(tenant) => tenant.tier.quotas().concurrent_tasks_per_agent,
            Err(_) => 1,
        };
        while runtime.active() >= limit {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = runtime.changed.notified() => {}
            }
        }

        let Some(task) = queue.pop(&shutdown).await else {
            return;
        };

        // A pause that landed while waiting stalls execution but does
        // not drain the claimed task.
        if !wait_dispatchable(&runtime, &shutdown).await {
            return;
        }

        runtime.task_started();
        let inner = inner.clone();
        let runtime = runtime.clone();
        let agent = agent.clone();
        tokio::spawn(async move {
            execute(inner, runtime, agent, task).await;
        });
    }
}

/// Wait until the agent may dispatch. `false` means shutdown fired.
async fn wait_dispatchable(runtime: &Arc<AgentRuntime>, shutdown: &CancellationToken) -> bool {
    while !runtime.dispatchable() {
        tokio::select! {
            _ = shutdown.cancelled() => return false,
            _ = runtime.changed.notified() => {}
        }
    }
    true
}

async fn execute<T, Ten>(
    inner: Arc<Inner<T, Ten>>,
    runtime: Arc<AgentRuntime>,
    agent: Arc<dyn Agent>,
    task: Task,
) where
    T: TaskRepository + Clone + 'static,
    Ten: TenantRepository + Clone + 'static,
{
    let tenant_id = task.tenant_id;
    let kind = task.agent_kind;

    let wait_ms = (Utc::now() - task.created_at).num_milliseconds().max(0) as f64;
    inner.metrics.emit(
        MetricSample::new(tenant_id, names::QUEUE_WAIT_MS, wait_ms).for_agent(kind),
    );

    // Claim the task. Losing the race (e.g. a cancel) skips it.
    if let Err(e) = inner
        .tasks
        .transition(
            tenant_id,
            task.id,
            TaskState::Queued,
            TaskState::Running,
            TaskPatch::default(),
        )
        .await
    {
        debug!(task_id = %task.id, error = %e, "task claim lost, skipping");
        runtime.task_aborted();
        return;
    }

    let ctx = AgentContext::new(
        tenant_id,
        kind,
        inner.cache.scoped(tenant_id),
        inner.router.clone(),
        inner.metrics.clone(),
        inner.shutdown.child_token(),
        task.deadline,
    );

    let started = Instant::now();
    let mut attempts = 0u32;

    let outcome = loop {
        attempts += 1;

        let attempt = tokio::select! {
            biased;
            _ = ctx.cancellation.cancelled() => Err(AgentError::Cancelled),
            _ = deadline_expiry(task.deadline) => Err(AgentError::Provider(
                ProviderError::Timeout("task deadline exceeded".into()),
            )),
            result = agent.handle(&task, &ctx) => result,
        };

        match attempt {
            Ok(value) => break Ok(value),
            Err(err) => {
                let class = err.classify();
                if class != ErrorClass::Transient || attempts >= inner.config.max_attempts {
                    break Err((err, class));
                }

                let delay = inner.config.backoff_delay(attempts);
                if deadline_violated(task.deadline, delay) {
                    break Err((err, class));
                }

                inner.metrics.emit(
                    MetricSample::new(tenant_id, names::TASK_RETRY, attempts as f64)
                        .for_agent(kind),
                );
                warn!(
                    task_id = %task.id,
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    "transient failure, retrying with backoff"
                );

                tokio::select! {
                    _ = ctx.cancellation.cancelled() => {
                        break Err((AgentError::Cancelled, ErrorClass::Cancelled));
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    };

    let exec_ms = started.elapsed().as_millis() as f64;
    inner.metrics.emit(
        MetricSample::new(tenant_id, names::TASK_EXEC_MS, exec_ms).for_agent(kind),
    );

    let (to, patch, succeeded, label) = match outcome {
        Ok(value) => (
            TaskState::Succeeded,
            TaskPatch {
                attempt_count: Some(attempts),
                result: Some(value),
                error: None,
            },
            true,
            "succeeded",
        ),
        Err((err, ErrorClass::Cancelled)) => (
            TaskState::Cancelled,
            TaskPatch {
                attempt_count: Some(attempts),
                result: None,
                error: Some(TaskError {
                    class: ErrorClass::Cancelled,
                    message: err.to_string(),
                }),
            },
            false,
            "cancelled",
        ),
        Err((err, class)) => (
            TaskState::Failed,
            TaskPatch {
                attempt_count: Some(attempts),
                result: None,
                error: Some(TaskError {
                    class,
                    message: err.to_string(),
                }),
            },
            false,
            "failed",
        ),
    };

    if let Err(e) = inner
        .tasks
        .transition(tenant_id, task.id, TaskState::Running, to, patch)
        .await
    {
        warn!(task_id = %task.id, error = %e, "failed to record task outcome");
    }

    inner.metrics.emit(
        MetricSample::new(tenant_id, names::TASK_OUTCOME, 1.0)
            .for_agent(kind)
            .label("state", label),
    );
    runtime.task_finished(succeeded, exec_ms);
}

/// Resolves when the deadline passes; pends forever without one.
async fn deadline_expiry(deadline: Option<DateTime<Utc>>) {
    match deadline {
        Some(deadline) => {
            let remaining = (deadline - Utc::now())
                .to_std()
                .unwrap_or(Duration::ZERO);
            tokio::time::sleep(remaining).await;
        }
        None => std::future::pending().await,
    }
}

fn deadline_violated(deadline: Option<DateTime<Utc>>, delay: Duration) -> bool {
    match deadline {
        Some(deadline) => {
            let resume = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();
            resume >= deadline
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_base() {
        let config = DispatchConfig {
            jitter: 0.0,
            ..Default::default()
        };
        assert_eq!(config.backoff_delay(1), Duration::from_millis(500));
        assert_eq!(config.backoff_delay(2), Duration::from_millis(1000));
        assert_eq!(config.backoff_delay(3), Duration::from_millis(2000));
    }

    #[test]
    fn backoff_caps_at_thirty_seconds() {
        let config = DispatchConfig {
            jitter: 0.0,
            ..Default::default()
        };
        assert_eq!(config.backoff_delay(12), Duration::from_secs(30));
    }

    #[test]
    fn jitter_stays_within_band() {
        let config = DispatchConfig::default();
        for _ in 0..100 {
            let delay = config.backoff_delay(1).as_millis() as f64;
            assert!((400.0..=600.0).contains(&delay), "delay {delay} out of band");
        }
    }

    #[test]
    fn deadline_violation_check() {
        let soon = Utc::now() + chrono::Duration::milliseconds(100);
        assert!(deadline_violated(Some(soon), Duration::from_secs(1)));
        let later = Utc::now() + chrono::Duration::seconds(60);
        assert!(!deadline_violated(Some(later), Duration::from_secs(1)));
        assert!(!deadline_violated(None, Duration::from_secs(999)));
    }
}
