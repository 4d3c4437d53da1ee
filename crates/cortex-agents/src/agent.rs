//! The uniform agent contract and execution context.
//!
//! Agents are pure workers: they receive a task and a context, return
//! a structured result, and never touch the queue or persistence
//! directly. Any state lives in the persistence layer or travels with
//! the task.

use std::sync::Arc;

use async_trait::async_trait;
use cortex_cache::TenantCache;
use cortex_core::models::agent::{AgentKind, ControlOp};
use cortex_core::models::metric::{MetricSample, names};
use cortex_core::models::task::Task;
use cortex_providers::{Capability, InvokeOptions, Invocation, ProviderRouter};
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::AgentError;
use crate::metrics::MetricSink;

/// Execution context handed to an agent for one task.
pub struct AgentContext {
    pub tenant_id: Uuid,
    pub agent_kind: AgentKind,
    /// Tenant-scoped cache for idempotent sub-results.
    pub cache: TenantCache,
    pub cancellation: CancellationToken,
    pub deadline: Option<chrono::DateTime<chrono::Utc>>,
    router: Arc<ProviderRouter>,
    metrics: MetricSink,
}

impl AgentContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant_id: Uuid,
        agent_kind: AgentKind,
        cache: TenantCache,
        router: Arc<ProviderRouter>,
        metrics: MetricSink,
        cancellation: CancellationToken,
        deadline: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Self {
        Self {
            tenant_id,
            agent_kind,
            cache,
            cancellation,
            deadline,
            router,
            metrics,
        }
    }

    /// Invoke the best model for a capability through the fallback
    /// chain, honouring cancellation and recording a fallback metric
    /// sample for every degradation step.
    pub async fn invoke_model(
        &self,
        requirement: Capability,
        preferences: &[String],
        prompt: &str,
        options: &InvokeOptions,
    ) -> Result<Invocation, AgentError> {
        if self.cancellation.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        let invocation = self
            .router
            .invoke(requirement, preferences, prompt, options)
            .await?;

        for fallback in &invocation.fallbacks {
            self.metrics.emit(
                MetricSample::new(self.tenant_id, names::PROVIDER_FALLBACK, 1.0)
                    .for_agent(self.agent_kind)
                    .label("from", fallback.from.clone())
                    .label("to", fallback.to.clone()),
            );
        }

        Ok(invocation)
    }

    pub fn emit_metric(&self, sample: MetricSample) {
        self.metrics.emit(sample);
    }

    /// Cache key for an idempotent sub-result: agent kind plus a
    /// payload fingerprint.
    pub fn fingerprint(&self, payload: &serde_json::Value) -> String {
        let mut hasher = Sha256::new();
        hasher.update(payload.to_string().as_bytes());
        format!(
            "{}:{}",
            self.agent_kind.as_str(),
            hex::encode(hasher.finalize())
        )
    }
}

/// Uniform contract every agent implements.
#[async_trait]
pub trait Agent: Send + Sync {
    fn kind(&self) -> AgentKind;

    /// Human-readable capability tags surfaced in status reports.
    fn capabilities(&self) -> Vec<String>;

    /// Cheap structural validation of a payload before it is queued.
    fn validate(&self, payload: &serde_json::Value) -> Result<(), AgentError>;

    /// Execute one task. Must honour `ctx.cancellation` between
    /// provider calls and surface provider errors unchanged so the
    /// dispatcher can classify them.
    async fn handle(&self, task: &Task, ctx: &AgentContext) -> Result<serde_json::Value, AgentError>;

    /// Hook for control transitions. Agents are stateless, so the
    /// default does nothing; the registry tracks status and metrics.
    async fn on_control(&self, _op: ControlOp) {}
}
