//! Agent registry and per-tenant runtime state.
//!
//! Agent implementations are stateless and shared across tenants; the
//! registry tracks the per-`(tenant, kind)` descriptor state: status,
//! rolling metrics, and the in-flight counter the dispatcher uses to
//! bound concurrency.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use cortex_core::error::{CoreError, CoreResult};
use cortex_core::models::agent::{
    ALL_AGENT_KINDS, AgentDescriptor, AgentKind, AgentMetrics, AgentStatus, ControlOp,
};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::agent::Agent;
use crate::kinds::{AnalyticsAgent, ContentAgent, MarketingAgent, OperationsAgent, SalesAgent};

/// Runtime state for one agent instance (one per kind per tenant).
pub struct AgentRuntime {
    status: Mutex<AgentStatus>,
    metrics: Mutex<AgentMetrics>,
    active: AtomicU32,
    /// Signalled on every control transition and freed slot.
    pub changed: Notify,
}

impl AgentRuntime {
    fn new() -> Self {
        Self {
            status: Mutex::new(AgentStatus::Idle),
            metrics: Mutex::new(AgentMetrics::default()),
            active: AtomicU32::new(0),
            changed: Notify::new(),
        }
    }

    pub fn status(&self) -> AgentStatus {
        *self.status.lock().expect("agent status poisoned")
    }

    pub fn metrics(&self) -> AgentMetrics {
        *self.metrics.lock().expect("agent metrics poisoned")
    }

    /// Dispatch may pull work only while the agent is not paused or
    /// stopped.
    pub fn dispatchable(&self) -> bool {
        matches!(self.status(), AgentStatus::Idle | AgentStatus::Busy)
    }

    pub fn active(&self) -> u32 {
        self.active.load(Ordering::Relaxed)
    }

    pub fn task_started(&self) {
        self.active.fetch_add(1, Ordering::Relaxed);
        let mut status = self.status.lock().expect("agent status poisoned");
        if *status == AgentStatus::Idle {
            *status = AgentStatus::Busy;
        }
    }

    /// Record a finished task and fold its latency into the rolling
    /// average.
    pub fn task_finished(&self, succeeded: bool, latency_ms: f64) {
        {
            let mut metrics = self.metrics.lock().expect("agent metrics poisoned");
            if succeeded {
                metrics.completed += 1;
            } else {
                metrics.failed += 1;
            }
            let total = (metrics.completed + metrics.failed) as f64;
            metrics.avg_latency_ms += (latency_ms - metrics.avg_latency_ms) / total;
        }

        let remaining = self.active.fetch_sub(1, Ordering::Relaxed) - 1;
        if remaining == 0 {
            let mut status = self.status.lock().expect("agent status poisoned");
            if *status == AgentStatus::Busy {
                *status = AgentStatus::Idle;
            }
        }
        self.changed.notify_waiters();
    }

    /// Undo `task_started` without touching metrics. Used when the
    /// claimed task turns out to be gone (e.g. cancelled in the race
    /// between pop and the running transition).
    pub fn task_aborted(&self) {
        let remaining = self.active.fetch_sub(1, Ordering::Relaxed) - 1;
        if remaining == 0 {
            let mut status = self.status.lock().expect("agent status poisoned");
            if *status == AgentStatus::Busy {
                *status = AgentStatus::Idle;
            }
        }
        self.changed.notify_waiters();
    }

    fn apply_control(&self, op: ControlOp) {
        let mut status = self.status.lock().expect("agent status poisoned");
        match op {
            ControlOp::Pause => *status = AgentStatus::Paused,
            ControlOp::Resume => {
                if matches!(*status, AgentStatus::Paused | AgentStatus::Stopped) {
                    *status = if self.active() > 0 {
                        AgentStatus::Busy
                    } else {
                        AgentStatus::Idle
                    };
                }
            }
            ControlOp::Reset => {
                // Queued tasks remain queued; identity is preserved.
                *self.metrics.lock().expect("agent metrics poisoned") = AgentMetrics::default();
            }
        }
        drop(status);
        self.changed.notify_waiters();
    }

    /// Mark stopped at shutdown; queued tasks stay queued.
    pub fn mark_stopped(&self) {
        *self.status.lock().expect("agent status poisoned") = AgentStatus::Stopped;
        self.changed.notify_waiters();
    }
}

pub struct AgentRegistry {
    agents: HashMap<AgentKind, Arc<dyn Agent>>,
    runtimes: Mutex<HashMap<(Uuid, AgentKind), Arc<AgentRuntime>>>,
}

impl AgentRegistry {
    /// Registry with the five stock agents.
    pub fn with_default_agents() -> Self {
        let mut agents: HashMap<AgentKind, Arc<dyn Agent>> = HashMap::new();
        agents.insert(AgentKind::Sales, Arc::new(SalesAgent));
        agents.insert(AgentKind::Marketing, Arc::new(MarketingAgent));
        agents.insert(AgentKind::Content, Arc::new(ContentAgent));
        agents.insert(AgentKind::Analytics, Arc::new(AnalyticsAgent));
        agents.insert(AgentKind::Operations, Arc::new(OperationsAgent));
        Self {
            agents,
            runtimes: Mutex::new(HashMap::new()),
        }
    }

    pub fn agent(&self, kind: AgentKind) -> CoreResult<Arc<dyn Agent>> {
        self.agents
            .get(&kind)
            .cloned()
            .ok_or_else(|| CoreError::not_found("agent", kind.as_str()))
    }

    pub fn runtime(&self, tenant_id: Uuid, kind: AgentKind) -> Arc<AgentRuntime> {
        let mut runtimes = self.runtimes.lock().expect("registry lock poisoned");
        runtimes
            .entry((tenant_id, kind))
            .or_insert_with(|| Arc::new(AgentRuntime::new()))
            .clone()
    }

    /// Apply a control operation and return the updated descriptor.
    pub async fn control(
        &self,
        tenant_id: Uuid,
        kind: AgentKind,
        op: ControlOp,
    ) -> CoreResult<AgentDescriptor> {
        let agent = self.agent(kind)?;
        agent.on_control(op).await;
        self.runtime(tenant_id, kind).apply_control(op);
        Ok(self.describe(tenant_id, kind))
    }

    pub fn describe(&self, tenant_id: Uuid, kind: AgentKind) -> AgentDescriptor {
        let runtime = self.runtime(tenant_id, kind);
        let capabilities = self
            .agents
            .get(&kind)
            .map(|a| a.capabilities())
            .unwrap_or_default();
        AgentDescriptor {
            kind,
            capabilities,
            status: runtime.status(),
            metrics: runtime.metrics(),
        }
    }

    pub fn describe_all(&self, tenant_id: Uuid) -> Vec<AgentDescriptor> {
        ALL_AGENT_KINDS
            .iter()
            .map(|kind| self.describe(tenant_id, *kind))
            .collect()
    }

    /// Mark every runtime stopped. Used at shutdown.
    pub fn stop_all(&self) {
        let runtimes = self.runtimes.lock().expect("registry lock poisoned");
        for runtime in runtimes.values() {
            runtime.mark_stopped();
        }
    }
}
