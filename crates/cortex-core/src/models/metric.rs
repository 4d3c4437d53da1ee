//! Telemetry samples. Append-only; compacted by the insights engine.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::agent::AgentKind;

/// Well-known metric names emitted by the dispatcher and provider
/// router.
pub mod names {
    pub const QUEUE_WAIT_MS: &str = "queue_wait_ms";
    pub const TASK_EXEC_MS: &str = "task_exec_ms";
    pub const TASK_RETRY: &str = "task_retry";
    pub const TASK_OUTCOME: &str = "task_outcome";
    pub const PROVIDER_FALLBACK: &str = "provider_fallback";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    pub tenant_id: Uuid,
    pub agent_kind: Option<AgentKind>,
    pub name: String,
    pub value: f64,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl MetricSample {
    pub fn new(tenant_id: Uuid, name: impl Into<String>, value: f64) -> Self {
        Self {
            tenant_id,
            agent_kind: None,
            name: name.into(),
            value,
            labels: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn for_agent(mut self, kind: AgentKind) -> Self {
        self.agent_kind = Some(kind);
        self
    }

    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}
