//! Insight and summary record types.

use chrono::{DateTime, Utc};
use cortex_core::models::agent::AgentKind;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    Anomaly,
    Recommendation,
}

/// A single analysis product. Advisory only — the engine never acts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub kind: InsightKind,
    pub severity: InsightSeverity,
    /// Confidence in [0, 1].
    pub confidence: f64,
    pub title: String,
    pub description: String,
    pub recommendations: Vec<String>,
    pub agent_kind: Option<AgentKind>,
    pub created_at: DateTime<Utc>,
}

/// Per-agent aggregates over an analysis window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPerformance {
    pub kind: AgentKind,
    pub task_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub success_rate: f64,
    pub p50_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub retry_count: u64,
    pub fallback_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub tenant_id: Uuid,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub agents: Vec<AgentPerformance>,
}
