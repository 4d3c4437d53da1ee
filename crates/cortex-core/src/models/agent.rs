//! Agent descriptors and control operations.

use serde::{Deserialize, Serialize};

/// The fixed set of agent kinds the registry ships with. One agent of
/// each kind exists per tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Sales,
    Marketing,
    Content,
    Analytics,
    Operations,
}

pub const ALL_AGENT_KINDS: &[AgentKind] = &[
    AgentKind::Sales,
    AgentKind::Marketing,
    AgentKind::Content,
    AgentKind::Analytics,
    AgentKind::Operations,
];

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Sales => "sales",
            AgentKind::Marketing => "marketing",
            AgentKind::Content => "content",
            AgentKind::Analytics => "analytics",
            AgentKind::Operations => "operations",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sales" => Some(AgentKind::Sales),
            "marketing" => Some(AgentKind::Marketing),
            "content" => Some(AgentKind::Content),
            "analytics" => Some(AgentKind::Analytics),
            "operations" => Some(AgentKind::Operations),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Busy,
    Paused,
    Stopped,
}

/// Rolling per-agent counters. Reset zeroes these but preserves the
/// agent's identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub completed: u64,
    pub failed: u64,
    pub avg_latency_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub kind: AgentKind,
    pub capabilities: Vec<String>,
    pub status: AgentStatus,
    pub metrics: AgentMetrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlOp {
    Pause,
    Resume,
    Reset,
}
