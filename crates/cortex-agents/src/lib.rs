//! Cortex Agents — the agent framework, per-tenant task queues, the
//! dispatch loop, and the collaboration coordinator.

pub mod agent;
pub mod collaboration;
pub mod dispatch;
pub mod error;
pub mod kinds;
pub mod metrics;
pub mod queue;
pub mod registry;

pub use agent::{Agent, AgentContext};
pub use collaboration::CollaborationCoordinator;
pub use dispatch::{DispatchConfig, TaskService};
pub use error::AgentError;
pub use metrics::{MetricSink, spawn_metric_writer};
pub use registry::{AgentRegistry, AgentRuntime};
