//! Cortex Insights — windowed performance analysis over telemetry.
//!
//! Products are advisory: summaries, anomaly flags, and optimisation
//! recommendations. The engine never acts on its own output.

mod engine;
mod store;
mod types;

pub use engine::{InsightsConfig, InsightsEngine};
pub use store::InsightStore;
pub use types::{
    AgentPerformance, Insight, InsightKind, InsightSeverity, PerformanceSummary,
};
