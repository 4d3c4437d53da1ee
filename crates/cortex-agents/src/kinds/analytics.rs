//! Analytics agent — report shaping over supplied numeric inputs.
//!
//! Aggregates are computed locally; the model only narrates them.

use async_trait::async_trait;
use cortex_core::models::agent::AgentKind;
use cortex_core::models::task::Task;
use cortex_providers::{Capability, InvokeOptions};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{cached_generation, parse_payload};
use crate::agent::{Agent, AgentContext};
use crate::error::AgentError;

#[derive(Debug, Deserialize)]
struct AnalyticsRequest {
    metric_name: String,
    values: Vec<f64>,
    #[serde(default)]
    question: Option<String>,
}

pub struct AnalyticsAgent;

#[async_trait]
impl Agent for AnalyticsAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Analytics
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["data_analysis".into(), "report_shaping".into()]
    }

    fn validate(&self, payload: &Value) -> Result<(), AgentError> {
        let request: AnalyticsRequest = parse_payload(payload)?;
        if request.values.is_empty() {
            return Err(AgentError::InvalidPayload(
                "values must not be empty".into(),
            ));
        }
        Ok(())
    }

    async fn handle(&self, task: &Task, ctx: &AgentContext) -> Result<Value, AgentError> {
        let request: AnalyticsRequest = parse_payload(&task.payload)?;
        if request.values.is_empty() {
            return Err(AgentError::InvalidPayload(
                "values must not be empty".into(),
            ));
        }

        let count = request.values.len();
        let sum: f64 = request.values.iter().sum();
        let mean = sum / count as f64;
        let min = request.values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = request
            .values
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);

        let prompt = format!(
            "Shape a short report on the metric '{}' from these aggregates:\n\
             count={count}, mean={mean:.3}, min={min:.3}, max={max:.3}\n\
             Question: {}",
            request.metric_name,
            request.question.as_deref().unwrap_or("summarize the trend"),
        );

        let generated = cached_generation(
            ctx,
            &task.payload,
            Capability::Reasoning,
            prompt,
            InvokeOptions {
                temperature: 0.2,
                ..Default::default()
            },
        )
        .await?;

        Ok(json!({
            "metric": request.metric_name,
            "aggregates": { "count": count, "mean": mean, "min": min, "max": max },
            "report": generated,
        }))
    }
}
