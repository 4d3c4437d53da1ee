//! Marketing agent — campaign planning and channel mix
//! recommendations.

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
#[serde(tag = "operation", rename_all = "snake_case")]
enum MarketingRequest {
    PlanCampaign {
        product: String,
        audience: String,
        #[serde(default)]
        budget: Option<f64>,
    },
    RecommendChannels {
        goal: String,
        #[serde(default)]
        channels_in_use: Vec<String>,
    },
}

pub struct MarketingAgent;

#[async_trait]
impl Agent for MarketingAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Marketing
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["campaign_planning".into(), "channel_mix".into()]
    }

    fn validate(&self, payload: &Value) -> Result<(), AgentError> {
        parse_payload::<MarketingRequest>(payload).map(|_| ())
    }

    async fn handle(&self, task: &Task, ctx: &AgentContext) -> Result<Value, AgentError> {
        let request: MarketingRequest = parse_payload(&task.payload)?;

        let (operation, prompt) = match &request {
            MarketingRequest::PlanCampaign {
                product,
                audience,
                budget,
            } => (
                "plan_campaign",
                format!(
                    "Plan a marketing campaign.\nProduct: {product}\n\
                     Audience: {audience}\nBudget: {}\n\
                     Cover positioning, phases, channels, and success metrics.",
                    budget.map_or("not specified".into(), |b| format!("{b:.2}")),
                ),
            ),
            MarketingRequest::RecommendChannels {
                goal,
                channels_in_use,
            } => (
                "recommend_channels",
                format!(
                    "Recommend a channel mix for this goal: {goal}.\n\
                     Channels already in use: {}.\n\
                     Rank channels by expected return and explain the split.",
                    if channels_in_use.is_empty() {
                        "none".to_string()
                    } else {
                        channels_in_use.join(", ")
                    },
                ),
            ),
        };

        let generated = cached_generation(
            ctx,
            &task.payload,
            Capability::Text,
            prompt,
            InvokeOptions::default(),
        )
        .await?;
        Ok(json!({ "operation": operation, "plan": generated }))
    }
}
