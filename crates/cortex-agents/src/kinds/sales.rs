//! Sales agent — lead qualification, pipeline analysis, and proposal
//! drafting.

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
enum SalesRequest {
    QualifyLead {
        lead: LeadDetails,
    },
    AnalyzePipeline {
        deals: Vec<DealSummary>,
    },
    DraftProposal {
        company: String,
        needs: Vec<String>,
        #[serde(default)]
        budget: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct LeadDetails {
    name: String,
    #[serde(default)]
    company: Option<String>,
    #[serde(default)]
    industry: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DealSummary {
    name: String,
    stage: String,
    value: f64,
}

pub struct SalesAgent;

#[async_trait]
impl Agent for SalesAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Sales
    }

    fn capabilities(&self) -> Vec<String> {
        vec![
            "lead_qualification".into(),
            "pipeline_analysis".into(),
            "proposal_drafting".into(),
        ]
    }

    fn validate(&self, payload: &Value) -> Result<(), AgentError> {
        parse_payload::<SalesRequest>(payload).map(|_| ())
    }

    async fn handle(&self, task: &Task, ctx: &AgentContext) -> Result<Value, AgentError> {
        let request: SalesRequest = parse_payload(&task.payload)?;

        match request {
            SalesRequest::QualifyLead { lead } => {
                let prompt = format!(
                    "Qualify this sales lead and score it 0-100.\n\
                     Name: {}\nCompany: {}\nIndustry: {}\nNotes: {}\n\
                     Return a short assessment with the score, fit, and next step.",
                    lead.name,
                    lead.company.as_deref().unwrap_or("unknown"),
                    lead.industry.as_deref().unwrap_or("unknown"),
                    lead.notes.as_deref().unwrap_or("none"),
                );
                let generated = cached_generation(
                    ctx,
                    &task.payload,
                    Capability::Reasoning,
                    prompt,
                    InvokeOptions {
                        temperature: 0.3,
                        ..Default::default()
                    },
                )
                .await?;
                Ok(json!({ "operation": "qualify_lead", "assessment": generated }))
            }
            SalesRequest::AnalyzePipeline { deals } => {
                let total: f64 = deals.iter().map(|d| d.value).sum();
                let lines: Vec<String> = deals
                    .iter()
                    .map(|d| format!("- {} [{}] {:.2}", d.name, d.stage, d.value))
                    .collect();
                let prompt = format!(
                    "Analyze this sales pipeline ({} deals, total value {total:.2}):\n{}\n\
                     Identify bottlenecks and the three highest-leverage actions.",
                    deals.len(),
                    lines.join("\n"),
                );
                let generated = cached_generation(
                    ctx,
                    &task.payload,
                    Capability::Reasoning,
                    prompt,
                    InvokeOptions::default(),
                )
                .await?;
                Ok(json!({
                    "operation": "analyze_pipeline",
                    "deal_count": deals.len(),
                    "total_value": total,
                    "analysis": generated,
                }))
            }
            SalesRequest::DraftProposal {
                company,
                needs,
                budget,
            } => {
                let prompt = format!(
                    "Draft a service proposal for {company}.\n\
                     Needs: {}\nBudget: {}\n\
                     Structure: summary, scope, timeline, investment.",
                    needs.join(", "),
                    budget.as_deref().unwrap_or("not specified"),
                );
                let generated = cached_generation(
                    ctx,
                    &task.payload,
                    Capability::Text,
                    prompt,
                    InvokeOptions::default(),
                )
                .await?;
                Ok(json!({ "operation": "draft_proposal", "proposal": generated }))
            }
        }
    }
}
