//! Operations agent — workflow automation descriptors, invoice
//! processing, and client onboarding.

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
enum OperationsRequest {
    AutomateWorkflow {
        name: String,
        steps: Vec<String>,
    },
    ProcessInvoice {
        vendor: String,
        amount: f64,
        currency: String,
        #[serde(default)]
        line_items: Vec<String>,
    },
    OnboardClient {
        client_name: String,
        services: Vec<String>,
    },
}

pub struct OperationsAgent;

#[async_trait]
impl Agent for OperationsAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Operations
    }

    fn capabilities(&self) -> Vec<String> {
        vec![
            "workflow_automation".into(),
            "invoice_processing".into(),
            "client_onboarding".into(),
        ]
    }

    fn validate(&self, payload: &Value) -> Result<(), AgentError> {
        parse_payload::<OperationsRequest>(payload).map(|_| ())
    }

    async fn handle(&self, task: &Task, ctx: &AgentContext) -> Result<Value, AgentError> {
        let request: OperationsRequest = parse_payload(&task.payload)?;

        match request {
            OperationsRequest::AutomateWorkflow { name, steps } => {
                let prompt = format!(
                    "Produce an automation descriptor for workflow '{name}' with steps:\n{}\n\
                     For each step give a trigger, an action, and a failure handler.",
                    steps.join("\n"),
                );
                let generated = cached_generation(
                    ctx,
                    &task.payload,
                    Capability::Code,
                    prompt,
                    InvokeOptions {
                        temperature: 0.2,
                        ..Default::default()
                    },
                )
                .await?;
                Ok(json!({
                    "operation": "automate_workflow",
                    "workflow": name,
                    "descriptor": generated,
                }))
            }
            OperationsRequest::ProcessInvoice {
                vendor,
                amount,
                currency,
                line_items,
            } => {
                let prompt = format!(
                    "Review this invoice for anomalies and produce a booking summary.\n\
                     Vendor: {vendor}\nAmount: {amount:.2} {currency}\nLine items:\n{}",
                    if line_items.is_empty() {
                        "none provided".to_string()
                    } else {
                        line_items.join("\n")
                    },
                );
                let generated = cached_generation(
                    ctx,
                    &task.payload,
                    Capability::Reasoning,
                    prompt,
                    InvokeOptions {
                        temperature: 0.1,
                        ..Default::default()
                    },
                )
                .await?;
                Ok(json!({
                    "operation": "process_invoice",
                    "vendor": vendor,
                    "amount": amount,
                    "currency": currency,
                    "review": generated,
                }))
            }
            OperationsRequest::OnboardClient {
                client_name,
                services,
            } => {
                let prompt = format!(
                    "Draft an onboarding plan for client '{client_name}' covering \
                     services: {}.\nInclude kickoff, access provisioning, and a \
                     30-day checkpoint.",
                    services.join(", "),
                );
                let generated = cached_generation(
                    ctx,
                    &task.payload,
                    Capability::Text,
                    prompt,
                    InvokeOptions::default(),
                )
                .await?;
                Ok(json!({
                    "operation": "onboard_client",
                    "client": client_name,
                    "plan": generated,
                }))
            }
        }
    }
}
