//! The five domain agents the registry ships with.

mod analytics;
mod content;
mod marketing;
mod operations;
mod sales;

pub use analytics::AnalyticsAgent;
pub use content::ContentAgent;
pub use marketing::MarketingAgent;
pub use operations::OperationsAgent;
pub use sales::SalesAgent;

use std::time::Duration;

use cortex_providers::{Capability, InvokeOptions};
use serde_json::{Value, json};

use crate::agent::AgentContext;
use crate::error::AgentError;

/// How long an idempotent sub-result stays cached.
const RESULT_TTL: Duration = Duration::from_secs(900);

/// Shared generation path: consult the cache under the payload
/// fingerprint, otherwise invoke the model chain and cache the
/// structured result. Computation is single-flight per fingerprint,
/// so a stampede of identical payloads costs one provider call.
pub(crate) async fn cached_generation(
    ctx: &AgentContext,
    payload: &Value,
    requirement: Capability,
    prompt: String,
    options: InvokeOptions,
) -> Result<Value, AgentError> {
    let key = ctx.fingerprint(payload);
    ctx.cache
        .get_or_compute(&key, RESULT_TTL, || async {
            let invocation = ctx.invoke_model(requirement, &[], &prompt, &options).await?;
            Ok(json!({
                "output": invocation.response.content,
                "model": invocation.entry_name,
                "tokens": {
                    "prompt": invocation.usage.prompt_tokens,
                    "completion": invocation.usage.completion_tokens,
                },
            }))
        })
        .await
}

/// Parse a typed request out of a task payload.
pub(crate) fn parse_payload<T: serde::de::DeserializeOwned>(
    payload: &Value,
) -> Result<T, AgentError> {
    serde_json::from_value(payload.clone()).map_err(|e| AgentError::InvalidPayload(e.to_string()))
}
