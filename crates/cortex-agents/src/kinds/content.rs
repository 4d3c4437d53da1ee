//! Content agent — drafting across formats.

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
struct ContentRequest {
    /// One of: blog_post, social_media, ad_copy, email, web_copy.
    format: String,
    topic: String,
    #[serde(default)]
    tone: Option<String>,
    #[serde(default)]
    keywords: Vec<String>,
}

pub struct ContentAgent;

#[async_trait]
impl Agent for ContentAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Content
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["content_drafting".into()]
    }

    fn validate(&self, payload: &Value) -> Result<(), AgentError> {
        let request: ContentRequest = parse_payload(payload)?;
        const FORMATS: &[&str] = &["blog_post", "social_media", "ad_copy", "email", "web_copy"];
        if !FORMATS.contains(&request.format.as_str()) {
            return Err(AgentError::InvalidPayload(format!(
                "unknown format {}, expected one of {}",
                request.format,
                FORMATS.join(", ")
            )));
        }
        Ok(())
    }

    async fn handle(&self, task: &Task, ctx: &AgentContext) -> Result<Value, AgentError> {
        let request: ContentRequest = parse_payload(&task.payload)?;

        let prompt = format!(
            "Draft {} content.\nTopic: {}\nTone: {}\nKeywords: {}",
            request.format.replace('_', " "),
            request.topic,
            request.tone.as_deref().unwrap_or("professional"),
            if request.keywords.is_empty() {
                "none".to_string()
            } else {
                request.keywords.join(", ")
            },
        );

        let generated = cached_generation(
            ctx,
            &task.payload,
            Capability::Text,
            prompt,
            InvokeOptions {
                temperature: 0.8,
                ..Default::default()
            },
        )
        .await?;

        Ok(json!({ "format": request.format, "draft": generated }))
    }
}
