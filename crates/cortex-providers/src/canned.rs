//! In-process providers.
//!
//! External provider SDKs plug in behind [`ModelProvider`]; what ships
//! here is the always-available canned provider that backs the safe
//! default, and a scripted provider used by tests to stage failure
//! sequences.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::entry::ModelEntry;
use crate::provider::{InvokeOptions, ModelProvider, ProviderError, ProviderResponse, Usage};

/// Deterministic template completions. Never fails, which is what
/// makes it a valid safe default.
pub struct CannedProvider {
    id: String,
}

impl CannedProvider {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
impl ModelProvider for CannedProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn invoke(
        &self,
        entry: &ModelEntry,
        prompt: &str,
        options: &InvokeOptions,
    ) -> Result<(ProviderResponse, Usage), ProviderError> {
        let prompt_tokens = (prompt.len() / 4) as u32;
        let content = format!(
            "[{}] Summary of the request: {}",
            entry.name,
            prompt.chars().take(200).collect::<String>()
        );
        let completion_tokens = (content.len() / 4).min(options.max_tokens as usize) as u32;

        Ok((
            ProviderResponse {
                content,
                model: entry.name.clone(),
            },
            Usage {
                prompt_tokens,
                completion_tokens,
            },
        ))
    }
}

type ScriptedOutcome = Result<String, ProviderError>;

/// Plays back a staged sequence of outcomes, then answers normally.
/// Used to exercise fallback and retry paths.
pub struct ScriptedProvider {
    id: String,
    script: Mutex<VecDeque<ScriptedOutcome>>,
    calls: Mutex<u32>,
}

impl ScriptedProvider {
    pub fn new(id: impl Into<String>, script: Vec<ScriptedOutcome>) -> Self {
        Self {
            id: id.into(),
            script: Mutex::new(script.into()),
            calls: Mutex::new(0),
        }
    }

    /// How many invocations this provider has served.
    pub fn call_count(&self) -> u32 {
        *self.calls.lock().expect("call counter poisoned")
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn invoke(
        &self,
        entry: &ModelEntry,
        _prompt: &str,
        _options: &InvokeOptions,
    ) -> Result<(ProviderResponse, Usage), ProviderError> {
        *self.calls.lock().expect("call counter poisoned") += 1;

        let next = self.script.lock().expect("script poisoned").pop_front();
        match next {
            Some(Err(err)) => Err(err),
            Some(Ok(content)) => Ok((
                ProviderResponse {
                    content,
                    model: entry.name.clone(),
                },
                Usage::default(),
            )),
            None => Ok((
                ProviderResponse {
                    content: "ok".into(),
                    model: entry.name.clone(),
                },
                Usage::default(),
            )),
        }
    }
}
