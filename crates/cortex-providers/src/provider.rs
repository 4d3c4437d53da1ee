//! The model provider seam.
//!
//! One implementation exists per provider; the control plane never
//! sees provider SDK types, only this trait and its error taxonomy.
//! Provider-specific failures (model-not-found, unsupported parameter)
//! map to [`ProviderError::Unavailable`] so the system degrades to the
//! next chain entry instead of surfacing provider names to callers.

use async_trait::async_trait;
use cortex_core::error::CoreError;
use thiserror::Error;

use crate::entry::ModelEntry;

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The entry cannot serve right now; the caller walks the chain.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// The request itself is invalid. Does not fall back.
    #[error("provider rejected request: {0}")]
    Rejected(String),

    #[error("provider quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The invocation timed out; the caller walks the chain.
    #[error("provider timed out: {0}")]
    Timeout(String),

    /// Unrecoverable. Does not fall back.
    #[error("provider failure: {0}")]
    Fatal(String),
}

impl ProviderError {
    /// True for the error kinds that trigger a walk to the next entry
    /// in the fallback chain.
    pub fn falls_back(&self) -> bool {
        matches!(
            self,
            ProviderError::Unavailable(_) | ProviderError::Timeout(_)
        )
    }
}

impl From<ProviderError> for CoreError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Unavailable(msg) | ProviderError::Timeout(msg) => {
                CoreError::Unavailable(msg)
            }
            ProviderError::QuotaExceeded(_) => CoreError::QuotaExceeded {
                dimension: "provider".into(),
                retry_after_secs: None,
            },
            ProviderError::Rejected(msg) => CoreError::Validation {
                field: "prompt".into(),
                message: msg,
            },
            ProviderError::Fatal(msg) => CoreError::Internal(msg),
        }
    }
}

/// Tunables forwarded to the provider with each invocation.
#[derive(Debug, Clone)]
pub struct InvokeOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for InvokeOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 4_096,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub content: String,
    /// The entry name that produced the response.
    pub model: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn id(&self) -> &str;

    async fn invoke(
        &self,
        entry: &ModelEntry,
        prompt: &str,
        options: &InvokeOptions,
    ) -> Result<(ProviderResponse, Usage), ProviderError>;
}
