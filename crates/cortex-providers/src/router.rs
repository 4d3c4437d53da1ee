//! Walks a fallback chain across registered providers.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::entry::Capability;
use crate::provider::{InvokeOptions, ModelProvider, ProviderError, ProviderResponse, Usage};
use crate::registry::ModelRegistry;

/// One recorded degradation step: the entry that failed and the entry
/// that was tried next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackEvent {
    pub from: String,
    pub to: String,
}

/// The outcome of a routed invocation.
#[derive(Debug)]
pub struct Invocation {
    pub response: ProviderResponse,
    pub usage: Usage,
    /// Name of the entry that finally answered.
    pub entry_name: String,
    pub fallbacks: Vec<FallbackEvent>,
}

/// Routes invocations through the registry's fallback chains.
pub struct ProviderRouter {
    registry: Arc<ModelRegistry>,
    providers: HashMap<String, Arc<dyn ModelProvider>>,
}

impl ProviderRouter {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self {
            registry,
            providers: HashMap::new(),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.providers.insert(provider.id().to_string(), provider);
        self
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Invoke the best entry for a capability, degrading along the
    /// chain on `Unavailable` or `Timeout`. `Rejected` and `Fatal`
    /// propagate immediately.
    pub async fn invoke(
        &self,
        requirement: Capability,
        preferences: &[String],
        prompt: &str,
        options: &InvokeOptions,
    ) -> Result<Invocation, ProviderError> {
        let chain = self.registry.select(requirement, preferences);
        let mut fallbacks = Vec::new();
        let mut last_error: Option<ProviderError> = None;

        for (idx, entry) in chain.iter().enumerate() {
            if let Some(prev) = last_error.take() {
                warn!(
                    from = %chain[idx - 1].name,
                    to = %entry.name,
                    error = %prev,
                    "provider degraded, walking fallback chain"
                );
                fallbacks.push(FallbackEvent {
                    from: chain[idx - 1].name.clone(),
                    to: entry.name.clone(),
                });
            }

            let outcome = match self.providers.get(&entry.provider_id) {
                Some(provider) => provider.invoke(entry, prompt, options).await,
                None => Err(ProviderError::Unavailable(format!(
                    "no provider registered for {}",
                    entry.provider_id
                ))),
            };

            match outcome {
                Ok((response, usage)) => {
                    debug!(entry = %entry.name, "provider invocation succeeded");
                    return Ok(Invocation {
                        response,
                        usage,
                        entry_name: entry.name.clone(),
                        fallbacks,
                    });
                }
                Err(err) if err.falls_back() => {
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error
            .unwrap_or_else(|| ProviderError::Unavailable("empty fallback chain".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canned::{CannedProvider, ScriptedProvider};
    use crate::entry::ModelEntry;
    use std::collections::BTreeSet;

    fn entry(name: &str, provider_id: &str) -> ModelEntry {
        ModelEntry {
            name: name.into(),
            provider_id: provider_id.into(),
            capabilities: BTreeSet::from([Capability::Text]),
            context_window: 8_192,
            cost_weight: 1,
            available: true,
        }
    }

    fn registry_with(entries: Vec<ModelEntry>) -> Arc<ModelRegistry> {
        Arc::new(ModelRegistry::new(entries, "fallback").unwrap())
    }

    #[tokio::test]
    async fn falls_back_on_unavailable_and_records_event() {
        let mut primary = entry("primary", "flaky");
        primary.cost_weight = 0;
        let registry = registry_with(vec![primary, entry("fallback", "canned")]);

        let flaky = ScriptedProvider::new("flaky", vec![Err(ProviderError::Unavailable(
            "maintenance".into(),
        ))]);
        let router = ProviderRouter::new(registry)
            .with_provider(Arc::new(flaky))
            .with_provider(Arc::new(CannedProvider::new("canned")));

        let invocation = router
            .invoke(Capability::Text, &[], "hello", &InvokeOptions::default())
            .await
            .unwrap();

        assert_eq!(invocation.entry_name, "fallback");
        assert_eq!(
            invocation.fallbacks,
            vec![FallbackEvent {
                from: "primary".into(),
                to: "fallback".into(),
            }]
        );
    }

    #[tokio::test]
    async fn rejected_does_not_fall_back() {
        let mut primary = entry("primary", "strict");
        primary.cost_weight = 0;
        let registry = registry_with(vec![primary, entry("fallback", "canned")]);

        let strict = ScriptedProvider::new(
            "strict",
            vec![Err(ProviderError::Rejected("bad prompt".into()))],
        );
        let router = ProviderRouter::new(registry)
            .with_provider(Arc::new(strict))
            .with_provider(Arc::new(CannedProvider::new("canned")));

        let err = router
            .invoke(Capability::Text, &[], "hello", &InvokeOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Rejected(_)));
    }

    #[tokio::test]
    async fn missing_provider_registration_degrades() {
        let mut orphan = entry("orphan", "nobody");
        orphan.cost_weight = 0;
        let registry = registry_with(vec![orphan, entry("fallback", "canned")]);

        let router =
            ProviderRouter::new(registry).with_provider(Arc::new(CannedProvider::new("canned")));

        let invocation = router
            .invoke(Capability::Text, &[], "hello", &InvokeOptions::default())
            .await
            .unwrap();
        assert_eq!(invocation.entry_name, "fallback");
        assert_eq!(invocation.fallbacks.len(), 1);
    }
}
