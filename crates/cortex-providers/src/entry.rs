//! Model catalogue entries and capability tags.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// What a model entry can do. Routing matches on these tags instead of
/// string-matching on model names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Text,
    Vision,
    Reasoning,
    Code,
    Multimodal,
    LongContext,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Text => "text",
            Capability::Vision => "vision",
            Capability::Reasoning => "reasoning",
            Capability::Code => "code",
            Capability::Multimodal => "multimodal",
            Capability::LongContext => "long_context",
        }
    }
}

/// One entry in the model catalogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Stable name, unique within the registry.
    pub name: String,
    /// The provider implementation that serves this entry.
    pub provider_id: String,
    pub capabilities: BTreeSet<Capability>,
    pub context_window: u32,
    /// Relative cost; cheaper entries win ties during selection.
    pub cost_weight: u32,
    pub available: bool,
}

impl ModelEntry {
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}
