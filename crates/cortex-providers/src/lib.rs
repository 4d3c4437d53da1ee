//! Cortex Providers — model catalogue, capability-based routing, and
//! graceful degradation across provider implementations.

pub mod canned;
pub mod entry;
pub mod provider;
pub mod registry;
pub mod router;

pub use canned::{CannedProvider, ScriptedProvider};
pub use entry::{Capability, ModelEntry};
pub use provider::{InvokeOptions, ModelProvider, ProviderError, ProviderResponse, Usage};
pub use registry::{ModelRegistry, RegistryError};
pub use router::{FallbackEvent, Invocation, ProviderRouter};
