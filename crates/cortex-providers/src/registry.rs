//! Model registry — read-mostly catalogue with copy-on-write updates.
//!
//! Selection is deterministic for a given snapshot, and every chain
//! ends in the always-available safe default.

use std::sync::{Arc, RwLock};

use thiserror::Error;

use crate::entry::{Capability, ModelEntry};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown model entry: {0}")]
    UnknownEntry(String),

    #[error("safe default {0} must exist and stay available")]
    BadSafeDefault(String),
}

#[derive(Debug)]
struct Catalogue {
    entries: Vec<ModelEntry>,
    safe_default: usize,
}

/// Thread-safe model catalogue. Readers take an `Arc` snapshot;
/// availability updates build a new catalogue and swap it in.
pub struct ModelRegistry {
    snapshot: RwLock<Arc<Catalogue>>,
}

impl ModelRegistry {
    /// Build a registry. `safe_default` names the entry every chain
    /// falls back to; it must exist and be available.
    pub fn new(entries: Vec<ModelEntry>, safe_default: &str) -> Result<Self, RegistryError> {
        let idx = entries
            .iter()
            .position(|e| e.name == safe_default && e.available)
            .ok_or_else(|| RegistryError::BadSafeDefault(safe_default.to_string()))?;

        Ok(Self {
            snapshot: RwLock::new(Arc::new(Catalogue {
                entries,
                safe_default: idx,
            })),
        })
    }

    /// Flip an entry's availability flag. The safe default cannot be
    /// marked unavailable.
    pub fn set_availability(&self, name: &str, available: bool) -> Result<(), RegistryError> {
        let current = self.snapshot();
        if !available && current.entries[current.safe_default].name == name {
            return Err(RegistryError::BadSafeDefault(name.to_string()));
        }

        let mut entries = current.entries.clone();
        let entry = entries
            .iter_mut()
            .find(|e| e.name == name)
            .ok_or_else(|| RegistryError::UnknownEntry(name.to_string()))?;
        entry.available = available;

        let next = Arc::new(Catalogue {
            entries,
            safe_default: current.safe_default,
        });
        *self.snapshot.write().expect("registry lock poisoned") = next;
        Ok(())
    }

    pub fn list(&self) -> Vec<ModelEntry> {
        self.snapshot().entries.clone()
    }

    pub fn get(&self, name: &str) -> Option<ModelEntry> {
        self.snapshot()
            .entries
            .iter()
            .find(|e| e.name == name)
            .cloned()
    }

    /// Select the fallback chain for a capability requirement.
    ///
    /// Candidates are the available entries supporting the capability.
    /// Preference-listed entries come first in the caller's order; the
    /// rest follow ordered by `(cost_weight, name)`. The safe default
    /// closes the chain, so the result is never empty.
    pub fn select(&self, requirement: Capability, preferences: &[String]) -> Vec<ModelEntry> {
        let snapshot = self.snapshot();
        let safe_default = &snapshot.entries[snapshot.safe_default];

        let mut chain: Vec<ModelEntry> = Vec::new();
        for preferred in preferences {
            if let Some(entry) = snapshot.entries.iter().find(|e| {
                e.name == *preferred
                    && e.available
                    && e.supports(requirement)
                    && e.name != safe_default.name
            }) {
                if !chain.iter().any(|c| c.name == entry.name) {
                    chain.push(entry.clone());
                }
            }
        }

        let mut rest: Vec<&ModelEntry> = snapshot
            .entries
            .iter()
            .filter(|e| {
                e.available
                    && e.supports(requirement)
                    && e.name != safe_default.name
                    && !chain.iter().any(|c| c.name == e.name)
            })
            .collect();
        rest.sort_by(|a, b| {
            a.cost_weight
                .cmp(&b.cost_weight)
                .then_with(|| a.name.cmp(&b.name))
        });
        chain.extend(rest.into_iter().cloned());

        chain.push(safe_default.clone());
        chain
    }

    fn snapshot(&self) -> Arc<Catalogue> {
        self.snapshot.read().expect("registry lock poisoned").clone()
    }
}
