use std::collections::HashMap;
use std::sync::Arc;

use super::adapters::{builtin_profiles, ProfileAdapter};
use super::SourceAdapter;
use crate::error::{LakehouseError, Result};

/// Registry of source adapters, keyed by source id
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn SourceAdapter>>,
    order: Vec<String>,
}

impl AdapterRegistry {
    /// Create a registry with every built-in source profile
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for profile in builtin_profiles() {
            registry.register(Arc::new(ProfileAdapter::new(profile)));
        }
        registry
    }

    pub fn empty() -> Self {
        Self {
            adapters: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register an adapter, replacing any previous one with the same id
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        let id = adapter.source_id().to_string();
        if self.adapters.insert(id.clone(), adapter).is_none() {
            self.order.push(id);
        }
    }

    pub fn get(&self, source_id: &str) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.get(source_id).cloned()
    }

    /// Registered source ids, in registration order
    pub fn list_sources(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    /// Adapters for the requested ids, or all of them when `requested` is empty.
    pub fn select(&self, requested: &[String]) -> Result<Vec<Arc<dyn SourceAdapter>>> {
        if requested.is_empty() {
            return Ok(self
                .order
                .iter()
                .filter_map(|id| self.adapters.get(id).cloned())
                .collect());
        }

        requested
            .iter()
            .map(|id| {
                self.get(id).ok_or_else(|| {
                    LakehouseError::Config(format!(
                        "Unknown source '{}'. Registered sources: {}",
                        id,
                        self.list_sources().join(", ")
                    ))
                })
            })
            .collect()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
