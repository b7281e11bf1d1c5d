//! In-memory tool registry.
//!
//! Populated once at bootstrap, read-only from the pipeline's perspective
//! afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use deskpilot_core::capability::{Capability, Tool, ToolRegistry};

/// Registry backed by a name-keyed map.
#[derive(Default)]
pub struct InMemoryRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its capability name. Re-registration replaces.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.capability().tool_name.clone();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "tool re-registered, previous definition replaced");
        }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl ToolRegistry for InMemoryRegistry {
    fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    fn get(&self, name: &str) -> Option<Capability> {
        self.tools.get(name).map(|t| t.capability().clone())
    }

    fn list_by_prefix(&self, prefix: &str) -> Vec<Capability> {
        let mut capabilities: Vec<Capability> = self
            .tools
            .values()
            .map(|t| t.capability().clone())
            .filter(|c| c.in_domain(prefix))
            .collect();
        capabilities.sort_by(|a, b| a.tool_name.cmp(&b.tool_name));
        capabilities
    }

    fn list_all(&self) -> Vec<Capability> {
        let mut capabilities: Vec<Capability> =
            self.tools.values().map(|t| t.capability().clone()).collect();
        capabilities.sort_by(|a, b| a.tool_name.cmp(&b.tool_name));
        capabilities
    }

    fn tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::file_tools;

    #[test]
    fn test_prefix_listing_matches_whole_segments() {
        let mut registry = InMemoryRegistry::new();
        for tool in file_tools() {
            registry.register(tool);
        }
        let files = registry.list_by_prefix("files");
        assert!(!files.is_empty());
        assert!(files.iter().all(|c| c.tool_name.starts_with("files.")));
        assert!(registry.list_by_prefix("file").is_empty());
    }
}
