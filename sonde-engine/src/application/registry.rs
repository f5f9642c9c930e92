//! Plugin registry
//!
//! Maps plugin ids to live plugin instances. Workflow nodes reference
//! plugins by id only; resolution happens at dispatch time, so a definition
//! can be registered before its plugins and vice versa.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use sonde_core::domain::plugin::DiagnosticPlugin;

#[derive(Default)]
pub struct PluginRegistry {
    plugins: DashMap<String, Arc<dyn DiagnosticPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin under its own id, replacing any previous instance.
    pub fn register(&self, plugin: Arc<dyn DiagnosticPlugin>) {
        let id = plugin.id().to_string();
        debug!(plugin_id = %id, title = %plugin.title(), "Registering plugin");
        self.plugins.insert(id, plugin);
    }

    pub fn get(&self, plugin_id: &str) -> Option<Arc<dyn DiagnosticPlugin>> {
        self.plugins.get(plugin_id).map(|entry| entry.clone())
    }

    /// Registered plugin ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.plugins.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use sonde_core::domain::finding::Finding;
    use sonde_core::domain::plugin::{DiagnosticContext, PluginError};

    struct StubPlugin {
        id: &'static str,
    }

    #[async_trait]
    impl DiagnosticPlugin for StubPlugin {
        fn id(&self) -> &str {
            self.id
        }

        fn title(&self) -> &str {
            "stub"
        }

        async fn run(&self, _ctx: &DiagnosticContext) -> Result<Vec<Finding>, PluginError> {
            Ok(vec![])
        }
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = PluginRegistry::new();
        registry.register(Arc::new(StubPlugin { id: "probe-a" }));

        assert!(registry.get("probe-a").is_some());
        assert!(registry.get("probe-b").is_none());
    }

    #[test]
    fn test_ids_sorted() {
        let registry = PluginRegistry::new();
        registry.register(Arc::new(StubPlugin { id: "zeta" }));
        registry.register(Arc::new(StubPlugin { id: "alpha" }));

        assert_eq!(registry.ids(), vec!["alpha", "zeta"]);
    }
}
