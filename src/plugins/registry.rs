//! Entry point registry.

use indexmap::IndexMap;
use tracing::debug;

use super::{builtin, Plugin, PluginContext, PluginDescriptor};
use crate::error::{Error, Result};

/// Creates a plugin instance bound to a context.
pub type PluginFactory = fn(PluginContext) -> Result<Box<dyn Plugin>>;

struct Registration {
    descriptor: PluginDescriptor,
    factory: PluginFactory,
}

/// Maps entry point names to plugin factories.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: IndexMap<String, Registration>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every shipped plugin.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        builtin::register_all(&mut registry);
        registry
    }

    /// Registers `factory` under the descriptor's entry point, replacing any
    /// previous registration.
    pub fn register(&mut self, descriptor: PluginDescriptor, factory: PluginFactory) {
        debug!("Registering plugin {}", descriptor.entry_point);
        self.plugins.insert(
            descriptor.entry_point.clone(),
            Registration {
                descriptor,
                factory,
            },
        );
    }

    /// Instantiates the plugin registered under `entry_point`.
    pub fn create(&self, entry_point: &str, context: PluginContext) -> Result<Box<dyn Plugin>> {
        let registration = self
            .plugins
            .get(entry_point)
            .ok_or_else(|| Error::PluginNotFound(entry_point.to_string()))?;
        (registration.factory)(context)
    }

    pub fn descriptor(&self, entry_point: &str) -> Option<&PluginDescriptor> {
        self.plugins.get(entry_point).map(|r| &r.descriptor)
    }

    pub fn contains(&self, entry_point: &str) -> bool {
        self.plugins.contains_key(entry_point)
    }

    pub fn entry_points(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }

    /// Descriptors of plugins visible to API users, sorted by entry point.
    pub fn public(&self) -> Vec<&PluginDescriptor> {
        let mut descriptors: Vec<_> = self
            .plugins
            .values()
            .map(|r| &r.descriptor)
            .filter(|d| d.public)
            .collect();
        descriptors.sort_by(|a, b| a.entry_point.cmp(&b.entry_point));
        descriptors
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.plugins.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_entry_points() {
        let registry = PluginRegistry::builtin();
        let mut names: Vec<&str> = registry.entry_points().collect();
        names.sort_unstable();
        assert_eq!(names, vec!["cluster_deploy", "purge_cluster", "server_discovery"]);
    }

    #[test]
    fn test_public_listing_hides_internal_plugins() {
        let registry = PluginRegistry::builtin();
        let public: Vec<&str> = registry
            .public()
            .iter()
            .map(|d| d.entry_point.as_str())
            .collect();
        assert_eq!(public, vec!["cluster_deploy", "purge_cluster"]);
    }
}
