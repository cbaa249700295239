//! Settings manager: registry, lifecycle controller and load policy together

use std::path::PathBuf;

use crate::Result;
use crate::config::SchemaSource;
use crate::events::LifecycleEvent;
use crate::extensions::ModuleLoader;
use crate::lifecycle::{LifecycleController, LoadPhase, LoadPolicy};
use crate::plugins::{PluginInfo, PluginRegistry};

/// Owns every piece of plugin lifecycle state
pub struct SettingsManager {
    registry: PluginRegistry,
    controller: LifecycleController,
    policy: LoadPolicy,
    schemas: Box<dyn SchemaSource>,
    plugin_dirs: Vec<PathBuf>,
}

impl SettingsManager {
    /// Create a manager; the eager threshold is read from `schemas` once
    #[must_use]
    pub fn new(
        schemas: Box<dyn SchemaSource>,
        plugin_dirs: Vec<PathBuf>,
        loader: Box<dyn ModuleLoader>,
    ) -> Self {
        let policy = LoadPolicy::new(schemas.init_load_priority());
        tracing::debug!(
            eager_threshold = policy.eager_threshold(),
            dirs = ?plugin_dirs,
            "settings manager created"
        );

        Self {
            registry: PluginRegistry::new(),
            controller: LifecycleController::new(loader),
            policy,
            schemas,
            plugin_dirs,
        }
    }

    /// Register a lifecycle observer
    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        self.controller.subscribe(observer);
    }

    /// Current load policy
    #[must_use]
    pub const fn policy(&self) -> LoadPolicy {
        self.policy
    }

    /// Switch the load phase used by subsequent passes
    pub const fn set_phase(&mut self, phase: LoadPhase) {
        self.policy.set_phase(phase);
    }

    /// Registered plugins
    #[must_use]
    pub const fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Scan the plugin directories for new manifests
    ///
    /// Returns the number of newly registered plugins.
    pub fn discover(&mut self) -> usize {
        let mut added = 0;
        for dir in &self.plugin_dirs {
            added += self.registry.scan(dir, self.schemas.as_ref()).len();
        }
        added
    }

    /// Scan the plugin directories and run a load pass in the current phase
    ///
    /// Returns the number of plugins activated.
    ///
    /// # Errors
    ///
    /// Returns error if the module system is unavailable
    pub fn load(&mut self) -> Result<usize> {
        self.controller.ensure_supported()?;
        self.discover();
        self.controller.load_pass(&mut self.registry, &self.policy)
    }

    /// Enable or disable a plugin at runtime
    ///
    /// Returns `false` if `location` is not registered.
    pub fn set_enabled(&mut self, location: &str, enabled: bool) -> bool {
        self.controller
            .set_enabled(&mut self.registry, location, enabled)
    }

    /// Replace the settings source and apply changed values
    ///
    /// Priorities are refreshed and plugins whose `enabled` flag changed are
    /// activated or deactivated. The eager threshold is not re-read.
    pub fn reload(&mut self, schemas: Box<dyn SchemaSource>) {
        self.schemas = schemas;
        for (location, enabled) in self.registry.refresh(self.schemas.as_ref()) {
            self.set_enabled(&location, enabled);
        }
    }

    /// Deactivate every active plugin, keeping the registry
    pub fn stop_all(&mut self) {
        self.controller.stop_all(&mut self.registry);
    }

    /// Deactivate and unregister every plugin
    pub fn stop(&mut self) {
        tracing::debug!("stopping settings manager");
        self.registry.unregister_all(&self.controller);
    }

    /// Summaries of every registered plugin in priority order
    #[must_use]
    pub fn plugins(&self) -> Vec<PluginInfo> {
        self.registry
            .all()
            .iter()
            .map(crate::plugins::PluginDescriptor::info)
            .collect()
    }
}

impl std::fmt::Debug for SettingsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsManager")
            .field("registry", &self.registry)
            .field("controller", &self.controller)
            .field("policy", &self.policy)
            .field("plugin_dirs", &self.plugin_dirs)
            .finish_non_exhaustive()
    }
}
