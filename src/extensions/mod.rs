//! Plugin module system
//!
//! A plugin is anything implementing [`Plugin`]. Modules are resolved through
//! a [`ModuleLoader`]; the default [`BuiltinModules`] loader is a build-time
//! registration table with a fallback to the [`exec`] module for manifests
//! that name a helper command.
//!
//! # Example
//!
//! ```rust,ignore
//! use settings_daemon::extensions::{BuiltinModules, Plugin};
//!
//! let mut modules = BuiltinModules::new();
//! modules.register("keyboard", |_manifest| Ok(Box::new(KeyboardPlugin::default())));
//! ```

pub mod exec;

use std::collections::HashMap;

use crate::plugins::PluginManifest;
use crate::{Error, Result};

pub use exec::ExecPlugin;

/// Capability contract every plugin module implements
///
/// Both entry points run synchronously on the daemon's single logical
/// thread.
pub trait Plugin: Send {
    /// Start providing the plugin's functionality
    ///
    /// # Errors
    ///
    /// Returns error if the plugin cannot start; it stays inactive
    fn activate(&mut self) -> Result<()>;

    /// Stop providing the plugin's functionality
    ///
    /// # Errors
    ///
    /// Returns error if teardown was incomplete; the plugin is still
    /// considered inactive afterwards
    fn deactivate(&mut self) -> Result<()>;
}

/// Constructor for a built-in plugin module
pub type PluginFactory = Box<dyn Fn(&PluginManifest) -> Result<Box<dyn Plugin>> + Send + Sync>;

/// Resolves plugin modules by location
pub trait ModuleLoader: Send + Sync {
    /// Whether this loader can load modules at all
    fn is_supported(&self) -> bool;

    /// Instantiate the module for `location`
    ///
    /// # Errors
    ///
    /// Returns error if no module provides `location` or construction fails
    fn load(&self, location: &str, manifest: &PluginManifest) -> Result<Box<dyn Plugin>>;
}

/// Build-time registration table of plugin modules
#[derive(Default)]
pub struct BuiltinModules {
    factories: HashMap<String, PluginFactory>,
}

impl BuiltinModules {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module factory for `location`, replacing any previous one
    pub fn register<F>(&mut self, location: impl Into<String>, factory: F)
    where
        F: Fn(&PluginManifest) -> Result<Box<dyn Plugin>> + Send + Sync + 'static,
    {
        let location = location.into();
        tracing::debug!(location = %location, "registering built-in module");
        self.factories.insert(location, Box::new(factory));
    }

    /// Whether a factory is registered for `location`
    #[must_use]
    pub fn contains(&self, location: &str) -> bool {
        self.factories.contains_key(location)
    }

    /// Number of registered factories
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether no factories are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for BuiltinModules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinModules")
            .field("modules", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ModuleLoader for BuiltinModules {
    fn is_supported(&self) -> bool {
        true
    }

    fn load(&self, location: &str, manifest: &PluginManifest) -> Result<Box<dyn Plugin>> {
        if let Some(factory) = self.factories.get(location) {
            return factory(manifest);
        }

        if !manifest.exec.is_empty() {
            return Ok(Box::new(ExecPlugin::new(location, manifest.exec.clone())?));
        }

        Err(Error::ModuleNotFound(location.to_string()))
    }
}
