//! Plugin descriptors: manifest metadata plus live settings and state

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::manifest::PluginManifest;
use crate::Result;
use crate::config::PluginSchema;
use crate::extensions::{ModuleLoader, Plugin};

/// Priority used when neither settings nor manifest specify one
pub const DEFAULT_PRIORITY: i32 = 100;

/// Whether a plugin is currently running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationState {
    /// Not running
    Inactive,
    /// Running
    Active,
}

/// In-memory record of a registered plugin
///
/// State only changes through the crate-private `activate`/`deactivate`
/// contract, which the lifecycle controller drives.
pub struct PluginDescriptor {
    location: String,
    manifest_path: PathBuf,
    manifest: PluginManifest,
    schema: String,
    priority: i32,
    enabled: bool,
    state: ActivationState,
    sequence: u64,
    module: Option<Box<dyn Plugin>>,
}

/// Serializable summary of a descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginInfo {
    /// Plugin location
    pub location: String,
    /// Human-readable name
    pub name: Option<String>,
    /// Short description
    pub description: Option<String>,
    /// Effective priority
    pub priority: i32,
    /// Whether the plugin may be activated
    pub enabled: bool,
    /// Current activation state
    pub state: ActivationState,
    /// Manifest file
    pub manifest_path: PathBuf,
}

impl PluginDescriptor {
    pub(crate) fn new(
        location: String,
        manifest_path: PathBuf,
        manifest: PluginManifest,
        schema: String,
        stored: &PluginSchema,
    ) -> Self {
        let mut descriptor = Self {
            location,
            manifest_path,
            manifest,
            schema,
            priority: DEFAULT_PRIORITY,
            enabled: false,
            state: ActivationState::Inactive,
            sequence: 0,
            module: None,
        };
        descriptor.apply_schema(stored);
        descriptor
    }

    /// Unique registry key
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Manifest file this descriptor was created from
    #[must_use]
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Static manifest metadata
    #[must_use]
    pub const fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    /// Settings schema name backing `enabled` and `priority`
    #[must_use]
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Load priority; lower loads earlier
    #[must_use]
    pub const fn priority(&self) -> i32 {
        self.priority
    }

    /// Whether the plugin should ever be activated
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    /// Current activation state
    #[must_use]
    pub const fn state(&self) -> ActivationState {
        self.state
    }

    /// Whether the plugin is running
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == ActivationState::Active
    }

    /// Summary for listings
    #[must_use]
    pub fn info(&self) -> PluginInfo {
        PluginInfo {
            location: self.location.clone(),
            name: self.manifest.name.clone(),
            description: self.manifest.description.clone(),
            priority: self.priority,
            enabled: self.enabled,
            state: self.state,
            manifest_path: self.manifest_path.clone(),
        }
    }

    /// Refresh `enabled` and `priority` from stored settings
    pub(crate) fn apply_schema(&mut self, stored: &PluginSchema) {
        self.enabled = stored.enabled;
        self.priority = stored
            .priority
            .or(self.manifest.priority)
            .unwrap_or(DEFAULT_PRIORITY);
    }

    /// Record the registration order, which breaks priority ties
    pub(crate) const fn set_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }

    /// Key the registry orders descriptors by
    pub(crate) const fn order_key(&self) -> (i32, u64) {
        (self.priority, self.sequence)
    }

    pub(crate) const fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Activate the plugin, loading its module on first use
    ///
    /// Returns `Ok(false)` if the plugin was already active.
    pub(crate) fn activate(&mut self, loader: &dyn ModuleLoader) -> Result<bool> {
        if self.is_active() {
            return Ok(false);
        }

        let module = match self.module.take() {
            Some(module) => module,
            None => loader.load(&self.location, &self.manifest)?,
        };
        self.module.insert(module).activate()?;

        self.state = ActivationState::Active;
        Ok(true)
    }

    /// Deactivate the plugin
    ///
    /// Returns `Ok(false)` if the plugin was already inactive. The state is
    /// `Inactive` afterwards even when the module's teardown reports an error.
    pub(crate) fn deactivate(&mut self) -> Result<bool> {
        if !self.is_active() {
            return Ok(false);
        }

        self.state = ActivationState::Inactive;
        if let Some(module) = &mut self.module {
            module.deactivate()?;
        }
        Ok(true)
    }
}

impl std::fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("location", &self.location)
            .field("manifest_path", &self.manifest_path)
            .field("priority", &self.priority)
            .field("enabled", &self.enabled)
            .field("state", &self.state)
            .field("loaded", &self.module.is_some())
            .finish_non_exhaustive()
    }
}
