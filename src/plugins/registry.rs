//! Plugin registry: the set of discovered descriptors

use std::path::Path;

use super::descriptor::PluginDescriptor;
use super::discovery::discover_manifests;
use super::manifest::PluginManifest;
use crate::config::SchemaSource;
use crate::lifecycle::LifecycleController;

/// Owns every registered [`PluginDescriptor`]
///
/// Descriptors are kept ordered by ascending priority. Equal priorities
/// keep registration order, also after priorities change.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    descriptors: Vec<PluginDescriptor>,
    next_sequence: u64,
}

impl PluginRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every manifest found directly in `dir`
    ///
    /// Returns the locations of newly registered plugins. Already registered
    /// locations are left untouched.
    pub fn scan(&mut self, dir: &Path, schemas: &dyn SchemaSource) -> Vec<String> {
        let _span = tracing::debug_span!("scan", path = %dir.display()).entered();
        tracing::debug!("loading settings plugins from dir");

        discover_manifests(dir)
            .iter()
            .filter_map(|path| self.register_manifest(path, schemas))
            .collect()
    }

    /// Register the manifest at `path`
    ///
    /// Returns the location if a new descriptor was inserted. Parse failures,
    /// duplicate locations and unknown settings schemas are skipped.
    pub fn register_manifest(&mut self, path: &Path, schemas: &dyn SchemaSource) -> Option<String> {
        tracing::debug!(path = %path.display(), "loading plugin");

        let manifest = match PluginManifest::load(path) {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::warn!(error = %e, "skipping plugin manifest");
                return None;
            }
        };

        let Some(location) = manifest.location(path) else {
            tracing::warn!(path = %path.display(), "plugin manifest has no location");
            return None;
        };

        if self.find(&location).is_some() {
            tracing::debug!(location = %location, path = %path.display(), "plugin already registered, skipping");
            return None;
        }

        let schema = schemas.plugin_schema_name(&location);
        let Some(stored) = schemas.plugin_schema(&schema) else {
            tracing::warn!(schema = %schema, "ignoring unknown module");
            return None;
        };

        let descriptor =
            PluginDescriptor::new(location.clone(), path.to_path_buf(), manifest, schema, &stored);
        tracing::info!(
            location = %location,
            priority = descriptor.priority(),
            enabled = descriptor.enabled(),
            "registered plugin"
        );
        self.insert(descriptor);

        Some(location)
    }

    /// Insert after every descriptor with a lower or equal priority
    fn insert(&mut self, mut descriptor: PluginDescriptor) {
        descriptor.set_sequence(self.next_sequence);
        self.next_sequence += 1;

        let key = descriptor.order_key();
        let index = self.descriptors.partition_point(|d| d.order_key() <= key);
        self.descriptors.insert(index, descriptor);
    }

    /// Re-read `enabled` and `priority` for every descriptor
    ///
    /// Descriptors whose schema disappeared keep their previous values.
    /// Returns the locations whose `enabled` value differs from the stored
    /// one, paired with the new value. Those values are not applied here;
    /// enabling and disabling goes through the lifecycle controller.
    pub fn refresh(&mut self, schemas: &dyn SchemaSource) -> Vec<(String, bool)> {
        let mut toggled = Vec::new();

        for descriptor in &mut self.descriptors {
            let Some(stored) = schemas.plugin_schema(descriptor.schema()) else {
                tracing::warn!(schema = %descriptor.schema(), "plugin schema disappeared");
                continue;
            };

            let enabled = descriptor.enabled();
            descriptor.apply_schema(&stored);
            if stored.enabled != enabled {
                descriptor.set_enabled(enabled);
                toggled.push((descriptor.location().to_string(), stored.enabled));
            }
        }

        self.descriptors.sort_by_key(PluginDescriptor::order_key);
        toggled
    }

    /// All descriptors in ascending priority order
    #[must_use]
    pub fn all(&self) -> &[PluginDescriptor] {
        &self.descriptors
    }

    pub(crate) fn all_mut(&mut self) -> &mut [PluginDescriptor] {
        &mut self.descriptors
    }

    /// Look up a descriptor by location
    #[must_use]
    pub fn find(&self, location: &str) -> Option<&PluginDescriptor> {
        self.descriptors.iter().find(|d| d.location() == location)
    }

    pub(crate) fn find_mut(&mut self, location: &str) -> Option<&mut PluginDescriptor> {
        self.descriptors.iter_mut().find(|d| d.location() == location)
    }

    /// Deactivate and drop every descriptor
    pub fn unregister_all(&mut self, controller: &LifecycleController) {
        controller.stop_all(self);
        self.descriptors.clear();
    }

    /// Number of registered plugins
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether no plugins are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
