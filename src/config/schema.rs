//! Settings schemas
//!
//! Each plugin is paired with a schema named `<namespace>.plugins.<location>`.
//! A plugin whose schema is not installed must never be registered, so the
//! registry asks a [`SchemaSource`] before reading any values from it.

use std::collections::BTreeMap;
use std::path::Path;

use super::file::{PluginSchema, SettingsFile, load_settings_file};

/// Default settings namespace
pub const DEFAULT_NAMESPACE: &str = "org.mate.SettingsDaemon";

/// Lookup of installed settings schemas
pub trait SchemaSource: Send + Sync {
    /// Settings namespace (e.g. `org.mate.SettingsDaemon`)
    fn namespace(&self) -> &str;

    /// Storage of the schema named `schema`, or `None` if it is not installed
    fn plugin_schema(&self, schema: &str) -> Option<PluginSchema>;

    /// Eager/deferred threshold from the `<namespace>.plugins` schema
    fn init_load_priority(&self) -> i32;

    /// Schema name for a plugin location
    fn plugin_schema_name(&self, location: &str) -> String {
        format!("{}.plugins.{location}", self.namespace())
    }

    /// Whether the schema named `schema` is installed
    fn has_schema(&self, schema: &str) -> bool {
        self.plugin_schema(schema).is_some()
    }
}

/// Settings loaded from a [`SettingsFile`]
#[derive(Debug, Clone)]
pub struct Settings {
    namespace: String,
    init_load_priority: i32,
    schemas: BTreeMap<String, PluginSchema>,
    debug: bool,
}

impl Settings {
    /// Build settings for `namespace` from a parsed file
    #[must_use]
    pub fn new(namespace: impl Into<String>, file: SettingsFile) -> Self {
        let (init_load_priority, schemas) = file.plugins.map_or_else(
            || (0, BTreeMap::new()),
            |plugins| {
                let schemas = plugins
                    .plugin_schemas()
                    .into_iter()
                    .map(|(location, schema)| (location.trim().to_ascii_lowercase(), schema))
                    .collect();
                (plugins.init_load_priority.unwrap_or(0), schemas)
            },
        );

        Self {
            namespace: namespace.into(),
            init_load_priority,
            schemas,
            debug: file.debug.enabled.unwrap_or(false),
        }
    }

    /// Load settings for `namespace` from the file at `path`
    #[must_use]
    pub fn load(namespace: impl Into<String>, path: &Path) -> Self {
        Self::new(namespace, load_settings_file(path))
    }

    /// Whether debug logging was requested in the settings file
    #[must_use]
    pub const fn debug(&self) -> bool {
        self.debug
    }

    /// Number of installed plugin schemas
    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Whether no plugin schemas are installed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl SchemaSource for Settings {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn plugin_schema(&self, schema: &str) -> Option<PluginSchema> {
        let location = schema
            .strip_prefix(self.namespace.as_str())?
            .strip_prefix(".plugins.")?;
        self.schemas.get(location).cloned()
    }

    fn init_load_priority(&self) -> i32 {
        self.init_load_priority
    }
}
