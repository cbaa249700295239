//! TOML settings file loading
//!
//! The settings file stores per-plugin `enabled`/`priority` values and the
//! eager-load threshold. All tables are optional; a missing file behaves like
//! an empty one.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML settings file schema
#[derive(Debug, Default, Deserialize)]
pub struct SettingsFile {
    /// Debug logging toggle
    #[serde(default)]
    pub debug: DebugFileConfig,

    /// Plugin schemas; `None` when the `[plugins]` table is absent
    #[serde(default)]
    pub plugins: Option<PluginsFileConfig>,
}

/// Debug configuration
#[derive(Debug, Default, Deserialize)]
pub struct DebugFileConfig {
    /// Enable debug-level logging
    pub enabled: Option<bool>,
}

/// The `[plugins]` table
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PluginsFileConfig {
    /// Highest priority still loaded during the eager phase
    pub init_load_priority: Option<i32>,

    /// Remaining keys; each `[plugins.<location>]` table is a plugin schema
    #[serde(flatten)]
    pub entries: BTreeMap<String, toml::Value>,
}

impl PluginsFileConfig {
    /// Plugin schemas keyed by location
    ///
    /// Keys that are not tables, or tables that do not describe a plugin
    /// schema, are logged and skipped.
    #[must_use]
    pub fn plugin_schemas(&self) -> BTreeMap<String, PluginSchema> {
        self.entries
            .iter()
            .filter_map(|(key, value)| {
                if !value.is_table() {
                    tracing::warn!(key = %key, "ignoring unknown key in [plugins]");
                    return None;
                }

                match value.clone().try_into::<PluginSchema>() {
                    Ok(schema) => Some((key.clone(), schema)),
                    Err(e) => {
                        tracing::warn!(key = %key, error = %e, "ignoring invalid plugin schema");
                        None
                    }
                }
            })
            .collect()
    }
}

/// Stored settings of a single plugin
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PluginSchema {
    /// Whether the plugin should be activated at all
    #[serde(default, alias = "active")]
    pub enabled: bool,

    /// Load priority override
    #[serde(default)]
    pub priority: Option<i32>,
}

/// Parse settings from TOML text
///
/// # Errors
///
/// Returns error if the text is not a valid settings document
pub fn parse_settings(content: &str) -> Result<SettingsFile> {
    Ok(toml::from_str(content)?)
}

/// Load the settings file at `path`
///
/// Returns `SettingsFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_settings_file(path: &Path) -> SettingsFile {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "settings file does not exist, using defaults");
        return SettingsFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match parse_settings(&content) {
            Ok(settings) => {
                tracing::info!(path = %path.display(), "loaded settings file");
                settings
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse settings file, using defaults"
                );
                SettingsFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read settings file"
            );
            SettingsFile::default()
        }
    }
}

/// Return the default settings file path: `~/.config/settings-daemon/settings.toml`
#[must_use]
pub fn settings_file_path() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".config/settings-daemon/settings.toml"),
        |d| d.config_dir().join("settings-daemon").join("settings.toml"),
    )
}
