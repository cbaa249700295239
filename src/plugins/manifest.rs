//! Plugin manifest format (`*.settings-plugin`)

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// File suffix that marks a plugin manifest
pub const MANIFEST_SUFFIX: &str = ".settings-plugin";

/// Manifest file contents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestFile {
    /// The `[plugin]` table
    pub plugin: PluginManifest,
}

/// Plugin manifest describing a plugin's static metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PluginManifest {
    /// Module/location override; defaults to the manifest file stem
    #[serde(default)]
    pub module: Option<String>,
    /// Human-readable name
    #[serde(default)]
    pub name: Option<String>,
    /// Short description
    #[serde(default)]
    pub description: Option<String>,
    /// Plugin authors
    #[serde(default)]
    pub authors: Vec<String>,
    /// Copyright notice
    #[serde(default)]
    pub copyright: Option<String>,
    /// Project website
    #[serde(default)]
    pub website: Option<String>,
    /// Static default priority, overridden by settings
    #[serde(default)]
    pub priority: Option<i32>,
    /// Helper command run by the `exec` module
    #[serde(default)]
    pub exec: Vec<String>,
}

impl PluginManifest {
    /// Parse a manifest from TOML text
    ///
    /// # Errors
    ///
    /// Returns error if the text is not a valid manifest
    pub fn parse(content: &str) -> Result<Self> {
        let file: ManifestFile = toml::from_str(content)?;
        Ok(file.plugin)
    }

    /// Read and parse the manifest at `path`
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Manifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::parse(&content).map_err(|e| Error::Manifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Canonical location for this manifest loaded from `path`
    ///
    /// Returns `None` if neither the `module` key nor the file name yields a
    /// non-empty identifier.
    #[must_use]
    pub fn location(&self, path: &Path) -> Option<String> {
        let raw = match &self.module {
            Some(module) => module.as_str(),
            None => path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.strip_suffix(MANIFEST_SUFFIX).unwrap_or(n))?,
        };
        normalize_location(raw)
    }
}

/// Normalize a location: trimmed and ASCII lower-cased
#[must_use]
pub fn normalize_location(raw: &str) -> Option<String> {
    let location = raw.trim().to_ascii_lowercase();
    (!location.is_empty()).then_some(location)
}
