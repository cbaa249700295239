//! Plugin registry for the settings daemon
//!
//! Plugins are introduced by `*.settings-plugin` manifests in the plugin
//! directories. A manifest is only registered when its settings schema
//! `<namespace>.plugins.<location>` is installed; that schema supplies the
//! plugin's `enabled` flag and priority.

pub mod descriptor;
pub mod discovery;
pub mod manifest;
pub mod registry;

pub use descriptor::{ActivationState, DEFAULT_PRIORITY, PluginDescriptor, PluginInfo};
pub use discovery::discover_manifests;
pub use manifest::{MANIFEST_SUFFIX, PluginManifest, normalize_location};
pub use registry::PluginRegistry;
