//! Error types for the settings daemon

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for settings daemon operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the settings daemon
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Plugin manifest could not be read or parsed
    #[error("invalid manifest {path}: {message}")]
    Manifest {
        /// Manifest file
        path: PathBuf,
        /// Parser or I/O message
        message: String,
    },

    /// The module system cannot load plugins on this platform
    #[error("plugins not supported")]
    PluginsUnsupported,

    /// No module provides the requested plugin
    #[error("module not found: {0}")]
    ModuleNotFound(String),

    /// Plugin activation or deactivation failed
    #[error("plugin {location}: {message}")]
    Plugin {
        /// Plugin location
        location: String,
        /// Failure description
        message: String,
    },

    /// Exporting the method surface failed after the name was granted
    #[error("failed to export interface: {0}")]
    Export(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Session bus error
    #[error("dbus error: {0}")]
    DBus(#[from] zbus::Error),

    /// Session bus standard interface error
    #[error("dbus error: {0}")]
    Fdo(#[from] zbus::fdo::Error),
}

impl Error {
    /// Build a plugin error for `location`
    pub fn plugin(location: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Plugin {
            location: location.into(),
            message: message.to_string(),
        }
    }
}
