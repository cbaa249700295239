//! Configuration management for the settings daemon

pub mod file;
pub mod schema;

use std::path::PathBuf;
use std::time::Duration;

pub use file::{PluginSchema, SettingsFile};
pub use schema::{DEFAULT_NAMESPACE, SchemaSource, Settings};

/// System-wide plugin directory
pub const SYSTEM_PLUGIN_DIR: &str = "/usr/lib/settings-daemon/plugins";

/// How long `--timed-exit` keeps the daemon alive
pub const TIMED_EXIT: Duration = Duration::from_secs(30);

/// Settings daemon process configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Settings schema namespace
    pub namespace: String,

    /// Directories scanned for plugin manifests, in precedence order
    pub plugin_dirs: Vec<PathBuf>,

    /// Path to the TOML settings file
    pub settings_path: PathBuf,

    /// Take over the bus name from a running instance
    pub replace: bool,

    /// Debug logging requested on the command line
    pub debug: bool,

    /// Quit automatically after this long
    pub timed_exit: Option<Duration>,

    /// Started through D-Bus activation; plugins wait for `Awake`
    pub dbus_activated: bool,

    /// Session manager startup identifier (`DESKTOP_AUTOSTART_ID`)
    pub startup_id: Option<String>,
}

/// Command-line overrides applied on top of environment and defaults
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    /// Explicit plugin directories (replace the defaults when non-empty)
    pub plugin_dirs: Vec<PathBuf>,
    /// Explicit settings file
    pub settings_path: Option<PathBuf>,
    /// Explicit namespace
    pub namespace: Option<String>,
    /// `--replace`
    pub replace: bool,
    /// `--debug`
    pub debug: bool,
    /// `--timed-exit`
    pub timed_exit: bool,
}

impl Config {
    /// Load configuration from the process environment
    #[must_use]
    pub fn load(options: ConfigOptions) -> Self {
        Self::from_env(options, |key| std::env::var(key).ok())
    }

    /// Load configuration using `env` to resolve environment variables
    ///
    /// Precedence is options > environment > defaults.
    pub fn from_env(options: ConfigOptions, env: impl Fn(&str) -> Option<String>) -> Self {
        let plugin_dirs = if options.plugin_dirs.is_empty() {
            env("SETTINGS_DAEMON_PLUGIN_DIRS").map_or_else(default_plugin_dirs, |dirs| {
                std::env::split_paths(&dirs).collect()
            })
        } else {
            options.plugin_dirs
        };

        let settings_path = options
            .settings_path
            .or_else(|| env("SETTINGS_DAEMON_SETTINGS").map(PathBuf::from))
            .unwrap_or_else(file::settings_file_path);

        let namespace = options
            .namespace
            .or_else(|| env("SETTINGS_DAEMON_NAMESPACE"))
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

        Self {
            namespace,
            plugin_dirs,
            settings_path,
            replace: options.replace,
            debug: options.debug,
            timed_exit: options.timed_exit.then_some(TIMED_EXIT),
            dbus_activated: env("DBUS_STARTER_BUS_TYPE").is_some(),
            startup_id: env("DESKTOP_AUTOSTART_ID").filter(|id| !id.is_empty()),
        }
    }
}

/// Default plugin search directories
///
/// The per-user data directory comes first so a user manifest shadows a
/// system manifest for the same location.
#[must_use]
pub fn default_plugin_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    if let Some(data_dir) = directories::BaseDirs::new().map(|d| d.data_dir().to_path_buf()) {
        dirs.push(data_dir.join("settings-daemon").join("plugins"));
    }

    dirs.push(PathBuf::from(SYSTEM_PLUGIN_DIR));
    dirs
}
