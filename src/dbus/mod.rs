//! Session bus surface
//!
//! The daemon owns a single well-known name and exports one object carrying
//! the `Awake`/`Start` methods plus lifecycle signals.

mod interface;
pub mod session_manager;

pub use interface::SettingsDaemonInterface;

/// Well-known bus name owned by the daemon
pub const BUS_NAME: &str = "org.mate.SettingsDaemon";

/// Object path of the exported interface
pub const OBJECT_PATH: &str = "/org/mate/SettingsDaemon";
