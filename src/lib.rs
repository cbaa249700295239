//! Settings Daemon - prioritized plugin lifecycle for a desktop session
//!
//! This library provides the core functionality of the settings daemon:
//! - Plugin discovery from `*.settings-plugin` manifests
//! - Settings-backed `enabled`/`priority` per plugin
//! - Two-phase (eager/deferred) activation ordered by priority
//! - A single session bus endpoint with `Awake`/`Start`
//! - Session controller integration for orderly shutdown
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   Session bus                        │
//! │   Awake/Start  │  PluginActivated  │  EndSession    │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 SettingsService                      │
//! │   Daemon  │  SessionBridge  │  SettingsManager      │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │          LifecycleController + PluginRegistry        │
//! │   Manifests  │  Settings  │  Plugin modules         │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod daemon;
pub mod dbus;
pub mod error;
pub mod events;
pub mod extensions;
pub mod lifecycle;
pub mod manager;
pub mod plugins;
pub mod service;
pub mod session;

pub use config::{Config, ConfigOptions, SchemaSource, Settings};
pub use daemon::{Daemon, QuitHandle, QuitReason};
pub use error::{Error, Result};
pub use events::{EventBus, LifecycleEvent, LifecycleEventKind};
pub use extensions::{BuiltinModules, ExecPlugin, ModuleLoader, Plugin};
pub use lifecycle::{LifecycleController, LoadPhase, LoadPolicy};
pub use manager::SettingsManager;
pub use plugins::{ActivationState, PluginDescriptor, PluginInfo, PluginManifest, PluginRegistry};
pub use service::{ServiceSlot, SettingsService};
pub use session::{SessionBridge, SessionClient, SessionSignal};
