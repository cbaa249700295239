//! Shared test utilities

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use settings_daemon::config::DEFAULT_NAMESPACE;
use settings_daemon::{
    BuiltinModules, Error, LifecycleEvent, Plugin, Result, Settings, SettingsManager,
};
use tempfile::TempDir;

/// Ordered record of plugin calls, e.g. `activate:a`
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Plugin that logs every call and can be told to fail teardown
pub struct RecordingPlugin {
    location: String,
    log: CallLog,
    fail_teardown: bool,
}

impl Plugin for RecordingPlugin {
    fn activate(&mut self) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("activate:{}", self.location));
        Ok(())
    }

    fn deactivate(&mut self) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("deactivate:{}", self.location));
        if self.fail_teardown {
            return Err(Error::plugin(&self.location, "teardown failed"));
        }
        Ok(())
    }
}

/// Built-in modules backed by [`RecordingPlugin`] for each location
pub fn recording_modules(log: &CallLog, locations: &[&str], fail_teardown: &[&str]) -> BuiltinModules {
    let mut modules = BuiltinModules::new();
    for location in locations {
        let log = Arc::clone(log);
        let name = (*location).to_string();
        let fail = fail_teardown.contains(location);
        modules.register(*location, move |_| {
            Ok(Box::new(RecordingPlugin {
                location: name.clone(),
                log: Arc::clone(&log),
                fail_teardown: fail,
            }))
        });
    }
    modules
}

/// Temporary plugin directory plus settings file
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    #[must_use]
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        std::fs::create_dir(dir.path().join("plugins")).expect("failed to create plugin dir");
        Self { dir }
    }

    /// Directory scanned for manifests
    #[must_use]
    pub fn plugin_dir(&self) -> PathBuf {
        self.dir.path().join("plugins")
    }

    /// Path of the settings file
    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        self.dir.path().join("settings.toml")
    }

    /// Write `<stem>.settings-plugin` with `body`
    pub fn manifest(&self, stem: &str, body: &str) {
        std::fs::write(
            self.plugin_dir().join(format!("{stem}.settings-plugin")),
            body,
        )
        .expect("failed to write manifest");
    }

    /// Write the settings file and load it
    pub fn settings(&self, body: &str) -> Settings {
        std::fs::write(self.settings_path(), body).expect("failed to write settings");
        Settings::load(DEFAULT_NAMESPACE, &self.settings_path())
    }

    /// Manager over this fixture's plugin directory
    pub fn manager(&self, settings: Settings, modules: BuiltinModules) -> SettingsManager {
        SettingsManager::new(Box::new(settings), vec![self.plugin_dir()], Box::new(modules))
    }
}

/// Subscribe to `manager` and collect every lifecycle event
pub fn record_events(manager: &mut SettingsManager) -> Arc<Mutex<Vec<LifecycleEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    manager.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
    events
}
