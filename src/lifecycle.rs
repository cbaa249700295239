//! Plugin lifecycle: two-phase activation and idempotent teardown
//!
//! Plugins with a priority at or below the eager threshold are loaded before
//! the daemon announces itself on the bus; the rest are deferred until a
//! second pass or an explicit `Awake`/`Start` call.

use std::fmt;

use crate::events::{EventBus, LifecycleEvent};
use crate::extensions::ModuleLoader;
use crate::plugins::{PluginDescriptor, PluginRegistry};
use crate::{Error, Result};

/// Which descriptors a load pass may activate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    /// Every enabled plugin
    All,
    /// Plugins with `priority <= threshold`
    Eager,
    /// Plugins with `priority > threshold`
    Deferred,
}

impl fmt::Display for LoadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Eager => write!(f, "eager"),
            Self::Deferred => write!(f, "deferred"),
        }
    }
}

/// Current load phase plus the eager threshold it is evaluated against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadPolicy {
    phase: LoadPhase,
    eager_threshold: i32,
}

impl LoadPolicy {
    /// Policy starting in [`LoadPhase::All`]
    #[must_use]
    pub const fn new(eager_threshold: i32) -> Self {
        Self {
            phase: LoadPhase::All,
            eager_threshold,
        }
    }

    /// Current phase
    #[must_use]
    pub const fn phase(&self) -> LoadPhase {
        self.phase
    }

    /// Highest priority loaded during the eager phase
    #[must_use]
    pub const fn eager_threshold(&self) -> i32 {
        self.eager_threshold
    }

    /// Switch to `phase`
    pub const fn set_phase(&mut self, phase: LoadPhase) {
        self.phase = phase;
    }

    /// Whether a plugin with `priority` may be activated in the current phase
    #[must_use]
    pub const fn admits(&self, priority: i32) -> bool {
        match self.phase {
            LoadPhase::All => true,
            LoadPhase::Eager => priority <= self.eager_threshold,
            LoadPhase::Deferred => priority > self.eager_threshold,
        }
    }
}

/// Drives descriptor state transitions and emits lifecycle events
pub struct LifecycleController {
    loader: Box<dyn ModuleLoader>,
    events: EventBus,
}

impl LifecycleController {
    /// Create a controller loading modules through `loader`
    #[must_use]
    pub fn new(loader: Box<dyn ModuleLoader>) -> Self {
        Self {
            loader,
            events: EventBus::new(),
        }
    }

    /// Register a lifecycle observer
    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(observer);
    }

    /// Fail if the module system cannot load plugins at all
    ///
    /// # Errors
    ///
    /// Returns [`Error::PluginsUnsupported`] if the loader is unavailable
    pub fn ensure_supported(&self) -> Result<()> {
        if self.loader.is_supported() {
            Ok(())
        } else {
            tracing::warn!("not able to initialize the plugins");
            Err(Error::PluginsUnsupported)
        }
    }

    /// Visit every descriptor in priority order and activate the eligible ones
    ///
    /// Returns the number of plugins activated by this pass. Individual
    /// activation failures are logged and do not stop the pass.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PluginsUnsupported`] before touching any descriptor
    /// if the module system is unavailable
    pub fn load_pass(&self, registry: &mut PluginRegistry, policy: &LoadPolicy) -> Result<usize> {
        self.ensure_supported()?;

        let _span = tracing::info_span!("load_pass", phase = %policy.phase()).entered();
        let mut activated = 0;
        for descriptor in registry.all_mut() {
            if self.maybe_activate(descriptor, policy) {
                activated += 1;
            }
        }

        tracing::debug!(activated, "load pass finished");
        Ok(activated)
    }

    /// Activate `descriptor` if it is enabled, inactive and admitted by `policy`
    fn maybe_activate(&self, descriptor: &mut PluginDescriptor, policy: &LoadPolicy) -> bool {
        let location = descriptor.location().to_string();

        if !descriptor.enabled() {
            tracing::debug!(location = %location, "plugin inactive");
            return false;
        }

        if descriptor.is_active() || !policy.admits(descriptor.priority()) {
            tracing::debug!(location = %location, "plugin loading deferred or previously loaded");
            return false;
        }

        let activated = self.activate(descriptor);
        if activated {
            tracing::debug!(location = %location, "plugin active");
        }
        activated
    }

    /// Activate `descriptor`
    ///
    /// Returns `true` if the plugin is active afterwards. Activating an
    /// active plugin is a no-op and emits nothing.
    pub fn activate(&self, descriptor: &mut PluginDescriptor) -> bool {
        match descriptor.activate(self.loader.as_ref()) {
            Ok(true) => {
                self.events
                    .emit(&LifecycleEvent::activated(descriptor.location()));
                true
            }
            Ok(false) => true,
            Err(e) => {
                tracing::warn!(
                    location = %descriptor.location(),
                    error = %e,
                    "plugin activation failed"
                );
                false
            }
        }
    }

    /// Deactivate `descriptor`
    ///
    /// Deactivating an inactive plugin is a no-op and emits nothing. Teardown
    /// errors are logged; the plugin is inactive afterwards regardless.
    pub fn deactivate(&self, descriptor: &mut PluginDescriptor) {
        match descriptor.deactivate() {
            Ok(false) => return,
            Ok(true) => {}
            Err(e) => {
                tracing::warn!(
                    location = %descriptor.location(),
                    error = %e,
                    "plugin deactivation failed"
                );
            }
        }

        self.events
            .emit(&LifecycleEvent::deactivated(descriptor.location()));
    }

    /// Deactivate every active descriptor
    pub fn stop_all(&self, registry: &mut PluginRegistry) {
        for descriptor in registry.all_mut().iter_mut().filter(|d| d.is_active()) {
            self.deactivate(descriptor);
        }
    }

    /// Change a plugin's `enabled` flag and apply it immediately
    ///
    /// Enabling activates the plugin regardless of the load phase; disabling
    /// deactivates it. Returns `false` if `location` is not registered.
    pub fn set_enabled(&self, registry: &mut PluginRegistry, location: &str, enabled: bool) -> bool {
        let Some(descriptor) = registry.find_mut(location) else {
            return false;
        };

        descriptor.set_enabled(enabled);
        if enabled {
            tracing::info!(location = %location, "plugin enabled");
            self.activate(descriptor);
        } else {
            tracing::info!(location = %location, "plugin disabled");
            self.deactivate(descriptor);
        }
        true
    }
}

impl fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleController")
            .field("supported", &self.loader.is_supported())
            .field("events", &self.events)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::config::{DEFAULT_NAMESPACE, Settings, file::parse_settings};
    use crate::events::LifecycleEventKind;
    use crate::extensions::Plugin;
    use crate::plugins::{ActivationState, PluginManifest};

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        location: String,
        log: Log,
        fail_activate: bool,
        fail_deactivate: bool,
    }

    impl Plugin for Recorder {
        fn activate(&mut self) -> Result<()> {
            if self.fail_activate {
                return Err(Error::plugin(&self.location, "refused"));
            }
            self.log.lock().unwrap().push(format!("+{}", self.location));
            Ok(())
        }

        fn deactivate(&mut self) -> Result<()> {
            self.log.lock().unwrap().push(format!("-{}", self.location));
            if self.fail_deactivate {
                return Err(Error::plugin(&self.location, "stuck"));
            }
            Ok(())
        }
    }

    struct RecordingLoader {
        log: Log,
        supported: bool,
        failing_activate: HashSet<String>,
        failing_deactivate: HashSet<String>,
    }

    impl ModuleLoader for RecordingLoader {
        fn is_supported(&self) -> bool {
            self.supported
        }

        fn load(&self, location: &str, _manifest: &PluginManifest) -> Result<Box<dyn Plugin>> {
            Ok(Box::new(Recorder {
                location: location.to_string(),
                log: Arc::clone(&self.log),
                fail_activate: self.failing_activate.contains(location),
                fail_deactivate: self.failing_deactivate.contains(location),
            }))
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        registry: PluginRegistry,
        controller: LifecycleController,
        log: Log,
        events: Arc<Mutex<Vec<LifecycleEvent>>>,
    }

    /// Plugins a(10), b(50), c(90, disabled), threshold 40
    fn fixture(supported: bool, failing_activate: &[&str], failing_deactivate: &[&str]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a", "b", "c"] {
            std::fs::write(dir.path().join(format!("{name}.settings-plugin")), "[plugin]\n").unwrap();
        }
        let schemas = Settings::new(
            DEFAULT_NAMESPACE,
            parse_settings(
                r"
                [plugins]
                init-load-priority = 40
                [plugins.a]
                enabled = true
                priority = 10
                [plugins.b]
                enabled = true
                priority = 50
                [plugins.c]
                enabled = false
                priority = 90
                ",
            )
            .unwrap(),
        );

        let mut registry = PluginRegistry::new();
        registry.scan(dir.path(), &schemas);

        let log = Log::default();
        let loader = RecordingLoader {
            log: Arc::clone(&log),
            supported,
            failing_activate: failing_activate.iter().map(|s| (*s).to_string()).collect(),
            failing_deactivate: failing_deactivate.iter().map(|s| (*s).to_string()).collect(),
        };
        let mut controller = LifecycleController::new(Box::new(loader));

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        controller.subscribe(move |e| sink.lock().unwrap().push(e.clone()));

        Fixture {
            _dir: dir,
            registry,
            controller,
            log,
            events,
        }
    }

    fn policy(phase: LoadPhase) -> LoadPolicy {
        let mut policy = LoadPolicy::new(40);
        policy.set_phase(phase);
        policy
    }

    fn active(registry: &PluginRegistry) -> Vec<&str> {
        registry
            .all()
            .iter()
            .filter(|d| d.is_active())
            .map(PluginDescriptor::location)
            .collect()
    }

    #[test]
    fn policy_admits_by_phase() {
        let mut policy = LoadPolicy::new(40);
        assert!(policy.admits(100));

        policy.set_phase(LoadPhase::Eager);
        assert!(policy.admits(40));
        assert!(!policy.admits(41));

        policy.set_phase(LoadPhase::Deferred);
        assert!(!policy.admits(40));
        assert!(policy.admits(41));
    }

    #[test]
    fn eager_then_deferred_activates_each_once() {
        let mut f = fixture(true, &[], &[]);

        let n = f
            .controller
            .load_pass(&mut f.registry, &policy(LoadPhase::Eager))
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(active(&f.registry), vec!["a"]);

        let n = f
            .controller
            .load_pass(&mut f.registry, &policy(LoadPhase::Deferred))
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(active(&f.registry), vec!["a", "b"]);

        // Awake afterwards changes nothing; c stays disabled
        let n = f
            .controller
            .load_pass(&mut f.registry, &policy(LoadPhase::All))
            .unwrap();
        assert_eq!(n, 0);
        assert_eq!(
            f.registry.find("c").unwrap().state(),
            ActivationState::Inactive
        );
        assert_eq!(*f.log.lock().unwrap(), vec!["+a", "+b"]);
        assert_eq!(f.events.lock().unwrap().len(), 2);
    }

    #[test]
    fn all_phase_activates_in_priority_order() {
        let mut f = fixture(true, &[], &[]);
        f.controller
            .load_pass(&mut f.registry, &policy(LoadPhase::All))
            .unwrap();

        assert_eq!(*f.log.lock().unwrap(), vec!["+a", "+b"]);
        let events = f.events.lock().unwrap();
        assert_eq!(
            *events,
            vec![LifecycleEvent::activated("a"), LifecycleEvent::activated("b")]
        );
    }

    #[test]
    fn unsupported_module_system_fails_fast() {
        let mut f = fixture(false, &[], &[]);
        let err = f
            .controller
            .load_pass(&mut f.registry, &policy(LoadPhase::All))
            .unwrap_err();

        assert!(matches!(err, Error::PluginsUnsupported));
        assert!(active(&f.registry).is_empty());
        assert!(f.log.lock().unwrap().is_empty());
    }

    #[test]
    fn failed_activation_does_not_abort_pass() {
        let mut f = fixture(true, &["a"], &[]);
        let n = f
            .controller
            .load_pass(&mut f.registry, &policy(LoadPhase::All))
            .unwrap();

        assert_eq!(n, 1);
        assert_eq!(active(&f.registry), vec!["b"]);
        assert_eq!(*f.events.lock().unwrap(), vec![LifecycleEvent::activated("b")]);
    }

    #[test]
    fn activate_is_idempotent() {
        let mut f = fixture(true, &[], &[]);
        let d = f.registry.find_mut("a").unwrap();

        assert!(f.controller.activate(d));
        assert!(f.controller.activate(d));

        let events = f.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, LifecycleEventKind::Activated);
    }

    #[test]
    fn deactivate_inactive_is_silent() {
        let mut f = fixture(true, &[], &[]);
        let d = f.registry.find_mut("a").unwrap();

        f.controller.deactivate(d);
        assert!(f.events.lock().unwrap().is_empty());
    }

    #[test]
    fn stop_all_survives_teardown_failure() {
        let mut f = fixture(true, &[], &["a"]);
        f.controller
            .load_pass(&mut f.registry, &policy(LoadPhase::All))
            .unwrap();
        f.events.lock().unwrap().clear();

        f.controller.stop_all(&mut f.registry);

        assert!(active(&f.registry).is_empty());
        let events = f.events.lock().unwrap();
        assert_eq!(
            *events,
            vec![LifecycleEvent::deactivated("a"), LifecycleEvent::deactivated("b")]
        );
        assert_eq!(f.registry.len(), 3);
    }

    #[test]
    fn unregister_all_drops_descriptors() {
        let mut f = fixture(true, &[], &[]);
        f.controller
            .load_pass(&mut f.registry, &policy(LoadPhase::All))
            .unwrap();

        f.registry.unregister_all(&f.controller);

        assert!(f.registry.is_empty());
        assert_eq!(*f.log.lock().unwrap(), vec!["+a", "+b", "-a", "-b"]);
    }

    #[test]
    fn set_enabled_toggles_immediately() {
        let mut f = fixture(true, &[], &[]);

        assert!(f.controller.set_enabled(&mut f.registry, "c", true));
        assert_eq!(active(&f.registry), vec!["c"]);

        assert!(f.controller.set_enabled(&mut f.registry, "c", false));
        assert!(active(&f.registry).is_empty());
        assert!(!f.registry.find("c").unwrap().enabled());

        assert!(!f.controller.set_enabled(&mut f.registry, "missing", true));
    }
}
