//! Settings service - the process-wide bus endpoint
//!
//! A [`SettingsService`] wraps the [`SettingsManager`] and owns the bus
//! connection once the well-known name is granted. Exactly one service
//! exists per process; [`ServiceSlot`] hands out clones of it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use futures::StreamExt;
use tokio::sync::{Mutex, mpsc};
use zbus::Connection;
use zbus::fdo::{RequestNameFlags, RequestNameReply};
use zbus::object_server::SignalEmitter;

use crate::config::SchemaSource;
use crate::daemon::{QuitHandle, QuitReason};
use crate::dbus::{BUS_NAME, OBJECT_PATH, SettingsDaemonInterface};
use crate::events::{LifecycleEvent, LifecycleEventKind};
use crate::lifecycle::LoadPhase;
use crate::manager::SettingsManager;
use crate::plugins::PluginInfo;
use crate::{Error, Result};

/// Shared handle to the settings service
#[derive(Clone)]
pub struct SettingsService {
    inner: Arc<Inner>,
}

struct Inner {
    manager: Mutex<SettingsManager>,
    connection: Mutex<Option<Connection>>,
    events: Mutex<Option<mpsc::UnboundedReceiver<LifecycleEvent>>>,
    shut_down: AtomicBool,
}

impl SettingsService {
    /// Wrap `manager`; lifecycle events are queued until the bus is available
    #[must_use]
    pub fn new(mut manager: SettingsManager) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        manager.subscribe(move |event| {
            if tx.send(event.clone()).is_err() {
                tracing::trace!(location = %event.location, "event forwarder gone");
            }
        });

        Self {
            inner: Arc::new(Inner {
                manager: Mutex::new(manager),
                connection: Mutex::new(None),
                events: Mutex::new(Some(rx)),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// Run a load pass in `phase`
    ///
    /// Returns the number of plugins activated. Does nothing after
    /// [`shutdown`](Self::shutdown).
    ///
    /// # Errors
    ///
    /// Returns error if the module system is unavailable
    pub async fn load(&self, phase: LoadPhase) -> Result<usize> {
        let mut manager = self.inner.manager.lock().await;
        if self.is_shut_down() {
            tracing::debug!(phase = %phase, "service stopped, ignoring load");
            return Ok(0);
        }

        manager.set_phase(phase);
        manager.load()
    }

    /// Load every enabled plugin that is not yet active
    ///
    /// # Errors
    ///
    /// Returns error if the module system is unavailable
    pub async fn awake(&self) -> Result<()> {
        tracing::debug!("awake requested");
        self.load(LoadPhase::All).await.map(|_| ())
    }

    /// Alias of [`awake`](Self::awake)
    ///
    /// # Errors
    ///
    /// Returns error if the module system is unavailable
    pub async fn start(&self) -> Result<()> {
        tracing::debug!("start requested");
        self.load(LoadPhase::All).await.map(|_| ())
    }

    /// Enable or disable a plugin at runtime
    ///
    /// Returns `false` if `location` is not registered.
    pub async fn set_enabled(&self, location: &str, enabled: bool) -> bool {
        self.inner
            .manager
            .lock()
            .await
            .set_enabled(location, enabled)
    }

    /// Apply re-read settings
    pub async fn reload(&self, schemas: Box<dyn SchemaSource>) {
        let mut manager = self.inner.manager.lock().await;
        if self.is_shut_down() {
            return;
        }
        manager.reload(schemas);
    }

    /// Summaries of every registered plugin
    pub async fn plugins(&self) -> Vec<PluginInfo> {
        self.inner.manager.lock().await.plugins()
    }

    /// Bus connection, once the name was acquired
    pub async fn connection(&self) -> Option<Connection> {
        self.inner.connection.lock().await.clone()
    }

    /// Whether [`shutdown`](Self::shutdown) already ran
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }

    /// Request the well-known name and export the interface
    ///
    /// Failing to obtain the name requests [`QuitReason::NameLost`]. Losing
    /// it later does the same.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Export`] if the name was granted but the interface
    /// could not be exported; [`QuitReason::ExportFailed`] is requested too
    pub async fn acquire_name(&self, replace: bool, quit: &QuitHandle) -> Result<()> {
        let conn = match Connection::session().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, "could not connect to session bus");
                quit.request(QuitReason::NameLost);
                return Ok(());
            }
        };

        if let Err(e) = watch_name_lost(&conn, quit.clone()).await {
            tracing::warn!(error = %e, "unable to watch bus name ownership");
        }

        let mut flags = RequestNameFlags::AllowReplacement | RequestNameFlags::DoNotQueue;
        if replace {
            flags.insert(RequestNameFlags::ReplaceExisting);
        }

        match conn.request_name_with_flags(BUS_NAME, flags).await {
            Ok(RequestNameReply::PrimaryOwner | RequestNameReply::AlreadyOwner) => {
                tracing::info!(name = BUS_NAME, "acquired bus name");
            }
            Ok(reply) => {
                tracing::warn!(name = BUS_NAME, reply = ?reply, "bus name not acquired");
                quit.request(QuitReason::NameLost);
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(name = BUS_NAME, error = %e, "bus name not acquired");
                quit.request(QuitReason::NameLost);
                return Ok(());
            }
        }

        let interface = SettingsDaemonInterface::new(self.clone());
        if let Err(e) = conn.object_server().at(OBJECT_PATH, interface).await {
            tracing::error!(path = OBJECT_PATH, error = %e, "failed to export interface");
            quit.request(QuitReason::ExportFailed);
            return Err(Error::Export(e.to_string()));
        }
        tracing::debug!(path = OBJECT_PATH, "interface exported");

        if let Some(events) = self.inner.events.lock().await.take() {
            tokio::spawn(forward_events(conn.clone(), events));
        }

        *self.inner.connection.lock().await = Some(conn);
        Ok(())
    }

    /// Unexport, release the bus name and stop every plugin
    ///
    /// Safe to call any number of times; only the first call has an effect.
    pub async fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            tracing::debug!("service already stopped");
            return;
        }

        if let Some(conn) = self.inner.connection.lock().await.take() {
            if let Err(e) = conn
                .object_server()
                .remove::<SettingsDaemonInterface, _>(OBJECT_PATH)
                .await
            {
                tracing::warn!(error = %e, "failed to unexport interface");
            }
            if let Err(e) = conn.release_name(BUS_NAME).await {
                tracing::warn!(name = BUS_NAME, error = %e, "failed to release bus name");
            }
        }

        self.inner.manager.lock().await.stop();
        tracing::info!("settings service stopped");
    }
}

impl std::fmt::Debug for SettingsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsService")
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

/// Request [`QuitReason::NameLost`] when the bus reports our name gone
async fn watch_name_lost(conn: &Connection, quit: QuitHandle) -> zbus::Result<()> {
    let proxy = zbus::fdo::DBusProxy::new(conn).await?;
    let mut lost = proxy.receive_name_lost().await?;

    tokio::spawn(async move {
        while let Some(signal) = lost.next().await {
            let Ok(args) = signal.args() else { continue };
            if args.name().as_str() == BUS_NAME {
                tracing::warn!(name = BUS_NAME, "lost bus name");
                quit.request(QuitReason::NameLost);
                break;
            }
        }
    });

    Ok(())
}

/// Re-emit lifecycle events as bus signals
async fn forward_events(conn: Connection, mut events: mpsc::UnboundedReceiver<LifecycleEvent>) {
    let emitter = match SignalEmitter::new(&conn, OBJECT_PATH) {
        Ok(emitter) => emitter,
        Err(e) => {
            tracing::warn!(error = %e, "unable to emit lifecycle signals");
            return;
        }
    };

    while let Some(event) = events.recv().await {
        let sent = match event.kind {
            LifecycleEventKind::Activated => {
                SettingsDaemonInterface::plugin_activated(&emitter, &event.location).await
            }
            LifecycleEventKind::Deactivated => {
                SettingsDaemonInterface::plugin_deactivated(&emitter, &event.location).await
            }
        };
        if let Err(e) = sent {
            tracing::debug!(location = %event.location, error = %e, "failed to emit {}", event.kind);
        }
    }
}

/// Holder of the single [`SettingsService`] of a process
#[derive(Debug, Default)]
pub struct ServiceSlot(OnceLock<SettingsService>);

impl ServiceSlot {
    /// Create an empty slot
    #[must_use]
    pub const fn new() -> Self {
        Self(OnceLock::new())
    }

    /// Return the service, creating it with `init` on first use
    pub fn get_or_init(&self, init: impl FnOnce() -> SettingsService) -> SettingsService {
        self.0.get_or_init(init).clone()
    }

    /// Return the service if it was created
    #[must_use]
    pub fn get(&self) -> Option<SettingsService> {
        self.0.get().cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::config::{DEFAULT_NAMESPACE, Settings, file::parse_settings};
    use crate::extensions::{BuiltinModules, Plugin};
    use crate::plugins::ActivationState;

    struct Counted(Arc<AtomicUsize>);

    impl Plugin for Counted {
        fn activate(&mut self) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn deactivate(&mut self) -> Result<()> {
            self.0.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn service(dir: &std::path::Path, active: &Arc<AtomicUsize>) -> SettingsService {
        for name in ["early", "late"] {
            std::fs::write(dir.join(format!("{name}.settings-plugin")), "[plugin]\n").unwrap();
        }
        let settings = Settings::new(
            DEFAULT_NAMESPACE,
            parse_settings(
                r"
                [plugins]
                init-load-priority = 50
                [plugins.early]
                enabled = true
                priority = 10
                [plugins.late]
                enabled = true
                priority = 90
                ",
            )
            .unwrap(),
        );

        let mut modules = BuiltinModules::new();
        for name in ["early", "late"] {
            let active = Arc::clone(active);
            modules.register(name, move |_| Ok(Box::new(Counted(Arc::clone(&active)))));
        }

        SettingsService::new(SettingsManager::new(
            Box::new(settings),
            vec![dir.to_path_buf()],
            Box::new(modules),
        ))
    }

    fn state(plugins: &[PluginInfo], location: &str) -> ActivationState {
        plugins
            .iter()
            .find(|p| p.location == location)
            .map(|p| p.state)
            .unwrap()
    }

    #[tokio::test]
    async fn eager_then_awake() {
        let dir = tempfile::tempdir().unwrap();
        let active = Arc::new(AtomicUsize::new(0));
        let service = service(dir.path(), &active);

        assert_eq!(service.load(LoadPhase::Eager).await.unwrap(), 1);
        let plugins = service.plugins().await;
        assert_eq!(state(&plugins, "early"), ActivationState::Active);
        assert_eq!(state(&plugins, "late"), ActivationState::Inactive);

        service.awake().await.unwrap();
        assert_eq!(active.load(Ordering::SeqCst), 2);

        // A second awake activates nothing new
        service.start().await.unwrap();
        assert_eq!(active.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let active = Arc::new(AtomicUsize::new(0));
        let service = service(dir.path(), &active);
        service.awake().await.unwrap();

        service.shutdown().await;
        service.shutdown().await;

        assert!(service.is_shut_down());
        assert_eq!(active.load(Ordering::SeqCst), 0);
        assert!(service.plugins().await.is_empty());
        assert!(service.connection().await.is_none());
    }

    #[tokio::test]
    async fn no_activation_after_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let active = Arc::new(AtomicUsize::new(0));
        let service = service(dir.path(), &active);

        service.shutdown().await;
        assert_eq!(service.load(LoadPhase::All).await.unwrap(), 0);
        service.awake().await.unwrap();
        assert_eq!(active.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn set_enabled_toggles_plugin() {
        let dir = tempfile::tempdir().unwrap();
        let active = Arc::new(AtomicUsize::new(0));
        let service = service(dir.path(), &active);
        service.awake().await.unwrap();

        assert!(service.set_enabled("late", false).await);
        assert_eq!(active.load(Ordering::SeqCst), 1);
        assert!(!service.set_enabled("missing", true).await);
    }

    #[test]
    fn slot_creates_once() {
        let dir = tempfile::tempdir().unwrap();
        let active = Arc::new(AtomicUsize::new(0));
        let slot = ServiceSlot::new();
        assert!(slot.get().is_none());

        let first = slot.get_or_init(|| service(dir.path(), &active));
        let second = slot.get_or_init(|| unreachable!("slot already filled"));

        assert!(Arc::ptr_eq(&first.inner, &second.inner));
        assert!(slot.get().is_some());
    }
}
