//! Daemon - startup sequence and main loop
//!
//! Startup runs the eager load pass, takes the bus name, registers with the
//! session controller and finishes with the deferred pass. The main loop then
//! waits for a [`QuitReason`] and tears the service down.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::{Config, Settings};
use crate::lifecycle::LoadPhase;
use crate::service::SettingsService;
use crate::{Result, session};

/// Why the main loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitReason {
    /// The session controller sent `EndSession`
    SessionEnded,
    /// The bus name was lost or never obtained
    NameLost,
    /// SIGTERM or SIGINT
    Terminated,
    /// `--timed-exit` elapsed
    TimedExit,
    /// The interface could not be exported
    ExportFailed,
}

impl QuitReason {
    /// Whether the process should exit with a failure status
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::ExportFailed)
    }
}

/// Cloneable request to end the main loop
#[derive(Debug, Clone)]
pub struct QuitHandle {
    tx: mpsc::Sender<QuitReason>,
}

impl QuitHandle {
    /// Create a handle and the receiver the main loop waits on
    #[must_use]
    pub fn channel() -> (Self, mpsc::Receiver<QuitReason>) {
        let (tx, rx) = mpsc::channel(4);
        (Self { tx }, rx)
    }

    /// Ask the main loop to exit; the first reason wins
    pub fn request(&self, reason: QuitReason) {
        tracing::debug!(reason = ?reason, "quit requested");
        if let Err(e) = self.tx.try_send(reason) {
            tracing::debug!(error = %e, "quit already pending");
        }
    }
}

/// Hook called with the effective debug flag after settings are re-read
pub type DebugHook = Arc<dyn Fn(bool) + Send + Sync>;

/// The settings daemon process
pub struct Daemon {
    config: Config,
    service: SettingsService,
    on_debug: Option<DebugHook>,
}

impl Daemon {
    /// Create a daemon around an existing service
    #[must_use]
    pub fn new(config: Config, service: SettingsService) -> Self {
        Self {
            config,
            service,
            on_debug: None,
        }
    }

    /// Call `hook` whenever a settings reload changes the debug flag
    #[must_use]
    pub fn with_debug_hook(mut self, hook: DebugHook) -> Self {
        self.on_debug = Some(hook);
        self
    }

    /// Run until a quit is requested
    ///
    /// The service is always shut down before returning.
    ///
    /// # Errors
    ///
    /// Returns error if the module system is unavailable, signal handlers
    /// cannot be installed or the interface cannot be exported
    pub async fn run(self) -> Result<QuitReason> {
        let (quit, mut quit_rx) = QuitHandle::channel();

        let result = self.start(&quit).await;
        let reason = match result {
            Ok(()) => {
                let reason = quit_rx.recv().await.unwrap_or(QuitReason::Terminated);
                tracing::info!(reason = ?reason, "leaving main loop");
                Ok(reason)
            }
            Err(e) => Err(e),
        };

        self.service.shutdown().await;
        reason
    }

    async fn start(&self, quit: &QuitHandle) -> Result<()> {
        self.watch_signals(quit)?;

        if self.config.dbus_activated {
            tracing::debug!("started by bus activation, waiting for Awake");
        } else {
            self.service.load(LoadPhase::Eager).await?;
        }

        self.service.acquire_name(self.config.replace, quit).await?;

        if let Some(conn) = self.service.connection().await {
            session::register(
                &conn,
                self.config.startup_id.as_deref(),
                self.service.clone(),
                quit.clone(),
            )
            .await;
        }

        if !self.config.dbus_activated {
            self.service.load(LoadPhase::Deferred).await?;
        }

        if let Some(after) = self.config.timed_exit {
            let quit = quit.clone();
            tokio::spawn(async move {
                tokio::time::sleep(after).await;
                quit.request(QuitReason::TimedExit);
            });
        }

        tracing::info!("settings daemon started");
        Ok(())
    }

    /// Install SIGTERM/SIGINT handlers and the SIGHUP settings reload
    #[cfg(unix)]
    fn watch_signals(&self, quit: &QuitHandle) -> Result<()> {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate())?;
        let mut int = signal(SignalKind::interrupt())?;
        let mut hup = signal(SignalKind::hangup())?;

        let quit = quit.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = term.recv() => tracing::info!("received SIGTERM"),
                _ = int.recv() => tracing::info!("received SIGINT"),
            }
            quit.request(QuitReason::Terminated);
        });

        let reloader = Reloader {
            namespace: self.config.namespace.clone(),
            path: self.config.settings_path.clone(),
            cli_debug: self.config.debug,
            service: self.service.clone(),
            on_debug: self.on_debug.clone(),
        };
        tokio::spawn(async move {
            while hup.recv().await.is_some() {
                reloader.reload().await;
            }
        });

        Ok(())
    }

    #[cfg(not(unix))]
    fn watch_signals(&self, quit: &QuitHandle) -> Result<()> {
        let quit = quit.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                quit.request(QuitReason::Terminated);
            }
        });
        Ok(())
    }
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon")
            .field("config", &self.config)
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

/// Re-reads the settings file on SIGHUP
#[cfg_attr(not(unix), allow(dead_code))]
struct Reloader {
    namespace: String,
    path: PathBuf,
    cli_debug: bool,
    service: SettingsService,
    on_debug: Option<DebugHook>,
}

#[cfg_attr(not(unix), allow(dead_code))]
impl Reloader {
    async fn reload(&self) {
        tracing::info!(path = %self.path.display(), "reloading settings");
        let settings = Settings::load(self.namespace.clone(), &self.path);

        if let Some(hook) = &self.on_debug {
            hook(self.cli_debug || settings.debug());
        }
        self.service.reload(Box::new(settings)).await;
    }
}
