//! `org.mate.SettingsDaemon` interface: `Awake`/`Start` plus lifecycle signals

use zbus::object_server::SignalEmitter;

use crate::service::SettingsService;

/// `org.mate.SettingsDaemon` object exported at [`super::OBJECT_PATH`]
#[derive(Debug, Clone)]
pub struct SettingsDaemonInterface {
    service: SettingsService,
}

impl SettingsDaemonInterface {
    /// Interface forwarding bus calls to `service`
    #[must_use]
    pub const fn new(service: SettingsService) -> Self {
        Self { service }
    }
}

#[zbus::interface(name = "org.mate.SettingsDaemon")]
impl SettingsDaemonInterface {
    /// Load every enabled plugin that is not yet active
    async fn awake(&self) -> zbus::fdo::Result<()> {
        tracing::debug!("Awake called");
        self.service
            .awake()
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// Same as `Awake`
    async fn start(&self) -> zbus::fdo::Result<()> {
        tracing::debug!("Start called");
        self.service
            .start()
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// A plugin became active
    #[zbus(signal)]
    pub async fn plugin_activated(emitter: &SignalEmitter<'_>, location: &str) -> zbus::Result<()>;

    /// A plugin stopped
    #[zbus(signal)]
    pub async fn plugin_deactivated(
        emitter: &SignalEmitter<'_>,
        location: &str,
    ) -> zbus::Result<()>;
}
