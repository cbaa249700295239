//! Session controller integration
//!
//! When started by the session controller (a startup identifier is present)
//! the daemon registers as a managed client, answers every end-of-session
//! query affirmatively and shuts down on `EndSession`. Registration failures
//! leave the daemon running without session integration.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use zbus::Connection;

use crate::Result;
use crate::daemon::{QuitHandle, QuitReason};
use crate::dbus::session_manager::{ClientPrivateProxy, SessionManagerProxy};
use crate::service::SettingsService;

/// Application identifier sent with `RegisterClient`
pub const APP_ID: &str = "settings-daemon";

/// Session controller signal relevant to the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSignal {
    /// The session asks whether it may end
    QueryEndSession,
    /// The session is ending
    EndSession,
}

/// Outbound half of the client protocol
#[async_trait]
pub trait SessionClient: Send + Sync {
    /// Send `EndSessionResponse(is_ok, reason)`
    ///
    /// # Errors
    ///
    /// Returns error if the call fails
    async fn respond(&self, is_ok: bool, reason: &str) -> Result<()>;
}

#[async_trait]
impl SessionClient for ClientPrivateProxy<'static> {
    async fn respond(&self, is_ok: bool, reason: &str) -> Result<()> {
        self.end_session_response(is_ok, reason).await?;
        Ok(())
    }
}

/// Reacts to session controller signals on behalf of the service
pub struct SessionBridge<C> {
    client: C,
    service: SettingsService,
    quit: QuitHandle,
}

impl<C: SessionClient> SessionBridge<C> {
    /// Create a bridge answering through `client`
    #[must_use]
    pub const fn new(client: C, service: SettingsService, quit: QuitHandle) -> Self {
        Self {
            client,
            service,
            quit,
        }
    }

    /// Handle one signal
    ///
    /// Exactly one affirmative response is sent before anything else
    /// happens. Returns `true` once the session has ended.
    pub async fn handle(&self, signal: SessionSignal) -> bool {
        tracing::debug!(signal = ?signal, "session signal");
        if let Err(e) = self.client.respond(true, "").await {
            tracing::warn!(error = %e, "failed to answer session manager");
        }

        match signal {
            SessionSignal::QueryEndSession => false,
            SessionSignal::EndSession => {
                tracing::info!("session ending");
                self.service.shutdown().await;
                self.quit.request(QuitReason::SessionEnded);
                true
            }
        }
    }

    /// Handle signals until the session ends or the stream closes
    pub async fn run<S>(self, mut signals: S)
    where
        S: Stream<Item = SessionSignal> + Unpin + Send,
    {
        while let Some(signal) = signals.next().await {
            if self.handle(signal).await {
                break;
            }
        }
    }
}

impl<C> std::fmt::Debug for SessionBridge<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBridge")
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

/// Register with the session controller and spawn the bridge
///
/// Returns `true` if registration succeeded. Without a startup identifier
/// nothing is registered.
pub async fn register(
    conn: &Connection,
    startup_id: Option<&str>,
    service: SettingsService,
    quit: QuitHandle,
) -> bool {
    let Some(startup_id) = startup_id else {
        tracing::debug!("no startup id, not registering with session manager");
        return false;
    };

    match connect(conn, startup_id).await {
        Ok((client, signals)) => {
            tokio::spawn(SessionBridge::new(client, service, quit).run(signals));
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "unable to register client with session manager");
            false
        }
    }
}

async fn connect(
    conn: &Connection,
    startup_id: &str,
) -> zbus::Result<(ClientPrivateProxy<'static>, BoxStream<'static, SessionSignal>)> {
    let manager = SessionManagerProxy::new(conn).await?;
    let path = manager.register_client(APP_ID, startup_id).await?;
    tracing::debug!(path = %path.as_str(), "registered with session manager");

    let client = ClientPrivateProxy::builder(conn).path(path)?.build().await?;
    let query = client
        .receive_query_end_session()
        .await?
        .map(|_| SessionSignal::QueryEndSession);
    let end = client
        .receive_end_session()
        .await?
        .map(|_| SessionSignal::EndSession);

    Ok((client, futures::stream::select(query, end).boxed()))
}
