//! Proxies for the desktop session controller

use zbus::zvariant::OwnedObjectPath;

/// `org.gnome.SessionManager`
#[zbus::proxy(
    interface = "org.gnome.SessionManager",
    default_service = "org.gnome.SessionManager",
    default_path = "/org/gnome/SessionManager"
)]
pub trait SessionManager {
    /// Register a client and return its object path
    fn register_client(&self, app_id: &str, client_startup_id: &str)
    -> zbus::Result<OwnedObjectPath>;
}

/// `org.gnome.SessionManager.ClientPrivate`, bound to a registered client path
#[zbus::proxy(
    interface = "org.gnome.SessionManager.ClientPrivate",
    default_service = "org.gnome.SessionManager"
)]
pub trait ClientPrivate {
    /// Answer a `QueryEndSession` or `EndSession` request
    fn end_session_response(&self, is_ok: bool, reason: &str) -> zbus::Result<()>;

    /// The session asks whether it may end
    #[zbus(signal)]
    fn query_end_session(&self, flags: u32) -> zbus::Result<()>;

    /// The session is ending
    #[zbus(signal)]
    fn end_session(&self, flags: u32) -> zbus::Result<()>;
}
