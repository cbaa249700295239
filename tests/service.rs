//! Service and session integration tests
//!
//! Exercises the bus-facing service without a session bus

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use settings_daemon::{
    LoadPhase, QuitHandle, QuitReason, Result, ServiceSlot, SessionBridge, SessionClient,
    SessionSignal, SettingsService,
};

mod common;
use common::{CallLog, Fixture, recording_modules};

/// Session client that records every response
#[derive(Clone, Default)]
struct MockSessionClient {
    responses: Arc<Mutex<Vec<(bool, String)>>>,
}

#[async_trait]
impl SessionClient for MockSessionClient {
    async fn respond(&self, is_ok: bool, reason: &str) -> Result<()> {
        self.responses
            .lock()
            .unwrap()
            .push((is_ok, reason.to_string()));
        Ok(())
    }
}

fn service(fixture: &Fixture, log: &CallLog) -> SettingsService {
    fixture.manifest("power", "[plugin]\nname = \"Power\"\n");
    fixture.manifest("xrandr", "[plugin]\nname = \"Displays\"\n");
    let settings = fixture.settings(
        r"
        [plugins]
        init-load-priority = 20

        [plugins.power]
        enabled = true
        priority = 60

        [plugins.xrandr]
        enabled = true
        priority = 1
        ",
    );

    SettingsService::new(fixture.manager(
        settings,
        recording_modules(log, &["power", "xrandr"], &[]),
    ))
}

#[tokio::test]
async fn awake_is_idempotent() {
    let fixture = Fixture::new();
    let log = CallLog::default();
    let service = service(&fixture, &log);

    service.load(LoadPhase::Eager).await.unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["activate:xrandr"]);

    service.awake().await.unwrap();
    service.awake().await.unwrap();
    service.start().await.unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["activate:xrandr", "activate:power"]
    );
}

#[tokio::test]
async fn end_session_responds_once_and_shuts_down() {
    let fixture = Fixture::new();
    let log = CallLog::default();
    let service = service(&fixture, &log);
    service.awake().await.unwrap();

    let (quit, mut quit_rx) = QuitHandle::channel();
    let client = MockSessionClient::default();
    let bridge = SessionBridge::new(client.clone(), service.clone(), quit);

    assert!(bridge.handle(SessionSignal::EndSession).await);

    assert_eq!(
        *client.responses.lock().unwrap(),
        vec![(true, String::new())]
    );
    assert!(service.is_shut_down());
    assert!(service.plugins().await.is_empty());
    assert_eq!(quit_rx.recv().await, Some(QuitReason::SessionEnded));

    let log = log.lock().unwrap();
    assert!(log.contains(&"deactivate:power".to_string()));
    assert!(log.contains(&"deactivate:xrandr".to_string()));
}

#[tokio::test]
async fn query_end_session_keeps_running() {
    let fixture = Fixture::new();
    let log = CallLog::default();
    let service = service(&fixture, &log);
    service.awake().await.unwrap();

    let (quit, mut quit_rx) = QuitHandle::channel();
    let client = MockSessionClient::default();
    let bridge = SessionBridge::new(client.clone(), service.clone(), quit);

    assert!(!bridge.handle(SessionSignal::QueryEndSession).await);
    assert!(!bridge.handle(SessionSignal::QueryEndSession).await);

    assert_eq!(client.responses.lock().unwrap().len(), 2);
    assert!(!service.is_shut_down());
    assert_eq!(service.plugins().await.len(), 2);
    assert!(quit_rx.try_recv().is_err());
}

#[tokio::test]
async fn shutdown_after_session_end_is_noop() {
    let fixture = Fixture::new();
    let log = CallLog::default();
    let service = service(&fixture, &log);
    service.awake().await.unwrap();

    let (quit, _quit_rx) = QuitHandle::channel();
    let bridge = SessionBridge::new(MockSessionClient::default(), service.clone(), quit);
    bridge.handle(SessionSignal::EndSession).await;
    let calls = log.lock().unwrap().len();

    service.shutdown().await;

    assert_eq!(log.lock().unwrap().len(), calls);
}

#[tokio::test]
async fn slot_hands_out_one_service() {
    let fixture = Fixture::new();
    let log = CallLog::default();
    let slot = ServiceSlot::new();

    let first = slot.get_or_init(|| service(&fixture, &log));
    first.awake().await.unwrap();

    let second = slot.get_or_init(|| unreachable!("service already created"));
    assert_eq!(second.plugins().await.len(), 2);
}
