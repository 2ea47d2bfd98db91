//! Integration tests for `ServiceConnection` against a live control server.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sbar_client::{ClientError, ServiceConnection};
use sbar_core::signal::ACTION_SCREEN_OFF;
use sbar_core::{
    Broadcast, Color, LifecycleSignal, Notice, NoticeAction, PreferencesSnapshot, ServiceState,
};
use sbar_protocol::{DaemonMessage, ProtocolVersion};
use sbard::compat::{CapabilityError, CapabilityProbe, PrivilegedOp, SlotKind};
use sbard::notice::NoticeBoard;
use sbard::overlay::{Density, HeadlessCompositor};
use sbard::prefs::MemoryPreferences;
use sbard::server::ControlServer;
use sbard::service::{spawn_service, ServiceContext};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

const SOCKET_WAIT_TIMEOUT: Duration = Duration::from_millis(500);
const SOCKET_POLL_INTERVAL: Duration = Duration::from_millis(10);
const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

struct NoPrivilege;

impl CapabilityProbe for NoPrivilege {
    fn probe(&self, slot: SlotKind) -> Result<Arc<dyn PrivilegedOp>, CapabilityError> {
        Err(CapabilityError {
            slot,
            reason: "test platform".into(),
        })
    }
}

struct TestService {
    socket_path: PathBuf,
    cancel_token: CancellationToken,
    _temp_dir: TempDir,
}

impl TestService {
    async fn spawn(prefs: PreferencesSnapshot) -> Self {
        let temp_dir = tempfile::tempdir().expect("create temp dir");
        let socket_path = temp_dir.path().join("sbar.sock");

        let service = spawn_service(ServiceContext {
            preferences: Arc::new(MemoryPreferences::new(prefs)),
            compositor: Arc::new(HeadlessCompositor::new()),
            probe: Arc::new(NoPrivilege),
            notifier: Arc::new(NoticeBoard::new()),
            app_source: None,
            density: Density::Hdpi,
            window_title: "StatusBar+".into(),
            notice: Notice::ongoing(
                "StatusBar+",
                "running",
                NoticeAction::OpenFrontEnd {
                    command: "sbar status".into(),
                },
            ),
            poll_interval: Duration::from_secs(1),
        });
        let cancel_token = CancellationToken::new();

        let server = ControlServer::new(socket_path.clone(), service, cancel_token.clone());
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        let start = tokio::time::Instant::now();
        while start.elapsed() < SOCKET_WAIT_TIMEOUT && !socket_path.exists() {
            sleep(SOCKET_POLL_INTERVAL).await;
        }
        assert!(socket_path.exists(), "server socket did not appear");

        Self {
            socket_path,
            cancel_token,
            _temp_dir: temp_dir,
        }
    }

    async fn bind(&self) -> ServiceConnection {
        let mut conn = ServiceConnection::new(&self.socket_path);
        conn.bind().await.expect("bind");
        conn
    }
}

impl Drop for TestService {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

#[tokio::test]
async fn test_bind_assigns_client_id() {
    let service = TestService::spawn(PreferencesSnapshot::default()).await;

    let mut conn = ServiceConnection::new(&service.socket_path).with_client_id("front-end");
    let id = conn.bind().await.unwrap();

    assert_eq!(id, "front-end");
    assert!(conn.is_bound());
    assert_eq!(conn.client_id(), Some("front-end"));

    // Binding twice keeps the same stream.
    assert_eq!(conn.bind().await.unwrap(), "front-end");
}

#[tokio::test]
async fn test_defaults_before_create() {
    let service = TestService::spawn(PreferencesSnapshot::default()).await;
    let mut conn = service.bind().await;

    conn.show().await.unwrap();
    conn.toggle().await.unwrap();
    assert!(!conn.is_dropped().await.unwrap());
    assert_eq!(conn.icon_color().await.unwrap(), Color::TRANSPARENT);
    assert_eq!(conn.background_color().await.unwrap(), Color::TRANSPARENT);
    assert_eq!(conn.height().await.unwrap(), 0);

    let status = conn.status().await.unwrap();
    assert_eq!(status.state, ServiceState::Uninitialized);
    assert!(!status.overlay_attached);
}

#[tokio::test]
async fn test_remote_operations() {
    let prefs = PreferencesSnapshot {
        background_color: Color::from_argb(0xFF11_2233),
        icon_color: Color::from_argb(0xFFEE_EEEE),
        ..Default::default()
    };
    let service = TestService::spawn(prefs).await;
    let mut conn = service.bind().await;

    conn.create().await.unwrap();
    assert_eq!(conn.height().await.unwrap(), 38);
    assert_eq!(conn.icon_color().await.unwrap(), Color::from_argb(0xFFEE_EEEE));

    conn.make_background_transparent().await.unwrap();
    assert_eq!(conn.background_color().await.unwrap(), Color::TRANSPARENT);
    conn.restore_background_color().await.unwrap();
    assert_eq!(
        conn.background_color().await.unwrap(),
        Color::from_argb(0xFF11_2233)
    );

    conn.toggle().await.unwrap();
    assert!(!conn.status().await.unwrap().visible);
    conn.toggle().await.unwrap();
    assert!(conn.status().await.unwrap().visible);

    conn.disable_expand().await.unwrap();
    assert!(!conn.status().await.unwrap().expand_enabled);
    conn.enable_expand().await.unwrap();
    assert!(conn.status().await.unwrap().expand_enabled);

    conn.destroy().await.unwrap();
    assert_eq!(conn.status().await.unwrap().state, ServiceState::Destroyed);
    assert_eq!(conn.height().await.unwrap(), 0);
}

#[tokio::test]
async fn test_ping_round_trip() {
    let service = TestService::spawn(PreferencesSnapshot::default()).await;
    let mut conn = service.bind().await;

    assert_eq!(conn.ping().await.unwrap(), 1);
    assert_eq!(conn.ping().await.unwrap(), 2);
}

#[tokio::test]
async fn test_deliver_broadcast() {
    let prefs = PreferencesSnapshot {
        auto_disable_expand: true,
        ..Default::default()
    };
    let service = TestService::spawn(prefs).await;
    let mut conn = service.bind().await;

    conn.create().await.unwrap();
    conn.deliver(Broadcast::new(ACTION_SCREEN_OFF)).await.unwrap();

    let status = conn.status().await.unwrap();
    assert!(!status.screen_on);
    assert!(!status.expand_enabled);
}

#[tokio::test]
async fn test_events_arriving_during_request_are_queued() {
    let service = TestService::spawn(PreferencesSnapshot::default()).await;
    let mut conn = service.bind().await;

    conn.subscribe().await.unwrap();
    conn.create().await.unwrap();

    // The push may land before or after the create reply.
    let first = timeout(EVENT_TIMEOUT, conn.next_event()).await.unwrap().unwrap();
    assert_eq!(
        first,
        DaemonMessage::Lifecycle {
            signal: LifecycleSignal::Enabled
        }
    );

    conn.destroy().await.unwrap();
    for _ in 0..3 {
        conn.ping().await.unwrap();
    }

    let second = timeout(EVENT_TIMEOUT, conn.next_event()).await.unwrap().unwrap();
    assert_eq!(
        second,
        DaemonMessage::Lifecycle {
            signal: LifecycleSignal::Disabled
        }
    );
}

#[tokio::test]
async fn test_unbind_then_rebind() {
    let service = TestService::spawn(PreferencesSnapshot::default()).await;
    let mut conn = service.bind().await;

    conn.unbind().await;
    assert!(!conn.is_bound());
    assert!(matches!(conn.height().await, Err(ClientError::NotBound)));

    conn.bind().await.unwrap();
    assert_eq!(conn.height().await.unwrap(), 0);
}

/// Server that completes the handshake and then hangs up.
async fn spawn_vanishing_server(socket_path: PathBuf) {
    let listener = UnixListener::bind(&socket_path).unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();

        let reply = serde_json::to_string(&DaemonMessage::connected("client-1".into())).unwrap();
        writer.write_all(reply.as_bytes()).await.unwrap();
        writer.write_all(b"\n").await.unwrap();
        writer.flush().await.unwrap();
    });
}

#[tokio::test]
async fn test_lost_service_unbinds() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("vanishing.sock");
    spawn_vanishing_server(socket_path.clone()).await;

    let mut conn = ServiceConnection::new(&socket_path);
    assert_eq!(conn.bind().await.unwrap(), "client-1");

    let err = conn.toggle().await.unwrap_err();
    assert!(err.breaks_binding(), "unexpected error: {err:?}");
    assert!(!conn.is_bound());
    assert!(matches!(conn.toggle().await, Err(ClientError::NotBound)));
}

#[tokio::test]
async fn test_rejected_handshake() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("rejecting.sock");
    let listener = UnixListener::bind(&socket_path).unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();

        let reply = DaemonMessage::Rejected {
            reason: "too old".into(),
            protocol_version: ProtocolVersion::new(9, 0),
        };
        let json = serde_json::to_string(&reply).unwrap();
        writer.write_all(json.as_bytes()).await.unwrap();
        writer.write_all(b"\n").await.unwrap();
        writer.flush().await.unwrap();
    });

    let mut conn = ServiceConnection::new(&socket_path);
    let err = conn.bind().await.unwrap_err();
    assert!(matches!(err, ClientError::Rejected(ref reason) if reason == "too old"));
    assert!(!conn.is_bound());
}
