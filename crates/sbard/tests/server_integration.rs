//! Integration tests for the Unix socket control server.
//!
//! These tests drive the server end to end over a socket in a temp dir:
//! handshake, remote operations, broadcast delivery and event pushes.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sbar_core::signal::{ACTION_SCREEN_OFF, ACTION_USER_PRESENT};
use sbar_core::{
    Broadcast, Color, LifecycleSignal, Notice, NoticeAction, PreferencesSnapshot, ServiceState,
};
use sbar_protocol::{ClientMessage, DaemonMessage, MessageType, ProtocolVersion};
use sbard::compat::{CapabilityError, CapabilityProbe, PrivilegedOp, SlotKind};
use sbard::notice::NoticeBoard;
use sbard::overlay::{Density, HeadlessCompositor};
use sbard::prefs::MemoryPreferences;
use sbard::server::ControlServer;
use sbard::service::{spawn_service, ServiceContext, ServiceHandle};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Constants
// ============================================================================

/// Maximum time to wait for server socket to appear
const SOCKET_WAIT_TIMEOUT: Duration = Duration::from_millis(500);

/// Interval between socket existence checks
const SOCKET_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Maximum time to wait for a pushed event
const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

/// Grace period for server shutdown
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_millis(100);

// ============================================================================
// Test Helpers
// ============================================================================

struct NoPrivilege;

impl CapabilityProbe for NoPrivilege {
    fn probe(&self, slot: SlotKind) -> Result<Arc<dyn PrivilegedOp>, CapabilityError> {
        Err(CapabilityError {
            slot,
            reason: "test platform".into(),
        })
    }
}

struct TestServer {
    socket_path: PathBuf,
    cancel_token: CancellationToken,
    service: ServiceHandle,
    _temp_dir: TempDir,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with_prefs(PreferencesSnapshot::default()).await
    }

    async fn spawn_with_prefs(prefs: PreferencesSnapshot) -> Self {
        let temp_dir = tempfile::tempdir().expect("create temp dir");
        let socket_path = temp_dir.path().join("sbar.sock");

        let service = spawn_service(ServiceContext {
            preferences: Arc::new(MemoryPreferences::new(prefs)),
            compositor: Arc::new(HeadlessCompositor::new()),
            probe: Arc::new(NoPrivilege),
            notifier: Arc::new(NoticeBoard::new()),
            app_source: None,
            density: Density::Xhdpi,
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

        let server = ControlServer::new(socket_path.clone(), service.clone(), cancel_token.clone());
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        let start = tokio::time::Instant::now();
        while start.elapsed() < SOCKET_WAIT_TIMEOUT {
            if socket_path.exists() {
                break;
            }
            sleep(SOCKET_POLL_INTERVAL).await;
        }
        assert!(
            socket_path.exists(),
            "Server socket did not appear within {SOCKET_WAIT_TIMEOUT:?}"
        );

        Self {
            socket_path,
            cancel_token,
            service,
            _temp_dir: temp_dir,
        }
    }

    async fn connect(&self) -> TestClient {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .expect("connect to server");
        TestClient::new(stream)
    }

    /// Connects and completes the handshake.
    async fn bind(&self) -> TestClient {
        let mut client = self.connect().await;
        client.handshake(None).await;
        client
    }

    async fn shutdown(self) {
        self.cancel_token.cancel();
        sleep(SHUTDOWN_GRACE_PERIOD).await;
    }
}

struct TestClient {
    reader: BufReader<tokio::net::unix::OwnedReadHalf>,
    writer: tokio::net::unix::OwnedWriteHalf,
}

impl TestClient {
    fn new(stream: UnixStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    async fn send(&mut self, msg: ClientMessage) {
        let json = serde_json::to_string(&msg).unwrap();
        self.send_raw(&json).await;
    }

    async fn send_raw(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn recv(&mut self) -> DaemonMessage {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap();
        serde_json::from_str(&line).unwrap()
    }

    /// Next reply, skipping pushed events.
    async fn reply(&mut self) -> DaemonMessage {
        loop {
            let msg = self.recv().await;
            if !msg.is_event() {
                return msg;
            }
        }
    }

    async fn request(&mut self, message: MessageType) -> DaemonMessage {
        self.send(ClientMessage::new(message)).await;
        self.reply().await
    }

    /// Reads until a message matches, failing after `EVENT_TIMEOUT`.
    async fn recv_until(&mut self, pred: impl Fn(&DaemonMessage) -> bool) -> DaemonMessage {
        timeout(EVENT_TIMEOUT, async {
            loop {
                let msg = self.recv().await;
                if pred(&msg) {
                    return msg;
                }
            }
        })
        .await
        .expect("expected message did not arrive")
    }

    async fn handshake(&mut self, client_id: Option<String>) -> String {
        self.send(ClientMessage::connect(client_id)).await;

        match self.recv().await {
            DaemonMessage::Connected { client_id, .. } => client_id,
            other => panic!("Expected Connected, got {other:?}"),
        }
    }
}

fn assert_ack(msg: DaemonMessage) {
    assert_eq!(msg, DaemonMessage::Ack);
}

// ============================================================================
// Handshake Tests
// ============================================================================

#[tokio::test]
async fn test_handshake_success() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    client
        .send(ClientMessage::connect(Some("front-end".to_string())))
        .await;

    match client.recv().await {
        DaemonMessage::Connected {
            protocol_version,
            client_id,
        } => {
            assert_eq!(protocol_version, ProtocolVersion::CURRENT);
            assert_eq!(client_id, "front-end");
        }
        other => panic!("Expected Connected, got {other:?}"),
    }

    server.shutdown().await;
}

#[tokio::test]
async fn test_handshake_auto_assigns_client_id() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    let client_id = client.handshake(None).await;
    assert!(client_id.starts_with("client-"), "got {client_id}");

    server.shutdown().await;
}

#[tokio::test]
async fn test_handshake_version_mismatch() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    client
        .send(ClientMessage {
            protocol_version: ProtocolVersion::new(99, 0),
            message: MessageType::Connect { client_id: None },
        })
        .await;

    match client.recv().await {
        DaemonMessage::Rejected { reason, .. } => {
            assert!(reason.contains("not compatible"), "got: {reason}");
        }
        other => panic!("Expected Rejected, got {other:?}"),
    }

    server.shutdown().await;
}

#[tokio::test]
async fn test_first_message_must_be_connect() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    client.send(ClientMessage::new(MessageType::Show)).await;

    match client.recv().await {
        DaemonMessage::Error { message } => assert!(message.contains("Connect")),
        other => panic!("Expected Error, got {other:?}"),
    }

    server.shutdown().await;
}

// ============================================================================
// Remote Operation Tests
// ============================================================================

#[tokio::test]
async fn test_defaults_before_create() {
    let server = TestServer::spawn().await;
    let mut client = server.bind().await;

    assert_ack(client.request(MessageType::Show).await);
    assert_eq!(
        client.request(MessageType::IsDropped).await,
        DaemonMessage::Dropped { dropped: false }
    );
    assert_eq!(
        client.request(MessageType::GetHeight).await,
        DaemonMessage::Height { height: 0 }
    );
    assert_eq!(
        client.request(MessageType::GetIconColor).await,
        DaemonMessage::Color {
            color: Color::TRANSPARENT
        }
    );

    server.shutdown().await;
}

#[tokio::test]
async fn test_create_toggle_status() {
    let server = TestServer::spawn().await;
    let mut client = server.bind().await;

    assert_ack(client.request(MessageType::Create).await);
    assert_ack(client.request(MessageType::Create).await);
    assert_eq!(
        client.request(MessageType::GetHeight).await,
        DaemonMessage::Height { height: 50 }
    );

    assert_ack(client.request(MessageType::Toggle).await);

    match client.request(MessageType::Status).await {
        DaemonMessage::Status { status } => {
            assert_eq!(status.state, ServiceState::Created);
            assert!(status.overlay_attached);
            assert!(!status.visible);
            assert_eq!(status.notice.map(|n| n.title), Some("StatusBar+".into()));
        }
        other => panic!("Expected Status, got {other:?}"),
    }

    assert_ack(client.request(MessageType::Destroy).await);
    match client.request(MessageType::Status).await {
        DaemonMessage::Status { status } => {
            assert_eq!(status.state, ServiceState::Destroyed);
            assert!(!status.overlay_attached);
            assert!(status.notice.is_none());
        }
        other => panic!("Expected Status, got {other:?}"),
    }

    server.shutdown().await;
}

#[tokio::test]
async fn test_background_color_round_trip() {
    let server = TestServer::spawn().await;
    let mut client = server.bind().await;
    client.request(MessageType::Create).await;

    assert_ack(client.request(MessageType::MakeBackgroundTransparent).await);
    assert_eq!(
        client.request(MessageType::GetBackgroundColor).await,
        DaemonMessage::Color {
            color: Color::TRANSPARENT
        }
    );

    assert_ack(client.request(MessageType::RestoreBackgroundColor).await);
    assert_eq!(
        client.request(MessageType::GetBackgroundColor).await,
        DaemonMessage::Color {
            color: Color::BLACK
        }
    );

    server.shutdown().await;
}

#[tokio::test]
async fn test_broadcast_delivery_over_socket() {
    let server = TestServer::spawn_with_prefs(PreferencesSnapshot {
        auto_disable_expand: true,
        ..Default::default()
    })
    .await;
    let mut client = server.bind().await;
    client.request(MessageType::Create).await;

    assert_ack(
        client
            .request(MessageType::Broadcast {
                broadcast: Broadcast::new(ACTION_SCREEN_OFF),
            })
            .await,
    );
    assert!(!server.service.status().await.unwrap().expand_enabled);

    assert_ack(
        client
            .request(MessageType::Broadcast {
                broadcast: Broadcast::new(ACTION_USER_PRESENT),
            })
            .await,
    );
    assert!(server.service.status().await.unwrap().expand_enabled);

    server.shutdown().await;
}

#[tokio::test]
async fn test_malformed_request_keeps_connection() {
    let server = TestServer::spawn().await;
    let mut client = server.bind().await;

    client.send_raw("{not json").await;
    match client.reply().await {
        DaemonMessage::Error { message } => assert!(message.contains("Parse error")),
        other => panic!("Expected Error, got {other:?}"),
    }

    client.send(ClientMessage::ping(7)).await;
    assert_eq!(client.reply().await, DaemonMessage::pong(7));

    server.shutdown().await;
}

#[tokio::test]
async fn test_client_loss_leaves_service_intact() {
    let server = TestServer::spawn().await;
    {
        let mut client = server.bind().await;
        client.request(MessageType::Create).await;
    }

    let mut client = server.bind().await;
    match client.request(MessageType::Status).await {
        DaemonMessage::Status { status } => assert!(status.overlay_attached),
        other => panic!("Expected Status, got {other:?}"),
    }

    server.shutdown().await;
}

// ============================================================================
// Subscription Tests
// ============================================================================

#[tokio::test]
async fn test_subscriber_receives_sticky_and_pushed_lifecycle() {
    let server = TestServer::spawn().await;

    let mut controller = server.bind().await;
    controller.request(MessageType::Create).await;

    let mut watcher = server.bind().await;
    watcher.send(ClientMessage::new(MessageType::Subscribe)).await;
    watcher
        .recv_until(|m| {
            *m == DaemonMessage::Lifecycle {
                signal: LifecycleSignal::Enabled,
            }
        })
        .await;

    controller.request(MessageType::Destroy).await;
    watcher
        .recv_until(|m| {
            *m == DaemonMessage::Lifecycle {
                signal: LifecycleSignal::Disabled,
            }
        })
        .await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_subscribe_delivers_sticky_lifecycle_once() {
    let server = TestServer::spawn().await;

    let mut early = server.bind().await;
    assert_ack(early.request(MessageType::Subscribe).await);

    let mut controller = server.bind().await;
    controller.request(MessageType::Create).await;

    // Once the early subscriber has it, the Enabled push is finished.
    early
        .recv_until(|m| {
            *m == DaemonMessage::Lifecycle {
                signal: LifecycleSignal::Enabled,
            }
        })
        .await;

    let mut watcher = server.bind().await;
    watcher.send(ClientMessage::new(MessageType::Subscribe)).await;
    assert_ack(watcher.recv().await);
    assert_eq!(
        watcher.recv().await,
        DaemonMessage::Lifecycle {
            signal: LifecycleSignal::Enabled,
        }
    );

    // Nothing changed since the snapshot, so no second Enabled is pushed.
    watcher.send(ClientMessage::ping(7)).await;
    assert_eq!(watcher.recv().await, DaemonMessage::pong(7));

    server.shutdown().await;
}

#[tokio::test]
async fn test_subscribe_before_create_sends_nothing_sticky() {
    let server = TestServer::spawn().await;
    let mut watcher = server.bind().await;

    assert_ack(watcher.request(MessageType::Subscribe).await);

    watcher.send(ClientMessage::ping(1)).await;
    assert_eq!(watcher.recv().await, DaemonMessage::pong(1));

    server.shutdown().await;
}
