//! Bound connection to the status bar service.
//!
//! A `ServiceConnection` owns at most one socket to the daemon. Requests
//! are strictly request/response; events pushed to a subscribed client
//! can arrive between a request and its reply, so they are queued and
//! handed out later through [`ServiceConnection::next_event`].
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tracing::{debug, info, warn};

use sbar_core::{Broadcast, Color};
use sbar_protocol::{ClientMessage, DaemonMessage, MessageType, ProtocolVersion, ServiceStatus};

use crate::error::{ClientError, Result};

// ============================================================================
// Binding
// ============================================================================

/// Live stream after a successful handshake.
struct Binding {
    client_id: String,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Binding {
    async fn send(&mut self, message: &ClientMessage) -> Result<()> {
        let json = serde_json::to_string(message)?;
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        debug!(message_type = ?message.message, "Sent message to service");
        Ok(())
    }

    async fn recv(&mut self) -> Result<DaemonMessage> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Err(ClientError::Protocol(
                "service closed the connection".to_string(),
            ));
        }
        Ok(serde_json::from_str(line.trim())?)
    }

    /// Sends a request and waits for its reply, queueing pushed events
    /// that arrive first.
    async fn exchange(
        &mut self,
        message: &ClientMessage,
        events: &mut VecDeque<DaemonMessage>,
    ) -> Result<DaemonMessage> {
        self.send(message).await?;

        loop {
            let reply = self.recv().await?;
            if reply.is_event() {
                events.push_back(reply);
                continue;
            }
            return match reply {
                DaemonMessage::Error { message } => Err(ClientError::Service(message)),
                other => Ok(other),
            };
        }
    }
}

// ============================================================================
// Service Connection
// ============================================================================

/// Client handle to the service's remote control interface.
///
/// # Connection Lifecycle
///
/// 1. `bind()` connects to the socket and sends `connect`
/// 2. The service answers `connected` (or `rejected` on a version mismatch)
/// 3. Each call sends one request and reads its reply
/// 4. An I/O or protocol failure drops the stream; the connection is
///    unbound and calls return `ClientError::NotBound` until `bind()`
///    succeeds again
/// 5. `unbind()` sends `disconnect` and closes the stream
pub struct ServiceConnection {
    socket_path: PathBuf,
    requested_id: Option<String>,
    binding: Option<Binding>,
    events: VecDeque<DaemonMessage>,
    next_seq: u64,
}

impl ServiceConnection {
    /// Creates an unbound connection for the given socket.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            requested_id: None,
            binding: None,
            events: VecDeque::new(),
            next_seq: 0,
        }
    }

    /// Asks the service to use this id instead of assigning one.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.requested_id = Some(client_id.into());
        self
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// Id the service assigned during the handshake.
    pub fn client_id(&self) -> Option<&str> {
        self.binding.as_ref().map(|b| b.client_id.as_str())
    }

    /// Connects and performs the handshake.
    ///
    /// Already bound connections return the current client id without
    /// reconnecting.
    pub async fn bind(&mut self) -> Result<String> {
        if let Some(ref binding) = self.binding {
            return Ok(binding.client_id.clone());
        }

        match self.handshake().await {
            Ok(binding) => {
                let client_id = binding.client_id.clone();
                info!(
                    client_id = %client_id,
                    socket_path = %self.socket_path.display(),
                    "Bound to service"
                );
                self.binding = Some(binding);
                self.events.clear();
                Ok(client_id)
            }
            Err(e) => {
                warn!(
                    socket_path = %self.socket_path.display(),
                    error = %e,
                    "Bind failed"
                );
                Err(e)
            }
        }
    }

    async fn handshake(&self) -> Result<Binding> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| ClientError::Connect {
                path: self.socket_path.clone(),
                error: e.to_string(),
            })?;
        let (reader, writer) = stream.into_split();
        let mut binding = Binding {
            client_id: String::new(),
            reader: BufReader::new(reader),
            writer,
        };

        binding
            .send(&ClientMessage::connect(self.requested_id.clone()))
            .await?;

        match binding.recv().await? {
            DaemonMessage::Connected {
                protocol_version,
                client_id,
            } => {
                ProtocolVersion::CURRENT.negotiate(&protocol_version)?;
                binding.client_id = client_id;
                Ok(binding)
            }
            DaemonMessage::Rejected { reason, .. } => Err(ClientError::Rejected(reason)),
            other => Err(ClientError::Protocol(format!(
                "unexpected response to connect: {other:?}"
            ))),
        }
    }

    /// Sends `disconnect` and drops the stream. Never fails.
    pub async fn unbind(&mut self) {
        let Some(mut binding) = self.binding.take() else {
            return;
        };
        if let Err(e) = binding.send(&ClientMessage::disconnect()).await {
            debug!(error = %e, "Disconnect not delivered");
        }
        let _ = binding.writer.shutdown().await;
        self.events.clear();
        info!(client_id = %binding.client_id, "Unbound from service");
    }

    /// Drops the stream if the error invalidates it.
    fn fail(&mut self, error: ClientError) -> ClientError {
        if error.breaks_binding() {
            if let Some(binding) = self.binding.take() {
                warn!(
                    client_id = %binding.client_id,
                    error = %error,
                    "Service call failed, connection unbound"
                );
            }
        }
        error
    }

    async fn request(&mut self, message: MessageType) -> Result<DaemonMessage> {
        let Some(binding) = self.binding.as_mut() else {
            return Err(ClientError::NotBound);
        };

        let result = binding
            .exchange(&ClientMessage::new(message), &mut self.events)
            .await;
        result.map_err(|e| self.fail(e))
    }

    /// Sends a request and extracts the expected reply variant.
    async fn call<T>(
        &mut self,
        message: MessageType,
        extract: impl FnOnce(DaemonMessage) -> std::result::Result<T, DaemonMessage>,
    ) -> Result<T> {
        let reply = self.request(message).await?;
        extract(reply).map_err(|other| {
            self.fail(ClientError::Protocol(format!("unexpected reply: {other:?}")))
        })
    }

    async fn ack(&mut self, message: MessageType) -> Result<()> {
        self.call(message, |reply| match reply {
            DaemonMessage::Ack => Ok(()),
            other => Err(other),
        })
        .await
    }

    async fn color(&mut self, message: MessageType) -> Result<Color> {
        self.call(message, |reply| match reply {
            DaemonMessage::Color { color } => Ok(color),
            other => Err(other),
        })
        .await
    }

    // ------------------------------------------------------------------------
    // Remote operations
    // ------------------------------------------------------------------------

    pub async fn create(&mut self) -> Result<()> {
        self.ack(MessageType::Create).await
    }

    pub async fn destroy(&mut self) -> Result<()> {
        self.ack(MessageType::Destroy).await
    }

    pub async fn show(&mut self) -> Result<()> {
        self.ack(MessageType::Show).await
    }

    pub async fn hide(&mut self) -> Result<()> {
        self.ack(MessageType::Hide).await
    }

    pub async fn toggle(&mut self) -> Result<()> {
        self.ack(MessageType::Toggle).await
    }

    /// Drops the indicators for the configured duration.
    pub async fn drop_indicators(&mut self) -> Result<()> {
        self.ack(MessageType::Drop).await
    }

    pub async fn is_dropped(&mut self) -> Result<bool> {
        self.call(MessageType::IsDropped, |reply| match reply {
            DaemonMessage::Dropped { dropped } => Ok(dropped),
            other => Err(other),
        })
        .await
    }

    pub async fn disable_expand(&mut self) -> Result<()> {
        self.ack(MessageType::DisableExpand).await
    }

    pub async fn enable_expand(&mut self) -> Result<()> {
        self.ack(MessageType::EnableExpand).await
    }

    pub async fn icon_color(&mut self) -> Result<Color> {
        self.color(MessageType::GetIconColor).await
    }

    pub async fn background_color(&mut self) -> Result<Color> {
        self.color(MessageType::GetBackgroundColor).await
    }

    /// Bar height in pixels, 0 while no overlay is attached.
    pub async fn height(&mut self) -> Result<u32> {
        self.call(MessageType::GetHeight, |reply| match reply {
            DaemonMessage::Height { height } => Ok(height),
            other => Err(other),
        })
        .await
    }

    pub async fn make_background_transparent(&mut self) -> Result<()> {
        self.ack(MessageType::MakeBackgroundTransparent).await
    }

    pub async fn restore_background_color(&mut self) -> Result<()> {
        self.ack(MessageType::RestoreBackgroundColor).await
    }

    pub async fn status(&mut self) -> Result<ServiceStatus> {
        self.call(MessageType::Status, |reply| match reply {
            DaemonMessage::Status { status } => Ok(*status),
            other => Err(other),
        })
        .await
    }

    /// Delivers a platform broadcast to the service's listeners.
    pub async fn deliver(&mut self, broadcast: Broadcast) -> Result<()> {
        self.ack(MessageType::Broadcast { broadcast }).await
    }

    /// Round-trips a ping, checking the echoed sequence number.
    pub async fn ping(&mut self) -> Result<u64> {
        self.next_seq = self.next_seq.wrapping_add(1);
        let expected = self.next_seq;

        self.call(MessageType::Ping { seq: expected }, |reply| match reply {
            DaemonMessage::Pong { seq } if seq == expected => Ok(seq),
            other => Err(other),
        })
        .await
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    /// Registers for lifecycle and foreground-app events.
    ///
    /// The current lifecycle signal, if any, is the first event delivered.
    pub async fn subscribe(&mut self) -> Result<()> {
        self.ack(MessageType::Subscribe).await
    }

    pub async fn unsubscribe(&mut self) -> Result<()> {
        self.ack(MessageType::Unsubscribe).await
    }

    /// Waits for the next pushed event.
    ///
    /// Events queued while waiting on a reply come out first.
    pub async fn next_event(&mut self) -> Result<DaemonMessage> {
        if let Some(event) = self.events.pop_front() {
            return Ok(event);
        }

        let Some(binding) = self.binding.as_mut() else {
            return Err(ClientError::NotBound);
        };

        loop {
            match binding.recv().await {
                Ok(message) if message.is_event() => return Ok(message),
                Ok(other) => {
                    debug!(message = ?other, "Skipping non-event message");
                }
                Err(e) => return Err(self.fail(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_calls_require_binding() {
        let mut conn = ServiceConnection::new("/nonexistent/sbar.sock");

        assert!(!conn.is_bound());
        assert!(matches!(conn.toggle().await, Err(ClientError::NotBound)));
        assert!(matches!(conn.height().await, Err(ClientError::NotBound)));
        assert!(matches!(conn.next_event().await, Err(ClientError::NotBound)));
    }

    #[tokio::test]
    async fn test_bind_to_missing_socket() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = ServiceConnection::new(dir.path().join("missing.sock"));

        let err = conn.bind().await.unwrap_err();
        assert!(matches!(err, ClientError::Connect { .. }));
        assert!(!conn.is_bound());
        assert!(conn.client_id().is_none());
    }

    #[tokio::test]
    async fn test_unbind_when_unbound_is_noop() {
        let mut conn = ServiceConnection::new("/nonexistent/sbar.sock");
        conn.unbind().await;
        assert!(!conn.is_bound());
    }

    #[test]
    fn test_with_client_id() {
        let conn = ServiceConnection::new("/tmp/sbar.sock").with_client_id("front-end");
        assert_eq!(conn.requested_id.as_deref(), Some("front-end"));
        assert_eq!(conn.socket_path(), Path::new("/tmp/sbar.sock"));
    }
}
