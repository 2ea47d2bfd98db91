//! Connection handler for individual client connections.
//!
//! Each client connection gets its own `ConnectionHandler` that:
//! - Performs protocol version negotiation
//! - Parses incoming requests
//! - Routes them to the service actor
//! - Registers the client for event pushes on `subscribe`
//!
//! A client vanishing mid-request only ends its own connection; the
//! service state is untouched.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Connection errors are logged and result in graceful disconnect

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use sbar_protocol::{ClientMessage, DaemonMessage, MessageType, ProtocolVersion, VersionError};

use crate::service::{ServiceError, ServiceHandle};

/// Writer shared between the connection and the event pusher
pub type SubscriberWriter = Arc<Mutex<BufWriter<OwnedWriteHalf>>>;

/// Subscribed clients keyed by client id
pub type SubscribersMap = Arc<RwLock<HashMap<String, SubscriberWriter>>>;

/// Maximum number of concurrent subscribers
pub const MAX_SUBSCRIBERS: usize = 16;

/// Maximum message size (64 KB)
const MAX_MESSAGE_SIZE: usize = 65_536;

/// Read timeout for idle connections (5 minutes)
const READ_TIMEOUT: Duration = Duration::from_secs(300);

/// Write timeout (10 seconds)
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

type ClientId = String;

/// Connection handler for a single client.
pub struct ConnectionHandler {
    reader: BufReader<OwnedReadHalf>,
    writer: SubscriberWriter,
    service: ServiceHandle,
    subscribers: SubscribersMap,
    client_id: Option<ClientId>,
    connection_number: u64,
}

impl ConnectionHandler {
    pub fn new(
        reader: OwnedReadHalf,
        writer: OwnedWriteHalf,
        service: ServiceHandle,
        subscribers: SubscribersMap,
        connection_number: u64,
    ) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer: Arc::new(Mutex::new(BufWriter::new(writer))),
            service,
            subscribers,
            client_id: None,
            connection_number,
        }
    }

    /// Performs the handshake, then serves requests until the connection
    /// closes. Returns the client id if the handshake succeeded.
    pub async fn run(mut self) -> Option<ClientId> {
        debug!(connection = self.connection_number, "New client connected");

        if let Err(e) = self.handle_handshake().await {
            warn!(
                connection = self.connection_number,
                error = %e,
                "Handshake failed"
            );
            return None;
        }
        info!(client_id = ?self.client_id, "Client bound");

        let client_id = self.client_id.clone();

        if let Err(e) = self.process_messages().await {
            debug!(client_id = ?self.client_id, error = %e, "Connection closed");
        }

        info!(client_id = ?self.client_id, "Client unbound");
        client_id
    }

    async fn handle_handshake(&mut self) -> Result<(), ConnectionError> {
        let msg = self.read_message().await?;

        if let Err(e) = ProtocolVersion::CURRENT.negotiate(&msg.protocol_version) {
            warn!(error = %e, "Protocol version mismatch");
            self.send_message(DaemonMessage::rejected(&e.to_string())).await?;
            return Err(e.into());
        }

        match msg.message {
            MessageType::Connect { client_id } => {
                let assigned_id =
                    client_id.unwrap_or_else(|| format!("client-{}", self.connection_number));
                self.client_id = Some(assigned_id.clone());
                self.send_message(DaemonMessage::connected(assigned_id))
                    .await
            }
            other => {
                self.send_message(DaemonMessage::error(
                    "Expected Connect message for handshake",
                ))
                .await?;
                Err(ConnectionError::UnexpectedMessage(format!("{other:?}")))
            }
        }
    }

    async fn process_messages(&mut self) -> Result<(), ConnectionError> {
        loop {
            let msg = match timeout(READ_TIMEOUT, self.read_message()).await {
                Ok(Ok(msg)) => msg,
                Ok(Err(ConnectionError::Eof)) => {
                    debug!(client_id = ?self.client_id, "Client sent EOF");
                    return Ok(());
                }
                Ok(Err(ConnectionError::ParseError(e))) => {
                    // Malformed request; the stream itself is still usable.
                    let _ = self
                        .send_message(DaemonMessage::error(&format!("Parse error: {e}")))
                        .await;
                    continue;
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    debug!(client_id = ?self.client_id, "Connection timed out");
                    return Err(ConnectionError::Timeout);
                }
            };

            match self.handle_message(msg).await {
                Ok(()) => {}
                Err(ConnectionError::Eof) => return Ok(()),
                Err(ConnectionError::Service(e)) => {
                    error!(client_id = ?self.client_id, error = %e, "Request failed");
                    self.send_message(DaemonMessage::error(&e)).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn handle_message(&mut self, msg: ClientMessage) -> Result<(), ConnectionError> {
        let reply = match msg.message {
            MessageType::Connect { .. } => DaemonMessage::error("Already connected"),

            MessageType::Create => {
                self.service.create().await?;
                DaemonMessage::Ack
            }
            MessageType::Destroy => {
                self.service.destroy().await?;
                DaemonMessage::Ack
            }
            MessageType::Show => {
                self.service.show().await?;
                DaemonMessage::Ack
            }
            MessageType::Hide => {
                self.service.hide().await?;
                DaemonMessage::Ack
            }
            MessageType::Toggle => {
                self.service.toggle().await?;
                DaemonMessage::Ack
            }
            MessageType::Drop => {
                self.service.drop_indicators().await?;
                DaemonMessage::Ack
            }
            MessageType::IsDropped => DaemonMessage::Dropped {
                dropped: self.service.is_dropped().await?,
            },
            MessageType::DisableExpand => {
                self.service.disable_expand().await?;
                DaemonMessage::Ack
            }
            MessageType::EnableExpand => {
                self.service.enable_expand().await?;
                DaemonMessage::Ack
            }
            MessageType::GetIconColor => DaemonMessage::Color {
                color: self.service.icon_color().await?,
            },
            MessageType::GetBackgroundColor => DaemonMessage::Color {
                color: self.service.background_color().await?,
            },
            MessageType::GetHeight => DaemonMessage::Height {
                height: self.service.height().await?,
            },
            MessageType::MakeBackgroundTransparent => {
                self.service.make_background_transparent().await?;
                DaemonMessage::Ack
            }
            MessageType::RestoreBackgroundColor => {
                self.service.restore_background_color().await?;
                DaemonMessage::Ack
            }
            MessageType::Status => DaemonMessage::status(self.service.status().await?),
            MessageType::Broadcast { broadcast } => {
                let handled = self.service.deliver(broadcast).await?;
                debug!(client_id = ?self.client_id, handled, "Broadcast delivered");
                DaemonMessage::Ack
            }
            MessageType::Subscribe => return self.handle_subscribe().await,
            MessageType::Unsubscribe => {
                if let Some(ref client_id) = self.client_id {
                    self.subscribers.write().await.remove(client_id);
                }
                debug!(client_id = ?self.client_id, "Client unsubscribed");
                DaemonMessage::Ack
            }
            MessageType::Ping { seq } => DaemonMessage::pong(seq),
            MessageType::Disconnect => {
                debug!(client_id = ?self.client_id, "Client requested disconnect");
                return Err(ConnectionError::Eof);
            }
        };

        self.send_message(reply).await
    }

    async fn handle_subscribe(&mut self) -> Result<(), ConnectionError> {
        let Some(client_id) = self.client_id.clone() else {
            return self
                .send_message(DaemonMessage::error("Must connect before subscribing"))
                .await;
        };

        // Pushes wait on the map lock, so the snapshot and the registration
        // are seen by the pusher as a single step.
        let mut subs = self.subscribers.write().await;
        if subs.len() >= MAX_SUBSCRIBERS && !subs.contains_key(&client_id) {
            drop(subs);
            return self
                .send_message(DaemonMessage::error(&format!(
                    "Too many subscribers (max: {MAX_SUBSCRIBERS})"
                )))
                .await;
        }

        self.send_message(DaemonMessage::Ack).await?;

        // Sticky: the current lifecycle signal goes out before any push.
        let current = *self.service.subscribe_lifecycle().borrow();
        if let Some(signal) = current {
            self.send_message(DaemonMessage::Lifecycle { signal }).await?;
        }

        subs.insert(client_id.clone(), Arc::clone(&self.writer));
        drop(subs);
        debug!(client_id = %client_id, "Client subscribed");
        Ok(())
    }

    async fn read_message(&mut self) -> Result<ClientMessage, ConnectionError> {
        let mut line = String::new();

        let bytes_read = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(|e| ConnectionError::Io(e.to_string()))?;

        if bytes_read == 0 {
            return Err(ConnectionError::Eof);
        }

        if line.len() > MAX_MESSAGE_SIZE {
            return Err(ConnectionError::MessageTooLarge {
                size: line.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }

        let msg: ClientMessage = serde_json::from_str(&line)
            .map_err(|e| ConnectionError::ParseError(e.to_string()))?;

        debug!(
            client_id = ?self.client_id,
            message_type = ?std::mem::discriminant(&msg.message),
            "Received message"
        );

        Ok(msg)
    }

    async fn send_message(&self, msg: DaemonMessage) -> Result<(), ConnectionError> {
        write_message(&self.writer, &msg).await
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }
}

/// Writes one NDJSON line to a client.
pub async fn write_message(
    writer: &SubscriberWriter,
    msg: &DaemonMessage,
) -> Result<(), ConnectionError> {
    let json =
        serde_json::to_string(msg).map_err(|e| ConnectionError::ParseError(e.to_string()))?;

    let mut writer = writer.lock().await;

    match timeout(WRITE_TIMEOUT, async {
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok::<(), std::io::Error>(())
    })
    .await
    {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ConnectionError::Io(e.to_string())),
        Err(_) => Err(ConnectionError::WriteTimeout),
    }
}

/// Errors that can occur during connection handling.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Version(#[from] VersionError),

    #[error("Unexpected message: {0}")]
    UnexpectedMessage(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Connection closed")]
    Eof,

    #[error("Read timeout")]
    Timeout,

    #[error("Write timeout")]
    WriteTimeout,

    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Service error: {0}")]
    Service(String),
}

impl From<ServiceError> for ConnectionError {
    fn from(e: ServiceError) -> Self {
        ConnectionError::Service(e.to_string())
    }
}
