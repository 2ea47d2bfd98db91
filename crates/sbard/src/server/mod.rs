//! Unix socket server exposing the Remote Control Interface.
//!
//! The server:
//! - Listens on a Unix socket for client connections
//! - Spawns a ConnectionHandler for each bound client
//! - Pushes lifecycle and foreground events to subscribers
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  ControlServer  │
//! │  UnixListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│  ServiceHandle  │
//! │   (per client)  │     └────────┬────────┘
//! └─────────────────┘              │ lifecycle (watch)
//!                                  │ foreground (broadcast)
//!                                  ▼
//!                         ┌─────────────────┐
//!                         │   subscribers   │
//!                         └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Server errors are logged and allow continued operation

mod connection;

pub use connection::{
    write_message, ConnectionError, ConnectionHandler, SubscriberWriter, SubscribersMap,
    MAX_SUBSCRIBERS,
};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::UnixListener;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use sbar_protocol::DaemonMessage;

use crate::service::ServiceHandle;

/// Unix socket server for the service.
///
/// Accepts remote control clients and pushes service events to the ones
/// that subscribed.
pub struct ControlServer {
    /// Path to the Unix socket
    socket_path: PathBuf,

    /// Handle to the service actor
    service: ServiceHandle,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Connection counter for generating client IDs
    connection_counter: AtomicU64,

    /// Active event subscribers (keyed by client_id)
    subscribers: SubscribersMap,
}

impl ControlServer {
    /// Creates a new control server.
    ///
    /// # Arguments
    ///
    /// * `socket_path` - Path where the Unix socket will be created
    /// * `service` - Handle to the service actor
    /// * `cancel_token` - Token for graceful shutdown
    pub fn new(
        socket_path: impl Into<PathBuf>,
        service: ServiceHandle,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            socket_path: socket_path.into(),
            service,
            cancel_token,
            connection_counter: AtomicU64::new(0),
            subscribers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Runs the server.
    ///
    /// Removes a stale socket file, binds, and accepts connections until
    /// the cancellation token is triggered. This method does not return
    /// until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| ServerError::SocketSetup {
                path: self.socket_path.clone(),
                error: e.to_string(),
            })?;
        }

        if let Some(parent) = self.socket_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| ServerError::SocketSetup {
                    path: self.socket_path.clone(),
                    error: e.to_string(),
                })?;
            }
        }

        let listener =
            UnixListener::bind(&self.socket_path).map_err(|e| ServerError::SocketSetup {
                path: self.socket_path.clone(),
                error: e.to_string(),
            })?;

        info!(socket = %self.socket_path.display(), "Control server listening");

        self.spawn_event_pusher();

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            let conn_num = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                            self.handle_connection(stream, conn_num);
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }

        self.cleanup().await;
        Ok(())
    }

    /// Handles a new client connection by spawning a handler task.
    fn handle_connection(&self, stream: tokio::net::UnixStream, connection_number: u64) {
        let (reader, writer) = stream.into_split();
        let service = self.service.clone();
        let subscribers = Arc::clone(&self.subscribers);

        tokio::spawn(async move {
            let handler = ConnectionHandler::new(
                reader,
                writer,
                service,
                Arc::clone(&subscribers),
                connection_number,
            );

            if let Some(id) = handler.run().await {
                if subscribers.write().await.remove(&id).is_some() {
                    debug!(client_id = %id, "Removed disconnected subscriber");
                }
            }
        });
    }

    /// Forwards lifecycle changes and foreground events to subscribers.
    fn spawn_event_pusher(&self) {
        let mut lifecycle_rx = self.service.subscribe_lifecycle();
        let mut foreground_rx = self.service.subscribe_foreground();
        let subscribers = Arc::clone(&self.subscribers);
        let cancel_token = self.cancel_token.clone();

        // Subscribers get the current value on subscribe.
        let _ = lifecycle_rx.borrow_and_update();

        tokio::spawn(async move {
            loop {
                let msg = tokio::select! {
                    _ = cancel_token.cancelled() => {
                        debug!("Event pusher shutting down");
                        break;
                    }

                    changed = lifecycle_rx.changed() => {
                        if changed.is_err() {
                            debug!("Lifecycle channel closed");
                            break;
                        }
                        let current = *lifecycle_rx.borrow_and_update();
                        match current {
                            Some(signal) => DaemonMessage::Lifecycle { signal },
                            None => continue,
                        }
                    }

                    result = foreground_rx.recv() => {
                        match result {
                            Ok(event) => DaemonMessage::ForegroundChanged { app: event.app },
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                warn!(skipped = n, "Event pusher lagged, skipped events");
                                continue;
                            }
                            Err(broadcast::error::RecvError::Closed) => {
                                debug!("Foreground channel closed");
                                break;
                            }
                        }
                    }
                };

                push_event(&subscribers, &msg).await;
            }
        });
    }

    /// Returns the number of active subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Drops all subscribers and removes the socket file.
    async fn cleanup(&self) {
        self.subscribers.write().await.clear();

        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(
                    socket = %self.socket_path.display(),
                    error = %e,
                    "Failed to remove socket file"
                );
            }
        }

        info!("Server cleanup complete");
    }
}

/// Sends an event to every subscriber, dropping the ones that fail.
async fn push_event(subscribers: &SubscribersMap, msg: &DaemonMessage) {
    let mut failed = Vec::new();

    {
        let subs = subscribers.read().await;
        for (client_id, writer) in subs.iter() {
            if let Err(e) = write_message(writer, msg).await {
                debug!(client_id = %client_id, error = %e, "Failed to push event");
                failed.push(client_id.clone());
            }
        }
    }

    if !failed.is_empty() {
        let mut subs = subscribers.write().await;
        for client_id in failed {
            subs.remove(&client_id);
            debug!(client_id = %client_id, "Removed failed subscriber");
        }
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to setup socket at {path}: {error}")]
    SocketSetup { path: PathBuf, error: String },

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
}
