//! Protocol message types for the remote control interface.

use crate::version::ProtocolVersion;
use sbar_core::{Broadcast, Color, LifecycleSignal, Notice, ServiceState};
use serde::{Deserialize, Serialize};

/// Requests a client can send to the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageType {
    /// Client handshake/connection request
    Connect {
        /// Client identifier (optional)
        #[serde(skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
    },

    /// Create the overlay (idempotent)
    Create,

    /// Tear the overlay down (idempotent)
    Destroy,

    /// Make the bar visible
    Show,

    /// Make the bar invisible
    Hide,

    /// Show if hidden, hide if visible
    Toggle,

    /// Drop the indicators
    Drop,

    /// Query whether the indicators are dropped
    IsDropped,

    /// Disallow the expand gesture
    DisableExpand,

    /// Allow the expand gesture
    EnableExpand,

    /// Query the configured icon color
    GetIconColor,

    /// Query the current background color
    GetBackgroundColor,

    /// Query the bar height in pixels
    GetHeight,

    /// Set the background to fully transparent
    MakeBackgroundTransparent,

    /// Restore the background to the preferred color
    RestoreBackgroundColor,

    /// Request a full service status report
    Status,

    /// Deliver a platform broadcast (screen / lock signals)
    Broadcast { broadcast: Broadcast },

    /// Subscribe to lifecycle and foreground-app events
    Subscribe,

    /// Unsubscribe from events
    Unsubscribe,

    /// Ping to check connection
    Ping {
        /// Sequence number for matching pong response
        seq: u64,
    },

    /// Client disconnecting gracefully
    Disconnect,
}

/// Messages sent from client to service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientMessage {
    /// Protocol version
    pub protocol_version: ProtocolVersion,

    /// Message payload
    #[serde(flatten)]
    pub message: MessageType,
}

impl ClientMessage {
    /// Creates a new client message with current protocol version.
    pub fn new(message: MessageType) -> Self {
        Self {
            protocol_version: ProtocolVersion::CURRENT,
            message,
        }
    }

    /// Creates a connect message.
    pub fn connect(client_id: Option<String>) -> Self {
        Self::new(MessageType::Connect { client_id })
    }

    /// Creates a broadcast delivery message.
    pub fn broadcast(broadcast: Broadcast) -> Self {
        Self::new(MessageType::Broadcast { broadcast })
    }

    /// Creates a ping message.
    pub fn ping(seq: u64) -> Self {
        Self::new(MessageType::Ping { seq })
    }

    /// Creates a disconnect message.
    pub fn disconnect() -> Self {
        Self::new(MessageType::Disconnect)
    }
}

/// Snapshot of the service for status queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub state: ServiceState,
    pub overlay_attached: bool,
    pub visible: bool,
    pub expand_enabled: bool,
    pub dropped: bool,
    pub screen_on: bool,
    pub expand_eligible: bool,
    pub monitor_running: bool,
    pub screen_listener: bool,
    pub lock_listener: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
}

/// Messages sent from the service to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DaemonMessage {
    /// Connection accepted
    Connected {
        /// Service's protocol version
        protocol_version: ProtocolVersion,
        /// Assigned client ID
        client_id: String,
    },

    /// Connection rejected (version mismatch, etc.)
    Rejected {
        /// Reason for rejection
        reason: String,
        /// Service's protocol version (for client to upgrade)
        protocol_version: ProtocolVersion,
    },

    /// Request without a result completed
    Ack,

    /// Answer to `is_dropped`
    Dropped { dropped: bool },

    /// Answer to a color query
    Color { color: Color },

    /// Answer to `get_height`
    Height { height: u32 },

    /// Answer to `status`
    Status { status: Box<ServiceStatus> },

    /// Sticky lifecycle signal (pushed to subscribers)
    Lifecycle { signal: LifecycleSignal },

    /// Foreground application changed (pushed to subscribers)
    ForegroundChanged { app: String },

    /// Pong response to ping
    Pong {
        /// Sequence number from ping
        seq: u64,
    },

    /// Error response
    Error {
        /// Error message
        message: String,
    },
}

impl DaemonMessage {
    /// Creates a connected response.
    pub fn connected(client_id: String) -> Self {
        Self::Connected {
            protocol_version: ProtocolVersion::CURRENT,
            client_id,
        }
    }

    /// Creates a rejected response.
    pub fn rejected(reason: &str) -> Self {
        Self::Rejected {
            reason: reason.to_string(),
            protocol_version: ProtocolVersion::CURRENT,
        }
    }

    /// Creates a status response.
    pub fn status(status: ServiceStatus) -> Self {
        Self::Status {
            status: Box::new(status),
        }
    }

    /// Creates a pong response.
    pub fn pong(seq: u64) -> Self {
        Self::Pong { seq }
    }

    /// Creates an error response.
    pub fn error(message: &str) -> Self {
        Self::Error {
            message: message.to_string(),
        }
    }

    /// Returns true for messages pushed to subscribers rather than sent
    /// in reply to a request.
    pub fn is_event(&self) -> bool {
        matches!(
            self,
            DaemonMessage::Lifecycle { .. } | DaemonMessage::ForegroundChanged { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_serialization() {
        let msg = ClientMessage::new(MessageType::Toggle);
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"toggle\""));
        assert!(json.contains("\"protocol_version\""));
    }

    #[test]
    fn test_broadcast_message_shape() {
        let msg = ClientMessage::broadcast(
            Broadcast::new("com.nanoha.UNLOCKED").with_bool("isActive", true),
        );
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "broadcast");
        assert_eq!(json["broadcast"]["action"], "com.nanoha.UNLOCKED");
        assert_eq!(json["broadcast"]["extras"]["isActive"], true);

        let parsed: ClientMessage = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_parse_request_from_raw_json() {
        let raw = r#"{"protocol_version":{"major":1,"minor":0},"type":"make_background_transparent"}"#;
        let parsed: ClientMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.message, MessageType::MakeBackgroundTransparent);
    }

    #[test]
    fn test_daemon_color_serialization() {
        let msg = DaemonMessage::Color {
            color: Color::TRANSPARENT,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"color\""));
        assert!(json.contains("\"#00000000\""));
    }

    #[test]
    fn test_event_classification() {
        assert!(DaemonMessage::Lifecycle {
            signal: LifecycleSignal::Enabled
        }
        .is_event());
        assert!(!DaemonMessage::Ack.is_event());
        assert!(!DaemonMessage::pong(1).is_event());
    }
}
