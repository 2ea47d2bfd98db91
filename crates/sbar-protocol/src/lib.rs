//! sbar Protocol - Wire protocol for the remote control interface
//!
//! Newline-delimited JSON messages exchanged between the service daemon
//! and any bound client (configuration front-end, control CLI, platform
//! signal bridges).

pub mod message;
pub mod version;

pub use message::{ClientMessage, DaemonMessage, MessageType, ServiceStatus};
pub use version::{ProtocolVersion, VersionError};
