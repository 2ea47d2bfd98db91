//! sbar Core - Shared types for the overlay status bar service
//!
//! This crate provides the domain types shared between
//! the daemon (sbard), the wire protocol, and remote clients.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod color;
pub mod error;
pub mod indicator;
pub mod notice;
pub mod prefs;
pub mod signal;
pub mod state;

// Re-exports for convenience
pub use color::Color;
pub use error::{DomainError, DomainResult};
pub use indicator::IndicatorId;
pub use notice::{Notice, NoticeAction, NoticeId};
pub use prefs::PreferencesSnapshot;
pub use signal::{Broadcast, PresenceSignal, ScreenSignal};
pub use state::{LifecycleSignal, ServiceState};
