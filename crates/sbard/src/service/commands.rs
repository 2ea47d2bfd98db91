//! Service actor commands and errors.

use thiserror::Error;
use tokio::sync::oneshot;

use sbar_core::{Broadcast, Color, ServiceState};
use sbar_protocol::ServiceStatus;

use crate::overlay::CompositorError;
use crate::prefs::PreferencesError;

// ============================================================================
// Service Commands
// ============================================================================

/// Overlay mutations exposed through the remote interface.
///
/// Each is a no-op when no overlay is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayMutation {
    Show,
    Hide,
    /// Hide if visible, otherwise show
    Toggle,
    Drop,
    DisableExpand,
    EnableExpand,
    MakeBackgroundTransparent,
    RestoreBackgroundColor,
}

/// Commands sent to the service actor.
#[derive(Debug)]
pub enum ServiceCommand {
    /// Run the create sequence. No-op when already created.
    Create {
        respond_to: oneshot::Sender<Result<ServiceState, ServiceError>>,
    },

    /// Run the destroy sequence. No-op unless created.
    Destroy {
        respond_to: oneshot::Sender<ServiceState>,
    },

    /// Mutate the attached overlay.
    Mutate {
        mutation: OverlayMutation,
        respond_to: oneshot::Sender<()>,
    },

    /// False without an overlay.
    IsDropped { respond_to: oneshot::Sender<bool> },

    /// Transparent without an overlay.
    IconColor { respond_to: oneshot::Sender<Color> },

    /// Transparent without an overlay.
    BackgroundColor { respond_to: oneshot::Sender<Color> },

    /// Zero without an overlay.
    Height { respond_to: oneshot::Sender<u32> },

    /// Deliver a system or lock-screen broadcast to the listeners.
    ///
    /// Replies whether a registered listener handled it.
    Deliver {
        broadcast: Broadcast,
        respond_to: oneshot::Sender<bool>,
    },

    /// Snapshot of the service state.
    Status {
        respond_to: oneshot::Sender<ServiceStatus>,
    },
}

// ============================================================================
// Service Errors
// ============================================================================

/// Errors from service operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Preferences unavailable: {0}")]
    Preferences(#[from] PreferencesError),

    #[error("Overlay could not be attached: {0}")]
    Attach(#[from] CompositorError),

    #[error("Service actor channel closed")]
    ChannelClosed,
}
