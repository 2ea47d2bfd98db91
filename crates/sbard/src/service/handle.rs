//! Client interface for interacting with the service actor.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`
//! - Channel errors are mapped to `ServiceError::ChannelClosed`

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};

use sbar_core::{Broadcast, Color, LifecycleSignal, ServiceState};
use sbar_protocol::ServiceStatus;

use super::commands::{OverlayMutation, ServiceCommand, ServiceError};
use crate::lifecycle::StickyBroadcaster;
use crate::monitor::ForegroundEvent;

/// Cheap-to-clone handle to the service actor.
#[derive(Clone)]
pub struct ServiceHandle {
    sender: mpsc::Sender<ServiceCommand>,
    lifecycle: Arc<StickyBroadcaster>,
    foreground: broadcast::Sender<ForegroundEvent>,
}

impl ServiceHandle {
    pub fn new(
        sender: mpsc::Sender<ServiceCommand>,
        lifecycle: Arc<StickyBroadcaster>,
        foreground: broadcast::Sender<ForegroundEvent>,
    ) -> Self {
        Self {
            sender,
            lifecycle,
            foreground,
        }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> ServiceCommand,
    ) -> Result<T, ServiceError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(make(tx))
            .await
            .map_err(|_| ServiceError::ChannelClosed)?;

        rx.await.map_err(|_| ServiceError::ChannelClosed)
    }

    async fn mutate(&self, mutation: OverlayMutation) -> Result<(), ServiceError> {
        self.request(|respond_to| ServiceCommand::Mutate {
            mutation,
            respond_to,
        })
        .await
    }

    /// Creates the overlay. Returns the resulting state.
    ///
    /// # Errors
    ///
    /// - `ServiceError::Preferences` if the preferences cannot be read
    /// - `ServiceError::Attach` if the compositor rejects the surface
    /// - `ServiceError::ChannelClosed` if the actor has shut down
    pub async fn create(&self) -> Result<ServiceState, ServiceError> {
        self.request(|respond_to| ServiceCommand::Create { respond_to })
            .await?
    }

    /// Destroys the overlay. Returns the resulting state.
    pub async fn destroy(&self) -> Result<ServiceState, ServiceError> {
        self.request(|respond_to| ServiceCommand::Destroy { respond_to })
            .await
    }

    pub async fn show(&self) -> Result<(), ServiceError> {
        self.mutate(OverlayMutation::Show).await
    }

    pub async fn hide(&self) -> Result<(), ServiceError> {
        self.mutate(OverlayMutation::Hide).await
    }

    pub async fn toggle(&self) -> Result<(), ServiceError> {
        self.mutate(OverlayMutation::Toggle).await
    }

    /// Drops the indicators if click-to-drop is allowed.
    pub async fn drop_indicators(&self) -> Result<(), ServiceError> {
        self.mutate(OverlayMutation::Drop).await
    }

    pub async fn is_dropped(&self) -> Result<bool, ServiceError> {
        self.request(|respond_to| ServiceCommand::IsDropped { respond_to })
            .await
    }

    pub async fn disable_expand(&self) -> Result<(), ServiceError> {
        self.mutate(OverlayMutation::DisableExpand).await
    }

    pub async fn enable_expand(&self) -> Result<(), ServiceError> {
        self.mutate(OverlayMutation::EnableExpand).await
    }

    pub async fn icon_color(&self) -> Result<Color, ServiceError> {
        self.request(|respond_to| ServiceCommand::IconColor { respond_to })
            .await
    }

    pub async fn background_color(&self) -> Result<Color, ServiceError> {
        self.request(|respond_to| ServiceCommand::BackgroundColor { respond_to })
            .await
    }

    pub async fn height(&self) -> Result<u32, ServiceError> {
        self.request(|respond_to| ServiceCommand::Height { respond_to })
            .await
    }

    pub async fn make_background_transparent(&self) -> Result<(), ServiceError> {
        self.mutate(OverlayMutation::MakeBackgroundTransparent)
            .await
    }

    pub async fn restore_background_color(&self) -> Result<(), ServiceError> {
        self.mutate(OverlayMutation::RestoreBackgroundColor).await
    }

    /// Delivers a broadcast to the registered listeners.
    ///
    /// Returns whether a registered listener handled it.
    pub async fn deliver(&self, broadcast: Broadcast) -> Result<bool, ServiceError> {
        self.request(|respond_to| ServiceCommand::Deliver {
            broadcast,
            respond_to,
        })
        .await
    }

    pub async fn status(&self) -> Result<ServiceStatus, ServiceError> {
        self.request(|respond_to| ServiceCommand::Status { respond_to })
            .await
    }

    /// Subscribes to the sticky lifecycle signal.
    pub fn subscribe_lifecycle(&self) -> watch::Receiver<Option<LifecycleSignal>> {
        self.lifecycle.subscribe()
    }

    /// Subscribes to foreground-application changes.
    pub fn subscribe_foreground(&self) -> broadcast::Receiver<ForegroundEvent> {
        self.foreground.subscribe()
    }
}
