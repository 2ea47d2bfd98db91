//! Service Core using the actor pattern.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  ServiceCommand  ┌──────────────┐  attach/detach  ┌────────────┐
//! │ServiceHandle │─────────────────▶│ ServiceActor │────────────────▶│ Compositor │
//! └──────────────┘   (mpsc)         └──────────────┘                 └────────────┘
//!        ▲                            │    │    │
//!        │ watch / broadcast          │    │    └── CompatShim (enter/exit privileged)
//!        │                            │    └─────── listeners (screen, presence)
//!  lifecycle + foreground events ◀────┴──────────── foreground monitor task
//! ```
//!
//! The actor processes commands sequentially, so at most one lifecycle
//! transition is in flight at any time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};

use sbar_core::Notice;

mod actor;
mod commands;
mod handle;

pub use actor::ServiceActor;
pub use commands::{OverlayMutation, ServiceCommand, ServiceError};
pub use handle::ServiceHandle;

use crate::compat::CapabilityProbe;
use crate::config::DaemonConfig;
use crate::lifecycle::StickyBroadcaster;
use crate::monitor::{AppSource, CommandAppSource, FOREGROUND_CHANNEL_CAPACITY};
use crate::notice::Notifier;
use crate::oom::OomScoreProbe;
use crate::overlay::{Compositor, Density, HeadlessCompositor};
use crate::prefs::{PreferencesSource, TomlPreferences};
use crate::process::ProcessState;

const COMMAND_BUFFER: usize = 32;

/// Collaborators and settings the service is built from.
pub struct ServiceContext {
    pub preferences: Arc<dyn PreferencesSource>,
    pub compositor: Arc<dyn Compositor>,
    pub probe: Arc<dyn CapabilityProbe>,
    pub notifier: Arc<dyn Notifier>,
    /// `None` leaves the foreground monitor idle
    pub app_source: Option<Arc<dyn AppSource>>,
    pub density: Density,
    pub window_title: String,
    pub notice: Notice,
    pub poll_interval: Duration,
}

impl ServiceContext {
    /// Production collaborators for the daemon.
    pub fn from_config(config: &DaemonConfig, notifier: Arc<dyn Notifier>) -> Self {
        let app_source = config
            .foreground
            .command
            .as_ref()
            .map(|cmd| Arc::new(CommandAppSource::new(cmd.clone())) as Arc<dyn AppSource>);

        Self {
            preferences: Arc::new(TomlPreferences::new(config.preferences_path.clone())),
            compositor: Arc::new(HeadlessCompositor::new()),
            probe: Arc::new(OomScoreProbe::for_current_process(
                config.privilege.score,
                notifier.clone(),
            )),
            notifier,
            app_source,
            density: config.density,
            window_title: config.window_title.clone(),
            notice: config.notice.to_notice(),
            poll_interval: config.foreground.poll_interval(),
        }
    }
}

/// Spawns the service actor with fresh process-scoped state.
pub fn spawn_service(ctx: ServiceContext) -> ServiceHandle {
    spawn_service_with_state(ctx, Arc::new(ProcessState::new()))
}

/// Spawns the service actor sharing existing process-scoped state.
pub fn spawn_service_with_state(ctx: ServiceContext, process: Arc<ProcessState>) -> ServiceHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (foreground_tx, _) = broadcast::channel(FOREGROUND_CHANNEL_CAPACITY);
    let lifecycle = Arc::new(StickyBroadcaster::new());

    let actor = ServiceActor::new(
        cmd_rx,
        ctx,
        process,
        lifecycle.clone(),
        foreground_tx.clone(),
    );
    tokio::spawn(actor.run());

    ServiceHandle::new(cmd_tx, lifecycle, foreground_tx)
}
