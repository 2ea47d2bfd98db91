//! Service actor - owns the overlay lifecycle and processes commands.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Reply send failures are ignored (the caller went away)
//! - Failures of collaborators degrade to "overlay unavailable"

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use sbar_core::{
    Broadcast, Color, LifecycleSignal, NoticeId, PreferencesSnapshot, ServiceState,
};
use sbar_protocol::ServiceStatus;

use super::commands::{OverlayMutation, ServiceCommand, ServiceError};
use super::ServiceContext;
use crate::compat::CompatShim;
use crate::lifecycle::StickyBroadcaster;
use crate::monitor::{spawn_foreground_monitor, ForegroundEvent, MonitorHandle};
use crate::overlay::OverlayWindowManager;
use crate::process::ProcessState;
use crate::signals::{ListenerSignal, LockPresenceListener, ScreenStateListener};

/// The service actor.
///
/// Owns the state machine, the overlay, the current preferences
/// snapshot, the listeners and the foreground monitor. Commands are
/// processed one at a time, which serializes every lifecycle
/// transition.
pub struct ServiceActor {
    receiver: mpsc::Receiver<ServiceCommand>,
    ctx: ServiceContext,

    /// Cached capability slots, kept across lifecycles
    shim: CompatShim,
    process: Arc<ProcessState>,
    lifecycle: Arc<StickyBroadcaster>,
    foreground: broadcast::Sender<ForegroundEvent>,

    state: ServiceState,
    overlay: OverlayWindowManager,
    prefs: Option<PreferencesSnapshot>,
    monitor: Option<MonitorHandle>,
    screen_listener: Option<ScreenStateListener>,
    lock_listener: Option<LockPresenceListener>,
}

impl ServiceActor {
    pub fn new(
        receiver: mpsc::Receiver<ServiceCommand>,
        ctx: ServiceContext,
        process: Arc<ProcessState>,
        lifecycle: Arc<StickyBroadcaster>,
        foreground: broadcast::Sender<ForegroundEvent>,
    ) -> Self {
        let shim = CompatShim::new(ctx.probe.clone(), ctx.notifier.clone());
        let overlay =
            OverlayWindowManager::new(ctx.compositor.clone(), ctx.density, ctx.window_title.clone());

        Self {
            receiver,
            ctx,
            shim,
            process,
            lifecycle,
            foreground,
            state: ServiceState::Uninitialized,
            overlay,
            prefs: None,
            monitor: None,
            screen_listener: None,
            lock_listener: None,
        }
    }

    /// Processes commands until every handle is dropped, then tears
    /// down whatever is still created.
    pub async fn run(mut self) {
        info!("Service actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        if self.state.is_created() {
            info!("Service actor stopping with overlay created, destroying");
            self.destroy();
        }
        info!(state = %self.state, "Service actor stopped");
    }

    fn handle_command(&mut self, cmd: ServiceCommand) {
        match cmd {
            ServiceCommand::Create { respond_to } => {
                let _ = respond_to.send(self.create());
            }
            ServiceCommand::Destroy { respond_to } => {
                let _ = respond_to.send(self.destroy());
            }
            ServiceCommand::Mutate {
                mutation,
                respond_to,
            } => {
                self.mutate(mutation);
                let _ = respond_to.send(());
            }
            ServiceCommand::IsDropped { respond_to } => {
                let dropped = self.overlay.handle().is_some_and(|h| h.is_dropped());
                let _ = respond_to.send(dropped);
            }
            ServiceCommand::IconColor { respond_to } => {
                let color = self
                    .overlay
                    .handle()
                    .map(|h| h.icon_color())
                    .unwrap_or(Color::TRANSPARENT);
                let _ = respond_to.send(color);
            }
            ServiceCommand::BackgroundColor { respond_to } => {
                let color = self
                    .overlay
                    .handle()
                    .map(|h| h.background_color())
                    .unwrap_or(Color::TRANSPARENT);
                let _ = respond_to.send(color);
            }
            ServiceCommand::Height { respond_to } => {
                let height = self.overlay.handle().map(|h| h.height()).unwrap_or(0);
                let _ = respond_to.send(height);
            }
            ServiceCommand::Deliver {
                broadcast,
                respond_to,
            } => {
                let _ = respond_to.send(self.deliver(&broadcast));
            }
            ServiceCommand::Status { respond_to } => {
                let _ = respond_to.send(self.status());
            }
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    fn create(&mut self) -> Result<ServiceState, ServiceError> {
        if self.state.is_created() {
            debug!("Create while already created, ignoring");
            return Ok(self.state);
        }
        if self.state == ServiceState::Destroyed {
            info!("Starting a fresh lifecycle after destroy");
        }

        // 1. Sticky "enabled"; withdraws "disabled"
        self.lifecycle.publish(LifecycleSignal::Enabled);

        // 2. Fresh preferences snapshot
        let prefs = match self.ctx.preferences.load() {
            Ok(prefs) => prefs,
            Err(e) => {
                warn!(error = %e, "Preferences unavailable, overlay not created");
                self.lifecycle.publish(LifecycleSignal::Disabled);
                return Err(e.into());
            }
        };

        // 3. Foreground monitor
        if prefs.wants_foreground_monitor() {
            self.monitor = Some(spawn_foreground_monitor(
                self.ctx.app_source.clone(),
                self.ctx.poll_interval,
                self.process.watch_screen(),
                self.foreground.clone(),
                CancellationToken::new(),
            ));
        }

        // 4. Screen-state listener
        if prefs.wants_screen_listener() {
            self.screen_listener = Some(ScreenStateListener);
        }

        // 5. Lock-presence listener
        if prefs.wants_lock_listener() {
            self.lock_listener = Some(LockPresenceListener);
        }

        // 6. Notice + privileged mode
        self.shim
            .enter_privileged(NoticeId::SERVICE, &self.ctx.notice.refreshed());

        // 7. Overlay
        let attached = self.overlay.attach(&prefs).map(|_| ());
        self.prefs = Some(prefs);
        self.state = ServiceState::Created;

        if let Err(e) = attached {
            warn!(error = %e, "Overlay attach failed, rolling back");
            self.destroy();
            return Err(e.into());
        }

        info!(
            monitor = self.monitor.is_some(),
            screen_listener = self.screen_listener.is_some(),
            lock_listener = self.lock_listener.is_some(),
            "Service created"
        );
        Ok(self.state)
    }

    fn destroy(&mut self) -> ServiceState {
        if !self.state.is_created() {
            debug!(state = %self.state, "Destroy while not created, ignoring");
            return self.state;
        }

        self.lifecycle.publish(LifecycleSignal::Disabled);

        // Detach before leaving privileged mode.
        self.overlay.detach();
        self.shim.exit_privileged(NoticeId::SERVICE);

        if let Some(monitor) = self.monitor.take() {
            monitor.stop();
        }
        self.screen_listener = None;
        self.lock_listener = None;
        self.prefs = None;
        self.state = ServiceState::Destroyed;

        info!("Service destroyed");
        self.state
    }

    // ========================================================================
    // Remote operations
    // ========================================================================

    fn mutate(&mut self, mutation: OverlayMutation) {
        let Some(handle) = self.overlay.handle_mut() else {
            debug!(?mutation, "No overlay attached, ignoring");
            return;
        };

        match mutation {
            OverlayMutation::Show => handle.set_visible(true),
            OverlayMutation::Hide => handle.set_visible(false),
            OverlayMutation::Toggle => {
                let visible = handle.is_visible();
                handle.set_visible(!visible);
            }
            OverlayMutation::Drop => {
                handle.drop_indicators();
            }
            OverlayMutation::DisableExpand => handle.set_expand(false),
            OverlayMutation::EnableExpand => handle.set_expand(true),
            OverlayMutation::MakeBackgroundTransparent => {
                handle.set_background_color(Color::TRANSPARENT)
            }
            OverlayMutation::RestoreBackgroundColor => handle.restore_background_color(),
        }
    }

    fn deliver(&mut self, broadcast: &Broadcast) -> bool {
        let Some(signal) = ListenerSignal::normalize(broadcast) else {
            debug!(action = %broadcast.action, "Unrecognized broadcast");
            return false;
        };

        match signal {
            ListenerSignal::Screen(screen) => match &self.screen_listener {
                Some(listener) => {
                    listener.on_signal(
                        screen,
                        self.overlay.handle_mut(),
                        self.prefs.as_ref(),
                        &self.process,
                    );
                    true
                }
                None => {
                    debug!(?screen, "Screen listener not registered");
                    false
                }
            },
            ListenerSignal::Presence(presence) => match &self.lock_listener {
                Some(listener) => {
                    listener.on_signal(
                        presence,
                        self.overlay.handle_mut(),
                        self.prefs.as_ref(),
                        &self.process,
                    );
                    true
                }
                None => {
                    debug!(?presence, "Lock listener not registered");
                    false
                }
            },
        }
    }

    fn status(&self) -> ServiceStatus {
        let handle = self.overlay.handle();

        ServiceStatus {
            state: self.state,
            overlay_attached: handle.is_some(),
            visible: handle.is_some_and(|h| h.is_visible()),
            expand_enabled: handle.is_some_and(|h| h.expand_enabled()),
            dropped: handle.is_some_and(|h| h.is_dropped()),
            screen_on: self.process.screen_on(),
            expand_eligible: self.process.expand_eligible(),
            monitor_running: self.monitor.as_ref().is_some_and(|m| m.is_running()),
            screen_listener: self.screen_listener.is_some(),
            lock_listener: self.lock_listener.is_some(),
            notice: self.ctx.notifier.current(NoticeId::SERVICE),
        }
    }
}
