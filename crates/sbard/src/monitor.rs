//! Foreground-application monitor.
//!
//! Polls an [`AppSource`] on a fixed interval and publishes a
//! [`ForegroundEvent`] whenever the foreground application changes.
//! While the screen is off the monitor stops polling and waits on the
//! screen watch channel. Stopping the monitor cancels its token and
//! never waits for the current poll to finish.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()` outside tests
//! - A failing source is logged and treated as "no change"

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::process::Command;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Capacity of the foreground event fan-out channel.
pub const FOREGROUND_CHANNEL_CAPACITY: usize = 64;

/// The foreground application changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForegroundEvent {
    pub app: String,
}

/// Reports the current foreground application.
#[async_trait]
pub trait AppSource: Send + Sync {
    /// Name of the foreground application, `None` if it cannot be told.
    async fn current_app(&self) -> Option<String>;
}

/// Runs a shell command printing the foreground PID and resolves the
/// process name.
pub struct CommandAppSource {
    command: String,
    system: Mutex<System>,
}

impl CommandAppSource {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            system: Mutex::new(System::new()),
        }
    }

    fn process_name(&self, pid: u32) -> Option<String> {
        let mut system = self.system.lock().ok()?;
        let pid = Pid::from_u32(pid);
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        system
            .process(pid)
            .map(|p| p.name().to_string_lossy().into_owned())
    }
}

#[async_trait]
impl AppSource for CommandAppSource {
    async fn current_app(&self) -> Option<String> {
        let output = match Command::new("sh").arg("-c").arg(&self.command).output().await {
            Ok(output) => output,
            Err(e) => {
                warn!(command = %self.command, error = %e, "Foreground command failed to run");
                return None;
            }
        };

        if !output.status.success() {
            debug!(command = %self.command, status = %output.status, "Foreground command failed");
            return None;
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let pid: u32 = match stdout.trim().parse() {
            Ok(pid) => pid,
            Err(_) => {
                debug!(output = %stdout.trim(), "Foreground command printed no PID");
                return None;
            }
        };

        self.process_name(pid)
    }
}

/// Handle to a running monitor task.
#[derive(Debug)]
pub struct MonitorHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Interrupts the monitor without waiting for it.
    pub fn stop(self) {
        self.cancel.cancel();
        debug!("Foreground monitor cancelled");
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Cancels and waits for the task. Only used where blocking is fine.
    pub async fn stop_and_wait(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

/// Spawns the monitor.
///
/// Without a source the task only logs a warning and idles until
/// cancelled.
pub fn spawn_foreground_monitor(
    source: Option<Arc<dyn AppSource>>,
    period: Duration,
    screen: watch::Receiver<bool>,
    events: broadcast::Sender<ForegroundEvent>,
    cancel: CancellationToken,
) -> MonitorHandle {
    let token = cancel.clone();
    let task = tokio::spawn(async move {
        match source {
            Some(source) => run_monitor(source, period, screen, events, token).await,
            None => {
                warn!("No foreground command configured, per-app filtering inactive");
                token.cancelled().await;
            }
        }
        debug!("Foreground monitor task completed");
    });

    MonitorHandle { cancel, task }
}

async fn run_monitor(
    source: Arc<dyn AppSource>,
    period: Duration,
    mut screen: watch::Receiver<bool>,
    events: broadcast::Sender<ForegroundEvent>,
    cancel: CancellationToken,
) {
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last: Option<String> = None;

    info!(interval_ms = period.as_millis() as u64, "Foreground monitor started");

    loop {
        if !*screen.borrow_and_update() {
            debug!("Screen off, foreground monitor sleeping");
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                woke = screen.wait_for(|on| *on) => {
                    if woke.is_err() {
                        break;
                    }
                    debug!("Screen on, foreground monitor resuming");
                    tick.reset_immediately();
                    continue;
                }
            }
        }

        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            changed = screen.changed() => {
                if changed.is_err() {
                    break;
                }
            }

            _ = tick.tick() => {
                let app = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    app = source.current_app() => app,
                };

                let Some(app) = app else { continue };
                if last.as_deref() == Some(app.as_str()) {
                    continue;
                }

                debug!(app = %app, "Foreground application changed");
                last = Some(app.clone());
                // No subscribers is fine.
                let _ = events.send(ForegroundEvent { app });
            }
        }
    }

    info!("Foreground monitor shutting down");
}
