//! Sticky lifecycle broadcasts.
//!
//! The latest `LifecycleSignal` stays visible to every future
//! subscriber until replaced. Publishing one signal withdraws the other,
//! so observers never see both at once.

use tokio::sync::watch;
use tracing::info;

use sbar_core::LifecycleSignal;

/// Publisher of the sticky `Enabled`/`Disabled` signal.
#[derive(Debug)]
pub struct StickyBroadcaster {
    sender: watch::Sender<Option<LifecycleSignal>>,
}

impl StickyBroadcaster {
    /// Nothing published yet.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self { sender }
    }

    /// Withdraws the opposite signal and publishes `signal`.
    pub fn publish(&self, signal: LifecycleSignal) {
        let withdrawn = self.sender.send_replace(Some(signal));
        info!(
            action = signal.action(),
            withdrawn = ?withdrawn.map(|s| s.action()),
            "Sticky lifecycle broadcast"
        );
    }

    /// Currently published signal.
    pub fn current(&self) -> Option<LifecycleSignal> {
        *self.sender.borrow()
    }

    /// Subscribes; the current value is immediately readable.
    pub fn subscribe(&self) -> watch::Receiver<Option<LifecycleSignal>> {
        self.sender.subscribe()
    }
}

impl Default for StickyBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
