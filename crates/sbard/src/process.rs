//! Process-scoped state that outlives individual create/destroy cycles.
//!
//! ScreenOn and ExpandEligible reflect hardware/OS state, not the
//! overlay's own lifecycle. They are owned here, initialized on first
//! use, and handed to collaborators by reference instead of living in
//! globals.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

/// Shared screen and lock state.
#[derive(Debug)]
pub struct ProcessState {
    screen_on: watch::Sender<bool>,
    expand_eligible: AtomicBool,
}

impl ProcessState {
    /// Screen assumed on and expansion allowed until told otherwise.
    pub fn new() -> Self {
        let (screen_on, _) = watch::channel(true);
        Self {
            screen_on,
            expand_eligible: AtomicBool::new(true),
        }
    }

    pub fn screen_on(&self) -> bool {
        *self.screen_on.borrow()
    }

    /// Records the screen state, waking watchers only on change.
    pub fn set_screen_on(&self, on: bool) {
        self.screen_on.send_if_modified(|current| {
            let changed = *current != on;
            *current = on;
            changed
        });
    }

    /// Receiver the foreground monitor sleeps on while the screen is off.
    pub fn watch_screen(&self) -> watch::Receiver<bool> {
        self.screen_on.subscribe()
    }

    pub fn expand_eligible(&self) -> bool {
        self.expand_eligible.load(Ordering::SeqCst)
    }

    pub fn set_expand_eligible(&self, eligible: bool) {
        self.expand_eligible.store(eligible, Ordering::SeqCst);
    }
}

impl Default for ProcessState {
    fn default() -> Self {
        Self::new()
    }
}
