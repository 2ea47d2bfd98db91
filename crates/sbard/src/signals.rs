//! Screen-state and lock-presence listeners.
//!
//! Both listeners are plain handlers invoked by the service actor with
//! whatever overlay and preferences currently exist. Either may be
//! absent when a signal races a create or destroy; the handler then
//! does nothing.

use tracing::debug;

use sbar_core::{Broadcast, PreferencesSnapshot, PresenceSignal, ScreenSignal};

use crate::overlay::OverlayHandle;
use crate::process::ProcessState;

/// A broadcast normalized to the listener that handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerSignal {
    Screen(ScreenSignal),
    Presence(PresenceSignal),
}

impl ListenerSignal {
    /// Maps a raw broadcast onto the closed set of recognized signals.
    pub fn normalize(broadcast: &Broadcast) -> Option<Self> {
        ScreenSignal::from_broadcast(broadcast)
            .map(ListenerSignal::Screen)
            .or_else(|| PresenceSignal::from_broadcast(broadcast).map(ListenerSignal::Presence))
    }
}

/// Reacts to the screen turning on or off.
#[derive(Debug, Default)]
pub struct ScreenStateListener;

impl ScreenStateListener {
    pub fn on_signal(
        &self,
        signal: ScreenSignal,
        overlay: Option<&mut OverlayHandle>,
        prefs: Option<&PreferencesSnapshot>,
        process: &ProcessState,
    ) {
        let (Some(overlay), Some(prefs)) = (overlay, prefs) else {
            debug!(?signal, "Screen signal without overlay, ignored");
            return;
        };

        match signal {
            ScreenSignal::Off => {
                if prefs.auto_disable_expand {
                    overlay.set_expand(false);
                    process.set_expand_eligible(false);
                }
                process.set_screen_on(false);
            }
            ScreenSignal::On => process.set_screen_on(true),
        }
    }
}

/// Reacts to the user confirming presence on any supported lock screen.
#[derive(Debug, Default)]
pub struct LockPresenceListener;

impl LockPresenceListener {
    pub fn on_signal(
        &self,
        signal: PresenceSignal,
        overlay: Option<&mut OverlayHandle>,
        prefs: Option<&PreferencesSnapshot>,
        process: &ProcessState,
    ) {
        let (Some(overlay), Some(prefs)) = (overlay, prefs) else {
            debug!(?signal, "Presence signal without overlay, ignored");
            return;
        };

        if !signal.confirms_presence() {
            debug!(?signal, "Presence not confirmed");
            return;
        }

        if prefs.auto_disable_expand {
            overlay.set_expand(true);
            process.set_expand_eligible(true);
        }
    }
}
