//! Preferences snapshot consulted when the overlay is created.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::indicator::IndicatorId;

/// Default time the indicators stay dropped, in milliseconds.
pub const DEFAULT_DROP_DURATION_MS: u64 = 3_000;

/// Read-only view of the user's settings.
///
/// Loaded once per `create()`. Changes made to the backing store while
/// the overlay is attached only take effect on the next creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferencesSnapshot {
    /// Bar background color
    pub background_color: Color,

    /// Color applied to every indicator glyph
    pub icon_color: Color,

    /// Per-indicator visibility; indicators absent from the map are visible
    pub indicators: BTreeMap<IndicatorId, bool>,

    /// Click-to-drop: tapping the bar drops the indicators
    pub drop_enabled: bool,

    /// Swipe to expand the system status surface
    pub swipe_enabled: bool,

    /// How long the indicators stay dropped, in milliseconds
    pub drop_duration_ms: u64,

    /// Per-app filtering through the foreground monitor
    pub blacklist_enabled: bool,

    /// Disable expansion while the device is locked
    pub auto_disable_expand: bool,
}

impl Default for PreferencesSnapshot {
    fn default() -> Self {
        Self {
            background_color: Color::BLACK,
            icon_color: Color::WHITE,
            indicators: BTreeMap::new(),
            drop_enabled: true,
            swipe_enabled: true,
            drop_duration_ms: DEFAULT_DROP_DURATION_MS,
            blacklist_enabled: false,
            auto_disable_expand: false,
        }
    }
}

impl PreferencesSnapshot {
    /// Returns whether the given indicator should be shown.
    pub fn indicator_visible(&self, id: IndicatorId) -> bool {
        self.indicators.get(&id).copied().unwrap_or(true)
    }

    /// Swipe setting actually applied to the bar.
    ///
    /// Without click-to-drop the bar cannot consume touches, so swipe
    /// cannot be intercepted and is always on.
    pub fn effective_swipe(&self) -> bool {
        !self.drop_enabled || self.swipe_enabled
    }

    /// Drop duration as a `Duration`.
    pub fn drop_duration(&self) -> Duration {
        Duration::from_millis(self.drop_duration_ms)
    }

    /// Whether the screen-state listener is needed.
    pub fn wants_screen_listener(&self) -> bool {
        self.blacklist_enabled || self.auto_disable_expand
    }

    /// Whether the lock-presence listener is needed.
    pub fn wants_lock_listener(&self) -> bool {
        self.auto_disable_expand
    }

    /// Whether the foreground monitor is needed.
    pub fn wants_foreground_monitor(&self) -> bool {
        self.blacklist_enabled
    }
}
