//! System and third-party broadcasts, normalized into typed signals.
//!
//! Screen and lock-screen products each announce state changes under
//! their own action names. The listeners never look at raw action
//! strings; they only see the closed set of variants defined here.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Screen turned on.
pub const ACTION_SCREEN_ON: &str = "android.intent.action.SCREEN_ON";
/// Screen turned off.
pub const ACTION_SCREEN_OFF: &str = "android.intent.action.SCREEN_OFF";
/// The system keyguard was dismissed.
pub const ACTION_USER_PRESENT: &str = "android.intent.action.USER_PRESENT";
/// WidgetLocker unlocked.
pub const ACTION_WIDGETLOCKER_UNLOCKED: &str = "com.teslacoilsw.widgetlocker.intent.UNLOCKED";
/// WidgetLocker locked. Not a presence confirmation.
pub const ACTION_WIDGETLOCKER_LOCKED: &str = "com.teslacoilsw.widgetlocker.intent.LOCKED";
/// NoLock unlocked.
pub const ACTION_NOLOCK_UNLOCKED: &str = "org.jraf.android.nolock.ACTION_UNLOCKED";
/// NoLock locked. Not a presence confirmation.
pub const ACTION_NOLOCK_LOCKED: &str = "org.jraf.android.nolock.ACTION_LOCKED";
/// No Lock Screen state change, carries the `isActive` extra.
pub const ACTION_NOLOCKSCREEN_LOCKSTATE: &str = "com.futonredemption.nokeyguard.lockstate";
/// Ripple Lock / Agile Lock unlocked.
pub const ACTION_RIPPLELOCK_UNLOCKED: &str = "com.nanoha.UNLOCKED";

/// Extra carried by the No Lock Screen state broadcast.
pub const EXTRA_IS_ACTIVE: &str = "isActive";

/// A raw broadcast as delivered by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Broadcast {
    /// Action identifier
    pub action: String,

    /// Optional payload
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extras: Map<String, Value>,
}

impl Broadcast {
    /// Creates a broadcast with no extras.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            extras: Map::new(),
        }
    }

    /// Adds a boolean extra.
    pub fn with_bool(mut self, key: impl Into<String>, value: bool) -> Self {
        self.extras.insert(key.into(), Value::Bool(value));
        self
    }

    /// Reads a boolean extra, falling back to `default` when absent or
    /// not a boolean.
    pub fn bool_extra(&self, key: &str, default: bool) -> bool {
        self.extras.get(key).and_then(Value::as_bool).unwrap_or(default)
    }
}

/// Screen power state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenSignal {
    On,
    Off,
}

impl ScreenSignal {
    /// Maps a broadcast to a screen signal, if it is one.
    pub fn from_broadcast(broadcast: &Broadcast) -> Option<Self> {
        match broadcast.action.as_str() {
            ACTION_SCREEN_ON => Some(ScreenSignal::On),
            ACTION_SCREEN_OFF => Some(ScreenSignal::Off),
            _ => None,
        }
    }

    /// Returns true for `On`.
    pub fn is_on(&self) -> bool {
        matches!(self, ScreenSignal::On)
    }
}

/// A recognized lock-presence signal from one of the supported sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceSignal {
    /// System keyguard dismissed
    UserPresent,
    /// WidgetLocker
    WidgetLockerUnlocked,
    /// NoLock
    NoLockUnlocked,
    /// Ripple Lock / Agile Lock
    RippleLockUnlocked,
    /// No Lock Screen, with its `isActive` payload
    NoLockScreenState { active: bool },
}

impl PresenceSignal {
    /// Maps a broadcast to a presence signal, if it is one we subscribe to.
    pub fn from_broadcast(broadcast: &Broadcast) -> Option<Self> {
        match broadcast.action.as_str() {
            ACTION_USER_PRESENT => Some(PresenceSignal::UserPresent),
            ACTION_WIDGETLOCKER_UNLOCKED => Some(PresenceSignal::WidgetLockerUnlocked),
            ACTION_NOLOCK_UNLOCKED => Some(PresenceSignal::NoLockUnlocked),
            ACTION_RIPPLELOCK_UNLOCKED => Some(PresenceSignal::RippleLockUnlocked),
            ACTION_NOLOCKSCREEN_LOCKSTATE => Some(PresenceSignal::NoLockScreenState {
                active: broadcast.bool_extra(EXTRA_IS_ACTIVE, false),
            }),
            _ => None,
        }
    }

    /// Whether this signal confirms the user is present (device unlocked).
    pub fn confirms_presence(&self) -> bool {
        match self {
            PresenceSignal::NoLockScreenState { active } => *active,
            _ => true,
        }
    }
}

/// Normalizes a broadcast into the single "device presence confirmed"
/// decision.
pub fn confirms_presence(broadcast: &Broadcast) -> bool {
    PresenceSignal::from_broadcast(broadcast).is_some_and(|s| s.confirms_presence())
}
