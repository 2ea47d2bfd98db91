//! Service lifecycle state and the sticky lifecycle signal.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of one service instance.
///
/// Transitions are one-way: `Uninitialized -> Created -> Destroyed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    #[default]
    Uninitialized,
    Created,
    Destroyed,
}

impl ServiceState {
    /// Returns true while the overlay is expected to be attached.
    pub fn is_created(&self) -> bool {
        matches!(self, ServiceState::Created)
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceState::Uninitialized => write!(f, "uninitialized"),
            ServiceState::Created => write!(f, "created"),
            ServiceState::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// Sticky signal announcing the service's lifecycle to observers.
///
/// `Enabled` and `Disabled` are mutually exclusive: publishing one
/// withdraws the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleSignal {
    Enabled,
    Disabled,
}

impl LifecycleSignal {
    /// Action name observers match on.
    pub fn action(&self) -> &'static str {
        match self {
            LifecycleSignal::Enabled => "sbar.intent.action.ENABLED",
            LifecycleSignal::Disabled => "sbar.intent.action.DISABLED",
        }
    }

    /// The signal this one withdraws.
    pub fn opposite(&self) -> Self {
        match self {
            LifecycleSignal::Enabled => LifecycleSignal::Disabled,
            LifecycleSignal::Disabled => LifecycleSignal::Enabled,
        }
    }
}
