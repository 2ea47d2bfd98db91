//! Persistent user-visible notice shown while the service is running.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a posted notice. Posting with an existing id replaces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NoticeId(pub u32);

impl NoticeId {
    /// The service's own ongoing notice.
    pub const SERVICE: NoticeId = NoticeId(1);
}

impl std::fmt::Display for NoticeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What happens when the user activates the notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoticeAction {
    /// Launch the configuration front-end.
    OpenFrontEnd {
        /// Shell command that opens the front-end
        command: String,
    },
}

/// An ongoing notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub title: String,
    pub text: String,
    pub ongoing: bool,
    pub posted_at: DateTime<Utc>,
    pub action: NoticeAction,
}

impl Notice {
    /// Creates an ongoing notice stamped with the current time.
    pub fn ongoing(title: impl Into<String>, text: impl Into<String>, action: NoticeAction) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            ongoing: true,
            posted_at: Utc::now(),
            action,
        }
    }

    /// Returns a copy re-stamped with the current time.
    pub fn refreshed(&self) -> Self {
        Self {
            posted_at: Utc::now(),
            ..self.clone()
        }
    }
}
