//! Persistent notice posting.

use std::collections::BTreeMap;
use std::sync::Mutex;

use tracing::{debug, info};

use sbar_core::{Notice, NoticeId};

/// Posts and cancels user-visible notices.
pub trait Notifier: Send + Sync {
    /// Posts a notice, replacing any notice with the same id.
    fn notify(&self, id: NoticeId, notice: &Notice);

    /// Cancels a notice. Cancelling an absent notice is a no-op.
    fn cancel(&self, id: NoticeId);

    /// Returns the active notice with the given id, if tracked.
    fn current(&self, _id: NoticeId) -> Option<Notice> {
        None
    }
}

/// In-process notice registry.
///
/// Keeps the active notices so front-ends can render them from status
/// queries.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    active: Mutex<BTreeMap<NoticeId, Notice>>,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the active notice with the given id.
    pub fn get(&self, id: NoticeId) -> Option<Notice> {
        self.active.lock().ok()?.get(&id).cloned()
    }

    /// Number of active notices.
    pub fn len(&self) -> usize {
        self.active.lock().map(|a| a.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Notifier for NoticeBoard {
    fn notify(&self, id: NoticeId, notice: &Notice) {
        if let Ok(mut active) = self.active.lock() {
            let replaced = active.insert(id, notice.clone()).is_some();
            info!(id = %id, title = %notice.title, replaced, "Notice posted");
        }
    }

    fn cancel(&self, id: NoticeId) {
        if let Ok(mut active) = self.active.lock() {
            if active.remove(&id).is_some() {
                info!(id = %id, "Notice cancelled");
            } else {
                debug!(id = %id, "Cancel for absent notice");
            }
        }
    }

    fn current(&self, id: NoticeId) -> Option<Notice> {
        self.get(id)
    }
}
