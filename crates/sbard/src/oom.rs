//! Linux privileged-execution backend based on the OOM killer score.
//!
//! The modern slots lower `oom_score_adj` (restoring the original score
//! on exit) and own the persistent notice. The legacy slot writes the
//! deprecated `oom_adj` file. A slot is unavailable when its file is
//! missing under the process directory.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use procfs::process::Process;
use tracing::debug;

use sbar_core::{Notice, NoticeId};

use crate::compat::{
    CapabilityError, CapabilityProbe, PlatformError, PrivilegedCall, PrivilegedOp, SlotKind,
};
use crate::notice::Notifier;

/// Default process directory.
pub const PROC_SELF: &str = "/proc/self";

/// Range accepted by `oom_score_adj`.
pub const SCORE_MIN: i16 = -1000;
pub const SCORE_MAX: i16 = 1000;

/// Range of the legacy `oom_adj` scale (`-17..=15`).
const LEGACY_MIN: i32 = -17;
const LEGACY_MAX: i32 = 15;

/// Probe resolving slots against a `/proc/<pid>` directory.
pub struct OomScoreProbe {
    ops: Arc<OomScoreOps>,
}

impl OomScoreProbe {
    /// Probe for the current process.
    pub fn for_current_process(privileged_score: i16, notifier: Arc<dyn Notifier>) -> Self {
        Self::with_root(PROC_SELF, privileged_score, notifier)
    }

    /// Probe rooted at an arbitrary process directory.
    pub fn with_root(
        root: impl Into<PathBuf>,
        privileged_score: i16,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            ops: Arc::new(OomScoreOps {
                root: root.into(),
                privileged_score,
                notifier,
                saved_score: Mutex::new(None),
                saved_legacy: Mutex::new(None),
            }),
        }
    }
}

impl CapabilityProbe for OomScoreProbe {
    fn probe(&self, slot: SlotKind) -> Result<Arc<dyn PrivilegedOp>, CapabilityError> {
        let file = match slot {
            SlotKind::Enter | SlotKind::Exit => "oom_score_adj",
            SlotKind::LegacySet => "oom_adj",
        };

        if self.ops.root.join(file).exists() {
            let op: Arc<dyn PrivilegedOp> = self.ops.clone();
            Ok(op)
        } else {
            Err(CapabilityError {
                slot,
                reason: format!("{} not present", self.ops.root.join(file).display()),
            })
        }
    }
}

/// Shared implementation behind every available slot.
struct OomScoreOps {
    root: PathBuf,
    privileged_score: i16,
    notifier: Arc<dyn Notifier>,
    saved_score: Mutex<Option<i16>>,
    saved_legacy: Mutex<Option<i32>>,
}

impl OomScoreOps {
    fn process(&self) -> Result<Process, PlatformError> {
        Process::new_with_root(self.root.clone()).map_err(|e| PlatformError::Io(e.to_string()))
    }

    fn enter(&self, id: NoticeId, notice: &Notice) -> Result<(), PlatformError> {
        self.notifier.notify(id, notice);

        let process = self.process()?;
        let current = process
            .oom_score_adj()
            .map_err(|e| PlatformError::Io(e.to_string()))?;

        if let Ok(mut saved) = self.saved_score.lock() {
            saved.get_or_insert(current);
        }

        process
            .set_oom_score_adj(self.privileged_score)
            .map_err(|e| PlatformError::Rejected(e.to_string()))?;

        debug!(from = current, to = self.privileged_score, "OOM score lowered");
        Ok(())
    }

    fn exit(&self, id: NoticeId, remove_notice: bool) -> Result<(), PlatformError> {
        let restore = self.saved_score.lock().ok().and_then(|mut s| s.take());

        if remove_notice {
            self.notifier.cancel(id);
        }

        if let Some(score) = restore {
            self.process()?
                .set_oom_score_adj(score)
                .map_err(|e| PlatformError::Rejected(e.to_string()))?;
            debug!(to = score, "OOM score restored");
        }
        Ok(())
    }

    fn set_legacy(&self, on: bool) -> Result<(), PlatformError> {
        let path = self.root.join("oom_adj");

        let value = if on {
            let current = read_i32(&path)?;
            if let Ok(mut saved) = self.saved_legacy.lock() {
                saved.get_or_insert(current);
            }
            legacy_scale(self.privileged_score)
        } else {
            match self.saved_legacy.lock().ok().and_then(|mut s| s.take()) {
                Some(v) => v,
                None => return Ok(()),
            }
        };

        std::fs::write(&path, value.to_string())
            .map_err(|e| PlatformError::Rejected(e.to_string()))?;
        debug!(value, "Legacy oom_adj written");
        Ok(())
    }
}

impl PrivilegedOp for OomScoreOps {
    fn invoke(&self, call: PrivilegedCall<'_>) -> Result<(), PlatformError> {
        match call {
            PrivilegedCall::Enter { id, notice } => self.enter(id, notice),
            PrivilegedCall::Exit { id, remove_notice } => self.exit(id, remove_notice),
            PrivilegedCall::SetLegacy(on) => self.set_legacy(on),
        }
    }
}

fn read_i32(path: &Path) -> Result<i32, PlatformError> {
    let text = std::fs::read_to_string(path).map_err(|e| PlatformError::Io(e.to_string()))?;
    text.trim()
        .parse()
        .map_err(|_| PlatformError::Io(format!("unparseable {}: {text:?}", path.display())))
}

/// Maps an `oom_score_adj` value (-1000..=1000) onto the legacy scale.
fn legacy_scale(score: i16) -> i32 {
    let span = i64::from(LEGACY_MAX.abs().max(LEGACY_MIN.abs()));
    let scaled = (i64::from(score) * span / i64::from(SCORE_MAX))
        .clamp(i64::from(LEGACY_MIN), i64::from(LEGACY_MAX));
    i32::try_from(scaled).unwrap_or(LEGACY_MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notice::NoticeBoard;

    #[test]
    fn test_legacy_scale() {
        assert_eq!(legacy_scale(0), 0);
        assert_eq!(legacy_scale(-1000), -17);
        assert_eq!(legacy_scale(-500), -8);
        assert_eq!(legacy_scale(1000), 15);
    }

    #[test]
    fn test_legacy_scale_extremes_clamp() {
        assert_eq!(legacy_scale(i16::MAX), LEGACY_MAX);
        assert_eq!(legacy_scale(i16::MIN), LEGACY_MIN);
    }

    #[test]
    fn test_missing_files_are_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let probe = OomScoreProbe::with_root(dir.path(), -500, Arc::new(NoticeBoard::new()));

        for slot in [SlotKind::Enter, SlotKind::Exit, SlotKind::LegacySet] {
            let err = probe.probe(slot).err().unwrap();
            assert_eq!(err.slot, slot);
        }
    }

    #[test]
    fn test_legacy_only_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("oom_adj"), "3\n").unwrap();
        let probe = OomScoreProbe::with_root(dir.path(), -500, Arc::new(NoticeBoard::new()));

        assert!(probe.probe(SlotKind::Enter).is_err());
        let legacy = probe.probe(SlotKind::LegacySet).unwrap();

        legacy.invoke(PrivilegedCall::SetLegacy(true)).unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("oom_adj")).unwrap(),
            "-8"
        );

        legacy.invoke(PrivilegedCall::SetLegacy(false)).unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("oom_adj")).unwrap(),
            "3"
        );
    }

    #[test]
    fn test_legacy_clear_without_set_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("oom_adj"), "2").unwrap();
        let probe = OomScoreProbe::with_root(dir.path(), -500, Arc::new(NoticeBoard::new()));

        let legacy = probe.probe(SlotKind::LegacySet).unwrap();
        legacy.invoke(PrivilegedCall::SetLegacy(false)).unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("oom_adj")).unwrap(), "2");
    }
}
