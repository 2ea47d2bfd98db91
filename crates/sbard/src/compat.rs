//! Compatibility shim for privileged execution.
//!
//! Platforms differ in how a process asks to be spared under memory
//! pressure. Some offer a modern enter/exit pair that also owns the
//! persistent notice; older ones only have a single legacy toggle and
//! rely on the caller to keep a notice posted; some have neither.
//!
//! `CompatShim` probes each slot once, caches the outcome as
//! `Capability::{Available, Unavailable}` and dispatches through the
//! cached tag from then on. A missing slot is a normal state that
//! selects a fallback path, never an error surfaced to callers.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing::{debug, info, warn};

use sbar_core::{Notice, NoticeId};

use crate::notice::Notifier;

/// One resolvable privileged operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// Modern entry: enter privileged mode and post the notice
    Enter,
    /// Modern exit: leave privileged mode, optionally removing the notice
    Exit,
    /// Legacy single toggle
    LegacySet,
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotKind::Enter => write!(f, "enter"),
            SlotKind::Exit => write!(f, "exit"),
            SlotKind::LegacySet => write!(f, "legacy-set"),
        }
    }
}

/// Arguments to a resolved privileged operation.
#[derive(Debug, Clone, Copy)]
pub enum PrivilegedCall<'a> {
    Enter { id: NoticeId, notice: &'a Notice },
    Exit { id: NoticeId, remove_notice: bool },
    SetLegacy(bool),
}

/// A resolved operation handle.
pub trait PrivilegedOp: Send + Sync {
    fn invoke(&self, call: PrivilegedCall<'_>) -> Result<(), PlatformError>;
}

/// Platform probe that resolves operation slots.
pub trait CapabilityProbe: Send + Sync {
    fn probe(&self, slot: SlotKind) -> Result<Arc<dyn PrivilegedOp>, CapabilityError>;
}

/// A slot could not be resolved on this platform.
#[derive(Debug, Clone, Error)]
#[error("{slot} capability unavailable: {reason}")]
pub struct CapabilityError {
    pub slot: SlotKind,
    pub reason: String,
}

/// A resolved operation failed when invoked.
#[derive(Debug, Clone, Error)]
pub enum PlatformError {
    #[error("privileged call rejected: {0}")]
    Rejected(String),

    #[error("privileged call I/O failure: {0}")]
    Io(String),
}

/// Cached result of probing one slot.
#[derive(Clone)]
pub enum Capability {
    Available(Arc<dyn PrivilegedOp>),
    Unavailable,
}

impl Capability {
    pub fn is_available(&self) -> bool {
        matches!(self, Capability::Available(_))
    }

    fn op(&self) -> Option<&Arc<dyn PrivilegedOp>> {
        match self {
            Capability::Available(op) => Some(op),
            Capability::Unavailable => None,
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Available(_) => write!(f, "Available"),
            Capability::Unavailable => write!(f, "Unavailable"),
        }
    }
}

/// The three resolved slots.
#[derive(Debug, Clone)]
pub struct CompatibilitySlots {
    pub enter: Capability,
    pub exit: Capability,
    pub legacy_set: Capability,
}

/// Entry path the shim takes on this platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegePath {
    Modern,
    Legacy,
    NoticeOnly,
}

/// Stable privileged-mode entry/exit regardless of platform support.
pub struct CompatShim {
    probe: Arc<dyn CapabilityProbe>,
    notifier: Arc<dyn Notifier>,
    slots: OnceCell<CompatibilitySlots>,
}

impl CompatShim {
    pub fn new(probe: Arc<dyn CapabilityProbe>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            probe,
            notifier,
            slots: OnceCell::new(),
        }
    }

    /// Returns the resolved slots, probing on first use.
    pub fn slots(&self) -> &CompatibilitySlots {
        self.slots.get_or_init(|| {
            let slots = CompatibilitySlots {
                enter: self.resolve(SlotKind::Enter),
                exit: self.resolve(SlotKind::Exit),
                legacy_set: self.resolve(SlotKind::LegacySet),
            };
            info!(
                enter = ?slots.enter,
                exit = ?slots.exit,
                legacy_set = ?slots.legacy_set,
                "Privileged execution capabilities resolved"
            );
            slots
        })
    }

    fn resolve(&self, slot: SlotKind) -> Capability {
        match self.probe.probe(slot) {
            Ok(op) => Capability::Available(op),
            Err(e) => {
                debug!(error = %e, "Falling back for missing capability");
                Capability::Unavailable
            }
        }
    }

    /// Path `enter_privileged` will take.
    pub fn entry_path(&self) -> PrivilegePath {
        let slots = self.slots();
        if slots.enter.is_available() {
            PrivilegePath::Modern
        } else if slots.legacy_set.is_available() {
            PrivilegePath::Legacy
        } else {
            PrivilegePath::NoticeOnly
        }
    }

    /// Enters privileged mode with `notice` posted under `id`.
    pub fn enter_privileged(&self, id: NoticeId, notice: &Notice) {
        let slots = self.slots();

        if let Some(enter) = slots.enter.op() {
            if let Err(e) = enter.invoke(PrivilegedCall::Enter { id, notice }) {
                warn!(error = %e, "Unable to enter privileged mode");
            }
            return;
        }

        // The legacy toggle keeps nothing alive by itself: the notice
        // must be posted on every fallback path.
        if let Some(legacy) = slots.legacy_set.op() {
            if let Err(e) = legacy.invoke(PrivilegedCall::SetLegacy(true)) {
                warn!(error = %e, "Unable to set legacy privileged mode");
            }
        }
        self.notifier.notify(id, notice);
    }

    /// Leaves privileged mode and removes the notice posted under `id`.
    pub fn exit_privileged(&self, id: NoticeId) {
        let slots = self.slots();

        if let Some(exit) = slots.exit.op() {
            if let Err(e) = exit.invoke(PrivilegedCall::Exit {
                id,
                remove_notice: true,
            }) {
                warn!(error = %e, "Unable to exit privileged mode");
            }
            return;
        }

        // Cancel first: the process may be killed as soon as privilege drops.
        self.notifier.cancel(id);
        if let Some(legacy) = slots.legacy_set.op() {
            if let Err(e) = legacy.invoke(PrivilegedCall::SetLegacy(false)) {
                warn!(error = %e, "Unable to clear legacy privileged mode");
            }
        }
    }
}
