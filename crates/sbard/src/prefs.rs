//! Read-only access to the persisted preferences store.
//!
//! The service never writes preferences. It asks a `PreferencesSource`
//! for a fresh snapshot on every `create()`.

use std::path::PathBuf;
use std::sync::Mutex;

use thiserror::Error;
use tracing::debug;

use sbar_core::PreferencesSnapshot;

/// Provider of preference snapshots.
pub trait PreferencesSource: Send + Sync {
    /// Reads the current preferences.
    fn load(&self) -> Result<PreferencesSnapshot, PreferencesError>;
}

/// Errors reading the preferences store.
#[derive(Debug, Error)]
pub enum PreferencesError {
    #[error("Failed to read preferences {path}: {error}")]
    Read { path: PathBuf, error: String },

    #[error("Invalid preferences {path}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Preferences stored as a TOML key-value file.
///
/// ```toml
/// background_color = "#FF000000"
/// icon_color = "#FFFFFFFF"
/// drop_enabled = false
/// auto_disable_expand = true
///
/// [indicators]
/// icon_roaming = false
/// ```
#[derive(Debug, Clone)]
pub struct TomlPreferences {
    path: PathBuf,
}

impl TomlPreferences {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PreferencesSource for TomlPreferences {
    fn load(&self) -> Result<PreferencesSnapshot, PreferencesError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No preferences file, using defaults");
            return Ok(PreferencesSnapshot::default());
        }

        let contents = std::fs::read_to_string(&self.path).map_err(|e| PreferencesError::Read {
            path: self.path.clone(),
            error: e.to_string(),
        })?;

        toml::from_str(&contents).map_err(|e| PreferencesError::Parse {
            path: self.path.clone(),
            error: e.to_string(),
        })
    }
}

/// In-memory preferences, replaceable at runtime.
///
/// Used for embedding the service without a file-backed store.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    current: Mutex<PreferencesSnapshot>,
}

impl MemoryPreferences {
    pub fn new(prefs: PreferencesSnapshot) -> Self {
        Self {
            current: Mutex::new(prefs),
        }
    }

    /// Replaces the stored preferences. Takes effect on the next `create()`.
    pub fn set(&self, prefs: PreferencesSnapshot) {
        if let Ok(mut current) = self.current.lock() {
            *current = prefs;
        }
    }
}

impl PreferencesSource for MemoryPreferences {
    fn load(&self) -> Result<PreferencesSnapshot, PreferencesError> {
        Ok(self
            .current
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default())
    }
}
