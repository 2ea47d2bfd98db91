//! Daemon configuration.
//!
//! Loaded from `$CONFIG_DIR/sbar/config.toml` (or `SBAR_CONFIG`), with
//! every field defaulted so a missing file is not an error. The socket
//! path can additionally be overridden with `SBAR_SOCKET`.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use sbar_core::{Notice, NoticeAction};

use crate::oom::{SCORE_MAX, SCORE_MIN};
use crate::overlay::Density;

/// Default socket path
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/sbar.sock";

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "SBAR_CONFIG";

/// Environment variable overriding the socket path.
pub const SOCKET_ENV: &str = "SBAR_SOCKET";

/// Default foreground poll interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

/// OOM score requested while in privileged mode.
pub const DEFAULT_PRIVILEGED_SCORE: i16 = -500;

/// Returns `$CONFIG_DIR/sbar`, falling back to `/tmp/sbar`.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("sbar")
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Unix socket the remote control interface listens on
    pub socket_path: PathBuf,

    /// Key-value preferences file read on every `create()`
    pub preferences_path: PathBuf,

    /// Display density, selects the bar height
    pub density: Density,

    /// Title given to the overlay surface
    pub window_title: String,

    /// Persistent notice shown while the overlay is created
    pub notice: NoticeConfig,

    /// Foreground-app monitor settings
    pub foreground: ForegroundConfig,

    /// Privileged execution settings
    pub privilege: PrivilegeConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            preferences_path: config_dir().join("preferences.toml"),
            density: Density::default(),
            window_title: "StatusBar+".to_string(),
            notice: NoticeConfig::default(),
            foreground: ForegroundConfig::default(),
            privilege: PrivilegeConfig::default(),
        }
    }
}

/// Text and action of the persistent notice.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NoticeConfig {
    pub title: String,
    pub text: String,
    /// Command that opens the configuration front-end
    pub front_end_command: String,
}

impl Default for NoticeConfig {
    fn default() -> Self {
        Self {
            title: "StatusBar+".to_string(),
            text: "Status bar running. Select to configure.".to_string(),
            front_end_command: "sbar status".to_string(),
        }
    }
}

impl NoticeConfig {
    /// Builds the notice to post.
    pub fn to_notice(&self) -> Notice {
        Notice::ongoing(
            self.title.clone(),
            self.text.clone(),
            NoticeAction::OpenFrontEnd {
                command: self.front_end_command.clone(),
            },
        )
    }
}

/// Foreground-app monitor settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForegroundConfig {
    /// Shell command printing the PID of the foreground application
    pub command: Option<String>,

    /// How often to poll, in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for ForegroundConfig {
    fn default() -> Self {
        Self {
            command: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl ForegroundConfig {
    /// Poll interval as a `Duration`, never zero.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Privileged execution settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PrivilegeConfig {
    /// OOM score adjustment applied while privileged, within -1000..=1000
    pub score: i16,
}

impl Default for PrivilegeConfig {
    fn default() -> Self {
        Self {
            score: DEFAULT_PRIVILEGED_SCORE,
        }
    }
}

impl DaemonConfig {
    /// Loads the configuration from the default location, honouring the
    /// `SBAR_CONFIG` and `SBAR_SOCKET` overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"));

        let mut config = Self::load_from(&path)?;

        if let Ok(socket) = env::var(SOCKET_ENV) {
            config.socket_path = PathBuf::from(socket);
        }

        Ok(config)
    }

    /// Loads the configuration from a file; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&contents).map_err(|e| match e {
            ConfigError::Parse { error, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                error,
            },
            other => other,
        })
    }

    /// Parses configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            error: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let score = self.privilege.score;
        if !(SCORE_MIN..=SCORE_MAX).contains(&score) {
            return Err(ConfigError::Invalid {
                field: "privilege.score",
                reason: format!("{score} is outside {SCORE_MIN}..={SCORE_MAX}"),
            });
        }
        Ok(())
    }
}

/// Errors that can occur loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {error}")]
    Read { path: PathBuf, error: String },

    #[error("Invalid config {path}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_default() {
        let config = DaemonConfig::parse("").unwrap();
        assert_eq!(config.socket_path, PathBuf::from(DEFAULT_SOCKET_PATH));
        assert_eq!(config.density, Density::Mdpi);
        assert_eq!(config.foreground.poll_interval(), Duration::from_secs(1));
        assert!(config.foreground.command.is_none());
        assert_eq!(config.privilege.score, DEFAULT_PRIVILEGED_SCORE);
    }

    #[test]
    fn test_partial_config() {
        let config = DaemonConfig::parse(
            r#"
            socket_path = "/run/sbar.sock"
            density = "hdpi"

            [foreground]
            command = "xdotool getactivewindow getwindowpid"
            poll_interval_ms = 250

            [notice]
            title = "Bar"
            "#,
        )
        .unwrap();

        assert_eq!(config.socket_path, PathBuf::from("/run/sbar.sock"));
        assert_eq!(config.density, Density::Hdpi);
        assert_eq!(config.foreground.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.notice.title, "Bar");
        assert_eq!(config.notice.front_end_command, "sbar status");
    }

    #[test]
    fn test_invalid_config() {
        let err = DaemonConfig::parse("density = 3").unwrap_err();
        assert!(err.to_string().contains("Invalid config"));
    }

    #[test]
    fn test_privileged_score_bounds_accepted() {
        let config = DaemonConfig::parse("[privilege]\nscore = -1000\n").unwrap();
        assert_eq!(config.privilege.score, -1000);

        let config = DaemonConfig::parse("[privilege]\nscore = 1000\n").unwrap();
        assert_eq!(config.privilege.score, 1000);
    }

    #[test]
    fn test_privileged_score_out_of_range_rejected() {
        let err = DaemonConfig::parse("[privilege]\nscore = 1001\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "privilege.score",
                ..
            }
        ));

        let err = DaemonConfig::parse("[privilege]\nscore = -1001\n").unwrap_err();
        assert!(err.to_string().contains("privilege.score"));

        // Does not fit the score type at all.
        assert!(DaemonConfig::parse("[privilege]\nscore = 200000000\n").is_err());
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = DaemonConfig::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.window_title, "StatusBar+");
    }

    #[test]
    fn test_notice_carries_front_end_action() {
        let notice = NoticeConfig::default().to_notice();
        assert!(notice.ongoing);
        assert_eq!(
            notice.action,
            NoticeAction::OpenFrontEnd {
                command: "sbar status".to_string()
            }
        );
    }

    #[test]
    fn test_zero_poll_interval_clamped() {
        let fg = ForegroundConfig {
            command: None,
            poll_interval_ms: 0,
        };
        assert_eq!(fg.poll_interval(), Duration::from_millis(1));
    }
}
