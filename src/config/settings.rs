//! Engine settings and paths.
//!
//! Settings live in an XDG-compliant `settings.json`. A missing file means
//! defaults; a present file may name any subset of the fields.

use crate::error::{ConfigError, ConfigResult};
use crate::session::{
    SessionOptions, DEFAULT_DISCOVERY_WINDOW, DEFAULT_GRACE_MARGIN, DEFAULT_QUEUE_POLL,
};
use crate::types::{PortMode, ScanRequest};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Application directory paths following the XDG Base Directory layout.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/lanscan)
    pub config_dir: PathBuf,
}

impl Paths {
    /// Resolve the per-user directories.
    pub fn new() -> ConfigResult<Self> {
        let project =
            ProjectDirs::from("com", "lanscan", "lanscan").ok_or(ConfigError::DirectoryNotFound)?;
        Ok(Self {
            config_dir: project.config_dir().to_path_buf(),
        })
    }

    /// Get the path to the settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }
}

/// Longest discovery window or grace margin accepted, in seconds.
pub const MAX_WAIT_SECS: f64 = 3600.0;

/// Convert a settings value in seconds to a duration within `MAX_WAIT_SECS`.
pub fn wait_duration(name: &str, secs: f64) -> ConfigResult<Duration> {
    if !(0.0..=MAX_WAIT_SECS).contains(&secs) {
        return Err(ConfigError::InvalidFormat(format!(
            "{name} must be 0-{MAX_WAIT_SECS} seconds, got {secs}"
        )));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| ConfigError::InvalidFormat(format!("{name}: {e}")))
}

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Default number of concurrent workers.
    pub concurrency: usize,
    /// Default per-probe timeout in seconds.
    pub timeout: f64,
    /// Port selection used when none is given.
    pub default_port_mode: PortMode,
    /// Seconds to collect ARP replies.
    pub discovery_window: f64,
    /// Seconds granted to workers beyond one timeout when stopping.
    pub grace_margin: f64,
    /// Worker queue poll interval in milliseconds.
    pub queue_poll_ms: u64,
    /// How often the CLI polls the event log, in milliseconds.
    pub progress_poll_ms: u64,
    /// Network interface for ARP discovery; picked automatically when unset.
    pub interface: Option<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            concurrency: 50,
            timeout: 0.5,
            default_port_mode: PortMode::Common,
            discovery_window: DEFAULT_DISCOVERY_WINDOW.as_secs_f64(),
            grace_margin: DEFAULT_GRACE_MARGIN.as_secs_f64(),
            queue_poll_ms: DEFAULT_QUEUE_POLL.as_millis() as u64,
            progress_poll_ms: 200,
            interface: None,
        }
    }
}

impl EngineSettings {
    /// Load settings from the default location.
    pub fn load() -> ConfigResult<Self> {
        let file = Paths::new()?.settings_file();
        if !file.exists() {
            debug!(path = %file.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&file)
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let settings: Self =
            serde_json::from_str(&content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
        settings.validate()?;
        debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    /// Save settings to the default location.
    pub fn save(&self) -> ConfigResult<PathBuf> {
        let paths = Paths::new()?;
        fs::create_dir_all(&paths.config_dir)?;
        let file = paths.settings_file();
        self.save_to(&file)?;
        Ok(file)
    }

    /// Save settings to a specific file.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| ConfigError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Reject values no session could run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(1..=ScanRequest::MAX_CONCURRENCY).contains(&self.concurrency) {
            return Err(ConfigError::InvalidFormat(format!(
                "concurrency must be 1-{}, got {}",
                ScanRequest::MAX_CONCURRENCY,
                self.concurrency
            )));
        }
        if !(self.timeout > 0.0 && self.timeout <= ScanRequest::MAX_TIMEOUT_SECS) {
            return Err(ConfigError::InvalidFormat(format!(
                "timeout must be >0 and <={}, got {}",
                ScanRequest::MAX_TIMEOUT_SECS,
                self.timeout
            )));
        }
        wait_duration("discovery_window", self.discovery_window)?;
        wait_duration("grace_margin", self.grace_margin)?;
        if self.queue_poll_ms == 0 || self.progress_poll_ms == 0 {
            return Err(ConfigError::InvalidFormat(
                "poll intervals must be at least 1 ms".to_string(),
            ));
        }
        Ok(())
    }

    /// Session tuning derived from these settings.
    pub fn session_options(&self) -> ConfigResult<SessionOptions> {
        Ok(SessionOptions {
            discovery_window: wait_duration("discovery_window", self.discovery_window)?,
            grace_margin: wait_duration("grace_margin", self.grace_margin)?,
            queue_poll: Duration::from_millis(self.queue_poll_ms),
        })
    }

    pub fn progress_poll(&self) -> Duration {
        Duration::from_millis(self.progress_poll_ms)
    }
}
