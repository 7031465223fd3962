//! Supervisor settings and validation.
//!
//! Pure data: the CLI fills these from flags/env, the runtime factory reads
//! them to pick and configure a backend.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::command::{BroadcastCommandBuilder, DEFAULT_FFMPEG_LOG_LEVEL};
use crate::domain::{DEFAULT_JOB_PREFIX, JobNaming, NamingError};
use crate::ports::BackendKind;

pub const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";
pub const DEFAULT_PM2_PATH: &str = "pm2";
pub const DEFAULT_PM2_NAMESPACE: &str = "streamflow";

/// How long a job may sit in `Stopping` before termination is re-issued.
pub const DEFAULT_STOP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_MANAGER_POLL_INTERVAL_MS: u64 = 2_000;

/// Levels accepted by ffmpeg's `-loglevel`.
const FFMPEG_LOG_LEVELS: &[&str] = &[
    "quiet", "panic", "fatal", "error", "warning", "info", "verbose", "debug", "trace",
];

/// Settings for the stream supervisor and its backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorSettings {
    pub backend: BackendKind,

    /// ffmpeg executable (looked up on `PATH` when relative).
    pub ffmpeg_path: PathBuf,

    pub ffmpeg_log_level: String,

    /// Direct backend only: SIGTERM first and wait this long before SIGKILL.
    /// Zero kills immediately.
    pub stop_grace_ms: u64,

    pub stop_timeout_secs: u64,

    pub reconcile_interval_secs: u64,

    pub manager: ManagerSettings,
}

/// Settings for the delegated (pm2) backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerSettings {
    pub pm2_path: PathBuf,

    /// Prepended to every stream id to form the pm2 process name.
    pub job_prefix: String,

    /// pm2 namespace tagging jobs owned by this service.
    pub namespace: String,

    /// How often the shared exit poller queries `pm2 jlist`.
    pub poll_interval_ms: u64,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Direct,
            ffmpeg_path: PathBuf::from(DEFAULT_FFMPEG_PATH),
            ffmpeg_log_level: DEFAULT_FFMPEG_LOG_LEVEL.to_string(),
            stop_grace_ms: 0,
            stop_timeout_secs: DEFAULT_STOP_TIMEOUT_SECS,
            reconcile_interval_secs: DEFAULT_RECONCILE_INTERVAL_SECS,
            manager: ManagerSettings::default(),
        }
    }
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            pm2_path: PathBuf::from(DEFAULT_PM2_PATH),
            job_prefix: DEFAULT_JOB_PREFIX.to_string(),
            namespace: DEFAULT_PM2_NAMESPACE.to_string(),
            poll_interval_ms: DEFAULT_MANAGER_POLL_INTERVAL_MS,
        }
    }
}

impl SupervisorSettings {
    pub const fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    pub const fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    pub const fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    /// Command template carrying the configured ffmpeg path and log level.
    pub fn command_builder(&self) -> BroadcastCommandBuilder {
        BroadcastCommandBuilder::new(&self.ffmpeg_path).log_level(&self.ffmpeg_log_level)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.ffmpeg_path.as_os_str().is_empty() {
            return Err(SettingsError::EmptyPath("ffmpeg_path"));
        }
        if !FFMPEG_LOG_LEVELS.contains(&self.ffmpeg_log_level.as_str()) {
            return Err(SettingsError::InvalidLogLevel(
                self.ffmpeg_log_level.clone(),
            ));
        }
        if self.stop_timeout_secs == 0 {
            return Err(SettingsError::ZeroInterval("stop_timeout_secs"));
        }
        if self.reconcile_interval_secs == 0 {
            return Err(SettingsError::ZeroInterval("reconcile_interval_secs"));
        }
        if self.backend == BackendKind::Delegated {
            self.manager.validate()?;
        }
        Ok(())
    }
}

impl ManagerSettings {
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn naming(&self) -> Result<JobNaming, SettingsError> {
        Ok(JobNaming::new(self.job_prefix.clone())?)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.pm2_path.as_os_str().is_empty() {
            return Err(SettingsError::EmptyPath("pm2_path"));
        }
        if self.namespace.is_empty()
            || !self
                .namespace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
        {
            return Err(SettingsError::InvalidNamespace(self.namespace.clone()));
        }
        if self.poll_interval_ms == 0 {
            return Err(SettingsError::ZeroInterval("poll_interval_ms"));
        }
        self.naming().map(|_| ())
    }
}

/// Settings validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("{0} cannot be empty")]
    EmptyPath(&'static str),

    #[error("Unknown ffmpeg log level '{0}'")]
    InvalidLogLevel(String),

    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),

    #[error("Invalid pm2 namespace '{0}' (use letters, digits, '_' or '-')")]
    InvalidNamespace(String),

    #[error("Invalid job prefix: {0}")]
    InvalidPrefix(#[from] NamingError),
}
