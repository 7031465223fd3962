//! External process manager port (pm2 and look-alikes).

use std::ffi::OsString;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from the external process manager.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// The named job does not exist. Stop and delete treat this as success.
    #[error("Managed job not found: {0}")]
    NotFound(String),

    #[error("Process manager command failed: {0}")]
    Command(String),

    #[error("Failed to parse process manager output: {0}")]
    Parse(String),

    #[error("Failed to run process manager: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything the manager needs to start one named job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedJobSpec {
    pub name: String,
    pub namespace: String,
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

/// Status reported by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagedStatus {
    Online,
    Launching,
    Stopping,
    Stopped,
    Errored,
    Other,
}

impl ManagedStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "online" => Self::Online,
            "launching" | "waiting restart" => Self::Launching,
            "stopping" => Self::Stopping,
            "stopped" => Self::Stopped,
            "errored" => Self::Errored,
            _ => Self::Other,
        }
    }

    /// Whether a process may still be running under this status.
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Online | Self::Launching | Self::Stopping)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Launching => "launching",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Errored => "errored",
            Self::Other => "unknown",
        }
    }
}

/// One entry of the manager's listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedJob {
    pub name: String,
    pub namespace: Option<String>,
    pub status: ManagedStatus,
    pub pid: Option<u32>,
    pub exit_code: Option<i32>,
}

/// Client for an external process manager.
#[async_trait]
pub trait ProcessManager: Send + Sync {
    async fn start(&self, spec: &ManagedJobSpec) -> Result<(), ManagerError>;

    async fn stop(&self, name: &str) -> Result<(), ManagerError>;

    /// Remove the job from the manager's table.
    async fn delete(&self, name: &str) -> Result<(), ManagerError>;

    async fn list(&self) -> Result<Vec<ManagedJob>, ManagerError>;
}
