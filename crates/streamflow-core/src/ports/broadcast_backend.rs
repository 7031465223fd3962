//! Broadcast backend trait: where broadcast processes actually run.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use super::BackendError;
use crate::command::BroadcastCommand;
use crate::domain::{ExitReport, StreamId};

/// Which backend executes broadcasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// The supervisor owns ffmpeg child processes directly.
    #[default]
    Direct,
    /// Jobs are started and supervised by an external process manager.
    Delegated,
}

impl BackendKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Delegated => "delegated",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "delegated" | "pm2" => Ok(Self::Delegated),
            other => Err(format!(
                "unknown backend '{other}' (expected 'direct' or 'delegated')"
            )),
        }
    }
}

/// Exclusive control over one running job.
///
/// Owned by the job's registry entry; nothing else holds it.
#[async_trait]
pub trait JobControl: Send + Sync {
    /// Short description for logs (pid, external name).
    fn describe(&self) -> String;

    /// Forcefully end the job. Returns once the request is dispatched;
    /// the exit itself arrives on the job's exit channel. Terminating a job
    /// that already ended is not an error.
    async fn terminate(&self) -> Result<(), BackendError>;
}

/// A job the backend accepted, plus the channel its exit arrives on.
pub struct LaunchedJob {
    pub control: Box<dyn JobControl>,
    /// Fires exactly once when the job ends. Dropped without a value when
    /// the backend loses track of the job.
    pub exit: oneshot::Receiver<ExitReport>,
}

impl LaunchedJob {
    pub fn new(control: Box<dyn JobControl>, exit: oneshot::Receiver<ExitReport>) -> Self {
        Self { control, exit }
    }
}

impl fmt::Debug for LaunchedJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchedJob")
            .field("control", &self.control.describe())
            .finish_non_exhaustive()
    }
}

/// Strategy for running broadcast jobs.
///
/// Implementations: the direct subprocess backend and the pm2-delegated
/// backend in `streamflow-runtime`, plus test fakes.
#[async_trait]
pub trait BroadcastBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Start `command` as the job identified by `id`.
    ///
    /// Returns once the job was accepted (child spawned / manager replied);
    /// never waits for the broadcast itself.
    async fn launch(&self, id: &StreamId, command: BroadcastCommand)
    -> Result<LaunchedJob, BackendError>;

    /// Ids of jobs this backend currently considers alive.
    async fn list_live(&self) -> Result<Vec<StreamId>, BackendError>;

    /// Take control of a live job that was started by an earlier process.
    async fn adopt(&self, id: &StreamId) -> Result<LaunchedJob, BackendError> {
        Err(BackendError::Unsupported(format!(
            "{} backend cannot adopt {id}",
            self.kind()
        )))
    }
}
