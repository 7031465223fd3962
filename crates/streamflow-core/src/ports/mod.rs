//! Port definitions (trait abstractions) for external systems.
//!
//! The supervisor only talks to processes through these traits; the
//! runtime crate provides the OS and pm2 implementations.

pub mod broadcast_backend;
pub mod event_emitter;
pub mod process_manager;

use thiserror::Error;

use crate::command::CommandError;
use crate::domain::StreamId;

pub use broadcast_backend::{BackendKind, BroadcastBackend, JobControl, LaunchedJob};
pub use event_emitter::{NoopEmitter, StreamEventEmitter};
pub use process_manager::{
    ManagedJob, ManagedJobSpec, ManagedStatus, ManagerError, ProcessManager,
};

/// Errors surfaced by the stream supervisor.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Request rejected before any process was touched.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The backend could not launch the broadcast. No job was recorded.
    #[error("Failed to start broadcast: {0}")]
    Spawn(String),

    #[error("Stream not found: {0}")]
    NotFound(StreamId),

    /// The external process manager failed or is unreachable.
    #[error("Process manager error: {0}")]
    ExternalManager(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CommandError> for StreamError {
    fn from(err: CommandError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

/// Errors from a broadcast backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Failed to spawn: {0}")]
    Spawn(String),

    #[error("Job is not running: {0}")]
    NotRunning(String),

    #[error(transparent)]
    Manager(#[from] ManagerError),

    #[error("Not supported by this backend: {0}")]
    Unsupported(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<BackendError> for StreamError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Manager(e) => Self::ExternalManager(e.to_string()),
            BackendError::Spawn(msg) => Self::Spawn(msg),
            BackendError::Io(e) => Self::Spawn(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}
