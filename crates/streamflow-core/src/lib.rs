#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

pub mod command;
pub mod domain;
pub mod events;
pub mod ports;
pub mod registry;
pub mod services;
pub mod settings;

// Re-export commonly used types for convenience
pub use command::{
    BroadcastCommand, BroadcastCommandBuilder, CommandError, DEFAULT_FFMPEG_LOG_LEVEL,
};
pub use domain::{
    BroadcastRequest, DEFAULT_JOB_PREFIX, Destination, DestinationError, ExitReason, ExitReport,
    InvalidTransition, JobNaming, JobState, NamingError, Platform, StreamId, StreamIdError,
    StreamSnapshot,
};
pub use events::StreamEvent;
pub use ports::{
    BackendError, BackendKind, BroadcastBackend, JobControl, LaunchedJob, ManagedJob,
    ManagedJobSpec, ManagedStatus, ManagerError, NoopEmitter, ProcessManager, StreamError,
    StreamEventEmitter,
};
pub use registry::{BroadcastJob, DuplicateStream, StreamRegistry};
pub use services::{ReconcileReport, StopOutcome, StreamSupervisor, SupervisorDeps};
pub use settings::{ManagerSettings, SettingsError, SupervisorSettings};

#[cfg(test)]
use tempfile as _;
