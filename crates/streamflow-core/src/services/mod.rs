//! Application services.

mod stream_supervisor;

pub use stream_supervisor::{
    MISSING_PASSES_BEFORE_RETIRE, ReconcileReport, StopOutcome, StreamSupervisor, SupervisorDeps,
};
