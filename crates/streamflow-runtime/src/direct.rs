//! Direct backend: ffmpeg runs as a child of this process.
//!
//! Each child is owned by one watch task. The job's [`JobControl`] only holds
//! a cancellation token; cancelling it makes the watch task kill and reap the
//! child, after which the exit report is sent.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use streamflow_core::{
    BackendError, BackendKind, BroadcastBackend, BroadcastCommand, ExitReport, JobControl,
    LaunchedJob, StreamId,
};

use crate::process::{exit_report, spawn_line_logger, terminate_child};

type LiveMap = Arc<Mutex<HashMap<StreamId, Option<u32>>>>;

/// Runs broadcasts as direct child processes.
#[derive(Debug, Default)]
pub struct DirectBackend {
    grace: Duration,
    live: LiveMap,
}

impl DirectBackend {
    /// `grace` = SIGTERM-to-SIGKILL delay on stop; zero kills immediately.
    pub fn new(grace: Duration) -> Self {
        Self {
            grace,
            live: Arc::default(),
        }
    }

    /// Number of children currently running.
    pub fn running(&self) -> usize {
        self.live.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl BroadcastBackend for DirectBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Direct
    }

    async fn launch(
        &self,
        id: &StreamId,
        command: BroadcastCommand,
    ) -> Result<LaunchedJob, BackendError> {
        let (program, args) = command.into_parts();
        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BackendError::Spawn(format!("{}: {e}", program.display())))?;

        let pid = child.id();
        info!(stream_id = %id, pid = ?pid, "Spawned broadcast process");
        if let Some(stderr) = child.stderr.take() {
            spawn_line_logger(id.clone(), stderr);
        }

        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), pid);

        let kill = CancellationToken::new();
        let (exit_tx, exit_rx) = oneshot::channel();
        tokio::spawn(watch_child(
            id.clone(),
            child,
            kill.clone(),
            self.grace,
            Arc::clone(&self.live),
            exit_tx,
        ));

        Ok(LaunchedJob::new(Box::new(DirectControl { pid, kill }), exit_rx))
    }

    async fn list_live(&self) -> Result<Vec<StreamId>, BackendError> {
        Ok(self
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect())
    }
}

struct DirectControl {
    pid: Option<u32>,
    kill: CancellationToken,
}

#[async_trait]
impl JobControl for DirectControl {
    fn describe(&self) -> String {
        self.pid
            .map_or_else(|| "pid unknown".to_string(), |pid| format!("pid {pid}"))
    }

    async fn terminate(&self) -> Result<(), BackendError> {
        self.kill.cancel();
        Ok(())
    }
}

/// Wait for the child to exit or for a kill request, then report.
async fn watch_child(
    id: StreamId,
    mut child: Child,
    kill: CancellationToken,
    grace: Duration,
    live: LiveMap,
    exit_tx: oneshot::Sender<ExitReport>,
) {
    let exited = tokio::select! {
        status = child.wait() => Some(status),
        () = kill.cancelled() => None,
    };
    let status = match exited {
        Some(status) => status,
        None => {
            debug!(stream_id = %id, ?grace, "Terminating broadcast process");
            terminate_child(&mut child, grace).await
        }
    };

    // Off the live list before the report goes out.
    live.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(&id);

    let report = match status {
        Ok(status) => exit_report(status),
        Err(e) => {
            warn!(stream_id = %id, error = %e, "Failed to reap broadcast process");
            ExitReport::unknown(e.to_string())
        }
    };
    debug!(stream_id = %id, ?report, "Broadcast process ended");
    let _ = exit_tx.send(report);
}
