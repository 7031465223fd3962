//! Stream supervisor - orchestrates broadcast job lifecycles.
//!
//! Start/stop/list go through here; the backend only runs processes and the
//! registry only stores state. One observer task per running job turns the
//! backend's exit report into `Terminated` + removal.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::command::BroadcastCommandBuilder;
use crate::domain::{BroadcastRequest, ExitReport, JobState, StreamId, StreamSnapshot};
use crate::events::StreamEvent;
use crate::ports::{
    BackendError, BackendKind, BroadcastBackend, LaunchedJob, NoopEmitter, StreamError,
    StreamEventEmitter,
};
use crate::registry::{BroadcastJob, StreamRegistry};
use crate::settings::DEFAULT_STOP_TIMEOUT_SECS;

/// Consecutive reconciliation passes a job may be missing from the backend
/// listing before it is retired.
pub const MISSING_PASSES_BEFORE_RETIRE: u32 = 2;

/// Result of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StopOutcome {
    /// Termination was dispatched; exit observation will finish the job.
    Stopping,
    /// Unknown id, or a stop is already in progress / done.
    AlreadyStopped,
}

/// What one reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    /// Backend listing failed; nothing was changed.
    pub skipped: bool,
    pub retired: Vec<StreamId>,
    pub reissued: Vec<StreamId>,
    pub adopted: Vec<StreamId>,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.retired.is_empty() && self.reissued.is_empty() && self.adopted.is_empty()
    }
}

/// Collaborators for [`StreamSupervisor`].
#[derive(Clone)]
pub struct SupervisorDeps {
    pub backend: Arc<dyn BroadcastBackend>,
    /// Template carrying ffmpeg path and log level.
    pub commands: BroadcastCommandBuilder,
    pub events: Arc<dyn StreamEventEmitter>,
    pub stop_timeout: Duration,
}

impl SupervisorDeps {
    pub fn new(backend: Arc<dyn BroadcastBackend>, commands: BroadcastCommandBuilder) -> Self {
        Self {
            backend,
            commands,
            events: Arc::new(NoopEmitter::new()),
            stop_timeout: Duration::from_secs(DEFAULT_STOP_TIMEOUT_SECS),
        }
    }

    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn StreamEventEmitter>) -> Self {
        self.events = events;
        self
    }

    #[must_use]
    pub const fn with_stop_timeout(mut self, stop_timeout: Duration) -> Self {
        self.stop_timeout = stop_timeout;
        self
    }
}

/// Cheaply cloneable handle; clones share one registry.
#[derive(Clone)]
pub struct StreamSupervisor {
    inner: Arc<Inner>,
}

struct Inner {
    registry: StreamRegistry,
    backend: Arc<dyn BroadcastBackend>,
    commands: BroadcastCommandBuilder,
    events: Arc<dyn StreamEventEmitter>,
    stop_timeout: Duration,
}

impl StreamSupervisor {
    pub fn new(deps: SupervisorDeps) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: StreamRegistry::new(),
                backend: deps.backend,
                commands: deps.commands,
                events: deps.events,
                stop_timeout: deps.stop_timeout,
            }),
        }
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.inner.backend.kind()
    }

    /// Launch a looped broadcast and return its id.
    ///
    /// Returns as soon as the backend accepted the job. Input problems are
    /// reported before any process is touched; a launch failure leaves no
    /// registry entry behind.
    pub async fn start(&self, request: BroadcastRequest) -> Result<StreamId, StreamError> {
        let BroadcastRequest {
            source_path,
            destinations,
        } = request;

        let command = self
            .inner
            .commands
            .clone()
            .source(&source_path)
            .destinations(destinations.iter().cloned())
            .build()?;
        check_source(&source_path).await?;

        let id = StreamId::generate();
        let job = Arc::new(BroadcastJob::new(id.clone(), source_path, destinations));
        let mut slot = job.lock_control().await;
        self.inner
            .registry
            .insert(Arc::clone(&job))
            .map_err(|e| StreamError::Internal(e.to_string()))?;

        info!(
            stream_id = %id,
            backend = %self.backend_kind(),
            command = %command.redacted(),
            "Starting broadcast"
        );

        let launched = match self.inner.backend.launch(&id, command).await {
            Ok(launched) => launched,
            Err(err) => {
                // Retired while still holding the slot, so a concurrent stop
                // finds nothing to stop.
                self.inner.registry.retire(&id);
                drop(slot);
                warn!(stream_id = %id, error = %err, "Broadcast failed to start");
                return Err(StreamError::Spawn(err.to_string()));
            }
        };

        let LaunchedJob { control, exit } = launched;
        debug!(stream_id = %id, handle = %control.describe(), "Broadcast accepted by backend");
        *slot = Some(control);

        if let Err(err) = job.transition(JobState::Running) {
            // Nothing but start touches a Starting job, so this means the
            // entry was retired underneath us.
            if let Some(control) = slot.as_ref() {
                if let Err(term_err) = control.terminate().await {
                    warn!(stream_id = %id, error = %term_err, "Terminate request failed");
                }
            }
            return Err(StreamError::Internal(err.to_string()));
        }
        self.spawn_observer(&job, exit);
        drop(slot);

        let platforms = job.destinations().iter().map(|d| d.platform).collect();
        self.inner.events.emit(StreamEvent::started(id.clone(), platforms));
        info!(stream_id = %id, "Broadcast running");
        Ok(id)
    }

    /// Request termination.
    ///
    /// Returns once the terminate request is dispatched, not after the
    /// process exits. Unknown ids and repeated stops report
    /// [`StopOutcome::AlreadyStopped`].
    pub async fn stop(&self, id: &StreamId) -> StopOutcome {
        let Some(job) = self.inner.registry.get(id) else {
            debug!(stream_id = %id, "Stop requested for unknown stream");
            return StopOutcome::AlreadyStopped;
        };

        // Waits out an in-flight launch.
        let slot = job.lock_control().await;
        if job.transition(JobState::Stopping).is_err() {
            debug!(stream_id = %id, state = %job.state(), "Stream already stopping or gone");
            return StopOutcome::AlreadyStopped;
        }
        job.mark_stopping();
        self.inner.events.emit(StreamEvent::stopping(id.clone()));

        match slot.as_ref() {
            Some(control) => {
                info!(stream_id = %id, handle = %control.describe(), "Stopping broadcast");
                if let Err(err) = control.terminate().await {
                    // Left to the reconciler: it re-issues or retires.
                    warn!(stream_id = %id, error = %err, "Terminate request failed");
                }
            }
            None => warn!(stream_id = %id, "Stopping stream without a control handle"),
        }
        StopOutcome::Stopping
    }

    /// Ids of streams that are starting or running, sorted.
    ///
    /// Combines the backend's live listing with the registry; ids being
    /// stopped are excluded. If the backend cannot be queried the registry
    /// view is returned.
    pub async fn list(&self) -> Vec<StreamId> {
        let jobs = self.inner.registry.entries();
        let mut ids: BTreeSet<StreamId> = BTreeSet::new();
        let mut stopping: HashSet<StreamId> = HashSet::new();
        for job in &jobs {
            match job.state() {
                JobState::Starting | JobState::Running => {
                    ids.insert(job.id().clone());
                }
                JobState::Stopping => {
                    stopping.insert(job.id().clone());
                }
                JobState::Terminated => {}
            }
        }

        match self.inner.backend.list_live().await {
            Ok(live) => ids.extend(live.into_iter().filter(|id| !stopping.contains(id))),
            Err(err) => warn!(error = %err, "Backend listing failed; returning registry view"),
        }
        ids.into_iter().collect()
    }

    /// Snapshot of one registered stream.
    pub fn get(&self, id: &StreamId) -> Option<StreamSnapshot> {
        self.inner.registry.get(id).map(|job| job.snapshot())
    }

    /// Snapshots of every registered stream, sorted by id.
    pub fn snapshots(&self) -> Vec<StreamSnapshot> {
        let mut snapshots: Vec<StreamSnapshot> = self
            .inner
            .registry
            .entries()
            .iter()
            .map(|job| job.snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.id.cmp(&b.id));
        snapshots
    }

    /// Number of registered jobs, in any state.
    pub fn registered(&self) -> usize {
        self.inner.registry.len()
    }

    /// Resolve once `id` is terminated and removed (immediately if unknown).
    pub async fn wait_terminated(&self, id: &StreamId) {
        let Some(job) = self.inner.registry.get(id) else {
            return;
        };
        let mut state = job.subscribe();
        let _ = state.wait_for(|s| s.is_terminal()).await;
    }

    /// Stop every registered job. Returns how many stop requests were sent.
    pub async fn stop_all(&self) -> usize {
        let mut stopped = 0;
        for job in self.inner.registry.entries() {
            if self.stop(job.id()).await == StopOutcome::Stopping {
                stopped += 1;
            }
        }
        stopped
    }

    /// One reconciliation pass between the registry and the backend.
    ///
    /// Retires jobs the backend lost track of, re-issues termination for
    /// jobs stuck stopping, and adopts live jobs unknown to the registry.
    pub async fn reconcile(&self) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let live: HashSet<StreamId> = match self.inner.backend.list_live().await {
            Ok(live) => live.into_iter().collect(),
            Err(err) => {
                warn!(error = %err, "Backend listing failed; skipping reconciliation");
                report.skipped = true;
                return report;
            }
        };

        for job in self.inner.registry.entries() {
            let id = job.id();
            let state = job.state();
            if !matches!(state, JobState::Running | JobState::Stopping) {
                continue;
            }

            if !live.contains(id) {
                let missed = job.record_missed_poll();
                if missed >= MISSING_PASSES_BEFORE_RETIRE {
                    job.abort_observer();
                    if self.finalize(id, ExitReport::vanished()) {
                        report.retired.push(id.clone());
                    }
                } else {
                    debug!(stream_id = %id, missed, "Stream missing from backend listing");
                }
                continue;
            }

            job.reset_missed_polls();
            let overdue = state == JobState::Stopping
                && job
                    .stopping_for()
                    .is_some_and(|elapsed| elapsed >= self.inner.stop_timeout);
            if overdue {
                let slot = job.lock_control().await;
                if let Some(control) = slot.as_ref() {
                    warn!(stream_id = %id, "Stream still live after stop timeout; terminating again");
                    if let Err(err) = control.terminate().await {
                        warn!(stream_id = %id, error = %err, "Repeated terminate failed");
                    }
                    job.mark_stopping();
                    report.reissued.push(id.clone());
                }
            }
        }

        let mut orphans: Vec<StreamId> = live
            .into_iter()
            .filter(|id| !self.inner.registry.contains(id))
            .collect();
        orphans.sort();
        for id in orphans {
            match self.adopt(&id).await {
                Ok(true) => report.adopted.push(id),
                Ok(false) => {}
                Err(BackendError::Unsupported(reason)) => {
                    debug!(stream_id = %id, %reason, "Untracked live job left alone");
                }
                Err(err) => warn!(stream_id = %id, error = %err, "Failed to adopt live job"),
            }
        }

        if !report.is_noop() {
            info!(
                retired = report.retired.len(),
                reissued = report.reissued.len(),
                adopted = report.adopted.len(),
                "Reconciliation changed registry"
            );
        }
        report
    }

    async fn adopt(&self, id: &StreamId) -> Result<bool, BackendError> {
        let job = Arc::new(BroadcastJob::adopted(id.clone()));
        let mut slot = job.lock_control().await;
        if self.inner.registry.insert(Arc::clone(&job)).is_err() {
            return Ok(false);
        }

        let LaunchedJob { control, exit } = match self.inner.backend.adopt(id).await {
            Ok(launched) => launched,
            Err(err) => {
                drop(slot);
                self.inner.registry.retire(id);
                return Err(err);
            }
        };
        info!(stream_id = %id, handle = %control.describe(), "Adopted live broadcast");
        *slot = Some(control);
        if job.transition(JobState::Running).is_err() {
            return Ok(false);
        }
        self.spawn_observer(&job, exit);
        drop(slot);
        self.inner.events.emit(StreamEvent::adopted(id.clone()));
        Ok(true)
    }

    fn spawn_observer(&self, job: &Arc<BroadcastJob>, exit: oneshot::Receiver<ExitReport>) {
        let supervisor = self.clone();
        let id = job.id().clone();
        let task = tokio::spawn(async move {
            match exit.await {
                Ok(report) => {
                    supervisor.finalize(&id, report);
                }
                Err(_) => {
                    warn!(stream_id = %id, "Exit channel closed without a report; leaving it to reconciliation");
                }
            }
        });
        job.set_observer(task.abort_handle());
    }

    /// Terminate and remove `id`. Returns `false` if someone else already did.
    fn finalize(&self, id: &StreamId, report: ExitReport) -> bool {
        let Some((_job, previous)) = self.inner.registry.retire(id) else {
            debug!(stream_id = %id, "Exit observed for already retired stream");
            return false;
        };

        let event = if previous == JobState::Stopping {
            info!(stream_id = %id, reason = ?report.reason, "Broadcast stopped");
            StreamEvent::stopped(id.clone(), report)
        } else {
            warn!(
                stream_id = %id,
                reason = ?report.reason,
                code = ?report.code,
                signal = ?report.signal,
                "Broadcast exited unexpectedly"
            );
            StreamEvent::exited(id.clone(), report)
        };
        self.inner.events.emit(event);
        true
    }
}

impl std::fmt::Debug for StreamSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSupervisor")
            .field("backend", &self.backend_kind())
            .field("registered", &self.registered())
            .finish()
    }
}

/// The source must be an existing, readable regular file.
async fn check_source(path: &Path) -> Result<(), StreamError> {
    let metadata = tokio::fs::metadata(path).await.map_err(|e| {
        StreamError::InvalidInput(format!("source media {}: {e}", path.display()))
    })?;
    if !metadata.is_file() {
        return Err(StreamError::InvalidInput(format!(
            "source media {} is not a regular file",
            path.display()
        )));
    }
    tokio::fs::File::open(path).await.map_err(|e| {
        StreamError::InvalidInput(format!("source media {} is not readable: {e}", path.display()))
    })?;
    Ok(())
}
