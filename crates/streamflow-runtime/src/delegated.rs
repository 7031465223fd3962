//! Delegated backend: broadcasts run under an external process manager.
//!
//! Jobs are named `prefix + stream id` and tagged with a namespace. The
//! manager is eventually consistent, so exits are observed by one shared
//! poll loop that compares the manager's listing against the jobs we are
//! watching and fires each job's exit channel once it is no longer live.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use streamflow_core::{
    BackendError, BackendKind, BroadcastBackend, BroadcastCommand, ExitReport, JobControl,
    JobNaming, LaunchedJob, ManagedJob, ManagedJobSpec, ManagerError, ProcessManager, StreamId,
};

/// Broadcasts started and stopped through a [`ProcessManager`].
pub struct DelegatedBackend {
    shared: Arc<Shared>,
    poller_started: AtomicBool,
    shutdown: CancellationToken,
}

struct Shared {
    manager: Arc<dyn ProcessManager>,
    naming: JobNaming,
    namespace: String,
    poll_interval: Duration,
    watchers: Mutex<HashMap<StreamId, Watcher>>,
}

struct Watcher {
    name: String,
    registered_at: Instant,
    exit: oneshot::Sender<ExitReport>,
}

impl DelegatedBackend {
    pub fn new(
        manager: Arc<dyn ProcessManager>,
        naming: JobNaming,
        namespace: impl Into<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                manager,
                naming,
                namespace: namespace.into(),
                poll_interval,
                watchers: Mutex::new(HashMap::new()),
            }),
            poller_started: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    /// Number of jobs whose exit is being watched.
    pub fn watching(&self) -> usize {
        self.shared.watchers().len()
    }

    fn ensure_poller(&self) {
        if !self.poller_started.swap(true, Ordering::AcqRel) {
            tokio::spawn(poll_exits(Arc::clone(&self.shared), self.shutdown.clone()));
        }
    }

    fn watch(&self, id: &StreamId, name: String) -> LaunchedJob {
        let (exit_tx, exit_rx) = oneshot::channel();
        self.shared.watchers().insert(
            id.clone(),
            Watcher {
                name: name.clone(),
                registered_at: Instant::now(),
                exit: exit_tx,
            },
        );
        self.ensure_poller();
        LaunchedJob::new(
            Box::new(ManagedControl {
                manager: Arc::clone(&self.shared.manager),
                name,
            }),
            exit_rx,
        )
    }
}

impl Drop for DelegatedBackend {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl Shared {
    fn watchers(&self) -> std::sync::MutexGuard<'_, HashMap<StreamId, Watcher>> {
        self.watchers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a listed job belongs to this service.
    fn owns(&self, job: &ManagedJob) -> Option<StreamId> {
        let namespace_ok = job
            .namespace
            .as_deref()
            .is_none_or(|ns| ns == self.namespace);
        if namespace_ok {
            self.naming.parse(&job.name)
        } else {
            None
        }
    }

    async fn live_jobs(&self) -> Result<HashMap<StreamId, ManagedJob>, ManagerError> {
        Ok(self
            .manager
            .list()
            .await?
            .into_iter()
            .filter_map(|job| self.owns(&job).map(|id| (id, job)))
            .collect())
    }
}

#[async_trait]
impl BroadcastBackend for DelegatedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Delegated
    }

    async fn launch(
        &self,
        id: &StreamId,
        command: BroadcastCommand,
    ) -> Result<LaunchedJob, BackendError> {
        let name = self.shared.naming.external_name(id);
        let (program, args) = command.into_parts();
        let spec = ManagedJobSpec {
            name: name.clone(),
            namespace: self.shared.namespace.clone(),
            program,
            args,
        };

        if let Err(err) = self.shared.manager.start(&spec).await {
            // pm2 may have registered the name before failing.
            if let Err(cleanup) = self.shared.manager.delete(&name).await {
                if !matches!(cleanup, ManagerError::NotFound(_)) {
                    debug!(%name, error = %cleanup, "Cleanup after failed start also failed");
                }
            }
            return Err(BackendError::Manager(err));
        }

        info!(stream_id = %id, %name, "Started managed broadcast");
        Ok(self.watch(id, name))
    }

    async fn list_live(&self) -> Result<Vec<StreamId>, BackendError> {
        Ok(self
            .shared
            .live_jobs()
            .await?
            .into_iter()
            .filter(|(_, job)| job.status.is_live())
            .map(|(id, _)| id)
            .collect())
    }

    async fn adopt(&self, id: &StreamId) -> Result<LaunchedJob, BackendError> {
        let live = self.shared.live_jobs().await?;
        let Some(job) = live.get(id).filter(|job| job.status.is_live()) else {
            return Err(BackendError::NotRunning(id.to_string()));
        };
        debug!(stream_id = %id, name = %job.name, pid = ?job.pid, "Watching adopted job");
        Ok(self.watch(id, job.name.clone()))
    }
}

struct ManagedControl {
    manager: Arc<dyn ProcessManager>,
    name: String,
}

#[async_trait]
impl JobControl for ManagedControl {
    fn describe(&self) -> String {
        format!("pm2:{}", self.name)
    }

    async fn terminate(&self) -> Result<(), BackendError> {
        match self.manager.stop(&self.name).await {
            Ok(()) | Err(ManagerError::NotFound(_)) => Ok(()),
            Err(err) => Err(BackendError::Manager(err)),
        }
    }
}

/// Shared exit poller. Runs until `shutdown` is cancelled.
async fn poll_exits(shared: Arc<Shared>, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(shared.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }
        if shared.watchers().is_empty() {
            continue;
        }

        // Watchers registered after this instant may not be in the listing yet.
        let listed_at = Instant::now();
        let live = match shared.live_jobs().await {
            Ok(live) => live,
            Err(err) => {
                warn!(error = %err, "Process manager listing failed; retrying next tick");
                continue;
            }
        };

        let finished: Vec<(StreamId, Watcher, ExitReport)> = {
            let mut watchers = shared.watchers();
            let done: Vec<(StreamId, ExitReport)> = watchers
                .iter()
                .filter(|(_, w)| w.registered_at < listed_at)
                .filter_map(|(id, _)| match live.get(id) {
                    Some(job) if job.status.is_live() => None,
                    Some(job) => {
                        let mut report = ExitReport::manager_stopped(job.status.as_str());
                        report.code = job.exit_code;
                        Some((id.clone(), report))
                    }
                    None => Some((id.clone(), ExitReport::manager_stopped("missing"))),
                })
                .collect();
            done.into_iter()
                .filter_map(|(id, report)| watchers.remove(&id).map(|w| (id, w, report)))
                .collect()
        };

        for (id, watcher, report) in finished {
            debug!(stream_id = %id, name = %watcher.name, ?report, "Managed job ended");
            let _ = watcher.exit.send(report);
            match shared.manager.delete(&watcher.name).await {
                Ok(()) | Err(ManagerError::NotFound(_)) => {}
                Err(err) => warn!(name = %watcher.name, error = %err, "Failed to delete finished job"),
            }
        }
    }
    debug!("Managed job poller stopped");
}
