//! In-memory backend and helpers shared by supervisor tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use streamflow_core::{
    BackendError, BackendKind, BroadcastBackend, BroadcastCommand, BroadcastCommandBuilder,
    ExitReport, JobControl, LaunchedJob, StreamEvent, StreamEventEmitter, StreamId,
    StreamSupervisor, SupervisorDeps,
};
use tokio::sync::oneshot;

#[derive(Default)]
pub struct FakeState {
    /// Live jobs; `None` sender means "live but not launched by us".
    live: Mutex<HashMap<StreamId, Option<oneshot::Sender<ExitReport>>>>,
    pub launches: AtomicUsize,
    pub terminations: AtomicUsize,
    pub fail_launch: AtomicBool,
    pub fail_listing: AtomicBool,
    pub ignore_terminate: AtomicBool,
    pub launch_delay: Mutex<Duration>,
}

impl FakeState {
    fn finish(&self, id: &StreamId, report: ExitReport) -> bool {
        let sender = self.live.lock().unwrap().remove(id);
        match sender {
            Some(Some(tx)) => {
                let _ = tx.send(report);
                true
            }
            Some(None) => true,
            None => false,
        }
    }
}

#[derive(Clone, Default)]
pub struct FakeBackend {
    pub state: Arc<FakeState>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the process exiting on its own.
    pub fn crash(&self, id: &StreamId, code: i32) -> bool {
        self.state.finish(id, ExitReport::exited(Some(code)))
    }

    /// Drop the job from the listing without ever reporting an exit.
    pub fn vanish(&self, id: &StreamId) {
        self.state.live.lock().unwrap().remove(id);
    }

    /// A live job this process never launched.
    pub fn plant_orphan(&self, id: StreamId) {
        self.state.live.lock().unwrap().insert(id, None);
    }

    pub fn is_live(&self, id: &StreamId) -> bool {
        self.state.live.lock().unwrap().contains_key(id)
    }

    pub fn launches(&self) -> usize {
        self.state.launches.load(Ordering::SeqCst)
    }

    pub fn terminations(&self) -> usize {
        self.state.terminations.load(Ordering::SeqCst)
    }

    fn register(&self, id: &StreamId) -> LaunchedJob {
        let (tx, rx) = oneshot::channel();
        self.state
            .live
            .lock()
            .unwrap()
            .insert(id.clone(), Some(tx));
        LaunchedJob::new(
            Box::new(FakeControl {
                id: id.clone(),
                state: Arc::clone(&self.state),
            }),
            rx,
        )
    }
}

struct FakeControl {
    id: StreamId,
    state: Arc<FakeState>,
}

#[async_trait]
impl JobControl for FakeControl {
    fn describe(&self) -> String {
        format!("fake:{}", self.id)
    }

    async fn terminate(&self) -> Result<(), BackendError> {
        self.state.terminations.fetch_add(1, Ordering::SeqCst);
        if !self.state.ignore_terminate.load(Ordering::SeqCst) {
            self.state.finish(&self.id, ExitReport::killed(Some(9)));
        }
        Ok(())
    }
}

#[async_trait]
impl BroadcastBackend for FakeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Direct
    }

    async fn launch(
        &self,
        id: &StreamId,
        _command: BroadcastCommand,
    ) -> Result<LaunchedJob, BackendError> {
        let delay = *self.state.launch_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.state.launches.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_launch.load(Ordering::SeqCst) {
            return Err(BackendError::Spawn("ffmpeg: not found".into()));
        }
        Ok(self.register(id))
    }

    async fn list_live(&self) -> Result<Vec<StreamId>, BackendError> {
        if self.state.fail_listing.load(Ordering::SeqCst) {
            return Err(BackendError::Unsupported("listing offline".into()));
        }
        Ok(self.state.live.lock().unwrap().keys().cloned().collect())
    }

    async fn adopt(&self, id: &StreamId) -> Result<LaunchedJob, BackendError> {
        if !self.is_live(id) {
            return Err(BackendError::NotRunning(id.to_string()));
        }
        Ok(self.register(id))
    }
}

/// Collects every emitted event.
#[derive(Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<StreamEvent>>,
}

impl RecordingEmitter {
    pub fn events(&self) -> Vec<StreamEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event_type: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .count()
    }
}

impl StreamEventEmitter for RecordingEmitter {
    fn emit(&self, event: StreamEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub struct Harness {
    pub supervisor: StreamSupervisor,
    pub backend: FakeBackend,
    pub events: Arc<RecordingEmitter>,
    pub source: tempfile::NamedTempFile,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_stop_timeout(Duration::from_secs(30))
    }

    pub fn with_stop_timeout(stop_timeout: Duration) -> Self {
        let backend = FakeBackend::new();
        let events = Arc::new(RecordingEmitter::default());
        let deps = SupervisorDeps::new(
            Arc::new(backend.clone()),
            BroadcastCommandBuilder::new("ffmpeg"),
        )
        .with_events(events.clone())
        .with_stop_timeout(stop_timeout);
        Self {
            supervisor: StreamSupervisor::new(deps),
            backend,
            events,
            source: tempfile::NamedTempFile::new().unwrap(),
        }
    }

    pub fn request(&self) -> streamflow_core::BroadcastRequest {
        streamflow_core::BroadcastRequest::new(self.source.path())
            .with_destination(streamflow_core::Destination::youtube("yt-key"))
    }
}

/// Poll `check` until it holds or a second passes.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}
