//! Stream registry: the supervisor's single source of truth.
//!
//! The map is guarded by a `RwLock` held only for the duration of one map
//! operation. Each entry carries its own `watch` cell for lifecycle state, so
//! transitions on one id are totally ordered and observable without touching
//! the map lock.
//!
//! Lock order: an entry's state cell may take the map lock (see
//! [`StreamRegistry::retire`]); the map lock never takes a state cell.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, watch};
use tokio::task::AbortHandle;

use crate::domain::{Destination, InvalidTransition, JobState, StreamId, StreamSnapshot};
use crate::ports::JobControl;

/// Exclusive slot for a job's control handle.
///
/// Held across `launch` so a concurrent stop waits for the launch to settle.
pub type ControlSlot = OwnedMutexGuard<Option<Box<dyn JobControl>>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("stream {0} is already registered")]
pub struct DuplicateStream(pub StreamId);

/// One broadcast job entry.
pub struct BroadcastJob {
    id: StreamId,
    source_path: Option<PathBuf>,
    destinations: Vec<Destination>,
    started_at: DateTime<Utc>,
    adopted: bool,
    state: watch::Sender<JobState>,
    control: Arc<AsyncMutex<Option<Box<dyn JobControl>>>>,
    observer: Mutex<Option<AbortHandle>>,
    stopping_since: Mutex<Option<Instant>>,
    missed_polls: AtomicU32,
}

impl BroadcastJob {
    /// A job launched by this process.
    pub fn new(id: StreamId, source_path: PathBuf, destinations: Vec<Destination>) -> Self {
        Self::build(id, Some(source_path), destinations, false)
    }

    /// A live job found in the backend that nobody in this process started.
    pub fn adopted(id: StreamId) -> Self {
        Self::build(id, None, Vec::new(), true)
    }

    fn build(
        id: StreamId,
        source_path: Option<PathBuf>,
        destinations: Vec<Destination>,
        adopted: bool,
    ) -> Self {
        let (state, _) = watch::channel(JobState::Starting);
        Self {
            id,
            source_path,
            destinations,
            started_at: Utc::now(),
            adopted,
            state,
            control: Arc::new(AsyncMutex::new(None)),
            observer: Mutex::new(None),
            stopping_since: Mutex::new(None),
            missed_polls: AtomicU32::new(0),
        }
    }

    pub const fn id(&self) -> &StreamId {
        &self.id
    }

    pub fn state(&self) -> JobState {
        *self.state.borrow()
    }

    pub fn destinations(&self) -> &[Destination] {
        &self.destinations
    }

    pub const fn is_adopted(&self) -> bool {
        self.adopted
    }

    pub fn snapshot(&self) -> StreamSnapshot {
        StreamSnapshot {
            id: self.id.clone(),
            state: self.state(),
            source_path: self.source_path.clone(),
            platforms: self.destinations.iter().map(|d| d.platform).collect(),
            started_at: self.started_at,
            adopted: self.adopted,
        }
    }

    /// Apply a validated transition. Returns the previous state.
    pub fn transition(&self, next: JobState) -> Result<JobState, InvalidTransition> {
        let mut outcome = Err(InvalidTransition {
            from: self.state(),
            to: next,
        });
        self.state.send_if_modified(|current| {
            if current.can_transition_to(next) {
                outcome = Ok(*current);
                *current = next;
                true
            } else {
                outcome = Err(InvalidTransition {
                    from: *current,
                    to: next,
                });
                false
            }
        });
        outcome
    }

    /// Watch lifecycle changes.
    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.state.subscribe()
    }

    /// Wait until the control slot is free and take it.
    pub async fn lock_control(&self) -> ControlSlot {
        Arc::clone(&self.control).lock_owned().await
    }

    pub fn set_observer(&self, handle: AbortHandle) {
        *self
            .observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Abort the exit observer, if one is attached.
    pub fn abort_observer(&self) {
        if let Some(handle) = self
            .observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }

    /// Start (or restart) the stop-timeout clock.
    pub fn mark_stopping(&self) {
        *self
            .stopping_since
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }

    /// Time since the last termination request.
    pub fn stopping_for(&self) -> Option<Duration> {
        self.stopping_since
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map(|since| since.elapsed())
    }

    /// Count a reconciliation pass that did not see this job. Returns the
    /// number of consecutive misses.
    pub fn record_missed_poll(&self) -> u32 {
        self.missed_polls.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn reset_missed_polls(&self) {
        self.missed_polls.store(0, Ordering::Release);
    }
}

impl std::fmt::Debug for BroadcastJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastJob")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("adopted", &self.adopted)
            .finish_non_exhaustive()
    }
}

/// Thread-safe `StreamId → BroadcastJob` map.
#[derive(Debug, Default)]
pub struct StreamRegistry {
    jobs: RwLock<HashMap<StreamId, Arc<BroadcastJob>>>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job. Fails if the id is taken.
    pub fn insert(&self, job: Arc<BroadcastJob>) -> Result<(), DuplicateStream> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        if jobs.contains_key(job.id()) {
            return Err(DuplicateStream(job.id().clone()));
        }
        jobs.insert(job.id().clone(), job);
        Ok(())
    }

    pub fn get(&self, id: &StreamId) -> Option<Arc<BroadcastJob>> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn contains(&self, id: &StreamId) -> bool {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// All entries at this instant.
    pub fn entries(&self) -> Vec<Arc<BroadcastJob>> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move a job to `Terminated` and drop it from the map.
    ///
    /// Exactly one caller per id gets `Some((job, previous_state))`; every
    /// other concurrent or later caller gets `None`. The entry is removed
    /// before state watchers are woken, so anyone who observes `Terminated`
    /// also observes the id gone from the registry.
    pub fn retire(&self, id: &StreamId) -> Option<(Arc<BroadcastJob>, JobState)> {
        let job = self.get(id)?;
        let mut previous = None;
        job.state.send_if_modified(|current| {
            if !current.can_transition_to(JobState::Terminated) {
                return false;
            }
            {
                let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
                if jobs.get(id).is_some_and(|entry| Arc::ptr_eq(entry, &job)) {
                    jobs.remove(id);
                }
            }
            previous = Some(*current);
            *current = JobState::Terminated;
            true
        });
        previous.map(|state| (job, state))
    }
}
