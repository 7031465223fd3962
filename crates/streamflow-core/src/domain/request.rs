use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Destination, JobState, Platform, StreamId};

/// What to broadcast and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastRequest {
    pub source_path: PathBuf,
    pub destinations: Vec<Destination>,
}

impl BroadcastRequest {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            destinations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destinations.push(destination);
        self
    }
}

/// Point-in-time view of a registered job. Never carries ingest keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSnapshot {
    pub id: StreamId,
    pub state: JobState,
    /// `None` for jobs adopted from a previous process.
    pub source_path: Option<PathBuf>,
    pub platforms: Vec<Platform>,
    pub started_at: DateTime<Utc>,
    pub adopted: bool,
}
