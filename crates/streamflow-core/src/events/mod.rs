//! Stream lifecycle events.
//!
//! Serialized with a `type` tag for SSE consumers:
//!
//! ```json
//! { "type": "stream_started", "streamId": "stream_…", "platforms": ["youtube"] }
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::{ExitReport, Platform, StreamId};

/// Lifecycle events emitted by the supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A broadcast was launched and is running.
    StreamStarted {
        #[serde(rename = "streamId")]
        stream_id: StreamId,
        platforms: Vec<Platform>,
    },

    /// Termination was requested.
    StreamStopping {
        #[serde(rename = "streamId")]
        stream_id: StreamId,
    },

    /// A job ended after a stop request.
    StreamStopped {
        #[serde(rename = "streamId")]
        stream_id: StreamId,
        exit: ExitReport,
    },

    /// A job ended without being asked to (crash, natural exit, vanished).
    StreamExited {
        #[serde(rename = "streamId")]
        stream_id: StreamId,
        exit: ExitReport,
    },

    /// A live job left by an earlier process was taken over.
    StreamAdopted {
        #[serde(rename = "streamId")]
        stream_id: StreamId,
    },
}

impl StreamEvent {
    pub const fn started(stream_id: StreamId, platforms: Vec<Platform>) -> Self {
        Self::StreamStarted {
            stream_id,
            platforms,
        }
    }

    pub const fn stopping(stream_id: StreamId) -> Self {
        Self::StreamStopping { stream_id }
    }

    pub const fn stopped(stream_id: StreamId, exit: ExitReport) -> Self {
        Self::StreamStopped { stream_id, exit }
    }

    pub const fn exited(stream_id: StreamId, exit: ExitReport) -> Self {
        Self::StreamExited { stream_id, exit }
    }

    pub const fn adopted(stream_id: StreamId) -> Self {
        Self::StreamAdopted { stream_id }
    }

    pub const fn stream_id(&self) -> &StreamId {
        match self {
            Self::StreamStarted { stream_id, .. }
            | Self::StreamStopping { stream_id }
            | Self::StreamStopped { stream_id, .. }
            | Self::StreamExited { stream_id, .. }
            | Self::StreamAdopted { stream_id } => stream_id,
        }
    }

    /// SSE event name.
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::StreamStarted { .. } => "stream_started",
            Self::StreamStopping { .. } => "stream_stopping",
            Self::StreamStopped { .. } => "stream_stopped",
            Self::StreamExited { .. } => "stream_exited",
            Self::StreamAdopted { .. } => "stream_adopted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_uses_type_tag_and_camel_case_id() {
        let id = StreamId::parse("stream_abc").unwrap();
        let json = serde_json::to_value(StreamEvent::started(id, vec![Platform::YouTube])).unwrap();
        assert_eq!(json["type"], "stream_started");
        assert_eq!(json["streamId"], "stream_abc");
        assert_eq!(json["platforms"][0], "youtube");
    }

    #[test]
    fn event_type_matches_serialized_tag() {
        let id = StreamId::generate();
        let events = [
            StreamEvent::started(id.clone(), vec![]),
            StreamEvent::stopping(id.clone()),
            StreamEvent::stopped(id.clone(), ExitReport::killed(Some(9))),
            StreamEvent::exited(id.clone(), ExitReport::exited(Some(1))),
            StreamEvent::adopted(id.clone()),
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], event.event_type());
            assert_eq!(event.stream_id(), &id);
        }
    }
}
