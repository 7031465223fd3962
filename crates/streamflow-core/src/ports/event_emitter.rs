//! Event emitter trait for stream lifecycle notifications.
//!
//! Implementations handle transport (SSE broadcast channel, logging, nothing).

use crate::events::StreamEvent;

/// Sink for [`StreamEvent`]s.
///
/// `emit` is called from supervisor paths that must not block; implementations
/// should hand the event off and return.
pub trait StreamEventEmitter: Send + Sync {
    fn emit(&self, event: StreamEvent);
}

/// Discards all events. Used by tests and the CLI `plan` path.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEmitter;

impl NoopEmitter {
    pub const fn new() -> Self {
        Self
    }
}

impl StreamEventEmitter for NoopEmitter {
    fn emit(&self, _event: StreamEvent) {}
}
