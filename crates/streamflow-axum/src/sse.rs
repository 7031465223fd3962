//! SSE event broadcaster for real-time stream lifecycle updates.
//!
//! Implements the core `StreamEventEmitter` port so the supervisor can push
//! events to every connected web client.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::Stream;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use streamflow_core::{StreamEvent, StreamEventEmitter};

/// Events buffered per client before a slow client starts missing them.
pub const DEFAULT_SSE_CAPACITY: usize = 256;

/// Broadcast-channel backed SSE fan-out.
#[derive(Debug, Clone)]
pub struct SseBroadcaster {
    sender: broadcast::Sender<StreamEvent>,
}

impl SseBroadcaster {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_SSE_CAPACITY)
    }

    /// SSE response for a new client connection.
    ///
    /// Each event is sent as a JSON `data:` line and named after its type, so
    /// browsers can `addEventListener("stream_started", ...)`. A keep-alive
    /// ping goes out every 30 seconds.
    pub fn subscribe(
        self: Arc<Self>,
    ) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
        let receiver = self.sender.subscribe();
        let stream = BroadcastStream::new(receiver).filter_map(|result| match result {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => Some(Ok(Event::default().event(event.event_type()).data(json))),
                Err(e) => {
                    tracing::warn!("Failed to serialize stream event: {e}");
                    None
                }
            },
            Err(e) => {
                // Lagged receivers skip ahead rather than disconnect.
                tracing::debug!("SSE stream error: {e}");
                None
            }
        });

        Sse::new(stream).keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(30))
                .text("ping"),
        )
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SseBroadcaster {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl StreamEventEmitter for SseBroadcaster {
    fn emit(&self, event: StreamEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }
}
