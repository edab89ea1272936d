//! Event Sinks - Downstream Consumers for Classified Frames
//!
//! - `LogSink`: writes each event to the structured log
//! - `BroadcastSink`: fans events out over a tokio broadcast channel

use tokio::sync::broadcast;
use tracing::{info, trace};

use crate::ports::event_sink::{EventSink, FeedEvent};

/// Broadcast buffer; slow subscribers lag rather than block the session.
const BROADCAST_CAPACITY: usize = 4096;

/// Logs every event with a fixed label (`ADMIN`, `APP`, `MESSAGE`).
#[derive(Debug, Clone)]
pub struct LogSink {
    label: &'static str,
}

impl LogSink {
    pub const fn new(label: &'static str) -> Self {
        Self { label }
    }
}

impl EventSink for LogSink {
    fn emit(&self, event: FeedEvent) {
        info!(
            label = self.label,
            category = %event.category,
            session = %event.session,
            payload = %event.raw,
            "Handling message"
        );
    }
}

/// Publishes events to any number of in-process subscribers.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<FeedEvent>,
}

impl BroadcastSink {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, event: FeedEvent) {
        // No receivers is not an error; the event is simply dropped.
        if self.tx.send(event).is_err() {
            trace!("No broadcast subscribers");
        }
    }
}
