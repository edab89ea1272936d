//! Message Classifier - Category Routing for Inbound Frames
//!
//! Routes each inbound frame through an explicit handler table keyed
//! by `FrameCategory`. Routing only: payloads are opaque past the
//! category boundary (no price/size extraction, no book updates).
//!
//! Publish/subscribe text frames are decoded to JSON first. A decode
//! failure is logged and the frame dropped; it never ends the session.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::adapters::metrics::FeedMetrics;
use crate::domain::frame::{FrameCategory, FramePayload, InboundFrame};
use crate::domain::lifecycle::SessionState;
use crate::ports::event_sink::{EventBody, EventSink, FeedEvent};

/// Category → handler mapping.
#[derive(Clone, Default)]
pub struct HandlerTable {
  routes: HashMap<FrameCategory, Arc<dyn EventSink>>,
}

impl HandlerTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// Route `category` to `sink`, replacing any previous route.
  #[must_use]
  pub fn route(mut self, category: FrameCategory, sink: Arc<dyn EventSink>) -> Self {
    self.routes.insert(category, sink);
    self
  }

  pub fn get(&self, category: FrameCategory) -> Option<&Arc<dyn EventSink>> {
    self.routes.get(&category)
  }
}

/// Why a frame did not reach a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardReason {
  /// Text payload was not valid JSON.
  Decode(String),
  /// Application data before the session reached `Streaming`.
  NotStreaming(SessionState),
  /// No handler registered for the category.
  Unrouted,
}

impl DiscardReason {
  /// Metric label.
  pub const fn label(&self) -> &'static str {
    match self {
      Self::Decode(_) => "decode",
      Self::NotStreaming(_) => "not_streaming",
      Self::Unrouted => "unrouted",
    }
  }
}

/// Outcome of one `classify_and_dispatch` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
  Emitted(FrameCategory),
  Discarded(DiscardReason),
}

pub struct MessageClassifier {
  table: HandlerTable,
  metrics: Arc<FeedMetrics>,
}

impl MessageClassifier {
  pub const fn new(table: HandlerTable, metrics: Arc<FeedMetrics>) -> Self {
    Self { table, metrics }
  }

  /// Classify `frame` and hand it to the handler for its category.
  ///
  /// Administrative frames are dispatched in any state; application
  /// and message frames only while `state == Streaming`.
  pub fn classify_and_dispatch(&self, frame: InboundFrame, state: SessionState) -> Dispatch {
    let category = frame.category;

    if !category.is_control() && state != SessionState::Streaming {
      return self.discard(DiscardReason::NotStreaming(state), category);
    }

    let Some(handler) = self.table.get(category) else {
      return self.discard(DiscardReason::Unrouted, category);
    };

    let (raw, body) = match frame.payload {
      FramePayload::Fix(message) => (message.to_string(), EventBody::Fix(message)),
      FramePayload::Text(text) => match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(value) => (text, EventBody::Json(value)),
        Err(e) => {
          self.metrics.decode_errors.inc();
          warn!(
            session = %frame.session,
            error = %e,
            len = text.len(),
            "Parse error, frame discarded"
          );
          return self.discard(DiscardReason::Decode(e.to_string()), category);
        }
      },
    };

    handler.emit(FeedEvent {
      session: frame.session,
      category,
      raw,
      body,
      received_at: Utc::now(),
    });
    self.metrics.record_dispatch(category);
    Dispatch::Emitted(category)
  }

  fn discard(&self, reason: DiscardReason, category: FrameCategory) -> Dispatch {
    debug!(%category, reason = reason.label(), "Frame not dispatched");
    self.metrics.record_discard(reason.label());
    Dispatch::Discarded(reason)
  }
}
