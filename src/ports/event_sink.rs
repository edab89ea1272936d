//! Event Sink Port - Downstream Consumer Interface
//!
//! Classified frames leave the core as `FeedEvent`s through an
//! `EventSink`. The classifier's handler table maps each frame
//! category to one sink.

use chrono::{DateTime, Utc};

use crate::domain::fix_message::FixMessage;
use crate::domain::frame::{FrameCategory, SessionId};

/// Structured payload of an emitted event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventBody {
  /// Session-oriented transport message, passed through untouched.
  Fix(FixMessage),
  /// Decoded publish/subscribe message.
  Json(serde_json::Value),
}

/// One normalized inbound protocol event.
#[derive(Debug, Clone)]
pub struct FeedEvent {
  /// Session that received the frame.
  pub session: SessionId,
  /// Category the classifier routed on.
  pub category: FrameCategory,
  /// Frame contents as received (JSON text, or pipe-delimited FIX).
  pub raw: String,
  /// Structured payload.
  pub body: EventBody,
  /// Local receive time.
  pub received_at: DateTime<Utc>,
}

/// Trait for downstream event consumers.
///
/// Called on the session's event-loop task; implementations must not
/// block. Events arrive in receive order.
pub trait EventSink: Send + Sync + 'static {
  /// Emit one classified event.
  fn emit(&self, event: FeedEvent);
}
