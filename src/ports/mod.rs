//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the session core requires
//! from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `FeedTransport`: Connect, logon, subscribe, receive, close
//! - `EventSink`: Downstream consumer of classified events

pub mod event_sink;
pub mod transport;

pub use event_sink::{EventBody, EventSink, FeedEvent};
pub use transport::{FeedTransport, TransportEvent, TransportKind};
