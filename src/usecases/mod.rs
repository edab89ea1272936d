//! Use Cases Layer - Session Core
//!
//! Orchestrates domain types with the transport and sink ports.
//!
//! Use cases:
//! - `FeedSession`: Connection lifecycle driver
//! - `MessageClassifier`: Category routing of inbound frames
//! - `SubscriptionTrigger`: One-shot subscription on open
//! - `ShutdownCoordinator`: Signals → cooperative stop

pub mod classifier;
pub mod feed_session;
pub mod shutdown;
pub mod subscription_trigger;

pub use classifier::{DiscardReason, Dispatch, HandlerTable, MessageClassifier};
pub use feed_session::{CloseCause, FeedSession, SessionReport};
pub use shutdown::{ShutdownCoordinator, ShutdownFlag};
pub use subscription_trigger::SubscriptionTrigger;
