//! Domain layer - Feed session model.
//!
//! Pure types for the session core: lifecycle states, identity,
//! inbound frames, subscription requests and the FIX message model.
//! No I/O happens here; transports live in `crate::adapters`.

pub mod credentials;
pub mod error;
pub mod fix_message;
pub mod frame;
pub mod identity;
pub mod lifecycle;
pub mod subscription;

pub use credentials::{CredentialInjector, HandshakeMessage};
pub use error::FeedError;
pub use fix_message::FixMessage;
pub use frame::{FrameCategory, FramePayload, InboundFrame, SessionId};
pub use identity::Identity;
pub use lifecycle::{Lifecycle, SessionState};
pub use subscription::SubscriptionRequest;
