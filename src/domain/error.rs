//! Feed error taxonomy.
//!
//! One enum covers the session core. Startup wiring wraps these in
//! `anyhow` with context; inside the session they drive the lifecycle
//! (transport errors → `Errored`, decode errors → frame discarded).

use thiserror::Error;

use super::lifecycle::SessionState;

#[derive(Debug, Error)]
pub enum FeedError {
    /// Transport could not be constructed or the initial connect failed.
    #[error("Connection init failed: {0}")]
    ConnectionInit(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Transport not connected")]
    NotConnected,

    #[error("Logon rejected by counterparty: {0}")]
    LogonRejected(String),

    #[error("No logon acknowledgement within {0}s")]
    LogonTimeout(u64),

    #[error("Failed to send subscription: {0}")]
    SubscriptionSend(String),

    #[error("Subscription already sent for this session")]
    AlreadySubscribed,

    #[error("Invalid subscription: {0}")]
    InvalidSubscription(String),

    /// A single inbound frame failed to parse. Recoverable.
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Illegal lifecycle transition {from} -> {to}")]
    IllegalTransition { from: SessionState, to: SessionState },

    #[error("TLS configuration error: {0}")]
    Tls(String),
}

impl From<serde_json::Error> for FeedError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}
