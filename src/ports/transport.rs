//! Feed Transport Port - Shared Session Capability Set
//!
//! Both transports (FIX over TCP/TLS, WebSocket over TLS) implement
//! this trait so the connection lifecycle never depends on transport
//! details. The lifecycle drives the calls strictly in order:
//! `connect` → `authenticate` → `send_subscription` → `next_event`* → `close`.

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::credentials::CredentialInjector;
use crate::domain::error::FeedError;
use crate::domain::frame::{InboundFrame, SessionId};
use crate::domain::subscription::SubscriptionRequest;

/// Transport family, selected by `feed.transport` in config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
  /// Session-oriented tag-value protocol.
  Fix,
  /// Text-framed publish/subscribe protocol.
  #[serde(alias = "ws")]
  Websocket,
}

impl std::fmt::Display for TransportKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Fix => f.write_str("fix"),
      Self::Websocket => f.write_str("websocket"),
    }
  }
}

/// What the transport produced on its event loop.
#[derive(Debug)]
pub enum TransportEvent {
  /// One inbound protocol unit, ready for classification.
  Frame(InboundFrame),
  /// Counterparty logged out or closed the connection cleanly.
  Closed {
    /// Human-readable close reason, possibly empty.
    reason: String,
  },
}

/// Trait for feed transports.
///
/// Implementors own the underlying connection exclusively for the
/// lifetime of the session. Errors from `connect`, `authenticate`,
/// `send_subscription` and `next_event` are transport errors and end
/// the session; frame-level decode problems must be contained inside
/// the transport or surfaced as frames, never as `Err`.
#[async_trait]
pub trait FeedTransport: Send {
  /// Transport family.
  fn kind(&self) -> TransportKind;

  /// Open the connection (TCP/TLS or WebSocket handshake).
  ///
  /// Returns once the transport is open and ready for the logon step.
  async fn connect(&mut self, session: SessionId) -> Result<(), FeedError>;

  /// Run the logon handshake, decorating the outbound logon through
  /// `injector`.
  ///
  /// Returns the administrative frames received while waiting for the
  /// logon acknowledgement. Transports without a logon step return an
  /// empty vector immediately.
  async fn authenticate(
    &mut self,
    injector: &CredentialInjector,
  ) -> Result<Vec<InboundFrame>, FeedError>;

  /// Send the one-shot subscription request.
  async fn send_subscription(
    &mut self,
    request: &SubscriptionRequest,
  ) -> Result<(), FeedError>;

  /// Wait for the next inbound event.
  ///
  /// Must be cancel-safe: the lifecycle races it against shutdown.
  async fn next_event(&mut self) -> Result<TransportEvent, FeedError>;

  /// Tear the connection down (logout handshake where applicable).
  async fn close(&mut self) -> Result<(), FeedError>;
}
