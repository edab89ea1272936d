//! Feed Session - Connection Lifecycle Driver
//!
//! Drives one transport through the lifecycle:
//! 1. Connect (Idle → Connecting)
//! 2. Logon with injected credentials (→ Authenticating)
//! 3. One-shot subscription (→ Subscribing)
//! 4. Classify and dispatch inbound frames (→ Streaming)
//! 5. Close on shutdown flag or remote logout (→ Closing → Closed)
//!
//! Any transport failure moves the session to `Errored`, which is
//! terminal: there is no reconnect.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::classifier::MessageClassifier;
use super::shutdown::ShutdownFlag;
use super::subscription_trigger::SubscriptionTrigger;
use crate::adapters::metrics::FeedMetrics;
use crate::domain::credentials::CredentialInjector;
use crate::domain::error::FeedError;
use crate::domain::frame::SessionId;
use crate::domain::identity::Identity;
use crate::domain::lifecycle::{Lifecycle, SessionState};
use crate::domain::subscription::SubscriptionRequest;
use crate::ports::transport::{FeedTransport, TransportEvent};

/// Why a streaming session moved to `Closing`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseCause {
  /// The shutdown flag was observed.
  ShutdownRequested,
  /// The counterparty logged out or closed the connection.
  Remote(String),
}

/// Summary of a session that reached `Closed`.
#[derive(Debug, Clone)]
pub struct SessionReport {
  pub session: SessionId,
  pub final_state: SessionState,
  /// Every state entered, starting with `Idle`.
  pub history: Vec<SessionState>,
  pub cause: CloseCause,
}

/// One feed session over one transport.
pub struct FeedSession<T: FeedTransport> {
  id: SessionId,
  /// Exclusively owned for the session lifetime.
  transport: T,
  lifecycle: Lifecycle,
  injector: CredentialInjector,
  trigger: SubscriptionTrigger,
  classifier: MessageClassifier,
  shutdown: ShutdownFlag,
  state_tx: watch::Sender<SessionState>,
  metrics: Arc<FeedMetrics>,
}

impl<T: FeedTransport> FeedSession<T> {
  pub fn new(
    transport: T,
    identity: Option<Identity>,
    subscription: SubscriptionRequest,
    classifier: MessageClassifier,
    shutdown: ShutdownFlag,
    metrics: Arc<FeedMetrics>,
  ) -> Self {
    let (state_tx, _) = watch::channel(SessionState::Idle);
    metrics.record_state(SessionState::Idle);

    Self {
      id: Uuid::new_v4(),
      transport,
      lifecycle: Lifecycle::new(),
      injector: CredentialInjector::new(identity),
      trigger: SubscriptionTrigger::new(subscription),
      classifier,
      shutdown,
      state_tx,
      metrics,
    }
  }

  pub const fn id(&self) -> SessionId {
    self.id
  }

  pub const fn state(&self) -> SessionState {
    self.lifecycle.state()
  }

  /// Observe lifecycle transitions (health endpoint, tests).
  pub fn watch_state(&self) -> watch::Receiver<SessionState> {
    self.state_tx.subscribe()
  }

  /// Run the session to a terminal state.
  ///
  /// # Errors
  /// The transport error that moved the session to `Errored`.
  #[instrument(skip(self), name = "feed_session", fields(session = %self.id, transport = %self.transport.kind()))]
  pub async fn run(mut self) -> Result<SessionReport, FeedError> {
    self.advance(SessionState::Connecting)?;
    if let Err(e) = self.transport.connect(self.id).await {
      return Err(self.fail(e));
    }

    self.advance(SessionState::Authenticating)?;
    let handshake_frames = match self.transport.authenticate(&self.injector).await {
      Ok(frames) => frames,
      Err(e) => return Err(self.fail(e)),
    };
    for frame in handshake_frames {
      self.classifier
        .classify_and_dispatch(frame, self.lifecycle.state());
    }

    self.advance(SessionState::Subscribing)?;
    if let Err(e) = self.trigger.on_connected(&mut self.transport).await {
      return Err(self.fail(e));
    }
    self.metrics.subscriptions_sent.inc();

    self.advance(SessionState::Streaming)?;
    let cause = match self.stream().await {
      Ok(cause) => cause,
      Err(e) => return Err(self.fail(e)),
    };

    self.advance(SessionState::Closing)?;
    if let Err(e) = self.transport.close().await {
      warn!(error = %e, "Transport did not close cleanly");
    }
    self.advance(SessionState::Closed)?;

    info!(?cause, "Shutdown completed");
    Ok(SessionReport {
      session: self.id,
      final_state: self.lifecycle.state(),
      history: self.lifecycle.history().to_vec(),
      cause,
    })
  }

  /// Dispatch inbound frames until shutdown or remote close.
  ///
  /// The shutdown check is biased first but only runs between frames,
  /// so a dispatch in progress always completes.
  async fn stream(&mut self) -> Result<CloseCause, FeedError> {
    loop {
      if self.shutdown.is_stopping() {
        return Ok(CloseCause::ShutdownRequested);
      }

      let event = tokio::select! {
        biased;
        () = self.shutdown.stopped() => return Ok(CloseCause::ShutdownRequested),
        event = self.transport.next_event() => event?,
      };

      match event {
        TransportEvent::Frame(frame) => {
          self.classifier
            .classify_and_dispatch(frame, self.lifecycle.state());
        }
        TransportEvent::Closed { reason } => {
          info!(reason = %reason, "Counterparty closed the session");
          return Ok(CloseCause::Remote(reason));
        }
      }
    }
  }

  fn advance(&mut self, next: SessionState) -> Result<(), FeedError> {
    let previous = self.lifecycle.advance(next)?;
    self.metrics.record_state(next);
    self.state_tx.send_replace(next);
    info!(from = %previous, to = %next, "Lifecycle transition");
    Ok(())
  }

  fn fail(&mut self, error: FeedError) -> FeedError {
    error!(error = %error, state = %self.lifecycle.state(), "Session failed");
    if let Err(e) = self.advance(SessionState::Errored) {
      warn!(error = %e, "Could not record Errored state");
    }
    error
  }
}
