//! Connection lifecycle state machine.
//!
//! ```text
//! Idle → Connecting → Authenticating → Subscribing → Streaming → Closing → Closed
//!           │               │                │            │
//!           └───────────────┴────────────────┴────────────┴──→ Errored
//! ```
//!
//! `Closed` and `Errored` are terminal. There is no reconnect edge:
//! a session that errors stays errored and the process exits.

use super::error::FeedError;

/// Lifecycle state of a feed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Connecting,
    Authenticating,
    Subscribing,
    Streaming,
    Closing,
    Closed,
    Errored,
}

impl SessionState {
    /// Every state, in lifecycle order.
    pub const ALL: [Self; 8] = [
        Self::Idle,
        Self::Connecting,
        Self::Authenticating,
        Self::Subscribing,
        Self::Streaming,
        Self::Closing,
        Self::Closed,
        Self::Errored,
    ];

    /// Whether `next` is a legal successor of `self`.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Connecting)
                | (Self::Connecting, Self::Authenticating)
                | (Self::Authenticating, Self::Subscribing)
                | (Self::Subscribing, Self::Streaming)
                | (Self::Streaming, Self::Closing)
                | (Self::Closing, Self::Closed)
                | (
                    Self::Connecting
                        | Self::Authenticating
                        | Self::Subscribing
                        | Self::Streaming,
                    Self::Errored
                )
        )
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Errored)
    }

    /// Numeric code exported on the lifecycle gauge.
    pub const fn code(self) -> i64 {
        match self {
            Self::Idle => 0,
            Self::Connecting => 1,
            Self::Authenticating => 2,
            Self::Subscribing => 3,
            Self::Streaming => 4,
            Self::Closing => 5,
            Self::Closed => 6,
            Self::Errored => -1,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Subscribing => "subscribing",
            Self::Streaming => "streaming",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Tracks the current state and every state entered so far.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: SessionState,
    history: Vec<SessionState>,
}

impl Lifecycle {
    /// A fresh lifecycle in `Idle`.
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            history: vec![SessionState::Idle],
        }
    }

    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// States entered so far, starting with `Idle`.
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    /// Move to `next`, returning the state that was left.
    ///
    /// # Errors
    /// `IllegalTransition` if `next` is not a successor of the current
    /// state. The state is unchanged in that case.
    pub fn advance(&mut self, next: SessionState) -> Result<SessionState, FeedError> {
        if !self.state.can_transition_to(next) {
            return Err(FeedError::IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        let previous = self.state;
        self.state = next;
        self.history.push(next);
        Ok(previous)
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
