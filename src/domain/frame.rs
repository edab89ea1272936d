//! Inbound frames: one received protocol unit, alive only for dispatch.

use uuid::Uuid;

use super::fix_message::FixMessage;

/// Identifies the session that produced a frame.
pub type SessionId = Uuid;

/// Closed set of inbound frame categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameCategory {
    /// Session layer: logon, logout, heartbeat, test request, reject.
    Admin,
    /// Application data on the session-oriented transport.
    App,
    /// Any text frame on the publish/subscribe transport.
    Message,
}

impl FrameCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::App => "app",
            Self::Message => "message",
        }
    }

    /// Frames that may be dispatched before the session is streaming.
    pub const fn is_control(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for FrameCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePayload {
    Fix(FixMessage),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    pub category: FrameCategory,
    pub payload: FramePayload,
    pub session: SessionId,
}

impl InboundFrame {
    /// Wrap a decoded FIX message, categorized by its `MsgType`.
    pub fn fix(message: FixMessage, session: SessionId) -> Self {
        let category = if message.is_admin() {
            FrameCategory::Admin
        } else {
            FrameCategory::App
        };
        Self {
            category,
            payload: FramePayload::Fix(message),
            session,
        }
    }

    pub fn text(text: impl Into<String>, session: SessionId) -> Self {
        Self {
            category: FrameCategory::Message,
            payload: FramePayload::Text(text.into()),
            session,
        }
    }
}
