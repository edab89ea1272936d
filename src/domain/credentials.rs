//! Credential injection for outbound handshake messages.
//!
//! The injector only touches the message a transport identifies as its
//! logon. Every other outbound message passes through unchanged, and
//! transports without a logon message (publish/subscribe) get a no-op.

use super::fix_message::{FixMessage, msg_type, tags};
use super::identity::Identity;

/// An outbound message that may be a transport's handshake frame.
pub trait HandshakeMessage {
    /// Whether this message is the logon/handshake frame, judged by its
    /// type discriminator.
    fn is_handshake(&self) -> bool;

    /// Write the principal and secret into their designated fields.
    fn set_credentials(&mut self, principal: &str, secret: &str);

    /// Read back the credential fields, if both are present.
    fn credentials(&self) -> Option<(&str, &str)>;
}

/// FIX Logon (35=A) carries `Username (553)` and `Password (554)`.
impl HandshakeMessage for FixMessage {
    fn is_handshake(&self) -> bool {
        self.msg_type() == msg_type::LOGON
    }

    fn set_credentials(&mut self, principal: &str, secret: &str) {
        self.set(tags::USERNAME, principal);
        self.set(tags::PASSWORD, secret);
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        Some((self.get(tags::USERNAME)?, self.get(tags::PASSWORD)?))
    }
}

/// Publish/subscribe messages never carry credentials in-band.
impl HandshakeMessage for serde_json::Value {
    fn is_handshake(&self) -> bool {
        false
    }

    fn set_credentials(&mut self, _principal: &str, _secret: &str) {}

    fn credentials(&self) -> Option<(&str, &str)> {
        None
    }
}

/// Decorates outbound handshake messages with the session identity.
#[derive(Debug, Clone, Default)]
pub struct CredentialInjector {
    identity: Option<Identity>,
}

impl CredentialInjector {
    pub const fn new(identity: Option<Identity>) -> Self {
        Self { identity }
    }

    /// Inject credentials if `message` is a handshake frame.
    ///
    /// Returns `true` when the message was decorated.
    pub fn decorate<M: HandshakeMessage + ?Sized>(&self, message: &mut M) -> bool {
        if !message.is_handshake() {
            return false;
        }
        match &self.identity {
            Some(identity) => {
                message.set_credentials(identity.principal(), identity.secret());
                true
            }
            None => false,
        }
    }

    /// Recover the identity carried by a decorated message.
    pub fn extract<M: HandshakeMessage + ?Sized>(message: &M) -> Option<Identity> {
        message
            .credentials()
            .map(|(principal, secret)| Identity::new(principal, secret))
    }
}
