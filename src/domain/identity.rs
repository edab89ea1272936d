//! Session identity material.

/// Immutable `(principal, secret)` pair used to decorate the logon.
///
/// For Coinbase FIX the principal is the API key and the secret is the
/// API passphrase. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    principal: String,
    secret: String,
}

impl Identity {
    pub fn new(principal: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            secret: secret.into(),
        }
    }

    pub fn principal(&self) -> &str {
        &self.principal
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("principal", &self.principal)
            .field("secret", &"<redacted>")
            .finish()
    }
}
