//! TLS context factory shared by both transports.
//!
//! rustls with the webpki root set, TLS 1.2 minimum. No custom
//! certificate validation.

use std::sync::Arc;

use rustls::ClientConfig;
use rustls::crypto::ring;

use crate::domain::error::FeedError;

/// Install `ring` as the process-wide rustls provider.
///
/// tungstenite builds its own `ClientConfig` for `wss://` when no
/// connector is given; this keeps provider selection unambiguous.
/// Safe to call more than once.
pub fn install_crypto_provider() {
    let _ = ring::default_provider().install_default();
}

/// Client TLS configuration for outbound feed connections.
pub fn client_config() -> Result<Arc<ClientConfig>, FeedError> {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = ClientConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_protocol_versions(&[&rustls::version::TLS13, &rustls::version::TLS12])
        .map_err(|e| FeedError::Tls(e.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(Arc::new(config))
}
