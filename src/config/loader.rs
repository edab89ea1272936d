//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, applying identity overrides from the
//! environment, validating all parameters, and providing clear error
//! messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};

use super::{AppConfig, IdentityConfig};
use crate::domain::identity::Identity;
use crate::domain::subscription::SubscriptionRequest;
use crate::ports::transport::TransportKind;

/// Env var overriding `identity.principal`.
pub const PRINCIPAL_ENV: &str = "FEED_PRINCIPAL";
/// Env var overriding `identity.secret`.
pub const SECRET_ENV: &str = "FEED_SECRET";

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;
  let config = apply_identity_overrides(
    config,
    std::env::var(PRINCIPAL_ENV).ok(),
    std::env::var(SECRET_ENV).ok(),
  );

  validate_config(&config)?;
  Ok(config)
}

/// Parse TOML text without validating it.
///
/// # Errors
/// TOML syntax errors and missing required keys.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  toml::from_str(content).with_context(|| "Failed to parse config.toml")
}

/// Overlay environment-provided identity material on the file config.
pub fn apply_identity_overrides(
  mut config: AppConfig,
  principal: Option<String>,
  secret: Option<String>,
) -> AppConfig {
  if principal.is_none() && secret.is_none() {
    return config;
  }
  let identity = config.identity.get_or_insert_with(|| IdentityConfig {
    principal: String::new(),
    secret: String::new(),
  });
  if let Some(principal) = principal {
    identity.principal = principal;
  }
  if let Some(secret) = secret {
    identity.secret = secret;
  }
  config
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - The endpoint required by the selected transport
/// - Complete FIX session identifiers and identity material
/// - A usable subscription and poll interval
pub fn validate_config(config: &AppConfig) -> Result<()> {
  match config.feed.transport {
    TransportKind::Websocket => {
      let uri = config
        .coinbase
        .socket_connection_uri
        .as_deref()
        .unwrap_or_default();
      anyhow::ensure!(
        !uri.trim().is_empty(),
        "missing coinbase.socket_connection_uri"
      );
      anyhow::ensure!(
        uri.starts_with("ws://") || uri.starts_with("wss://"),
        "coinbase.socket_connection_uri must be a ws:// or wss:// URI, got {}",
        uri
      );
    }
    TransportKind::Fix => {
      let fix = config
        .fix
        .as_ref()
        .context("missing [fix] section for fix transport")?;
      anyhow::ensure!(!fix.host.trim().is_empty(), "fix.host must not be empty");
      anyhow::ensure!(fix.port > 0, "fix.port must be positive");
      anyhow::ensure!(
        !fix.sender_comp_id.is_empty(),
        "fix.sender_comp_id must not be empty"
      );
      anyhow::ensure!(
        !fix.target_comp_id.is_empty(),
        "fix.target_comp_id must not be empty"
      );
      anyhow::ensure!(
        fix.heartbeat_interval_secs > 0,
        "fix.heartbeat_interval_secs must be positive"
      );
      anyhow::ensure!(
        fix.logon_timeout_secs > 0,
        "fix.logon_timeout_secs must be positive"
      );

      let identity = config
        .identity
        .as_ref()
        .context("missing [identity] section for fix transport")?;
      anyhow::ensure!(
        !identity.principal.is_empty(),
        "identity.principal must not be empty (or set {})",
        PRINCIPAL_ENV
      );
      anyhow::ensure!(
        !identity.secret.is_empty(),
        "identity.secret must not be empty (or set {})",
        SECRET_ENV
      );
    }
  }

  subscription_request(config)?;

  anyhow::ensure!(
    config.shutdown.poll_interval_ms > 0,
    "shutdown.poll_interval_ms must be positive"
  );

  if config.metrics.enabled {
    config
      .metrics
      .bind_address
      .parse::<std::net::SocketAddr>()
      .with_context(|| {
        format!("Invalid metrics.bind_address: {}", config.metrics.bind_address)
      })?;
  }

  Ok(())
}

/// The subscription described by `[subscription]`.
///
/// # Errors
/// Empty channel or product set.
pub fn subscription_request(config: &AppConfig) -> Result<SubscriptionRequest> {
  SubscriptionRequest::new(
    config.subscription.channel.clone(),
    config.subscription.product_ids.clone(),
  )
  .context("Invalid [subscription] section")
}

/// Identity for the credential injector, if configured.
pub fn identity(config: &AppConfig) -> Option<Identity> {
  config
    .identity
    .as_ref()
    .filter(|id| !id.principal.is_empty())
    .map(|id| Identity::new(id.principal.clone(), id.secret.clone()))
}
