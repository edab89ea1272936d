//! Configuration Module - TOML-based Feed Handler Configuration
//!
//! Loads and validates configuration from `config.toml` (or the path
//! given as the first CLI argument). Endpoints, session identifiers and
//! identity material are externalized here; nothing is hardcoded in the
//! domain layer.

pub mod loader;

use std::time::Duration;

use serde::Deserialize;

use crate::adapters::feeds::FixSessionConfig;
use crate::ports::transport::TransportKind;

/// Top-level feed handler configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Process identity and transport selection.
  pub feed: FeedConfig,
  /// Publish/subscribe endpoint.
  #[serde(default)]
  pub coinbase: CoinbaseConfig,
  /// Session-oriented endpoint.
  pub fix: Option<FixConfig>,
  /// Credentials injected into the logon.
  pub identity: Option<IdentityConfig>,
  #[serde(default)]
  pub subscription: SubscriptionConfig,
  #[serde(default)]
  pub shutdown: ShutdownConfig,
  #[serde(default)]
  pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
  /// Human-readable process name, logged at startup.
  #[serde(default = "default_name")]
  pub name: String,
  /// Which transport to run.
  pub transport: TransportKind,
  /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins.
  #[serde(default = "default_log_level")]
  pub log_level: String,
  #[serde(default)]
  pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
  /// Structured JSON lines.
  #[default]
  Json,
  /// Human-readable output for local runs.
  Pretty,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoinbaseConfig {
  /// WebSocket feed URI, e.g. `wss://ws-feed.exchange.coinbase.com`.
  pub socket_connection_uri: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixConfig {
  pub host: String,
  pub port: u16,
  /// Wrap the TCP connection in TLS.
  #[serde(default = "default_true")]
  pub tls: bool,
  #[serde(default = "default_begin_string")]
  pub begin_string: String,
  pub sender_comp_id: String,
  pub target_comp_id: String,
  #[serde(default = "default_heartbeat_interval")]
  pub heartbeat_interval_secs: u64,
  /// How long to wait for the Logon acknowledgement.
  #[serde(default = "default_logon_timeout")]
  pub logon_timeout_secs: u64,
  #[serde(default = "default_true")]
  pub reset_seq_num: bool,
}

impl FixConfig {
  /// Session parameters for the FIX transport.
  pub fn session_config(&self) -> FixSessionConfig {
    FixSessionConfig {
      host: self.host.clone(),
      port: self.port,
      tls: self.tls,
      begin_string: self.begin_string.clone(),
      sender_comp_id: self.sender_comp_id.clone(),
      target_comp_id: self.target_comp_id.clone(),
      heartbeat_interval: Duration::from_secs(self.heartbeat_interval_secs),
      logon_timeout: Duration::from_secs(self.logon_timeout_secs),
      reset_seq_num: self.reset_seq_num,
    }
  }
}

/// Identity material. Either field may be overridden from the environment.
#[derive(Clone, Deserialize)]
pub struct IdentityConfig {
  #[serde(default)]
  pub principal: String,
  #[serde(default)]
  pub secret: String,
}

impl std::fmt::Debug for IdentityConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("IdentityConfig")
      .field("principal", &self.principal)
      .field("secret", &"<redacted>")
      .finish()
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionConfig {
  #[serde(default = "default_channel")]
  pub channel: String,
  #[serde(default = "default_product_ids")]
  pub product_ids: Vec<String>,
}

impl Default for SubscriptionConfig {
  fn default() -> Self {
    Self {
      channel: default_channel(),
      product_ids: default_product_ids(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShutdownConfig {
  /// Main loop poll interval for the stop flag (milliseconds).
  #[serde(default = "default_poll_interval")]
  pub poll_interval_ms: u64,
}

impl Default for ShutdownConfig {
  fn default() -> Self {
    Self {
      poll_interval_ms: default_poll_interval(),
    }
  }
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Serve `/metrics`, `/live` and `/ready`.
  #[serde(default)]
  pub enabled: bool,
  /// Metrics server bind address.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: false,
      bind_address: default_metrics_addr(),
    }
  }
}

// Default value functions for serde

fn default_name() -> String {
  "md-feed-handler".to_string()
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_true() -> bool {
  true
}

fn default_begin_string() -> String {
  "FIX.4.2".to_string()
}

fn default_heartbeat_interval() -> u64 {
  30
}

fn default_logon_timeout() -> u64 {
  10
}

fn default_channel() -> String {
  "ticker".to_string()
}

fn default_product_ids() -> Vec<String> {
  vec!["BTC-USD".to_string()]
}

fn default_poll_interval() -> u64 {
  1000
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}
