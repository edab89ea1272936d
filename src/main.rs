//! Market Data Feed Handler — Entry Point
//!
//! Connects to one market-data endpoint (FIX or WebSocket), subscribes,
//! and logs classified frames until SIGINT/SIGTERM.
//!
//! Wiring sequence:
//! 1. Load config (path from argv[1], default `config.toml`) + validate
//! 2. Init tracing (JSON or pretty structured logging)
//! 3. Install the rustls crypto provider
//! 4. Install SIGINT/SIGTERM handling on the shutdown flag
//! 5. Run the session under the 1 s supervising poll loop
//! 6. Exit 0 on `Closed`, 1 on any failure

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::process::ExitCode;
use std::time::Duration;

use md_feed_handler::adapters::feeds::tls;
use md_feed_handler::app::{self, EXIT_FAILURE};
use md_feed_handler::config::loader::load_config;
use md_feed_handler::config::{FeedConfig, LogFormat};
use md_feed_handler::usecases::shutdown::ShutdownCoordinator;
use tracing::{error, info};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> ExitCode {
    // ── 1. Load configuration ───────────────────────────────
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = match load_config(&path) {
        Ok(config) => config,
        Err(e) => {
            // Tracing is not up yet; the config decides its format.
            eprintln!("Failed to load configuration: {e:#}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    // ── 2. Initialize structured logging ────────────────────
    init_tracing(&config.feed);

    info!(
        name = %config.feed.name,
        version = env!("CARGO_PKG_VERSION"),
        transport = %config.feed.transport,
        config = %path,
        "Starting market data feed handler"
    );

    // ── 3. TLS provider ─────────────────────────────────────
    tls::install_crypto_provider();

    // ── 4. Shutdown flag + signal listener ──────────────────
    let coordinator =
        ShutdownCoordinator::new(Duration::from_millis(config.shutdown.poll_interval_ms));
    let signals = coordinator.install();

    // ── 5. Run the session to a terminal state ──────────────
    let result = app::run(&config, &coordinator).await;
    signals.abort();

    match &result {
        Ok(report) => info!(
            session = %report.session,
            final_state = %report.final_state,
            cause = ?report.cause,
            "Feed handler stopped"
        ),
        Err(e) => error!(error = %format!("{e:#}"), "Feed handler failed"),
    }

    ExitCode::from(app::exit_status(&result))
}

fn init_tracing(feed: &FeedConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&feed.log_level));

    match feed.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .pretty()
            .init(),
    }
}
