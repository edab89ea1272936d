//! Application Wiring - Config to Running Session
//!
//! Builds metrics, TLS context, the handler table and the selected
//! transport, then runs one `FeedSession` under the shutdown
//! coordinator. `main` only adds config loading, tracing and signals.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::adapters::feeds::{FixTransport, WsTransport, tls};
use crate::adapters::metrics::{FeedMetrics, HealthServer};
use crate::adapters::sinks::LogSink;
use crate::config::AppConfig;
use crate::config::loader;
use crate::domain::frame::FrameCategory;
use crate::domain::lifecycle::SessionState;
use crate::ports::transport::{FeedTransport, TransportKind};
use crate::usecases::classifier::{HandlerTable, MessageClassifier};
use crate::usecases::feed_session::{FeedSession, SessionReport};
use crate::usecases::shutdown::ShutdownCoordinator;

/// Process exit code for a session that reached `Closed`.
pub const EXIT_OK: u8 = 0;
/// Process exit code for config, connection or transport failure.
pub const EXIT_FAILURE: u8 = 1;

/// Log every category with its own label.
pub fn default_handlers() -> HandlerTable {
    HandlerTable::new()
        .route(FrameCategory::Admin, Arc::new(LogSink::new("ADMIN")))
        .route(FrameCategory::App, Arc::new(LogSink::new("APP")))
        .route(FrameCategory::Message, Arc::new(LogSink::new("MESSAGE")))
}

/// Run one session with the default log handlers.
///
/// # Errors
/// Setup failures and the transport error that ended the session.
pub async fn run(config: &AppConfig, coordinator: &ShutdownCoordinator) -> Result<SessionReport> {
    run_with_handlers(config, coordinator, default_handlers()).await
}

/// Run one session, dispatching classified frames through `handlers`.
///
/// # Errors
/// Setup failures and the transport error that ended the session.
pub async fn run_with_handlers(
    config: &AppConfig,
    coordinator: &ShutdownCoordinator,
    handlers: HandlerTable,
) -> Result<SessionReport> {
    let metrics = Arc::new(FeedMetrics::new().context("Failed to register metrics")?);
    let classifier = MessageClassifier::new(handlers, Arc::clone(&metrics));
    let subscription = loader::subscription_request(config)?;
    let identity = loader::identity(config);
    let tls = tls::client_config().context("Failed to build TLS context")?;

    match config.feed.transport {
        TransportKind::Websocket => {
            let uri = config
                .coinbase
                .socket_connection_uri
                .clone()
                .context("missing coinbase.socket_connection_uri")?;
            let transport = WsTransport::new(uri, tls);
            let session = FeedSession::new(
                transport,
                identity,
                subscription,
                classifier,
                coordinator.flag(),
                Arc::clone(&metrics),
            );
            drive(session, config, coordinator, metrics).await
        }
        TransportKind::Fix => {
            let fix = config
                .fix
                .as_ref()
                .context("missing [fix] section for fix transport")?;
            let transport = FixTransport::new(fix.session_config(), tls);
            let session = FeedSession::new(
                transport,
                identity,
                subscription,
                classifier,
                coordinator.flag(),
                Arc::clone(&metrics),
            );
            drive(session, config, coordinator, metrics).await
        }
    }
}

async fn drive<T>(
    session: FeedSession<T>,
    config: &AppConfig,
    coordinator: &ShutdownCoordinator,
    metrics: Arc<FeedMetrics>,
) -> Result<SessionReport>
where
    T: FeedTransport + 'static,
{
    let health = config
        .metrics
        .enabled
        .then(|| spawn_health(&session, config, coordinator, metrics));

    info!(session = %session.id(), transport = %config.feed.transport, "Session starting");
    let handle = tokio::spawn(session.run());
    let outcome = coordinator
        .supervise(handle)
        .await
        .context("Session task panicked")?;

    if let Some(health) = health {
        health.abort();
    }

    Ok(outcome?)
}

fn spawn_health<T: FeedTransport>(
    session: &FeedSession<T>,
    config: &AppConfig,
    coordinator: &ShutdownCoordinator,
    metrics: Arc<FeedMetrics>,
) -> JoinHandle<()> {
    let server = HealthServer::new(
        session.watch_state(),
        metrics,
        config.metrics.bind_address.clone(),
    );
    let flag = coordinator.flag();
    tokio::spawn(async move {
        if let Err(e) = server.run(async move { flag.stopped().await }).await {
            warn!(error = %e, "Health server failed");
        }
    })
}

/// Map the run outcome to a process exit code.
pub fn exit_status(result: &Result<SessionReport>) -> u8 {
    match result {
        Ok(report) if report.final_state == SessionState::Closed => EXIT_OK,
        _ => EXIT_FAILURE,
    }
}
