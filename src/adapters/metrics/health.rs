//! Health and Metrics Server - Liveness, Readiness, Prometheus
//!
//! Exposes /live, /ready and /metrics via axum 0.7. Readiness follows
//! the session lifecycle: ready only while streaming.

use std::future::Future;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use super::prometheus::FeedMetrics;
use crate::domain::lifecycle::SessionState;

/// State shared with the HTTP handlers.
#[derive(Clone)]
struct HealthState {
    /// Lifecycle state published by the session.
    state_rx: watch::Receiver<SessionState>,
    /// Session metrics.
    metrics: Arc<FeedMetrics>,
}

/// Axum-based health check and metrics HTTP server.
pub struct HealthServer {
    state: HealthState,
    /// Bind address, e.g. `0.0.0.0:9090`.
    bind_address: String,
}

impl HealthServer {
    /// Create a new health server.
    pub fn new(
        state_rx: watch::Receiver<SessionState>,
        metrics: Arc<FeedMetrics>,
        bind_address: impl Into<String>,
    ) -> Self {
        Self {
            state: HealthState { state_rx, metrics },
            bind_address: bind_address.into(),
        }
    }

    /// Serve until `shutdown` resolves.
    #[instrument(skip(self, shutdown), fields(address = %self.bind_address))]
    pub async fn run<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = Router::new()
            .route("/live", get(Self::liveness))
            .route("/ready", get(Self::readiness))
            .route("/metrics", get(Self::metrics))
            .with_state(self.state);

        let listener = tokio::net::TcpListener::bind(&self.bind_address).await?;
        info!("Health server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }

    /// Liveness probe: always returns 200 if the process is running.
    async fn liveness() -> impl IntoResponse {
        (StatusCode::OK, "OK")
    }

    /// Readiness probe: returns 200 only while the session is streaming.
    async fn readiness(State(state): State<HealthState>) -> impl IntoResponse {
        let current = *state.state_rx.borrow();
        if current == SessionState::Streaming {
            (StatusCode::OK, "READY".to_string())
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, format!("NOT READY ({current})"))
        }
    }

    async fn metrics(State(state): State<HealthState>) -> impl IntoResponse {
        match state.metrics.render() {
            Ok(body) => (StatusCode::OK, body),
            Err(e) => {
                warn!(error = %e, "Failed to render metrics");
                (StatusCode::INTERNAL_SERVER_ERROR, String::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ready_status(state: &HealthState) -> StatusCode {
        HealthServer::readiness(State(state.clone()))
            .await
            .into_response()
            .status()
    }

    #[tokio::test]
    async fn test_ready_only_while_streaming() {
        let (tx, state_rx) = watch::channel(SessionState::Idle);
        let state = HealthState {
            state_rx,
            metrics: Arc::new(FeedMetrics::new().unwrap()),
        };

        for current in SessionState::ALL {
            tx.send(current).unwrap();
            let expected = if current == SessionState::Streaming {
                StatusCode::OK
            } else {
                StatusCode::SERVICE_UNAVAILABLE
            };
            assert_eq!(ready_status(&state).await, expected, "state {current}");
        }
    }

    #[tokio::test]
    async fn test_live_and_metrics_respond() {
        assert_eq!(
            HealthServer::liveness().await.into_response().status(),
            StatusCode::OK
        );

        let (_tx, state_rx) = watch::channel(SessionState::Streaming);
        let state = HealthState {
            state_rx,
            metrics: Arc::new(FeedMetrics::new().unwrap()),
        };
        let response = HealthServer::metrics(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
