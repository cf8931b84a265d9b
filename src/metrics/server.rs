//! HTTP server for the Prometheus metrics endpoint.

use super::{MetricsRegistry, MetricsSnapshot};
use crate::queue::DeviceState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

/// Errors that can occur during metrics server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen address could not be bound.
    #[error("failed to bind to address: {0}")]
    Bind(#[from] std::io::Error),

    /// The server stopped with an error.
    #[error("server error: {0}")]
    Server(String),
}

/// Configuration for the metrics server.
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    /// Address to bind the server to.
    pub bind_addr: SocketAddr,
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self::with_port(9090)
    }
}

impl MetricsServerConfig {
    /// Creates a config listening on all interfaces at `port`.
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], port).into(),
        }
    }
}

/// Registry plus the device state from the latest snapshot.
pub struct MetricsState {
    registry: MetricsRegistry,
    device_state: DeviceState,
}

impl MetricsState {
    /// Pushes a snapshot into the registry.
    pub fn update(&mut self, snapshot: &MetricsSnapshot) {
        self.registry.update(snapshot);
        self.device_state = snapshot.state;
    }
}

type SharedState = Arc<RwLock<MetricsState>>;

/// HTTP server exposing `/metrics`, `/health` and `/state`.
pub struct MetricsServer {
    config: MetricsServerConfig,
    state: SharedState,
}

impl MetricsServer {
    /// Creates a server around `registry`.
    pub fn new(config: MetricsServerConfig, registry: MetricsRegistry) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(MetricsState {
                registry,
                device_state: DeviceState::Closed,
            })),
        }
    }

    /// Returns the shared state, used by the capture loop to push snapshots.
    pub fn state(&self) -> SharedState {
        Arc::clone(&self.state)
    }

    /// Serves until `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .route("/state", get(state_handler))
            .layer(CorsLayer::permissive())
            .with_state(self.state);

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Metrics server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Server(e.to_string()))
    }
}

async fn metrics_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let state = state.read().await;

    match state.registry.encode() {
        Ok(output) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {}", e),
        ),
    }
}

/// Healthy while the device is open.
async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let device_state = state.read().await.device_state;
    if device_state.is_open() {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "device not open")
    }
}

async fn state_handler(State(state): State<SharedState>) -> impl IntoResponse {
    state.read().await.device_state.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = MetricsServerConfig::default();
        assert_eq!(config.bind_addr.port(), 9090);
    }

    #[test]
    fn test_state_tracks_snapshot() {
        let server = MetricsServer::new(
            MetricsServerConfig::with_port(0),
            MetricsRegistry::new().unwrap(),
        );
        let state = server.state();
        state.blocking_write().update(&MetricsSnapshot {
            state: DeviceState::Capturing,
            ..Default::default()
        });
        assert_eq!(state.blocking_read().device_state, DeviceState::Capturing);
    }
}
