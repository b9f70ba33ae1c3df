use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use weft_core::config::GatewayConfig;
use weft_engine::ExecutionCoordinator;

use crate::routes;
use crate::state::AppState;

/// HTTP control-API server built on axum.
pub struct GatewayServer {
    config: GatewayConfig,
    coordinator: Arc<ExecutionCoordinator>,
}

/// Build the gateway router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(routes::health))
        .route("/api/workflows/execute", post(routes::execute))
        .route("/api/workflows/executions", get(routes::list))
        .route("/api/workflows/executions/{id}", get(routes::status))
        .route("/api/workflows/executions/{id}/pause", post(routes::pause))
        .route(
            "/api/workflows/executions/{id}/resume",
            post(routes::resume),
        )
        .route("/api/workflows/executions/{id}/stop", post(routes::stop))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, coordinator: Arc<ExecutionCoordinator>) -> Self {
        Self {
            config,
            coordinator,
        }
    }

    /// Run the gateway server until the cancellation token is triggered.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let state = Arc::new(AppState {
            config: self.config.clone(),
            coordinator: self.coordinator.clone(),
        });

        let app = router(state);

        let listener = TcpListener::bind(&self.config.bind).await?;
        info!(bind = %self.config.bind, "Gateway listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Gateway shut down");
        Ok(())
    }
}
