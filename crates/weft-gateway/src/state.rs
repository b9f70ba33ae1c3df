use std::sync::Arc;

use weft_core::config::GatewayConfig;
use weft_engine::ExecutionCoordinator;

/// Shared state for all gateway handlers.
pub struct AppState {
    pub config: GatewayConfig,
    pub coordinator: Arc<ExecutionCoordinator>,
}
