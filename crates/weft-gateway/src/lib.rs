//! HTTP control API: start, steer, and inspect workflow executions.

pub mod auth;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use server::GatewayServer;
pub use state::AppState;
