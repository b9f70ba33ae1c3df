pub mod config;
pub mod error;
pub mod graph;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use error::{Result, WeftError};
pub use graph::{Edge, Node, NodeKind, WorkflowGraph};
pub use types::*;
