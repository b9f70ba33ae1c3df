//! Workflow execution engine.
//!
//! Walks a validated workflow graph node by node, persisting progress and
//! a final record through the [`weft_core::traits::ExecutionStore`] seam.

pub mod condition;
pub mod context;
pub mod coordinator;
pub mod executor;
pub mod invoker;
pub mod walker;

pub use context::ExecutionContext;
pub use coordinator::ExecutionCoordinator;
pub use executor::NodeExecutor;
pub use invoker::SimulatedAgentInvoker;
