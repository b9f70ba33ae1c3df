use futures::future::BoxFuture;

use crate::error::Result;
use crate::graph::AgentConfig;
use crate::types::*;

/// Execution store, the coordinator's only persistence surface.
///
/// A keyed record store supporting insert, partial update-by-key, and
/// owner-scoped reads. Writes for one `ExecutionId` come from a single
/// task; the store only has to keep different runs from interfering.
pub trait ExecutionStore: Send + Sync + 'static {
    /// Insert the initial record for a new run.
    fn insert(&self, record: &ExecutionRecord) -> BoxFuture<'_, Result<()>>;

    /// Apply a partial update to a record by id.
    fn update(&self, id: &ExecutionId, patch: &ExecutionPatch) -> BoxFuture<'_, Result<()>>;

    /// Fetch a record by id, scoped to its owner. `None` when the id is
    /// unknown or belongs to someone else.
    fn get(
        &self,
        id: &ExecutionId,
        owner: &str,
    ) -> BoxFuture<'_, Result<Option<ExecutionRecord>>>;

    /// All records owned by `owner`, most recent first.
    fn list(&self, owner: &str) -> BoxFuture<'_, Result<Vec<ExecutionRecord>>>;
}

/// Agent runtime, invoked by the agent node executor.
pub trait AgentInvoker: Send + Sync + 'static {
    /// Run the agent described by `config` and report outcome plus timing.
    fn invoke(&self, config: &AgentConfig) -> BoxFuture<'_, Result<AgentOutcome>>;
}

/// Analytics collaborator for append-only agent metric events.
///
/// Callers treat this as fire-and-forget: a failed `record` must never
/// affect the run that emitted it.
pub trait AnalyticsSink: Send + Sync + 'static {
    fn record(&self, event: AgentMetricEvent) -> BoxFuture<'_, Result<()>>;
}
