use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use weft_core::config::EngineConfig;
use weft_core::error::{Result, WeftError};
use weft_core::graph::WorkflowGraph;
use weft_core::traits::{AgentInvoker, AnalyticsSink, ExecutionStore};
use weft_core::types::{
    ExecutionId, ExecutionMetrics, ExecutionPatch, ExecutionRecord, ExecutionStatus,
};

use crate::context::ExecutionContext;
use crate::executor::NodeExecutor;
use crate::walker;

/// How a node loop ended, short of an executor error.
enum RunEnd {
    Completed,
    Cancelled,
}

/// Outcome of the between-steps control check.
enum Control {
    Proceed,
    Stop,
}

/// Orchestrates workflow runs.
///
/// `execute` validates the graph, persists the initial record, and spawns
/// the node loop as a detached task; the call returns as soon as the record
/// exists. Control operations (`pause`/`resume`/`stop`) flip the persisted
/// status, and the loop observes it between node steps; a node already in
/// flight is never preempted.
///
/// All collaborators arrive by constructor injection; one coordinator
/// serves any number of concurrent runs, each with its own context.
#[derive(Clone)]
pub struct ExecutionCoordinator {
    store: Arc<dyn ExecutionStore>,
    executor: NodeExecutor,
    config: EngineConfig,
    shutdown: CancellationToken,
}

impl ExecutionCoordinator {
    pub fn new(
        store: Arc<dyn ExecutionStore>,
        invoker: Arc<dyn AgentInvoker>,
        analytics: Arc<dyn AnalyticsSink>,
        config: EngineConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let executor = NodeExecutor::new(invoker, analytics, config.default_delay_ms);
        Self {
            store,
            executor,
            config,
            shutdown,
        }
    }

    /// Start a run. Returns the new execution id once the initial record
    /// is durable; the node loop proceeds out-of-band.
    pub async fn execute(
        &self,
        graph: WorkflowGraph,
        owner: &str,
        variables: HashMap<String, serde_json::Value>,
    ) -> Result<ExecutionId> {
        graph.validate()?;

        let id = ExecutionId::new();
        let record =
            ExecutionRecord::new(id.clone(), &graph.id, owner, graph.nodes.len() as u32);
        self.store.insert(&record).await?;

        info!(
            execution_id = %id,
            workflow_id = %graph.id,
            nodes = graph.nodes.len(),
            "Execution started"
        );

        let ctx = ExecutionContext::new(id.clone(), graph.id.clone(), owner, variables);
        let coordinator = self.clone();
        tokio::spawn(async move {
            coordinator.drive(graph, ctx).await;
        });

        Ok(id)
    }

    /// Pause a running execution. The loop parks at the next step boundary.
    pub async fn pause(&self, id: &ExecutionId, owner: &str) -> Result<()> {
        let record = self.fetch(id, owner).await?;
        if record.status != ExecutionStatus::Running {
            return Err(WeftError::Validation(format!(
                "Cannot pause execution in status '{}'",
                record.status
            )));
        }
        self.store
            .update(
                id,
                &ExecutionPatch {
                    status: Some(ExecutionStatus::Paused),
                    ..Default::default()
                },
            )
            .await?;
        info!(execution_id = %id, "Execution paused");
        Ok(())
    }

    /// Resume a paused execution.
    pub async fn resume(&self, id: &ExecutionId, owner: &str) -> Result<()> {
        let record = self.fetch(id, owner).await?;
        if record.status != ExecutionStatus::Paused {
            return Err(WeftError::Validation(format!(
                "Cannot resume execution in status '{}'",
                record.status
            )));
        }
        self.store
            .update(
                id,
                &ExecutionPatch {
                    status: Some(ExecutionStatus::Running),
                    ..Default::default()
                },
            )
            .await?;
        info!(execution_id = %id, "Execution resumed");
        Ok(())
    }

    /// Cancel an execution. The loop exits at the next step boundary.
    pub async fn stop(&self, id: &ExecutionId, owner: &str) -> Result<()> {
        let record = self.fetch(id, owner).await?;
        if record.status.is_terminal() {
            return Err(WeftError::Validation(format!(
                "Cannot stop execution in status '{}'",
                record.status
            )));
        }
        self.store
            .update(
                id,
                &ExecutionPatch {
                    status: Some(ExecutionStatus::Cancelled),
                    end_time: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await?;
        info!(execution_id = %id, "Execution stopped");
        Ok(())
    }

    /// Read the current record for an execution owned by `owner`.
    pub async fn status(&self, id: &ExecutionId, owner: &str) -> Result<ExecutionRecord> {
        self.fetch(id, owner).await
    }

    /// All executions owned by `owner`, most recent first.
    pub async fn list(&self, owner: &str) -> Result<Vec<ExecutionRecord>> {
        self.store.list(owner).await
    }

    async fn fetch(&self, id: &ExecutionId, owner: &str) -> Result<ExecutionRecord> {
        self.store
            .get(id, owner)
            .await?
            .ok_or_else(|| WeftError::NotFound(id.to_string()))
    }

    /// Drive one run to a terminal state and write the final record.
    async fn drive(&self, graph: WorkflowGraph, mut ctx: ExecutionContext) {
        let total = graph.nodes.len() as u32;

        match self.run_nodes(&graph, &mut ctx).await {
            Ok(RunEnd::Completed) => {
                let completed = ctx.results().len() as u32;
                let error_count = ctx
                    .results()
                    .iter()
                    .filter(|(_, r)| !r.succeeded())
                    .count() as u32;
                let elapsed_ms = (Utc::now() - ctx.start_time).num_milliseconds().max(0) as f64;
                let avg_execution_time = if completed > 0 {
                    elapsed_ms / completed as f64
                } else {
                    0.0
                };

                let patch = ExecutionPatch {
                    status: Some(ExecutionStatus::Completed),
                    end_time: Some(Utc::now()),
                    progress: Some(100),
                    metrics: Some(ExecutionMetrics {
                        total_nodes: total,
                        completed_nodes: completed,
                        error_count,
                        avg_execution_time,
                    }),
                    ..Default::default()
                };
                if let Err(e) = self.store.update(&ctx.execution_id, &patch).await {
                    error!(execution_id = %ctx.execution_id, error = %e, "Failed to finalize record");
                }

                info!(
                    execution_id = %ctx.execution_id,
                    completed_nodes = completed,
                    elapsed_ms,
                    "Execution completed"
                );
            }
            Ok(RunEnd::Cancelled) => {
                // `stop` already wrote the terminal record; this only covers
                // process shutdown, where the loop exits on the token.
                match self.store.get(&ctx.execution_id, &ctx.owner_id).await {
                    Ok(Some(record)) if !record.status.is_terminal() => {
                        let patch = ExecutionPatch {
                            status: Some(ExecutionStatus::Cancelled),
                            end_time: Some(Utc::now()),
                            ..Default::default()
                        };
                        if let Err(e) = self.store.update(&ctx.execution_id, &patch).await {
                            error!(execution_id = %ctx.execution_id, error = %e, "Failed to finalize record");
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(execution_id = %ctx.execution_id, error = %e, "Failed to read record at cancellation");
                    }
                }
                info!(execution_id = %ctx.execution_id, "Execution cancelled");
            }
            Err(e) => {
                let completed = ctx.results().len() as u32;
                let error_count = ctx
                    .results()
                    .iter()
                    .filter(|(_, r)| !r.succeeded())
                    .count() as u32
                    + 1;

                error!(
                    execution_id = %ctx.execution_id,
                    node_id = ctx.current_node_id.as_deref().unwrap_or(""),
                    error = %e,
                    "Execution failed"
                );

                let patch = ExecutionPatch {
                    status: Some(ExecutionStatus::Failed),
                    end_time: Some(Utc::now()),
                    error_details: Some(e.to_string()),
                    metrics: Some(ExecutionMetrics {
                        total_nodes: total,
                        completed_nodes: completed,
                        error_count,
                        avg_execution_time: 0.0,
                    }),
                    ..Default::default()
                };
                if let Err(e) = self.store.update(&ctx.execution_id, &patch).await {
                    error!(execution_id = %ctx.execution_id, error = %e, "Failed to finalize record");
                }
            }
        }
    }

    /// The node loop: walk the graph from the start node, executing one
    /// node at a time, until the path ends or control says otherwise.
    async fn run_nodes(
        &self,
        graph: &WorkflowGraph,
        ctx: &mut ExecutionContext,
    ) -> Result<RunEnd> {
        let total = graph.nodes.len() as u32;
        let mut current = walker::start_node(graph).map(str::to_string);
        let mut steps: u32 = 0;

        while let Some(node_id) = current {
            match self.observe_control(ctx).await? {
                Control::Proceed => {}
                Control::Stop => return Ok(RunEnd::Cancelled),
            }

            steps += 1;
            if steps > self.config.max_steps {
                return Err(WeftError::Execution(format!(
                    "Step limit of {} exceeded; the graph likely contains a cycle",
                    self.config.max_steps
                )));
            }

            // Edges were validated at execute time, so the id resolves
            // unless the walker and graph disagree.
            let node = graph.find_node(&node_id).ok_or_else(|| {
                WeftError::Execution(format!("Node '{}' not found in graph", node_id))
            })?;

            ctx.current_node_id = Some(node_id.clone());
            // Revisits push the result count past the node count, so cap
            // the percentage before the cast.
            let completed = ctx.results().len() as u32;
            let progress =
                ((completed as f64 / total as f64) * 100.0).round().min(100.0) as u8;
            self.store
                .update(
                    &ctx.execution_id,
                    &ExecutionPatch {
                        current_node: Some(node_id.clone()),
                        progress: Some(progress),
                        ..Default::default()
                    },
                )
                .await?;

            let result = self.executor.execute(node, ctx).await?;
            current = walker::next_node(graph, node, &result).map(str::to_string);
            ctx.record_result(&node_id, result);

            // Inter-node throttle; a correctness no-op, zero disables it.
            if self.config.inter_node_delay_ms > 0 && current.is_some() {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(self.config.inter_node_delay_ms)) => {}
                    _ = self.shutdown.cancelled() => return Ok(RunEnd::Cancelled),
                }
            }
        }

        Ok(RunEnd::Completed)
    }

    /// Re-read the persisted status between steps. Parks while paused,
    /// proceeds when running, stops on cancellation or shutdown.
    async fn observe_control(&self, ctx: &ExecutionContext) -> Result<Control> {
        loop {
            if self.shutdown.is_cancelled() {
                return Ok(Control::Stop);
            }

            let record = self
                .store
                .get(&ctx.execution_id, &ctx.owner_id)
                .await?
                .ok_or_else(|| {
                    WeftError::Execution("Execution record disappeared mid-run".into())
                })?;

            match record.status {
                ExecutionStatus::Running => return Ok(Control::Proceed),
                ExecutionStatus::Paused => {
                    debug!(execution_id = %ctx.execution_id, "Execution paused, waiting");
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_millis(self.config.pause_poll_ms)) => {}
                        _ = self.shutdown.cancelled() => return Ok(Control::Stop),
                    }
                }
                ExecutionStatus::Cancelled => return Ok(Control::Stop),
                status => {
                    // A terminal status mid-loop means someone raced us;
                    // treat it as a stop rather than overwrite it.
                    warn!(execution_id = %ctx.execution_id, %status, "Unexpected status mid-run");
                    return Ok(Control::Stop);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use futures::future::BoxFuture;

    use weft_core::graph::{AgentConfig, Edge, Node, NodeKind};
    use weft_core::types::AgentOutcome;
    use weft_store::SqliteStore;

    struct StubInvoker;

    impl AgentInvoker for StubInvoker {
        fn invoke(&self, config: &AgentConfig) -> BoxFuture<'_, Result<AgentOutcome>> {
            let name = config.agent_id();
            Box::pin(async move {
                Ok(AgentOutcome {
                    success: true,
                    response_time_ms: 3,
                    output: format!("Agent {} executed", name),
                })
            })
        }
    }

    struct FailingInvoker;

    impl AgentInvoker for FailingInvoker {
        fn invoke(&self, _config: &AgentConfig) -> BoxFuture<'_, Result<AgentOutcome>> {
            Box::pin(async { Err(WeftError::Execution("agent runtime unreachable".into())) })
        }
    }

    fn coordinator_with(invoker: impl AgentInvoker) -> ExecutionCoordinator {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let config = EngineConfig {
            inter_node_delay_ms: 0,
            default_delay_ms: 1,
            pause_poll_ms: 5,
            max_steps: 1000,
        };
        ExecutionCoordinator::new(
            store.clone(),
            Arc::new(invoker),
            store,
            config,
            CancellationToken::new(),
        )
    }

    async fn wait_terminal(
        coordinator: &ExecutionCoordinator,
        id: &ExecutionId,
        owner: &str,
    ) -> ExecutionRecord {
        for _ in 0..500 {
            let record = coordinator.status(id, owner).await.unwrap();
            if record.status.is_terminal() {
                return record;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("execution never reached a terminal state");
    }

    fn linear_graph() -> WorkflowGraph {
        let mut graph = WorkflowGraph::new("wf-linear", "Linear");
        graph.nodes = vec![
            Node::new("t1", NodeKind::Trigger),
            Node::new("a1", NodeKind::Agent)
                .with_data(serde_json::json!({ "id": "agent-1", "name": "scout" })),
            Node::new("x1", NodeKind::Action)
                .with_data(serde_json::json!({ "action_type": "send-email" })),
        ];
        graph.edges = vec![Edge::new("e1", "t1", "a1"), Edge::new("e2", "a1", "x1")];
        graph
    }

    fn branching_graph(condition: &str) -> WorkflowGraph {
        let mut graph = WorkflowGraph::new("wf-branch", "Branching");
        graph.nodes = vec![
            Node::new("t1", NodeKind::Trigger),
            Node::new("c1", NodeKind::Condition)
                .with_data(serde_json::json!({ "condition": condition })),
            Node::new("a_true", NodeKind::Action),
            Node::new("a_false", NodeKind::Action),
        ];
        graph.edges = vec![
            Edge::new("e1", "t1", "c1"),
            Edge::new("e2", "c1", "a_true").with_handle("true"),
            Edge::new("e3", "c1", "a_false").with_handle("false"),
        ];
        graph
    }

    #[tokio::test]
    async fn test_linear_chain_completes() {
        let coordinator = coordinator_with(StubInvoker);
        let id = coordinator
            .execute(linear_graph(), "alice", HashMap::new())
            .await
            .unwrap();

        let record = wait_terminal(&coordinator, &id, "alice").await;
        assert_eq!(record.status, ExecutionStatus::Completed);
        assert_eq!(record.progress, 100);
        assert_eq!(record.metrics.total_nodes, 3);
        assert_eq!(record.metrics.completed_nodes, 3);
        assert_eq!(record.metrics.error_count, 0);
        assert_eq!(record.current_node.as_deref(), Some("x1"));
        assert!(record.end_time.is_some());
        assert!(record.metrics.avg_execution_time >= 0.0);
    }

    #[tokio::test]
    async fn test_empty_graph_completes_immediately() {
        let coordinator = coordinator_with(StubInvoker);
        let graph = WorkflowGraph::new("wf-empty", "Empty");
        let id = coordinator
            .execute(graph, "alice", HashMap::new())
            .await
            .unwrap();

        let record = wait_terminal(&coordinator, &id, "alice").await;
        assert_eq!(record.status, ExecutionStatus::Completed);
        assert_eq!(record.progress, 100);
        assert_eq!(record.metrics.completed_nodes, 0);
        assert_eq!(record.metrics.avg_execution_time, 0.0);
    }

    #[tokio::test]
    async fn test_condition_false_branch() {
        let coordinator = coordinator_with(StubInvoker);
        let mut variables = HashMap::new();
        variables.insert("flag".to_string(), serde_json::json!("no"));

        let id = coordinator
            .execute(branching_graph(r#"flag == "yes""#), "alice", variables)
            .await
            .unwrap();

        let record = wait_terminal(&coordinator, &id, "alice").await;
        assert_eq!(record.status, ExecutionStatus::Completed);
        // Path: t1 -> c1 -> a_false; the untaken branch is never visited.
        assert_eq!(record.metrics.completed_nodes, 3);
        assert_eq!(record.current_node.as_deref(), Some("a_false"));
    }

    #[tokio::test]
    async fn test_condition_true_branch_results() {
        let coordinator = coordinator_with(StubInvoker);
        let graph = branching_graph(r#"flag == "yes""#);
        let mut variables = HashMap::new();
        variables.insert("flag".to_string(), serde_json::json!("yes"));

        let id = ExecutionId::new();
        let record = ExecutionRecord::new(id.clone(), &graph.id, "alice", 4);
        coordinator.store.insert(&record).await.unwrap();

        let mut ctx = ExecutionContext::new(id, graph.id.clone(), "alice", variables);
        let end = coordinator.run_nodes(&graph, &mut ctx).await.unwrap();
        assert!(matches!(end, RunEnd::Completed));

        let ids: Vec<_> = ctx.results().iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "c1", "a_true"]);
        assert!(!ctx.visited("a_false"));
    }

    #[tokio::test]
    async fn test_executor_error_fails_run() {
        let coordinator = coordinator_with(FailingInvoker);
        let id = coordinator
            .execute(linear_graph(), "alice", HashMap::new())
            .await
            .unwrap();

        let record = wait_terminal(&coordinator, &id, "alice").await;
        assert_eq!(record.status, ExecutionStatus::Failed);
        assert!(record
            .error_details
            .as_deref()
            .unwrap()
            .contains("agent runtime unreachable"));
        // Only the trigger ran; the failing agent has no successor entry.
        assert_eq!(record.metrics.completed_nodes, 1);
        assert!(record.metrics.error_count >= 1);
        assert!(record.end_time.is_some());
    }

    #[tokio::test]
    async fn test_cycle_hits_step_limit() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let config = EngineConfig {
            inter_node_delay_ms: 0,
            default_delay_ms: 1,
            pause_poll_ms: 5,
            max_steps: 5,
        };
        let coordinator = ExecutionCoordinator::new(
            store.clone(),
            Arc::new(StubInvoker),
            store,
            config,
            CancellationToken::new(),
        );

        let mut graph = WorkflowGraph::new("wf-cycle", "Cycle");
        graph.nodes = vec![Node::new("a1", NodeKind::Action)];
        graph.edges = vec![Edge::new("e1", "a1", "a1")];

        let id = coordinator
            .execute(graph, "alice", HashMap::new())
            .await
            .unwrap();

        let record = wait_terminal(&coordinator, &id, "alice").await;
        assert_eq!(record.status, ExecutionStatus::Failed);
        assert!(record
            .error_details
            .as_deref()
            .unwrap()
            .contains("Step limit"));
    }

    #[tokio::test]
    async fn test_progress_stays_capped_on_revisits() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let config = EngineConfig {
            inter_node_delay_ms: 0,
            default_delay_ms: 1,
            pause_poll_ms: 5,
            max_steps: 4,
        };
        let coordinator = ExecutionCoordinator::new(
            store.clone(),
            Arc::new(StubInvoker),
            store,
            config,
            CancellationToken::new(),
        );

        // A self-loop revisits its one node until the step limit trips;
        // each revisit grows the result count past the node count.
        let mut graph = WorkflowGraph::new("wf-loop", "Loop");
        graph.nodes = vec![Node::new("a1", NodeKind::Action)];
        graph.edges = vec![Edge::new("e1", "a1", "a1")];

        let id = coordinator
            .execute(graph, "alice", HashMap::new())
            .await
            .unwrap();

        let record = wait_terminal(&coordinator, &id, "alice").await;
        assert_eq!(record.status, ExecutionStatus::Failed);
        assert!(record.progress <= 100);
    }

    #[tokio::test]
    async fn test_validation_rejected_before_any_record() {
        let coordinator = coordinator_with(StubInvoker);
        let mut graph = linear_graph();
        graph.edges.push(Edge::new("e9", "x1", "ghost"));

        let err = coordinator
            .execute(graph, "alice", HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, WeftError::Validation(_)));
        assert!(coordinator.list("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_owner_scoping() {
        let coordinator = coordinator_with(StubInvoker);
        let id = coordinator
            .execute(linear_graph(), "alice", HashMap::new())
            .await
            .unwrap();

        let err = coordinator.status(&id, "bob").await.unwrap_err();
        assert!(matches!(err, WeftError::NotFound(_)));

        wait_terminal(&coordinator, &id, "alice").await;
        assert_eq!(coordinator.list("alice").await.unwrap().len(), 1);
        assert!(coordinator.list("bob").await.unwrap().is_empty());
    }

    fn slow_graph() -> WorkflowGraph {
        let mut graph = WorkflowGraph::new("wf-slow", "Slow");
        graph.nodes = vec![
            Node::new("d1", NodeKind::Delay)
                .with_data(serde_json::json!({ "duration_ms": 150 })),
            Node::new("d2", NodeKind::Delay)
                .with_data(serde_json::json!({ "duration_ms": 150 })),
            Node::new("d3", NodeKind::Delay)
                .with_data(serde_json::json!({ "duration_ms": 150 })),
        ];
        graph.edges = vec![Edge::new("e1", "d1", "d2"), Edge::new("e2", "d2", "d3")];
        graph
    }

    #[tokio::test]
    async fn test_stop_is_observed_between_steps() {
        let coordinator = coordinator_with(StubInvoker);
        let id = coordinator
            .execute(slow_graph(), "alice", HashMap::new())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        coordinator.stop(&id, "alice").await.unwrap();

        let record = wait_terminal(&coordinator, &id, "alice").await;
        assert_eq!(record.status, ExecutionStatus::Cancelled);
        assert!(record.end_time.is_some());

        // Stopping a terminal run is rejected.
        let err = coordinator.stop(&id, "alice").await.unwrap_err();
        assert!(matches!(err, WeftError::Validation(_)));
    }

    #[tokio::test]
    async fn test_pause_parks_and_resume_continues() {
        let coordinator = coordinator_with(StubInvoker);
        let id = coordinator
            .execute(slow_graph(), "alice", HashMap::new())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        coordinator.pause(&id, "alice").await.unwrap();

        // Long enough for the whole graph to finish were it not paused.
        tokio::time::sleep(Duration::from_millis(600)).await;
        let record = coordinator.status(&id, "alice").await.unwrap();
        assert_eq!(record.status, ExecutionStatus::Paused);

        // Pausing twice is a validation error.
        assert!(coordinator.pause(&id, "alice").await.is_err());

        coordinator.resume(&id, "alice").await.unwrap();
        let record = wait_terminal(&coordinator, &id, "alice").await;
        assert_eq!(record.status, ExecutionStatus::Completed);
        assert_eq!(record.metrics.completed_nodes, 3);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_run() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let shutdown = CancellationToken::new();
        let config = EngineConfig {
            inter_node_delay_ms: 0,
            default_delay_ms: 1,
            pause_poll_ms: 5,
            max_steps: 1000,
        };
        let coordinator = ExecutionCoordinator::new(
            store.clone(),
            Arc::new(StubInvoker),
            store,
            config,
            shutdown.clone(),
        );

        let id = coordinator
            .execute(slow_graph(), "alice", HashMap::new())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown.cancel();

        let record = wait_terminal(&coordinator, &id, "alice").await;
        assert_eq!(record.status, ExecutionStatus::Cancelled);
    }
}
