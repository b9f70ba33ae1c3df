use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, warn};

use weft_core::error::Result;
use weft_core::graph::{
    ActionConfig, AgentConfig, ConditionConfig, DelayConfig, Node, NodeKind, TriggerConfig,
};
use weft_core::traits::{AgentInvoker, AnalyticsSink};
use weft_core::types::{AgentMetricEvent, MetricOutcome, NodeResult};

use crate::condition::evaluate_condition;
use crate::context::ExecutionContext;

/// Executes a single node of any kind.
///
/// Dispatch is a closed `match` over `NodeKind`. Executors are isolated:
/// one returning an error never corrupts the context, it just ends the run
/// at the coordinator.
#[derive(Clone)]
pub struct NodeExecutor {
    invoker: Arc<dyn AgentInvoker>,
    analytics: Arc<dyn AnalyticsSink>,
    default_delay_ms: u64,
}

impl NodeExecutor {
    pub fn new(
        invoker: Arc<dyn AgentInvoker>,
        analytics: Arc<dyn AnalyticsSink>,
        default_delay_ms: u64,
    ) -> Self {
        Self {
            invoker,
            analytics,
            default_delay_ms,
        }
    }

    pub async fn execute(&self, node: &Node, ctx: &ExecutionContext) -> Result<NodeResult> {
        debug!(node_id = %node.id, kind = node.kind.as_str(), "Executing node");

        match node.kind {
            NodeKind::Trigger => Ok(self.execute_trigger(node)),
            NodeKind::Agent => self.execute_agent(node).await,
            NodeKind::Action => Ok(self.execute_action(node)),
            NodeKind::Condition => Ok(self.execute_condition(node, ctx)),
            NodeKind::Delay => Ok(self.execute_delay(node).await),
        }
    }

    /// A trigger node is an entry marker, not a fallible operation.
    fn execute_trigger(&self, node: &Node) -> NodeResult {
        let config: TriggerConfig = node.parse_data();
        NodeResult::Trigger {
            trigger_type: config.trigger_type,
            triggered: true,
            timestamp: Utc::now(),
        }
    }

    async fn execute_agent(&self, node: &Node) -> Result<NodeResult> {
        let config: AgentConfig = node.parse_data();
        let agent_name = config
            .name
            .clone()
            .unwrap_or_else(|| config.agent_id());

        let start = Instant::now();
        let outcome = self.invoker.invoke(&config).await?;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        // Best-effort metrics emission; never blocks or fails the node.
        let event = AgentMetricEvent {
            agent_id: config.agent_id(),
            outcome: if outcome.success {
                MetricOutcome::Success
            } else {
                MetricOutcome::Error
            },
            response_time_ms: outcome.response_time_ms,
            timestamp: Utc::now(),
        };
        let sink = Arc::clone(&self.analytics);
        tokio::spawn(async move {
            if let Err(e) = sink.record(event).await {
                warn!(error = %e, "Failed to record agent metrics");
            }
        });

        Ok(NodeResult::Agent {
            agent_name,
            success: outcome.success,
            elapsed_ms,
            output: outcome.output,
        })
    }

    fn execute_action(&self, node: &Node) -> NodeResult {
        let config: ActionConfig = node.parse_data();
        NodeResult::Action {
            result: format!("Action {} completed", config.action_type),
            action_type: config.action_type,
            executed: true,
        }
    }

    fn execute_condition(&self, node: &Node, ctx: &ExecutionContext) -> NodeResult {
        let config: ConditionConfig = node.parse_data();
        let result = evaluate_condition(&config.condition, &ctx.variables);
        NodeResult::Condition {
            condition: config.condition,
            result,
            output: format!("Condition evaluated to: {}", result),
        }
    }

    /// The one executor that deliberately suspends its own run, for a
    /// bounded, caller-specified time.
    async fn execute_delay(&self, node: &Node) -> NodeResult {
        let config: DelayConfig = node.parse_data();
        let duration_ms = config.duration_ms.unwrap_or(self.default_delay_ms);
        tokio::time::sleep(std::time::Duration::from_millis(duration_ms)).await;
        NodeResult::Delay {
            duration_ms,
            completed: true,
        }
    }
}
