use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use weft_core::types::{ExecutionId, NodeResult};

/// Mutable run-scoped state.
///
/// Owned exclusively by the execution coordinator for the lifetime of one
/// run; node executors read it, only the coordinator writes it. Discarded
/// when the run reaches a terminal state.
#[derive(Debug)]
pub struct ExecutionContext {
    pub execution_id: ExecutionId,
    pub workflow_id: String,
    pub owner_id: String,
    pub start_time: DateTime<Utc>,
    pub current_node_id: Option<String>,
    /// Name→value variables accumulated across node executions; condition
    /// expressions evaluate against this map.
    pub variables: HashMap<String, Value>,
    /// Per-node results in execution order.
    results: Vec<(String, NodeResult)>,
}

impl ExecutionContext {
    pub fn new(
        execution_id: ExecutionId,
        workflow_id: impl Into<String>,
        owner_id: impl Into<String>,
        variables: HashMap<String, Value>,
    ) -> Self {
        Self {
            execution_id,
            workflow_id: workflow_id.into(),
            owner_id: owner_id.into(),
            start_time: Utc::now(),
            current_node_id: None,
            variables,
            results: Vec::new(),
        }
    }

    /// Append a node's result and publish its `{node_id}_status` variable
    /// for downstream condition expressions.
    pub fn record_result(&mut self, node_id: &str, result: NodeResult) {
        self.variables.insert(
            format!("{}_status", node_id),
            Value::String(
                if result.succeeded() { "success" } else { "failure" }.to_string(),
            ),
        );
        self.results.push((node_id.to_string(), result));
    }

    /// Results so far, in execution order.
    pub fn results(&self) -> &[(String, NodeResult)] {
        &self.results
    }

    pub fn result_for(&self, node_id: &str) -> Option<&NodeResult> {
        self.results
            .iter()
            .find(|(id, _)| id == node_id)
            .map(|(_, r)| r)
    }

    pub fn visited(&self, node_id: &str) -> bool {
        self.results.iter().any(|(id, _)| id == node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_record_result_order_and_status_var() {
        let mut ctx =
            ExecutionContext::new(ExecutionId::new(), "wf-1", "alice", HashMap::new());

        ctx.record_result(
            "t1",
            NodeResult::Trigger {
                trigger_type: "manual".into(),
                triggered: true,
                timestamp: Utc::now(),
            },
        );
        ctx.record_result(
            "a1",
            NodeResult::Agent {
                agent_name: "scout".into(),
                success: false,
                elapsed_ms: 5,
                output: "boom".into(),
            },
        );

        let ids: Vec<_> = ctx.results().iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "a1"]);
        assert!(ctx.visited("t1"));
        assert!(!ctx.visited("x1"));
        assert_eq!(ctx.variables["t1_status"], "success");
        assert_eq!(ctx.variables["a1_status"], "failure");
        assert!(ctx.result_for("a1").is_some());
    }
}
