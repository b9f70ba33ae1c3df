use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::WeftError;

/// Unique identifier for one run of a workflow.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ExecutionId(pub String);

impl ExecutionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of an execution.
///
/// `Running ⇄ Paused`; `Completed`, `Failed`, and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = WeftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(WeftError::Validation(format!(
                "Unknown execution status: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Aggregate counters for one execution.
///
/// Wire names are camelCase to match the persisted record layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionMetrics {
    pub total_nodes: u32,
    pub completed_nodes: u32,
    pub error_count: u32,
    /// Average per-node wall time in milliseconds.
    pub avg_execution_time: f64,
}

/// Durable, externally visible projection of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: ExecutionId,
    pub workflow_id: String,
    pub status: ExecutionStatus,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// 0–100; monotonically non-decreasing while the run is `running`.
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_node: Option<String>,
    pub metrics: ExecutionMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
    pub owner_id: String,
    pub updated_at: DateTime<Utc>,
}

impl ExecutionRecord {
    /// Build the initial record written at `execute` time.
    pub fn new(
        id: ExecutionId,
        workflow_id: impl Into<String>,
        owner_id: impl Into<String>,
        total_nodes: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            workflow_id: workflow_id.into(),
            status: ExecutionStatus::Running,
            start_time: now,
            end_time: None,
            progress: 0,
            current_node: None,
            metrics: ExecutionMetrics {
                total_nodes,
                ..Default::default()
            },
            error_details: None,
            owner_id: owner_id.into(),
            updated_at: now,
        }
    }
}

/// Partial update applied to a persisted record by key.
///
/// Only the populated fields are written; `updated_at` is refreshed on
/// every write by the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionPatch {
    pub status: Option<ExecutionStatus>,
    pub progress: Option<u8>,
    pub current_node: Option<String>,
    pub end_time: Option<DateTime<Utc>>,
    pub metrics: Option<ExecutionMetrics>,
    pub error_details: Option<String>,
}

/// Output of one node's execution, immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node_type", rename_all = "lowercase")]
pub enum NodeResult {
    Trigger {
        trigger_type: String,
        triggered: bool,
        timestamp: DateTime<Utc>,
    },
    Agent {
        agent_name: String,
        success: bool,
        elapsed_ms: u64,
        output: String,
    },
    Action {
        action_type: String,
        executed: bool,
        result: String,
    },
    Condition {
        condition: String,
        result: bool,
        output: String,
    },
    Delay {
        duration_ms: u64,
        completed: bool,
    },
}

impl NodeResult {
    /// Whether the node's own outcome marker reports success.
    pub fn succeeded(&self) -> bool {
        match self {
            Self::Trigger { triggered, .. } => *triggered,
            Self::Agent { success, .. } => *success,
            Self::Action { executed, .. } => *executed,
            Self::Condition { .. } => true,
            Self::Delay { completed, .. } => *completed,
        }
    }

    /// The boolean branch selector, present only for condition results.
    pub fn branch(&self) -> Option<bool> {
        match self {
            Self::Condition { result, .. } => Some(*result),
            _ => None,
        }
    }
}

/// Result of invoking an agent through the agent-runtime collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutcome {
    pub success: bool,
    pub response_time_ms: u64,
    pub output: String,
}

/// Outcome marker for an analytics event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricOutcome {
    Success,
    Error,
}

impl MetricOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Append-only event emitted after each agent invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMetricEvent {
    pub agent_id: String,
    pub outcome: MetricOutcome,
    pub response_time_ms: u64,
    pub timestamp: DateTime<Utc>,
}
