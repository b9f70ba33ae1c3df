use futures::future::BoxFuture;
use rand::Rng;
use tracing::debug;

use weft_core::error::Result;
use weft_core::graph::AgentConfig;
use weft_core::traits::AgentInvoker;
use weft_core::types::AgentOutcome;

/// Simulated agent runtime.
///
/// Stands in for a real agent service behind the `AgentInvoker` seam:
/// outcomes are drawn from a configurable success rate and latency band.
/// Production deployments replace this with an invoker that talks to the
/// actual runtime.
pub struct SimulatedAgentInvoker {
    success_rate: f64,
    min_latency_ms: u64,
    max_latency_ms: u64,
}

impl SimulatedAgentInvoker {
    pub fn new(success_rate: f64) -> Self {
        Self {
            success_rate: success_rate.clamp(0.0, 1.0),
            min_latency_ms: 200,
            max_latency_ms: 1200,
        }
    }

    pub fn with_latency(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.min_latency_ms = min_ms;
        self.max_latency_ms = max_ms.max(min_ms);
        self
    }
}

impl Default for SimulatedAgentInvoker {
    fn default() -> Self {
        Self::new(0.9)
    }
}

impl AgentInvoker for SimulatedAgentInvoker {
    fn invoke(&self, config: &AgentConfig) -> BoxFuture<'_, Result<AgentOutcome>> {
        let name = config.name.clone().unwrap_or_else(|| config.agent_id());

        Box::pin(async move {
            let (success, response_time_ms) = {
                let mut rng = rand::thread_rng();
                (
                    rng.gen_bool(self.success_rate),
                    rng.gen_range(self.min_latency_ms..=self.max_latency_ms),
                )
            };

            debug!(agent = %name, success, response_time_ms, "Simulated agent invocation");

            let output = if success {
                format!("Agent {} executed successfully", name)
            } else {
                format!("Agent {} reported a failure", name)
            };

            Ok(AgentOutcome {
                success,
                response_time_ms,
                output,
            })
        })
    }
}
