use serde::{Deserialize, Serialize};

/// Engine tuning knobs. Constructed by the caller and passed in; there is no
/// ambient process-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on node executions per `run`/`resume` call. Generous but
    /// finite; exceeding it fails the run.
    #[serde(default = "default_step_budget")]
    pub step_budget: u32,
    /// Per-invocation timeout. A timed-out invocation is a failed attempt
    /// feeding the normal retry path.
    #[serde(default = "default_step_timeout")]
    pub step_timeout_secs: u64,
}

fn default_step_budget() -> u32 {
    256
}

fn default_step_timeout() -> u64 {
    300
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_budget: default_step_budget(),
            step_timeout_secs: default_step_timeout(),
        }
    }
}
