use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use skein_core::context::{Context, ContextPatch};
use skein_core::error::{Result, SkeinError};
use skein_core::goal::Goal;
use skein_core::graph::NodeSpec;
use skein_core::traits::{StepExecutor, StepRequest};
use skein_core::types::NodeOutcome;

/// Executes one node's unit of work with bounded retry.
///
/// The runner delegates the work itself to the step executor and never
/// touches the shared context: inputs go out as a restricted view, outputs
/// come back as a patch for the executor to apply. The retry counter it is
/// handed lives in `SessionState`, so counters survive suspend/resume and
/// freeze at the cap.
pub struct NodeRunner {
    timeout: Duration,
    goal: Option<Goal>,
    metadata: serde_json::Value,
}

impl NodeRunner {
    pub fn new(timeout: Duration, goal: Option<Goal>, metadata: serde_json::Value) -> Self {
        Self {
            timeout,
            goal,
            metadata,
        }
    }

    /// Run `node` against `executor`.
    ///
    /// `retries` is the node's persisted retry counter. `skip_preconditions`
    /// exempts entry-point nodes from the input-key check. Returns
    /// `Err(Cancelled)` only for cancellation; execution failures are a
    /// `Failed` outcome, not an `Err`.
    pub async fn run(
        &self,
        node: &NodeSpec,
        context: &Context,
        executor: &dyn StepExecutor,
        retries: &mut u32,
        skip_preconditions: bool,
        cancel: &CancellationToken,
    ) -> Result<NodeOutcome> {
        if !skip_preconditions && !context.contains_all(&node.input_keys) {
            let missing = context.missing_keys(&node.input_keys);
            warn!(node_id = %node.id, missing = ?missing, "Node precondition failed");
            let err = SkeinError::Precondition {
                node: node.id.clone(),
                missing: missing.join(", "),
            };
            return Ok(NodeOutcome::failed(err.to_string(), 1));
        }

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let request = StepRequest {
                node_id: node.id.clone(),
                node_type: node.node_type,
                payload: node.payload.clone(),
                inputs: context.view(&node.input_keys),
                output_keys: node.output_keys.clone(),
                permitted_tools: node.tools.clone(),
                goal: self.goal.clone(),
                metadata: self.metadata.clone(),
                attempt: *retries + 1,
            };

            debug!(node_id = %node.id, attempt = attempts, "Invoking step executor");
            let invocation = tokio::time::timeout(self.timeout, executor.invoke(request));
            let attempt_error = tokio::select! {
                _ = cancel.cancelled() => return Err(SkeinError::Cancelled),
                result = invocation => match result {
                    Ok(Ok(step)) if step.status.is_success() => {
                        let patch = self.collect_patch(node, step.outputs);
                        return Ok(NodeOutcome::succeeded(patch, attempts));
                    }
                    Ok(Ok(step)) => step
                        .error
                        .unwrap_or_else(|| "step executor reported failure".to_string()),
                    Ok(Err(SkeinError::Cancelled)) => return Err(SkeinError::Cancelled),
                    Ok(Err(e)) => e.to_string(),
                    Err(_) => format!("step timed out after {}s", self.timeout.as_secs()),
                },
            };

            if *retries < node.max_retries {
                *retries += 1;
                warn!(
                    node_id = %node.id,
                    retry = *retries,
                    max_retries = node.max_retries,
                    error = %attempt_error,
                    "Step failed, retrying"
                );
                continue;
            }

            // Counter stays frozen at the cap
            warn!(node_id = %node.id, error = %attempt_error, "Step failed, retries exhausted");
            let err = SkeinError::StepExecution {
                node: node.id.clone(),
                message: attempt_error,
            };
            return Ok(NodeOutcome::failed(err.to_string(), attempts));
        }
    }

    /// Keep only the declared output keys the step actually produced.
    fn collect_patch(
        &self,
        node: &NodeSpec,
        mut outputs: std::collections::HashMap<String, serde_json::Value>,
    ) -> ContextPatch {
        let mut patch = ContextPatch::new();
        for key in &node.output_keys {
            if let Some(value) = outputs.remove(key) {
                patch.insert(key.clone(), value);
            }
        }
        patch
    }
}
