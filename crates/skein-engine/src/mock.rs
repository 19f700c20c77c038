use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use futures::future::BoxFuture;
use tracing::debug;

use skein_core::error::Result;
use skein_core::traits::{StepExecutor, StepRequest, StepResult};

/// Step executor that replays canned outcomes, for tests and dry runs.
///
/// Each node id gets a queue of scripted results, consumed in order; the
/// last entry repeats once the queue is down to one. Unscripted nodes
/// succeed and echo a placeholder value for every requested output key.
#[derive(Default)]
pub struct MockStepExecutor {
    scripts: Mutex<HashMap<String, VecDeque<StepResult>>>,
    calls: Mutex<HashMap<String, u32>>,
}

impl MockStepExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the outcomes for a node, replacing any previous script.
    pub fn script(&self, node_id: impl Into<String>, results: Vec<StepResult>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(node_id.into(), results.into());
    }

    /// How many times a node has been invoked.
    pub fn invocations(&self, node_id: &str) -> u32 {
        self.calls.lock().unwrap().get(node_id).copied().unwrap_or(0)
    }

    fn next_result(&self, request: &StepRequest) -> StepResult {
        let mut scripts = self.scripts.lock().unwrap();
        if let Some(queue) = scripts.get_mut(&request.node_id) {
            if queue.len() > 1 {
                return queue.pop_front().unwrap();
            }
            if let Some(last) = queue.front() {
                return last.clone();
            }
        }

        // Unscripted: succeed and echo the requested output keys
        let outputs = request
            .output_keys
            .iter()
            .map(|k| {
                (
                    k.clone(),
                    serde_json::Value::String(format!("{} from {}", k, request.node_id)),
                )
            })
            .collect();
        StepResult::succeeded(outputs)
    }
}

impl StepExecutor for MockStepExecutor {
    fn invoke(&self, request: StepRequest) -> BoxFuture<'_, Result<StepResult>> {
        Box::pin(async move {
            *self
                .calls
                .lock()
                .unwrap()
                .entry(request.node_id.clone())
                .or_insert(0) += 1;
            debug!(node_id = %request.node_id, attempt = request.attempt, "Mock step invoked");
            Ok(self.next_result(&request))
        })
    }
}
