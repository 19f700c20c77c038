use std::collections::HashMap;

use futures::future::BoxFuture;

use crate::error::Result;
use crate::goal::Goal;
use crate::graph::NodeType;
use crate::types::{SessionId, SessionState, StepStatus, ToolDescriptor};

/// Everything a step executor gets for one node invocation.
///
/// The context view is restricted to the node's declared input keys; the
/// payload and graph metadata pass through untouched.
#[derive(Debug, Clone)]
pub struct StepRequest {
    pub node_id: String,
    pub node_type: NodeType,
    pub payload: Option<serde_json::Value>,
    pub inputs: HashMap<String, serde_json::Value>,
    pub output_keys: Vec<String>,
    pub permitted_tools: Vec<String>,
    pub goal: Option<Goal>,
    pub metadata: serde_json::Value,
    /// 1-based invocation attempt for this node within the run.
    pub attempt: u32,
}

/// What a step executor reports back.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub status: StepStatus,
    pub outputs: HashMap<String, serde_json::Value>,
    pub error: Option<String>,
}

impl StepResult {
    pub fn succeeded(outputs: HashMap<String, serde_json::Value>) -> Self {
        Self {
            status: StepStatus::Succeeded,
            outputs,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Failed,
            outputs: HashMap::new(),
            error: Some(error.into()),
        }
    }
}

/// The engine's only way to perform work.
///
/// Implementations may call an LLM, run a tool, or compute a pure function;
/// the engine does not care. An `Err` return and a `Failed` status are
/// treated the same by the retry path.
pub trait StepExecutor: Send + Sync + 'static {
    fn invoke(&self, request: StepRequest) -> BoxFuture<'_, Result<StepResult>>;
}

/// Tool catalog supplied by the surrounding application for step-executor
/// implementations. The engine itself only forwards permitted tool names.
pub trait ToolRegistry: Send + Sync + 'static {
    fn tools(&self) -> HashMap<String, ToolDescriptor>;
}

/// Durable persistence for suspended runs.
///
/// `save` must complete (or visibly fail) before the executor reports a run
/// as paused. Implementations must be safe under concurrent access to
/// distinct session ids; one active executor per session id is the caller's
/// contract.
pub trait SessionStore: Send + Sync + 'static {
    fn save(&self, state: &SessionState) -> Result<()>;

    fn load(&self, session_id: &SessionId) -> Result<Option<SessionState>>;

    fn delete(&self, session_id: &SessionId) -> Result<usize>;

    fn list(&self) -> Result<Vec<SessionId>>;
}
