use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::{Context, ContextPatch};

/// Unique identifier for one run of a graph. Doubles as the key under which
/// a suspended run is persisted.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_str(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a single step invocation succeeded or failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
}

impl StepStatus {
    pub fn is_success(self) -> bool {
        matches!(self, StepStatus::Succeeded)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Succeeded => write!(f, "succeeded"),
            StepStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    Paused,
    Succeeded,
    Failed,
}

/// Result of executing a single node, as reported by the node runner.
///
/// The runner never touches the shared context; successful output lands in
/// `patch` and is applied atomically by the executor. A failed attempt
/// therefore leaves the context untouched.
#[derive(Debug, Clone)]
pub struct NodeOutcome {
    pub status: StepStatus,
    pub patch: ContextPatch,
    pub error: Option<String>,
    /// Step-executor invocations consumed by this call (1 + retries taken).
    pub attempts: u32,
}

impl NodeOutcome {
    pub fn succeeded(patch: ContextPatch, attempts: u32) -> Self {
        Self {
            status: StepStatus::Succeeded,
            patch,
            error: None,
            attempts,
        }
    }

    pub fn failed(error: impl Into<String>, attempts: u32) -> Self {
        Self {
            status: StepStatus::Failed,
            patch: ContextPatch::default(),
            error: Some(error.into()),
            attempts,
        }
    }
}

/// Outcome of a whole graph run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Whether the run reached a terminal node with a succeeded last step.
    pub success: bool,
    /// Node executions performed in this call (each retry attempt counts).
    pub steps_executed: u32,
    /// Final output: the terminal node's declared inputs projected out of
    /// the context, or the full context when it declares none.
    pub output: HashMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when the run suspended at a pause node (or was cancelled).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused_at: Option<String>,
    /// Persisted state a caller can hand back to `resume`. Present only for
    /// suspended runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_state: Option<SessionState>,
}

/// Snapshot of a suspended (or in-flight) run.
///
/// Owned by the session store; the executor reads and writes it only at
/// suspend/resume boundaries. The layout is stable within a graph `version`;
/// resuming against a different version is refused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: SessionId,
    pub graph_id: String,
    pub graph_version: String,
    /// Last node that completed an execution attempt. `None` before the
    /// entry node has run.
    pub last_node: Option<String>,
    pub last_status: StepStatus,
    pub context: Context,
    /// Per-node retry counters. Survive suspend/resume so a resumed run
    /// never resets them.
    pub retry_counts: HashMap<String, u32>,
    /// Edge ids taken, in order. Audit trail for tie-breaks and resume.
    pub edge_history: Vec<String>,
    pub saved_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(session_id: SessionId, graph_id: impl Into<String>, graph_version: impl Into<String>) -> Self {
        Self {
            session_id,
            graph_id: graph_id.into(),
            graph_version: graph_version.into(),
            last_node: None,
            last_status: StepStatus::Succeeded,
            context: Context::new(),
            retry_counts: HashMap::new(),
            edge_history: Vec::new(),
            saved_at: Utc::now(),
        }
    }
}

/// Events published on the run event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        session_id: SessionId,
        graph_id: String,
    },
    NodeStarted {
        node_id: String,
    },
    NodeFinished {
        node_id: String,
        status: StepStatus,
        attempts: u32,
    },
    EdgeTaken {
        edge_id: String,
        target: String,
    },
    RunPaused {
        session_id: SessionId,
        node_id: String,
    },
    RunResumed {
        session_id: SessionId,
    },
    RunFinished {
        session_id: SessionId,
        success: bool,
        steps_executed: u32,
    },
}

/// Descriptor for a tool a step executor may call. The engine forwards tool
/// names only; descriptors exist for registry introspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}
