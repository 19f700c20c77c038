use thiserror::Error;

#[derive(Debug, Error)]
pub enum SkeinError {
    // Graph errors
    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    #[error("Node not found in graph: {0}")]
    NodeNotFound(String),

    #[error("No matching edge out of node '{node}'")]
    DeadEnd { node: String },

    // Node execution errors
    #[error("Node '{node}' missing input keys: {missing}")]
    Precondition { node: String, missing: String },

    #[error("Step execution failed at node '{node}': {message}")]
    StepExecution { node: String, message: String },

    #[error("Step budget exceeded ({budget} steps)")]
    StepBudgetExceeded { budget: u32 },

    // Session errors
    #[error("Graph version mismatch: session has '{found}', graph is '{expected}'")]
    VersionMismatch { expected: String, found: String },

    #[error("Session error: {0}")]
    Session(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    // Run control
    #[error("Run cancelled")]
    Cancelled,

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SkeinError>;
