pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod goal;
pub mod graph;
pub mod traits;
pub mod types;

pub use config::EngineConfig;
pub use context::{Context, ContextPatch};
pub use error::{Result, SkeinError};
pub use event::EventBus;
pub use goal::{Constraint, Goal, SuccessCriterion};
pub use graph::{EdgeCondition, EdgeSpec, GraphSpec, NodeSpec, NodeType};
pub use types::*;
