//! Goal-driven graph execution engine for node/edge workflows.
//!
//! A workflow is a directed graph of `NodeSpec`s connected by `EdgeSpec`s.
//! The `GraphExecutor` walks the graph from an entry node, delegating each
//! node's unit of work to a caller-supplied `StepExecutor`, applying output
//! patches to a shared run-scoped context, and following edges whose
//! conditions match the node's outcome. Runs suspend at pause nodes with
//! their state persisted through a `SessionStore`, and can be resumed later,
//! possibly by a different process.

pub mod executor;
pub mod expr;
pub mod mock;
pub mod resolver;
pub mod runner;
pub mod validator;

pub use executor::GraphExecutor;
pub use mock::MockStepExecutor;
pub use runner::NodeRunner;
pub use validator::{validate, ValidationReport};
