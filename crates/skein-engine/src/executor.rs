use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use skein_core::config::EngineConfig;
use skein_core::error::{Result, SkeinError};
use skein_core::goal::Goal;
use skein_core::graph::{GraphSpec, NodeSpec};
use skein_core::traits::{SessionStore, StepExecutor};
use skein_core::types::{ExecutionResult, RunEvent, SessionId, SessionState};
use skein_core::EventBus;

use crate::resolver;
use crate::runner::NodeRunner;
use crate::validator;

/// Orchestrates a graph run as a sequential state machine.
///
/// One executor drives one run at a time; distinct runs get distinct
/// executors (and session ids) and share nothing. The step executor is the
/// only component allowed to block; cancelling the token aborts the in-flight
/// invocation and leaves the run persisted and resumable.
pub struct GraphExecutor {
    graph: GraphSpec,
    goal: Option<Goal>,
    config: EngineConfig,
    step_executor: Arc<dyn StepExecutor>,
    store: Arc<dyn SessionStore>,
    events: EventBus,
    cancel: CancellationToken,
}

impl std::fmt::Debug for GraphExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphExecutor").finish_non_exhaustive()
    }
}

impl GraphExecutor {
    /// Build an executor for `graph`. The graph is validated here; an
    /// invalid graph is refused before anything runs.
    pub fn new(
        graph: GraphSpec,
        goal: Option<Goal>,
        config: EngineConfig,
        step_executor: Arc<dyn StepExecutor>,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self> {
        let report = validator::validate(&graph);
        if !report.valid {
            return Err(SkeinError::InvalidGraph(report.errors.join("; ")));
        }
        for warning in &report.warnings {
            warn!(graph_id = %graph.id, "{}", warning);
        }
        if let Some(goal) = &goal {
            if !graph.goal_id.is_empty() && graph.goal_id != goal.id {
                warn!(
                    graph_id = %graph.id,
                    graph_goal = %graph.goal_id,
                    goal_id = %goal.id,
                    "Graph declares a different goal id than the one attached"
                );
            }
        }

        Ok(Self {
            graph,
            goal,
            config,
            step_executor,
            store,
            events: EventBus::default(),
            cancel: CancellationToken::new(),
        })
    }

    /// The run event stream.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Get a cancellation token for this executor.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Execute the graph from its entry node with the given initial input.
    pub async fn run(
        &self,
        session_id: SessionId,
        initial_input: HashMap<String, serde_json::Value>,
    ) -> Result<ExecutionResult> {
        let entry = self.graph.entry_node.clone();
        self.run_from(session_id, &entry, initial_input).await
    }

    /// Execute the graph from a caller-supplied entry point.
    pub async fn run_from(
        &self,
        session_id: SessionId,
        entry: &str,
        initial_input: HashMap<String, serde_json::Value>,
    ) -> Result<ExecutionResult> {
        if !self.graph.is_entry_point(entry) {
            return Err(SkeinError::InvalidGraph(format!(
                "'{}' is not a declared entry point",
                entry
            )));
        }

        let mut state = SessionState::new(session_id.clone(), &self.graph.id, &self.graph.version);
        state.context = skein_core::Context::from_map(initial_input);

        info!(session_id = %session_id, graph_id = %self.graph.id, entry, "Starting graph run");
        self.events.publish(RunEvent::RunStarted {
            session_id,
            graph_id: self.graph.id.clone(),
        });

        let queue: VecDeque<String> = VecDeque::from([entry.to_string()]);
        self.drive(&mut state, queue).await
    }

    /// Resume a previously suspended run.
    ///
    /// The supplemental input is merged into the restored context and the
    /// loop restarts at the node *following* the recorded pause node; the
    /// pause node itself is not re-executed. Retry counters and edge history
    /// carry over, so resuming twice with the same input replays the same
    /// node sequence.
    pub async fn resume(
        &self,
        session_id: &SessionId,
        supplemental_input: HashMap<String, serde_json::Value>,
    ) -> Result<ExecutionResult> {
        let mut state = self
            .store
            .load(session_id)?
            .ok_or_else(|| SkeinError::SessionNotFound(session_id.to_string()))?;

        if state.graph_version != self.graph.version {
            return Err(SkeinError::VersionMismatch {
                expected: self.graph.version.clone(),
                found: state.graph_version,
            });
        }
        if state.graph_id != self.graph.id {
            return Err(SkeinError::Session(format!(
                "session '{}' belongs to graph '{}', not '{}'",
                session_id, state.graph_id, self.graph.id
            )));
        }

        state.context.apply(&supplemental_input);

        info!(session_id = %session_id, last_node = ?state.last_node, "Resuming graph run");
        self.events.publish(RunEvent::RunResumed {
            session_id: session_id.clone(),
        });

        let queue = match state.last_node.clone() {
            // Nothing ran before suspension; start at the entry node
            None => VecDeque::from([self.graph.entry_node.clone()]),
            Some(last) => {
                match resolver::resolve(&self.graph, &last, state.last_status, &state.context) {
                    Ok(edges) => {
                        let mut queue = VecDeque::new();
                        for edge in edges {
                            state.edge_history.push(edge.id.clone());
                            self.events.publish(RunEvent::EdgeTaken {
                                edge_id: edge.id.clone(),
                                target: edge.target.clone(),
                            });
                            queue.push_back(edge.target.clone());
                        }
                        queue
                    }
                    Err(SkeinError::DeadEnd { node }) => {
                        self.persist(&mut state)?;
                        return Ok(self.finish_failed(
                            &state,
                            0,
                            SkeinError::DeadEnd { node }.to_string(),
                        ));
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        self.drive(&mut state, queue).await
    }

    /// The run loop. Pops the next node, executes it, applies its patch,
    /// and follows matching edges until a terminal node, a pause, a fatal
    /// error, or the step budget ends the walk.
    async fn drive(
        &self,
        state: &mut SessionState,
        mut queue: VecDeque<String>,
    ) -> Result<ExecutionResult> {
        let index = self.graph.node_index();
        let runner = NodeRunner::new(
            Duration::from_secs(self.config.step_timeout_secs),
            self.goal.clone(),
            self.graph.metadata.clone(),
        );
        let mut steps: u32 = 0;
        let mut last_error: Option<String> = None;

        while let Some(current) = queue.pop_front() {
            if self.graph.is_terminal(&current) {
                return self.finish_at_terminal(state, &current, &index, steps, last_error);
            }

            if steps >= self.config.step_budget {
                self.persist(state)?;
                let err = SkeinError::StepBudgetExceeded {
                    budget: self.config.step_budget,
                };
                error!(session_id = %state.session_id, "{}", err);
                return Ok(self.finish_failed(state, steps, err.to_string()));
            }

            if self.cancel.is_cancelled() {
                return self.suspend_cancelled(state, steps);
            }

            let node = *index
                .get(current.as_str())
                .ok_or_else(|| SkeinError::NodeNotFound(current.clone()))?;

            info!(node_id = %node.id, node_name = %node.name, "Executing graph node");
            self.events.publish(RunEvent::NodeStarted {
                node_id: node.id.clone(),
            });

            let skip_preconditions = self.graph.is_entry_point(&node.id);
            let retries = state.retry_counts.entry(node.id.clone()).or_insert(0);
            let outcome = match runner
                .run(
                    node,
                    &state.context,
                    self.step_executor.as_ref(),
                    retries,
                    skip_preconditions,
                    &self.cancel,
                )
                .await
            {
                Ok(outcome) => outcome,
                Err(SkeinError::Cancelled) => return self.suspend_cancelled(state, steps),
                Err(e) => return Err(e),
            };

            steps += outcome.attempts;
            if outcome.status.is_success() {
                state.context.apply(&outcome.patch);
            }
            state.last_node = Some(node.id.clone());
            state.last_status = outcome.status;
            last_error = outcome.error.clone();

            self.events.publish(RunEvent::NodeFinished {
                node_id: node.id.clone(),
                status: outcome.status,
                attempts: outcome.attempts,
            });

            if outcome.status.is_success() && self.graph.is_pause(&node.id) {
                // Persistence must complete before the pause is reported
                self.persist(state)?;
                info!(session_id = %state.session_id, node_id = %node.id, "Run paused");
                self.events.publish(RunEvent::RunPaused {
                    session_id: state.session_id.clone(),
                    node_id: node.id.clone(),
                });
                return Ok(ExecutionResult {
                    success: false,
                    steps_executed: steps,
                    output: HashMap::new(),
                    error: None,
                    paused_at: Some(node.id.clone()),
                    session_state: Some(state.clone()),
                });
            }

            match resolver::resolve(&self.graph, &node.id, outcome.status, &state.context) {
                Ok(edges) => {
                    for edge in edges {
                        state.edge_history.push(edge.id.clone());
                        self.events.publish(RunEvent::EdgeTaken {
                            edge_id: edge.id.clone(),
                            target: edge.target.clone(),
                        });
                        queue.push_back(edge.target.clone());
                    }
                }
                Err(SkeinError::DeadEnd { node }) => {
                    self.persist(state)?;
                    let mut message = SkeinError::DeadEnd { node }.to_string();
                    if let Some(step_error) = &last_error {
                        message = format!("{message}; last step error: {step_error}");
                    }
                    error!(session_id = %state.session_id, "{}", message);
                    return Ok(self.finish_failed(state, steps, message));
                }
                Err(e) => return Err(e),
            }
        }

        // Unreachable for validated graphs: every executed node either ends
        // the run or queues a successor.
        Err(SkeinError::InvalidGraph(
            "execution queue drained without reaching a terminal node".into(),
        ))
    }

    fn finish_at_terminal(
        &self,
        state: &mut SessionState,
        terminal: &str,
        index: &HashMap<&str, &NodeSpec>,
        steps: u32,
        last_error: Option<String>,
    ) -> Result<ExecutionResult> {
        let success = state.last_status.is_success();
        self.persist(state)?;

        let output = if success {
            self.project_output(terminal, state, index)
        } else {
            HashMap::new()
        };

        info!(
            session_id = %state.session_id,
            terminal,
            success,
            steps,
            "Graph run finished"
        );
        self.events.publish(RunEvent::RunFinished {
            session_id: state.session_id.clone(),
            success,
            steps_executed: steps,
        });

        Ok(ExecutionResult {
            success,
            steps_executed: steps,
            output,
            error: if success { None } else { last_error },
            paused_at: None,
            session_state: None,
        })
    }

    /// Final output: the terminal node's declared inputs projected from the
    /// context, or the whole context when it declares none.
    fn project_output(
        &self,
        terminal: &str,
        state: &SessionState,
        index: &HashMap<&str, &NodeSpec>,
    ) -> HashMap<String, serde_json::Value> {
        match index.get(terminal) {
            Some(node) if !node.input_keys.is_empty() => state.context.view(&node.input_keys),
            _ => state.context.data().clone(),
        }
    }

    fn finish_failed(&self, state: &SessionState, steps: u32, message: String) -> ExecutionResult {
        self.events.publish(RunEvent::RunFinished {
            session_id: state.session_id.clone(),
            success: false,
            steps_executed: steps,
        });
        ExecutionResult {
            success: false,
            steps_executed: steps,
            output: HashMap::new(),
            error: Some(message),
            paused_at: None,
            session_state: None,
        }
    }

    /// Cancelled mid-run: persist progress so the run is resumable, then
    /// report a paused-equivalent result instead of losing the work.
    fn suspend_cancelled(&self, state: &mut SessionState, steps: u32) -> Result<ExecutionResult> {
        self.persist(state)?;
        warn!(session_id = %state.session_id, last_node = ?state.last_node, "Run cancelled, state persisted");
        Ok(ExecutionResult {
            success: false,
            steps_executed: steps,
            output: HashMap::new(),
            error: Some(SkeinError::Cancelled.to_string()),
            paused_at: state.last_node.clone(),
            session_state: Some(state.clone()),
        })
    }

    fn persist(&self, state: &mut SessionState) -> Result<()> {
        state.saved_at = Utc::now();
        self.store.save(state)
    }
}
