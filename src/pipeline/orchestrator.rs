//! Dependency-ordered execution of a task graph.
//!
//! Edges come from artifact paths: a task depends on whichever task declares
//! one of its inputs as an output. Ready tasks run concurrently up to
//! `max_parallel`, each attempt bounded by a timeout and retried a bounded
//! number of times. A task whose input can never appear, because it is
//! neither produced by the graph nor present in the store or because its
//! producer failed, is reported unreachable together with all of its
//! dependents. Independent branches keep running.

use super::manifest::TaskManifest;
use super::registry::TaskRegistry;
use super::runner::TaskRunner;
use super::task::{Task, TaskOutcome, TaskSpec};
use crate::error::{ConfigurationError, PipelineError, Result};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use progenitor_core::config::PipelineConfig;
use progenitor_io::ArtifactStore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorOptions {
    pub timeout: Duration,
    /// Extra attempts after the first failure.
    pub max_retries: u32,
    pub max_parallel: usize,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

impl OrchestratorOptions {
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.task_timeout_s),
            max_retries: config.max_retries,
            max_parallel: config.max_parallel.max(1),
        }
    }
}

/// A constructed task with its label and serializable spec.
#[derive(Clone)]
pub struct TaskNode {
    pub label: String,
    pub spec: TaskSpec,
    pub task: Arc<dyn Task>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedTask {
    pub label: String,
    pub outcome: TaskOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedTask {
    pub label: String,
    pub manifest: TaskManifest,
    pub cause: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnreachableTask {
    pub label: String,
    /// Inputs that never became available.
    pub missing: Vec<PathBuf>,
}

/// Final status of every task, in dependency order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub completed: Vec<CompletedTask>,
    pub failed: Vec<FailedTask>,
    pub unreachable: Vec<UnreachableTask>,
}

impl PipelineReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.unreachable.is_empty()
    }

    #[must_use]
    pub fn completed_labels(&self) -> Vec<&str> {
        self.completed.iter().map(|c| c.label.as_str()).collect()
    }

    #[must_use]
    pub fn unreachable_labels(&self) -> Vec<&str> {
        self.unreachable.iter().map(|u| u.label.as_str()).collect()
    }
}

enum NodeState {
    Pending,
    Running,
    Done(TaskOutcome),
    Failed(PipelineError),
    Unreachable(Vec<PathBuf>),
}

struct Plan {
    graph: DiGraph<usize, PathBuf>,
    order: Vec<NodeIndex>,
    /// Inputs nobody in the graph produces, per node.
    external: Vec<Vec<PathBuf>>,
}

pub struct Orchestrator {
    store: ArtifactStore,
    runner: Arc<dyn TaskRunner>,
    registry: TaskRegistry,
    options: OrchestratorOptions,
    nodes: Vec<TaskNode>,
}

impl Orchestrator {
    pub fn new(store: ArtifactStore, runner: Arc<dyn TaskRunner>, options: OrchestratorOptions) -> Self {
        Self {
            store,
            runner,
            registry: TaskRegistry::with_builtins(),
            options,
            nodes: Vec::new(),
        }
    }

    /// Replaces the built-in task types; call before adding tasks.
    #[must_use]
    pub fn with_registry(mut self, registry: TaskRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Constructs the task described by `spec`; parameter errors surface
    /// here, before anything runs.
    pub fn add(&mut self, label: &str, spec: TaskSpec) -> std::result::Result<(), ConfigurationError> {
        if self.nodes.iter().any(|n| n.label == label) {
            return Err(ConfigurationError::new(format!("duplicate task label '{}'", label)));
        }
        let task = self
            .registry
            .build(&spec)
            .map_err(|e| ConfigurationError::new(format!("{}: {}", label, e.0)))?;
        self.nodes.push(TaskNode {
            label: label.to_string(),
            spec,
            task,
        });
        Ok(())
    }

    #[must_use]
    pub fn nodes(&self) -> &[TaskNode] {
        &self.nodes
    }

    #[must_use]
    pub fn manifests(&self) -> Vec<(String, TaskManifest)> {
        self.nodes
            .iter()
            .map(|n| (n.label.clone(), n.task.describe()))
            .collect()
    }

    fn plan(&self) -> std::result::Result<Plan, ConfigurationError> {
        let mut graph = DiGraph::new();
        let indices: Vec<NodeIndex> = (0..self.nodes.len()).map(|i| graph.add_node(i)).collect();

        let mut producers: HashMap<PathBuf, usize> = HashMap::new();
        for (i, node) in self.nodes.iter().enumerate() {
            for output in node.task.outputs() {
                if let Some(&other) = producers.get(&output) {
                    return Err(ConfigurationError::new(format!(
                        "{:?} is produced by both '{}' and '{}'",
                        output, self.nodes[other].label, node.label
                    )));
                }
                producers.insert(output, i);
            }
        }

        let mut external = vec![Vec::new(); self.nodes.len()];
        for (i, node) in self.nodes.iter().enumerate() {
            for input in node.task.inputs() {
                match producers.get(&input) {
                    Some(&p) if p == i => {
                        return Err(ConfigurationError::new(format!(
                            "'{}' consumes its own output {:?}",
                            node.label, input
                        )))
                    }
                    Some(&p) => {
                        graph.add_edge(indices[p], indices[i], input);
                    }
                    None => external[i].push(input),
                }
            }
        }

        let order = petgraph::algo::toposort(&graph, None).map_err(|cycle| {
            ConfigurationError::new(format!(
                "dependency cycle through '{}'",
                self.nodes[graph[cycle.node_id()]].label
            ))
        })?;
        Ok(Plan {
            graph,
            order,
            external,
        })
    }

    /// Marks every pending dependent of `from` unreachable.
    fn propagate_unreachable(plan: &Plan, states: &mut [NodeState], from: NodeIndex) {
        let mut stack = vec![from];
        while let Some(node) = stack.pop() {
            for edge in plan.graph.edges_directed(node, Direction::Outgoing) {
                let target = plan.graph[edge.target()];
                match &mut states[target] {
                    NodeState::Pending => {
                        states[target] = NodeState::Unreachable(vec![edge.weight().clone()]);
                        stack.push(edge.target());
                    }
                    NodeState::Unreachable(missing) => {
                        if !missing.contains(edge.weight()) {
                            missing.push(edge.weight().clone());
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    /// Validates the graph, then runs every reachable task.
    ///
    /// Only graph construction errors are returned as `Err`; task failures
    /// end up in the report.
    pub async fn run(&self) -> std::result::Result<PipelineReport, ConfigurationError> {
        let plan = self.plan()?;
        let mut states: Vec<NodeState> = self.nodes.iter().map(|_| NodeState::Pending).collect();

        for &idx in &plan.order {
            let i = plan.graph[idx];
            let missing: Vec<PathBuf> = plan.external[i]
                .iter()
                .filter(|p| !self.store.exists(p))
                .cloned()
                .collect();
            if !missing.is_empty() && matches!(states[i], NodeState::Pending) {
                tracing::warn!(task = %self.nodes[i].label, missing = ?missing, "Task inputs unavailable");
                states[i] = NodeState::Unreachable(missing);
                Self::propagate_unreachable(&plan, &mut states, idx);
            }
        }

        let mut running: JoinSet<(usize, Result<TaskOutcome>)> = JoinSet::new();
        loop {
            for &idx in &plan.order {
                if running.len() >= self.options.max_parallel {
                    break;
                }
                let i = plan.graph[idx];
                if !matches!(states[i], NodeState::Pending) {
                    continue;
                }
                let ready = plan
                    .graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .all(|p| matches!(states[plan.graph[p]], NodeState::Done(_)));
                if !ready {
                    continue;
                }
                states[i] = NodeState::Running;
                let node = self.nodes[i].clone();
                tracing::info!(task = %node.label, kind = node.task.kind(), "Task started");
                let attempt = run_with_retries(
                    self.runner.clone(),
                    node.clone(),
                    self.store.clone(),
                    self.options,
                );
                running.spawn(async move {
                    let result = match tokio::spawn(attempt).await {
                        Ok(result) => result,
                        Err(e) => Err(PipelineError::task_failed(&node.label, format!("panicked: {}", e))),
                    };
                    (i, result)
                });
            }

            let Some(joined) = running.join_next().await else {
                break;
            };
            let Ok((i, result)) = joined else {
                continue;
            };
            let idx = NodeIndex::new(i);
            let label = &self.nodes[i].label;
            match result {
                Ok(outcome) => {
                    tracing::info!(task = %label, outcome = ?outcome, "Task finished");
                    states[i] = NodeState::Done(outcome);
                }
                Err(e) => {
                    tracing::error!(task = %label, error = %e, "Task failed");
                    states[i] = NodeState::Failed(e);
                    Self::propagate_unreachable(&plan, &mut states, idx);
                }
            }
        }

        let mut report = PipelineReport::default();
        for &idx in &plan.order {
            let i = plan.graph[idx];
            let label = self.nodes[i].label.clone();
            match std::mem::replace(&mut states[i], NodeState::Pending) {
                NodeState::Done(outcome) => report.completed.push(CompletedTask { label, outcome }),
                NodeState::Failed(e) => report.failed.push(FailedTask {
                    label,
                    manifest: self.nodes[i].task.describe(),
                    cause: e.to_string(),
                }),
                NodeState::Unreachable(missing) => {
                    tracing::warn!(task = %label, missing = ?missing, "Task unreachable");
                    report.unreachable.push(UnreachableTask { label, missing });
                }
                NodeState::Pending | NodeState::Running => report.unreachable.push(UnreachableTask {
                    label,
                    missing: Vec::new(),
                }),
            }
        }
        tracing::info!(
            completed = report.completed.len(),
            failed = report.failed.len(),
            unreachable = report.unreachable.len(),
            "Pipeline finished"
        );
        Ok(report)
    }
}

async fn run_with_retries(
    runner: Arc<dyn TaskRunner>,
    node: TaskNode,
    store: ArtifactStore,
    options: OrchestratorOptions,
) -> Result<TaskOutcome> {
    let mut attempt = 0u32;
    loop {
        // An elapsed timeout drops the attempt, which cancels it in the runner.
        let attempted = tokio::time::timeout(
            options.timeout,
            runner.run(&node.label, &node.spec, node.task.clone(), &store),
        )
        .await;
        let result = attempted.unwrap_or_else(|_| {
            Err(PipelineError::Timeout {
                task: node.label.clone(),
                after: options.timeout,
            })
        });

        let result = result.and_then(|outcome| {
            let missing: Vec<PathBuf> = node
                .task
                .outputs()
                .into_iter()
                .filter(|p| !store.exists(p))
                .collect();
            if missing.is_empty() {
                Ok(outcome)
            } else {
                Err(PipelineError::task_failed(
                    &node.label,
                    format!("declared outputs missing: {:?}", missing),
                ))
            }
        });

        match result {
            Ok(outcome) => return Ok(outcome),
            Err(e) if e.is_permanent() || attempt >= options.max_retries => return Err(e),
            Err(e) => {
                attempt += 1;
                tracing::warn!(
                    task = %node.label,
                    attempt,
                    max_retries = options.max_retries,
                    error = %e,
                    "Task failed, retrying"
                );
            }
        }
    }
}

/// Labels grouped by task type, for the `describe` command.
#[must_use]
pub fn labels_by_kind(nodes: &[TaskNode]) -> BTreeMap<&'static str, Vec<&str>> {
    let mut grouped: BTreeMap<&'static str, Vec<&str>> = BTreeMap::new();
    for node in nodes {
        grouped
            .entry(node.task.kind())
            .or_default()
            .push(node.label.as_str());
    }
    grouped
}
