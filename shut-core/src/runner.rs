//! Sequential execution of a task graph with a configurable failure policy.

use std::time::{Duration, Instant};

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::graph::{TaskGraph, TaskKey};
use crate::task::{TaskFailure, TaskStatus};

/// What the runner does with the remaining tasks once a task ends in [`TaskStatus::Error`].
///
/// The graph itself never propagates failures along edges; this policy is the runner's.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnFailure {
    /// Run every remaining task regardless.
    #[default]
    Continue,
    /// Mark tasks with a failed (transitive) dependency as skipped without running them.
    SkipDependents,
    /// Stop at the first failure; remaining tasks stay pending.
    Halt,
}

/// Result of executing a single task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    /// Identifier of the task that was executed.
    pub id: String,
    /// Terminal status of the task.
    pub status: TaskStatus,
    /// Wall time spent in the task's action.
    pub duration: Duration,
    /// The recorded failure, if the task ended in an error.
    pub error: Option<TaskFailure>,
    /// Whether the task was skipped because a dependency failed.
    pub blocked: bool,
}

/// Results of one run, in execution order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub results: Vec<TaskResult>,
    /// Tasks left pending because the run halted early.
    pub not_run: Vec<String>,
}

impl RunReport {
    /// `false` if any task ended in [`TaskStatus::Error`].
    pub fn success(&self) -> bool {
        !self
            .results
            .iter()
            .any(|result| result.status == TaskStatus::Error)
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.results
            .iter()
            .filter(|result| result.status == status)
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &TaskResult> {
        self.results
            .iter()
            .filter(|result| result.status == TaskStatus::Error)
    }
}

/// Executes tasks one at a time in dependency order.
#[derive(Debug, Clone, Default)]
pub struct TaskRunner {
    on_failure: OnFailure,
}

impl TaskRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_on_failure(mut self, on_failure: OnFailure) -> Self {
        self.on_failure = on_failure;
        self
    }

    /// Runs `selection` (all tasks if empty) plus its dependencies.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown identifiers, cycles, or tasks that were already executed.
    pub fn run<S: AsRef<str>>(&self, graph: &mut TaskGraph, selection: &[S]) -> Result<RunReport> {
        self.run_with(graph, selection, |_| {})
    }

    /// Like [`TaskRunner::run`], calling `on_result` after each task finishes.
    pub fn run_with<S, F>(
        &self,
        graph: &mut TaskGraph,
        selection: &[S],
        mut on_result: F,
    ) -> Result<RunReport>
    where
        S: AsRef<str>,
        F: FnMut(&TaskResult),
    {
        let order = if selection.is_empty() {
            graph.ordered_tasks()?
        } else {
            graph.ordered_selection(selection)?
        };
        info!(tasks = order.len(), policy = ?self.on_failure, "running tasks");

        let mut report = RunReport::default();
        let mut failed: FxHashSet<TaskKey> = FxHashSet::default();

        for (position, &key) in order.iter().enumerate() {
            let id = graph.identifier(key)?;

            let blocked = self.on_failure == OnFailure::SkipDependents
                && graph
                    .dependencies(key)?
                    .iter()
                    .any(|dep| failed.contains(dep));

            let start = Instant::now();
            let status = if blocked {
                debug!(id = %id, "skipping task with failed dependency");
                graph.skip(key)?;
                failed.insert(key);
                TaskStatus::Skipped
            } else {
                graph.execute(key)?
            };
            let duration = start.elapsed();

            let result = TaskResult {
                id,
                status,
                duration,
                error: graph.task(key)?.error().cloned(),
                blocked,
            };
            on_result(&result);
            report.results.push(result);

            if status == TaskStatus::Error {
                failed.insert(key);
                if self.on_failure == OnFailure::Halt {
                    for &rest in &order[position + 1..] {
                        report.not_run.push(graph.identifier(rest)?);
                    }
                    info!(not_run = report.not_run.len(), "halting after failure");
                    break;
                }
            }
        }

        Ok(report)
    }
}
