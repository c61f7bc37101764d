// src/dag/scheduler.rs

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::dag::graph::TaskGraph;
use crate::dag::task_info::{TaskRecord, TaskRunState};
use crate::engine::TaskName;
use crate::errors::{AssetdagError, Result};
use crate::exec::StageRunner;

/// Result of executing one resolved order.
#[derive(Debug)]
pub struct RunReport {
    /// Monotonically increasing run identifier.
    pub run_id: u64,
    /// One record per task in the order, in order.
    pub records: Vec<TaskRecord>,
    /// The first failure, which stopped the run.
    pub failure: Option<AssetdagError>,
    /// Shutdown was requested before every task got to run.
    pub interrupted: bool,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none() && !self.interrupted
    }

    /// Whether `task` ran to completion in this run.
    pub fn succeeded(&self, task: &str) -> bool {
        self.state_of(task) == Some(TaskRunState::Succeeded)
    }

    pub fn state_of(&self, task: &str) -> Option<TaskRunState> {
        self.records.iter().find(|r| r.name == task).map(|r| r.state)
    }

    /// Names of the tasks that completed, in execution order.
    pub fn succeeded_tasks(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| r.state == TaskRunState::Succeeded)
            .map(|r| r.name.as_str())
            .collect()
    }

    /// Turn a failed run into its error (build mode).
    pub fn into_result(self) -> Result<Self> {
        match self.failure {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// Runs resolved task orders one task at a time.
///
/// Tasks never overlap: each stage runs on the blocking pool and is awaited
/// before the next one starts, so writes to the output tree are never
/// concurrent.
pub struct Scheduler {
    graph: Arc<TaskGraph>,
    runner: Arc<dyn StageRunner>,
    run_counter: u64,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("tasks", &self.graph.len())
            .field("run_counter", &self.run_counter)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    pub fn new(graph: Arc<TaskGraph>, runner: Arc<dyn StageRunner>) -> Self {
        Self {
            graph,
            runner,
            run_counter: 0,
        }
    }

    /// Execute `order` synchronously, in order.
    ///
    /// - The first failing task stops the run; later tasks are `Skipped` and
    ///   outputs already written stay in place.
    /// - If `shutdown` flips to `true`, the run stops before the next task
    ///   (a running stage is always allowed to finish its writes).
    pub async fn execute(
        &mut self,
        order: &[TaskName],
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> RunReport {
        self.run_counter += 1;
        let run_id = self.run_counter;
        info!(run_id, tasks = ?order, "starting run");

        let mut records = Vec::with_capacity(order.len());
        let mut failure = None;
        let mut interrupted = false;

        for name in order {
            let stop = failure.is_some()
                || interrupted
                || shutdown.is_some_and(|rx| *rx.borrow());
            if stop {
                if failure.is_none() {
                    interrupted = true;
                }
                records.push(skipped(name));
                continue;
            }

            let started = Instant::now();
            match self.run_one(name).await {
                Ok(outputs) => {
                    let elapsed = started.elapsed();
                    debug!(
                        run_id,
                        task = %name,
                        outputs = outputs.len(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "task finished"
                    );
                    records.push(TaskRecord {
                        name: name.clone(),
                        state: TaskRunState::Succeeded,
                        outputs,
                        elapsed,
                    });
                }
                Err(err) => {
                    error!(run_id, task = %name, error = %err, "task failed; stopping run");
                    records.push(TaskRecord {
                        name: name.clone(),
                        state: TaskRunState::Failed,
                        outputs: Vec::new(),
                        elapsed: started.elapsed(),
                    });
                    failure = Some(err);
                }
            }
        }

        if interrupted {
            warn!(run_id, "run interrupted by shutdown request");
        } else if failure.is_none() {
            info!(run_id, "run finished");
        }

        RunReport {
            run_id,
            records,
            failure,
            interrupted,
        }
    }

    async fn run_one(&self, name: &str) -> Result<Vec<std::path::PathBuf>> {
        let spec = self
            .graph
            .get(name)
            .cloned()
            .ok_or_else(|| AssetdagError::TaskNotFound(name.to_string()))?;
        let runner = Arc::clone(&self.runner);
        let task = spec.name.clone();

        let joined = tokio::task::spawn_blocking(move || runner.run_stage(&spec)).await;

        match joined {
            Ok(Ok(output)) => Ok(output.outputs),
            Ok(Err(source)) => Err(AssetdagError::StageFailure { task, source }),
            Err(join_err) => Err(AssetdagError::StageFailure {
                task,
                source: anyhow::anyhow!("stage aborted: {join_err}"),
            }),
        }
    }
}

fn skipped(name: &str) -> TaskRecord {
    TaskRecord {
        name: name.to_string(),
        state: TaskRunState::Skipped,
        outputs: Vec::new(),
        elapsed: std::time::Duration::ZERO,
    }
}
