use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::bail;
use assetdag::dag::TaskSpec;
use assetdag::exec::{StageOutput, StageRunner};

/// A fake stage runner that:
/// - records which tasks were "run", in order
/// - fails the tasks it was told to fail
/// - optionally sleeps per task, to simulate slow stages.
#[derive(Debug, Clone, Default)]
pub struct RecordingRunner {
    executed: Arc<Mutex<Vec<String>>>,
    failing: Arc<Mutex<BTreeSet<String>>>,
    delay: Option<Duration>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(self, task: &str) -> Self {
        self.failing.lock().unwrap().insert(task.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Stop failing `task` (a "fix" between two runs).
    pub fn heal(&self, task: &str) {
        self.failing.lock().unwrap().remove(task);
    }

    /// Shared handle on the execution log.
    pub fn executed(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.executed)
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

impl StageRunner for RecordingRunner {
    fn run_stage(&self, task: &TaskSpec) -> anyhow::Result<StageOutput> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        {
            let mut guard = self.executed.lock().unwrap();
            guard.push(task.name.clone());
        }

        if self.failing.lock().unwrap().contains(&task.name) {
            bail!("stage for '{}' failed on purpose", task.name);
        }
        Ok(StageOutput::default())
    }
}
