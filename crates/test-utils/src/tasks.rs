use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use tickdag::report::{Report, Reporter};
use tickdag::task::{Task, TaskContext};

/// One observed call of a test task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCall {
    pub job_id: String,
    pub attempt: u32,
    pub cycle: String,
}

/// Task that records every call and succeeds.
#[derive(Debug, Clone, Default)]
pub struct RecordingTask {
    calls: Arc<Mutex<Vec<TaskCall>>>,
}

impl RecordingTask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<TaskCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn job_ids(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.job_id).collect()
    }
}

impl Task for RecordingTask {
    fn execute(&self, ctx: &TaskContext<'_>) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(TaskCall {
            job_id: ctx.job_id.to_string(),
            attempt: ctx.attempt,
            cycle: ctx.cycle.to_string(),
        });
        Ok(())
    }
}

/// Task that fails its first `failures` calls, then succeeds.
#[derive(Debug, Clone)]
pub struct FailingTask {
    remaining: Arc<AtomicU32>,
    calls: Arc<AtomicU32>,
}

impl FailingTask {
    pub fn new(failures: u32) -> Self {
        Self {
            remaining: Arc::new(AtomicU32::new(failures)),
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Never succeeds.
    pub fn always() -> Self {
        Self::new(u32::MAX)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Task for FailingTask {
    fn execute(&self, ctx: &TaskContext<'_>) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let left = self.remaining.load(Ordering::SeqCst);
        if left > 0 {
            self.remaining.store(left - 1, Ordering::SeqCst);
            anyhow::bail!("{}: simulated failure on attempt {}", ctx.job_id, ctx.attempt);
        }
        Ok(())
    }
}

/// Reporter that keeps every report for inspection.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    reports: Mutex<Vec<Report>>,
}

impl CollectingReporter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().unwrap().clone()
    }
}

impl Reporter for CollectingReporter {
    fn report(&self, report: &Report) {
        self.reports.lock().unwrap().push(report.clone());
    }
}
