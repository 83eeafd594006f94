#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use tickdag::dag::DependencyGate;
use tickdag::engine::{
    CoreCommand, CoreStep, DispatchCore, DispatchOptions, JobInstance, RetryPolicy, RuntimeEvent,
    TaskOutcome,
};
use tickdag::report::Report;
use tickdag::schedule::JobDefinition;

pub use tickdag_test_utils::clock::utc;
pub use tickdag_test_utils::init_tracing;

/// Dispatcher options with deterministic (jitter-free) retries.
pub fn options(workers: usize) -> DispatchOptions {
    DispatchOptions {
        workers,
        retry: RetryPolicy {
            max_delay: Duration::from_secs(3600),
            jitter: false,
        },
        max_backlog_per_job: None,
    }
}

pub fn new_core(workers: usize) -> (DispatchCore, Arc<DependencyGate>) {
    let gate = Arc::new(DependencyGate::in_memory());
    (DispatchCore::new(Arc::clone(&gate), options(workers)), gate)
}

/// Definitions keyed by id, shared the way a schedule snapshot shares them.
pub fn by_id(defs: Vec<JobDefinition>) -> HashMap<String, Arc<JobDefinition>> {
    defs.into_iter()
        .map(|d| (d.id.clone(), Arc::new(d)))
        .collect()
}

/// Simple sequence source for hand-made instances.
#[derive(Default)]
pub struct Instances {
    next_seq: u64,
}

impl Instances {
    pub fn fire(&mut self, def: &Arc<JobDefinition>, at: DateTime<Utc>) -> JobInstance {
        self.next_seq += 1;
        JobInstance::new(self.next_seq, Arc::clone(def), at)
    }
}

pub fn tick(core: &mut DispatchCore, now: DateTime<Utc>, due: Vec<JobInstance>) -> CoreStep {
    core.step(RuntimeEvent::Tick { now, due })
}

pub fn finish(
    core: &mut DispatchCore,
    instance: JobInstance,
    outcome: TaskOutcome,
    at: DateTime<Utc>,
) -> CoreStep {
    core.step(RuntimeEvent::InstanceFinished {
        instance,
        outcome,
        finished_at: at,
    })
}

pub fn dispatched(step: &CoreStep) -> Vec<JobInstance> {
    step.commands
        .iter()
        .filter_map(|c| match c {
            CoreCommand::Dispatch(i) => Some(i.clone()),
            _ => None,
        })
        .collect()
}

pub fn dispatched_ids(step: &CoreStep) -> Vec<String> {
    dispatched(step)
        .iter()
        .map(|i| i.job_id().to_string())
        .collect()
}

pub fn reports(step: &CoreStep) -> Vec<Report> {
    step.commands
        .iter()
        .filter_map(|c| match c {
            CoreCommand::Report(r) => Some(r.clone()),
            _ => None,
        })
        .collect()
}
