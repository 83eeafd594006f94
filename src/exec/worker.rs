// src/exec/worker.rs

//! Running one attempt of one instance.

use std::any::Any;
use std::sync::Arc;

use tracing::{debug, error};

use crate::dag::DependencyGate;
use crate::engine::{JobInstance, TaskOutcome};
use crate::task::{CancelSignal, TaskContext, TaskRegistry};

/// Run one attempt of `instance` to completion and classify the result.
///
/// Nothing escapes: an unknown task name, a task error, a panic and a failed
/// completion write all come back as [`TaskOutcome::Failed`]. Success is only
/// reported after the completion record was durably written.
pub async fn run_instance(
    instance: &JobInstance,
    registry: &TaskRegistry,
    gate: &Arc<DependencyGate>,
    cancel: &CancelSignal,
) -> TaskOutcome {
    let task = match registry.resolve(&instance.definition.task) {
        Ok(task) => task,
        Err(err) => {
            error!(job = %instance.job_id(), error = %err, "cannot resolve task");
            return TaskOutcome::Failed(err.to_string());
        }
    };

    let definition = Arc::clone(&instance.definition);
    let cycle = instance.cycle.clone();
    let attempt = instance.attempt;
    let fire_at = instance.fire_at;
    let cancel = cancel.clone();
    let gate = Arc::clone(gate);

    debug!(job = %definition.id, seq = instance.seq, attempt, "running task");
    let joined = tokio::task::spawn_blocking(move || {
        let ctx = TaskContext::new(
            &definition.id,
            &definition.payload,
            attempt,
            fire_at,
            &cycle,
            &cancel,
        );
        if let Err(err) = task.execute(&ctx) {
            return TaskOutcome::Failed(format!("{err:#}"));
        }
        match gate.record_completion(&definition.id, &cycle) {
            Ok(_) => TaskOutcome::Success,
            Err(err) => {
                error!(job = %definition.id, %cycle, error = %err, "task succeeded but completion was not persisted");
                TaskOutcome::Failed(err.to_string())
            }
        }
    })
    .await;

    match joined {
        Ok(outcome) => outcome,
        Err(err) if err.is_panic() => {
            let msg = panic_message(err.into_panic());
            error!(job = %instance.job_id(), panic = %msg, "task panicked");
            TaskOutcome::Failed(format!("task panicked: {msg}"))
        }
        Err(err) => TaskOutcome::Failed(format!("task did not complete: {err}")),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
