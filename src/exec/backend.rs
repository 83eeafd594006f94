// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of a raw channel.
//! This makes it easy to swap in a fake executor in tests while keeping the
//! production worker pool here.
//!
//! - [`WorkerPool`] is the implementation used by `tickdag`: a fixed number
//!   of Tokio workers pulling instances from one shared queue.
//! - Tests can provide their own `ExecutorBackend` that, for example, records
//!   which instances were dispatched and directly emits `InstanceFinished`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::dag::DependencyGate;
use crate::engine::{JobInstance, RuntimeEvent};
use crate::errors::{Result, TickdagError};
use crate::task::{CancelSignal, TaskRegistry};

use super::worker::run_instance;

/// Trait abstracting how dispatched instances are executed.
///
/// Production code uses [`WorkerPool`]; tests can provide their own
/// implementation that doesn't run real tasks.
pub trait ExecutorBackend: Send {
    /// Start one attempt of `instance`. The core only dispatches while a
    /// worker is idle, so this must not queue behind other attempts.
    ///
    /// The implementation must eventually send exactly one
    /// `RuntimeEvent::InstanceFinished` for the instance.
    fn dispatch(
        &mut self,
        instance: JobInstance,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Ask running attempts to stop (shutdown).
    fn cancel_running(&mut self);
}

/// Bounded pool of workers.
pub struct WorkerPool {
    tx: mpsc::UnboundedSender<JobInstance>,
    cancel: CancelSignal,
    workers: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers.len())
            .finish_non_exhaustive()
    }
}

impl WorkerPool {
    /// Spawn `size` workers. Each sends `InstanceFinished` to `runtime_tx`
    /// after every attempt.
    pub fn new(
        size: usize,
        registry: Arc<TaskRegistry>,
        gate: Arc<DependencyGate>,
        runtime_tx: mpsc::UnboundedSender<RuntimeEvent>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<JobInstance>();
        let rx = Arc::new(Mutex::new(rx));
        let cancel = CancelSignal::new();

        let workers = (0..size.max(1))
            .map(|id| {
                let rx = Arc::clone(&rx);
                let registry = Arc::clone(&registry);
                let gate = Arc::clone(&gate);
                let cancel = cancel.clone();
                let runtime_tx = runtime_tx.clone();
                tokio::spawn(async move {
                    debug!(worker = id, "worker started");
                    loop {
                        let next = rx.lock().await.recv().await;
                        let Some(instance) = next else {
                            break;
                        };
                        let outcome = run_instance(&instance, &registry, &gate, &cancel).await;
                        let event = RuntimeEvent::InstanceFinished {
                            instance,
                            outcome,
                            finished_at: Utc::now(),
                        };
                        if runtime_tx.send(event).is_err() {
                            debug!(worker = id, "runtime gone; worker exiting");
                            break;
                        }
                    }
                    debug!(worker = id, "worker finished");
                })
            })
            .collect();

        info!(workers = size.max(1), "worker pool started");
        Self {
            tx,
            cancel,
            workers,
        }
    }
}

impl ExecutorBackend for WorkerPool {
    fn dispatch(
        &mut self,
        instance: JobInstance,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let sent = self.tx.send(instance);
        Box::pin(async move {
            sent.map_err(|e| {
                TickdagError::Other(anyhow::anyhow!(
                    "worker pool closed; could not dispatch {}",
                    e.0
                ))
            })
        })
    }

    fn cancel_running(&mut self) {
        info!("raising cancellation signal for running tasks");
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use chrono::TimeZone;

    use super::*;
    use crate::engine::TaskOutcome;
    use crate::schedule::test_support::definition;
    use crate::task::TaskContext;

    #[tokio::test]
    async fn runs_at_most_pool_size_tasks_at_once() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut registry = TaskRegistry::new();
        {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            registry.register("slow", move |_: &TaskContext<'_>| -> anyhow::Result<()> {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(50));
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            });
        }

        let (rt_tx, mut rt_rx) = mpsc::unbounded_channel();
        let mut pool = WorkerPool::new(
            2,
            Arc::new(registry),
            Arc::new(DependencyGate::in_memory()),
            rt_tx,
        );

        let at = Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap();
        for i in 0..5u64 {
            let mut def = definition(&format!("job{i}"), &[]);
            def.task = "slow".into();
            pool.dispatch(JobInstance::new(i, Arc::new(def), at)).await.unwrap();
        }

        for _ in 0..5 {
            match rt_rx.recv().await {
                Some(RuntimeEvent::InstanceFinished { outcome, .. }) => {
                    assert_eq!(outcome, TaskOutcome::Success)
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
