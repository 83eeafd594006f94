use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tickdag::dag::DependencyGate;
use tickdag::engine::{JobInstance, RuntimeEvent, TaskOutcome};
use tickdag::errors::Result;
use tickdag::exec::ExecutorBackend;

use crate::clock::VirtualClock;

/// A fake executor that:
/// - records which instances were dispatched
/// - immediately reports `InstanceFinished` for each, with a scripted
///   outcome per job (success when nothing is scripted)
/// - records completions in the gate on success, like the real workers
pub struct FakeExecutor {
    runtime_tx: mpsc::UnboundedSender<RuntimeEvent>,
    clock: VirtualClock,
    gate: Option<Arc<DependencyGate>>,
    dispatched: Arc<Mutex<Vec<JobInstance>>>,
    script: Arc<Mutex<HashMap<String, VecDeque<TaskOutcome>>>>,
    cancelled: Arc<AtomicBool>,
}

impl FakeExecutor {
    pub fn new(runtime_tx: mpsc::UnboundedSender<RuntimeEvent>, clock: VirtualClock) -> Self {
        Self {
            runtime_tx,
            clock,
            gate: None,
            dispatched: Arc::new(Mutex::new(Vec::new())),
            script: Arc::new(Mutex::new(HashMap::new())),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_gate(mut self, gate: Arc<DependencyGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Queue outcomes for the next attempts of `job`.
    pub fn script(&self, job: &str, outcomes: impl IntoIterator<Item = TaskOutcome>) {
        self.script
            .lock()
            .unwrap()
            .entry(job.to_string())
            .or_default()
            .extend(outcomes);
    }

    /// Shared log of dispatched instances.
    pub fn dispatched(&self) -> Arc<Mutex<Vec<JobInstance>>> {
        Arc::clone(&self.dispatched)
    }

    pub fn cancelled(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }
}

impl ExecutorBackend for FakeExecutor {
    fn dispatch(
        &mut self,
        instance: JobInstance,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let finished_at = self.clock.now();
        let gate = self.gate.clone();
        let dispatched = Arc::clone(&self.dispatched);
        let script = Arc::clone(&self.script);

        Box::pin(async move {
            dispatched.lock().unwrap().push(instance.clone());

            let mut outcome = script
                .lock()
                .unwrap()
                .get_mut(instance.job_id())
                .and_then(VecDeque::pop_front)
                .unwrap_or(TaskOutcome::Success);

            if outcome == TaskOutcome::Success {
                if let Some(gate) = gate {
                    if let Err(e) = gate.record_completion_at(instance.job_id(), &instance.cycle, finished_at) {
                        outcome = TaskOutcome::Failed(e.to_string());
                    }
                }
            }

            tx.send(RuntimeEvent::InstanceFinished {
                instance,
                outcome,
                finished_at,
            })
            .map_err(|e| anyhow::anyhow!("runtime channel closed: {e}"))?;
            Ok(())
        })
    }

    fn cancel_running(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}
