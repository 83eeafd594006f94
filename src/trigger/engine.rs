// src/trigger/engine.rs

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use crate::engine::{JobInstance, RuntimeEvent};
use crate::schedule::{ScheduleSnapshot, ScheduleStore, TriggerSpec};
use crate::trigger::next_fire::next_fire_time;
use crate::types::JobId;

#[derive(Debug, Clone)]
struct Tracked {
    trigger: TriggerSpec,
    next_due: DateTime<Utc>,
}

/// Decides which jobs are due.
///
/// Keeps one `next_due` per job. When a check finds a job overdue it emits a
/// single instance carrying the originally intended fire time and advances
/// from that fire time, so a late check never skips a period; missed periods
/// surface one per check until the job has caught up.
#[derive(Debug, Default)]
pub struct TriggerEngine {
    jobs: HashMap<JobId, Tracked>,
    next_seq: u64,
}

impl TriggerEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate every job in `snapshot` at `now`, returning due instances in
    /// document order.
    pub fn evaluate(&mut self, snapshot: &ScheduleSnapshot, now: DateTime<Utc>) -> Vec<JobInstance> {
        let live: HashSet<&str> = snapshot.jobs().iter().map(|j| j.id.as_str()).collect();
        self.jobs.retain(|id, _| {
            let keep = live.contains(id.as_str());
            if !keep {
                debug!(job = %id, "job removed from schedule; no longer tracked");
            }
            keep
        });

        let mut due = Vec::new();
        for def in snapshot.jobs() {
            let known = self.jobs.get(&def.id).map(|t| t.trigger == def.trigger);
            if known != Some(true) {
                let next_due = next_fire_time(&def.trigger, now, None);
                if known.is_some() {
                    info!(job = %def.id, trigger = %def.trigger, %next_due, "trigger changed; rescheduled");
                } else {
                    debug!(job = %def.id, trigger = %def.trigger, %next_due, "tracking job");
                }
                self.jobs.insert(
                    def.id.clone(),
                    Tracked {
                        trigger: def.trigger,
                        next_due,
                    },
                );
                continue;
            }
            let Some(tracked) = self.jobs.get_mut(&def.id) else {
                continue;
            };

            if tracked.next_due > now {
                continue;
            }

            let fire_at = tracked.next_due;
            tracked.next_due = next_fire_time(&def.trigger, fire_at, Some(fire_at));

            self.next_seq += 1;
            let instance = JobInstance::new(self.next_seq, Arc::clone(def), fire_at);
            trace!(
                job = %def.id,
                seq = instance.seq,
                %fire_at,
                next_due = %tracked.next_due,
                "job due"
            );
            due.push(instance);
        }
        due
    }

    /// When `id` is next due, if it is tracked.
    pub fn next_due(&self, id: &str) -> Option<DateTime<Utc>> {
        self.jobs.get(id).map(|t| t.next_due)
    }
}

/// Evaluate the live schedule every `tick` and send the due instances to
/// the runtime.
///
/// Every tick produces a `RuntimeEvent::Tick`, even without due instances,
/// so the dispatcher can promote retries and expire dependency waits.
pub fn spawn_trigger_loop(
    store: Arc<ScheduleStore>,
    tick: Duration,
    tx: mpsc::UnboundedSender<RuntimeEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut engine = TriggerEngine::new();
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(?tick, "trigger loop started");
        loop {
            interval.tick().await;
            let now = Utc::now();
            let due = engine.evaluate(&store.snapshot(), now);
            if tx.send(RuntimeEvent::Tick { now, due }).is_err() {
                debug!("runtime channel closed; trigger loop exiting");
                break;
            }
        }
    })
}
