// src/engine/event_handlers.rs

//! Event handling logic for the dispatcher core.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, trace, warn};

use crate::engine::core::DispatchCore;
use crate::engine::lanes::LaneSlot;
use crate::engine::retry::should_retry;
use crate::engine::{InstanceStatus, JobInstance, TaskOutcome};
use crate::report::{AbandonReason, Report};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Hand this instance to an idle worker.
    Dispatch(JobInstance),
    /// Deliver this report to the reporter.
    Report(Report),
    /// Raise the cancellation signal for running attempts.
    CancelRunning,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl DispatchCore {
    /// Accept newly due instances, then make progress.
    pub(crate) fn handle_tick(&mut self, now: DateTime<Utc>, due: Vec<JobInstance>) -> CoreStep {
        self.advance_clock(now);
        let mut commands = Vec::new();

        if self.shutting_down {
            if !due.is_empty() {
                debug!(dropped = due.len(), "shutting down; ignoring due instances");
            }
            return self.finish_step(commands);
        }

        for instance in due {
            self.accept(instance, &mut commands);
        }
        self.pump(&mut commands);
        self.finish_step(commands)
    }

    /// Apply the outcome of one attempt, then make progress.
    pub(crate) fn handle_finished(
        &mut self,
        mut instance: JobInstance,
        outcome: TaskOutcome,
        finished_at: DateTime<Utc>,
    ) -> CoreStep {
        self.advance_clock(finished_at);
        let mut commands = Vec::new();

        let job = instance.job_id().to_string();
        let known = self
            .lanes
            .get(&job)
            .is_some_and(|lane| lane.is_running(instance.seq));
        if !known {
            warn!(job = %job, seq = instance.seq, "completion for an instance that is not running; ignored");
            return self.finish_step(commands);
        }
        self.in_flight = self.in_flight.saturating_sub(1);

        let def = std::sync::Arc::clone(&instance.definition);
        let next_slot = match outcome {
            TaskOutcome::Success => {
                instance.status = InstanceStatus::Succeeded;
                info!(
                    job = %job,
                    seq = instance.seq,
                    attempt = instance.attempt,
                    cycle = %instance.cycle,
                    "instance succeeded"
                );
                LaneSlot::Idle
            }
            TaskOutcome::Failed(error) if should_retry(instance.attempt, def.max_attempts) => {
                let delay = self
                    .options
                    .retry
                    .next_delay(instance.attempt, def.retry_base_delay);
                let eligible_at = TimeDelta::from_std(delay)
                    .ok()
                    .and_then(|d| finished_at.checked_add_signed(d))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);
                warn!(
                    job = %job,
                    seq = instance.seq,
                    attempt = instance.attempt,
                    max_attempts = def.max_attempts,
                    ?delay,
                    %error,
                    "attempt failed; retry scheduled"
                );
                instance.status = InstanceStatus::RetryPending;
                LaneSlot::RetryPending {
                    instance,
                    eligible_at,
                }
            }
            TaskOutcome::Failed(error) => {
                instance.status = InstanceStatus::Abandoned;
                commands.push(abandon(
                    &instance,
                    AbandonReason::RetriesExhausted,
                    Some(error),
                ));
                LaneSlot::Idle
            }
        };

        if let Some(lane) = self.lanes.get_mut(&job) {
            lane.slot = next_slot;
        }

        if !self.shutting_down {
            self.pump(&mut commands);
        }
        self.finish_step(commands)
    }

    /// Stop starting attempts; exit once running ones have finished.
    pub(crate) fn handle_shutdown(&mut self) -> CoreStep {
        info!(in_flight = self.in_flight, "shutdown requested; no new attempts will start");
        self.shutting_down = true;
        self.finish_step(vec![CoreCommand::CancelRunning])
    }

    fn advance_clock(&mut self, at: DateTime<Utc>) {
        if at > self.now {
            self.now = at;
        }
    }

    fn finish_step(&self, commands: Vec<CoreCommand>) -> CoreStep {
        CoreStep {
            commands,
            keep_running: !(self.shutting_down && self.in_flight == 0),
        }
    }

    /// Park a new instance in its job's lane, enforcing the backlog cap.
    fn accept(&mut self, mut instance: JobInstance, commands: &mut Vec<CoreCommand>) {
        instance.status = InstanceStatus::Pending;
        instance.pending_since = self.now;
        debug!(
            job = %instance.job_id(),
            seq = instance.seq,
            fire_at = %instance.fire_at,
            priority = instance.priority(),
            "instance pending"
        );

        let lane = self.lanes.entry(instance.job_id().to_string()).or_default();
        lane.enqueue(instance);

        if let Some(cap) = self.options.max_backlog_per_job {
            while lane.waiting.len() > cap {
                let Some(mut oldest) = lane.waiting.pop_front() else {
                    break;
                };
                oldest.status = InstanceStatus::Abandoned;
                commands.push(abandon(&oldest, AbandonReason::Superseded, None));
            }
        }
    }

    /// Move everything forward as far as possible at `self.now`:
    /// release due retries, supersede stale heads, admit lane heads whose
    /// dependencies are met (or expire them), then fill idle workers from
    /// the ready queue.
    fn pump(&mut self, commands: &mut Vec<CoreCommand>) {
        let now = self.now;

        for lane in self.lanes.values_mut() {
            if let Some(mut instance) = lane.take_due_retry(now) {
                debug!(job = %instance.job_id(), seq = instance.seq, "retry eligible");
                instance.status = InstanceStatus::Queued;
                lane.slot = LaneSlot::Queued { seq: instance.seq };
                self.ready.push(instance);
            }

            if lane.is_busy() {
                continue;
            }

            // An unmet head must not hold back a later instance whose
            // dependencies are already met. The newest ready instance
            // supersedes everything queued before it.
            let head_blocked = lane
                .waiting
                .front()
                .is_some_and(|head| !self.gate.is_ready(&head.definition, &head.cycle));
            if head_blocked {
                let newest_ready = lane
                    .waiting
                    .iter()
                    .rposition(|w| self.gate.is_ready(&w.definition, &w.cycle));
                if let Some(pos) = newest_ready {
                    for mut stale in lane.waiting.drain(..pos) {
                        stale.status = InstanceStatus::Abandoned;
                        let unmet = self.gate.unmet_dependencies(&stale.definition, &stale.cycle);
                        let last_error = (!unmet.is_empty())
                            .then(|| format!("unmet dependencies: {}", unmet.join(", ")));
                        commands.push(abandon(&stale, AbandonReason::Superseded, last_error));
                    }
                }
            }

            while let Some(head) = lane.waiting.front() {
                if self.gate.is_ready(&head.definition, &head.cycle) {
                    let Some(mut instance) = lane.waiting.pop_front() else {
                        break;
                    };
                    instance.status = InstanceStatus::Queued;
                    lane.slot = LaneSlot::Queued { seq: instance.seq };
                    self.ready.push(instance);
                    break;
                }

                let expired = head.definition.dependency_timeout.is_some_and(|timeout| {
                    TimeDelta::from_std(timeout)
                        .map(|t| now.signed_duration_since(head.pending_since) >= t)
                        .unwrap_or(false)
                });
                if !expired {
                    trace!(
                        job = %head.job_id(),
                        seq = head.seq,
                        unmet = ?self.gate.unmet_dependencies(&head.definition, &head.cycle),
                        "waiting for dependencies"
                    );
                    break;
                }

                let Some(mut instance) = lane.waiting.pop_front() else {
                    break;
                };
                instance.status = InstanceStatus::Abandoned;
                let unmet = self.gate.unmet_dependencies(&instance.definition, &instance.cycle);
                commands.push(abandon(
                    &instance,
                    AbandonReason::DependencyTimeout,
                    Some(format!("unmet dependencies: {}", unmet.join(", "))),
                ));
            }
        }

        while self.in_flight < self.options.workers {
            let Some(mut instance) = self.ready.pop() else {
                break;
            };
            instance.attempt += 1;
            instance.status = InstanceStatus::Running;
            if let Some(lane) = self.lanes.get_mut(instance.job_id()) {
                lane.slot = LaneSlot::Running { seq: instance.seq };
            }
            self.in_flight += 1;
            info!(
                job = %instance.job_id(),
                seq = instance.seq,
                attempt = instance.attempt,
                priority = instance.priority(),
                fire_at = %instance.fire_at,
                "dispatching instance"
            );
            commands.push(CoreCommand::Dispatch(instance));
        }

        self.lanes.retain(|_, lane| !lane.is_empty());
    }
}

fn abandon(instance: &JobInstance, reason: AbandonReason, last_error: Option<String>) -> CoreCommand {
    warn!(
        job = %instance.job_id(),
        seq = instance.seq,
        attempts = instance.attempt,
        %reason,
        "instance abandoned"
    );
    CoreCommand::Report(Report::Abandoned {
        job_id: instance.job_id().to_string(),
        fire_at: instance.fire_at,
        attempts: instance.attempt,
        reason,
        last_error,
    })
}
