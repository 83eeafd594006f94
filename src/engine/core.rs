// src/engine/core.rs

//! Pure core dispatcher state machine.
//!
//! This module contains a synchronous, deterministic "core" that consumes
//! [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels
//! - sending `JobInstance`s to the executor
//! - forwarding reports and cancellation
//!
//! Time only enters through events, so the core is unit tested without any
//! Tokio, channels, clocks, or processes.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::dag::DependencyGate;
use crate::engine::event_handlers::CoreStep;
use crate::engine::lanes::{Lane, LaneSlot};
use crate::engine::queue::ReadyQueue;
use crate::engine::{DispatchOptions, InstanceStatus, RuntimeEvent};
use crate::types::JobId;

/// Pure core dispatcher state.
///
/// This owns:
/// - one lane per job with non-terminal instances
/// - the ready queue
/// - the in-flight counter
///
/// The only shared state it touches is the dependency gate's in-memory index.
#[derive(Debug)]
pub struct DispatchCore {
    pub(crate) gate: Arc<DependencyGate>,
    pub(crate) options: DispatchOptions,
    pub(crate) lanes: HashMap<JobId, Lane>,
    pub(crate) ready: ReadyQueue,
    pub(crate) in_flight: usize,
    pub(crate) shutting_down: bool,
    /// Latest time seen in any event.
    pub(crate) now: DateTime<Utc>,
}

impl DispatchCore {
    pub fn new(gate: Arc<DependencyGate>, options: DispatchOptions) -> Self {
        Self {
            gate,
            options: DispatchOptions {
                workers: options.workers.max(1),
                ..options
            },
            lanes: HashMap::new(),
            ready: ReadyQueue::new(),
            in_flight: 0,
            shutting_down: false,
            now: DateTime::<Utc>::MIN_UTC,
        }
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::Tick { now, due } => self.handle_tick(now, due),
            RuntimeEvent::InstanceFinished {
                instance,
                outcome,
                finished_at,
            } => self.handle_finished(instance, outcome, finished_at),
            RuntimeEvent::ShutdownRequested => self.handle_shutdown(),
        }
    }

    /// Attempts currently handed to workers.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Instances waiting for a worker.
    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    /// Instances of `job` waiting behind its lane (not counting the active one).
    pub fn waiting_len(&self, job: &str) -> usize {
        self.lanes.get(job).map_or(0, |l| l.waiting.len())
    }

    /// Status of the active instance of `job`, if it has one.
    pub fn active_status(&self, job: &str) -> Option<InstanceStatus> {
        match self.lanes.get(job).map(|l| &l.slot)? {
            LaneSlot::Idle => None,
            LaneSlot::Queued { .. } => Some(InstanceStatus::Queued),
            LaneSlot::Running { .. } => Some(InstanceStatus::Running),
            LaneSlot::RetryPending { .. } => Some(InstanceStatus::RetryPending),
        }
    }

    /// When `job`'s pending retry becomes eligible.
    pub fn retry_eligible_at(&self, job: &str) -> Option<DateTime<Utc>> {
        match self.lanes.get(job).map(|l| &l.slot)? {
            LaneSlot::RetryPending { eligible_at, .. } => Some(*eligible_at),
            _ => None,
        }
    }

    /// Nothing running, queued, retrying or waiting.
    pub fn is_idle(&self) -> bool {
        self.in_flight == 0 && self.ready.is_empty() && self.lanes.values().all(Lane::is_empty)
    }
}
