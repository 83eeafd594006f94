// src/engine/mod.rs

//! Dispatch engine for tickdag.
//!
//! This module ties together:
//! - per-job lanes that keep a job's instances in fire-time order
//! - the dependency gate (via [`crate::dag::DependencyGate`])
//! - the priority ready queue
//! - the retry policy
//! - the main runtime event loop that reacts to:
//!   - trigger ticks
//!   - instance completion events
//!   - shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::schedule::JobDefinition;
use crate::types::CycleKey;

/// Lifecycle of one job instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    /// Created by a trigger; waiting for its lane or its dependencies.
    Pending,
    /// Dependencies met; waiting for a worker.
    Queued,
    Running,
    Succeeded,
    /// Failed and waiting out its backoff delay.
    RetryPending,
    Abandoned,
}

/// One occurrence of a job.
#[derive(Debug, Clone)]
pub struct JobInstance {
    /// Monotonic first-seen number; breaks priority and fire-time ties.
    pub seq: u64,
    /// Definition the instance was created under.
    pub definition: Arc<JobDefinition>,
    /// Intended fire time (may be earlier than when it was emitted).
    pub fire_at: DateTime<Utc>,
    pub cycle: CycleKey,
    /// Attempts started so far.
    pub attempt: u32,
    pub status: InstanceStatus,
    /// When the instance entered the dispatcher.
    pub pending_since: DateTime<Utc>,
}

impl JobInstance {
    pub fn new(seq: u64, definition: Arc<JobDefinition>, fire_at: DateTime<Utc>) -> Self {
        let cycle = CycleKey::for_fire(definition.cycle, fire_at);
        Self {
            seq,
            definition,
            fire_at,
            cycle,
            attempt: 0,
            status: InstanceStatus::Pending,
            pending_since: fire_at,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.definition.id
    }

    pub fn priority(&self) -> i32 {
        self.definition.priority
    }
}

impl fmt::Display for JobInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.definition.id, self.seq, self.fire_at)
    }
}

/// Outcome of one attempt, as seen by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    /// The task failed, panicked, was unknown, or its completion could not
    /// be persisted.
    Failed(String),
}

/// Events flowing into the runtime from the trigger loop, workers, etc.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// Trigger evaluation ran at `now`; `due` holds the new instances.
    Tick {
        now: DateTime<Utc>,
        due: Vec<JobInstance>,
    },
    /// A worker finished one attempt of `instance`.
    InstanceFinished {
        instance: JobInstance,
        outcome: TaskOutcome,
        finished_at: DateTime<Utc>,
    },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

/// Dispatcher settings fixed at startup.
#[derive(Debug, Clone, Copy)]
pub struct DispatchOptions {
    /// Size of the worker pool; at most this many attempts run at once.
    pub workers: usize,
    pub retry: retry::RetryPolicy,
    /// Cap on waiting instances per job; `None` is unbounded.
    pub max_backlog_per_job: Option<usize>,
}

pub mod core;
pub mod event_handlers;
pub mod lanes;
pub mod queue;
pub mod retry;
pub mod runtime;

pub use core::DispatchCore;
pub use event_handlers::{CoreCommand, CoreStep};
pub use queue::ReadyQueue;
pub use retry::{backoff, should_retry, RetryPolicy};
pub use runtime::Runtime;
