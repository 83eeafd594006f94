// src/task/mod.rs

//! The boundary between the scheduler and business logic.
//!
//! A job names its task (`task = "command"`); the [`TaskRegistry`] resolves
//! that name to a [`Task`] at execution time. The scheduler never looks
//! inside a task: it only sees success or an error.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::errors::{Result, TickdagError};
use crate::types::{CycleKey, Payload};

pub mod command;
pub mod log;

pub use command::CommandTask;
pub use log::LogTask;

/// Everything a task learns about the attempt it is running.
#[derive(Debug, Clone, Copy)]
pub struct TaskContext<'a> {
    pub job_id: &'a str,
    pub payload: &'a Payload,
    /// 1 for the first attempt.
    pub attempt: u32,
    pub fire_at: DateTime<Utc>,
    pub cycle: &'a CycleKey,
    cancel: &'a CancelSignal,
}

impl<'a> TaskContext<'a> {
    pub fn new(
        job_id: &'a str,
        payload: &'a Payload,
        attempt: u32,
        fire_at: DateTime<Utc>,
        cycle: &'a CycleKey,
        cancel: &'a CancelSignal,
    ) -> Self {
        Self {
            job_id,
            payload,
            attempt,
            fire_at,
            cycle,
            cancel,
        }
    }

    /// True once shutdown has begun. Long-running tasks should poll this and
    /// return early.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// String value of `key` in the payload.
    pub fn payload_str(&self, key: &str) -> Option<&'a str> {
        self.payload.get(key).and_then(|v| v.as_str())
    }
}

/// A unit of business logic.
///
/// `execute` runs on a blocking thread; it may block, and a panic is treated
/// as a failed attempt.
pub trait Task: Send + Sync {
    fn execute(&self, ctx: &TaskContext<'_>) -> anyhow::Result<()>;
}

impl<F> Task for F
where
    F: Fn(&TaskContext<'_>) -> anyhow::Result<()> + Send + Sync,
{
    fn execute(&self, ctx: &TaskContext<'_>) -> anyhow::Result<()> {
        self(ctx)
    }
}

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Maps task names to implementations.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, Arc<dyn Task>>,
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.names())
            .finish()
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `log` and `command` tasks.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register("log", LogTask)
            .register("command", CommandTask::default());
        registry
    }

    /// Register `task` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, task: impl Task + 'static) -> &mut Self {
        self.tasks.insert(name.into(), Arc::new(task));
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Task>> {
        self.tasks.get(name).cloned()
    }

    /// Like [`Self::get`], but an unknown name is an error.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Task>> {
        self.get(name)
            .ok_or_else(|| TickdagError::UnknownTask(name.to_string()))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tasks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
