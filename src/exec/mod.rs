// src/exec/mod.rs

//! Task execution layer.
//!
//! - [`backend`] provides the `ExecutorBackend` trait and the `WorkerPool`
//!   that the runtime uses in production, and which tests can replace with
//!   a fake implementation.
//! - [`worker`] runs a single attempt: resolves the task, executes it on a
//!   blocking thread, persists the completion and classifies the outcome.

pub mod backend;
pub mod worker;

pub use backend::{ExecutorBackend, WorkerPool};
pub use worker::run_instance;
