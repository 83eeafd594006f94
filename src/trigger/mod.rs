// src/trigger/mod.rs

//! Time triggers.
//!
//! [`next_fire_time`] is the pure "when does this fire next" function;
//! [`TriggerEngine`] applies it to a schedule snapshot on every tick and
//! [`spawn_trigger_loop`] drives the engine from a Tokio interval.

pub mod engine;
pub mod next_fire;

pub use engine::{spawn_trigger_loop, TriggerEngine};
pub use next_fire::next_fire_time;
