// src/schedule/mod.rs

//! Job definitions and the live schedule.
//!
//! - [`definition`] holds the immutable runtime form of a `[[job]]` entry.
//! - [`store`] publishes fully validated, versioned snapshots of all
//!   definitions; readers always see one consistent version.
//! - [`hash`] fingerprints a definition set so reloads can skip no-op changes.
//! - [`watcher`] observes the schedule file and swaps in new snapshots.

pub mod definition;
pub mod hash;
pub mod store;
pub mod watcher;

pub use definition::{CronField, CronSpec, Dependency, JobDefinition, TriggerSpec};
pub use hash::content_hash;
pub use store::{ScheduleSnapshot, ScheduleStore};
pub use watcher::{ConfigWatcher, ReloadOutcome, WatcherHandle};
