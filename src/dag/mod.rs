// src/dag/mod.rs

//! Job dependencies.
//!
//! - [`graph`] validates a definition set and holds its acyclic
//!   dependency graph.
//! - [`completion`] persists completion records behind the
//!   [`CompletionStore`] trait.
//! - [`gate`] answers "may this instance run yet?" from those records.

pub mod completion;
pub mod gate;
pub mod graph;

pub use completion::{
    CompletionRecord, CompletionStore, FileCompletionStore, MemoryCompletionStore,
    COMPLETIONS_FILE,
};
pub use gate::DependencyGate;
pub use graph::{validate_definitions, DagGraph};
