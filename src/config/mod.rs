// src/config/mod.rs

//! Schedule document loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a schedule file through the `FileSystem` abstraction, writing the
//!   default document when missing (`loader.rs`, `defaults.rs`).
//! - Turn raw `[[job]]` entries into validated job definitions (`validate.rs`).

pub mod defaults;
pub mod loader;
pub mod model;
pub mod validate;

pub use defaults::DEFAULT_CONFIG;
pub use loader::{load_and_validate, load_from_path, load_from_str, load_or_init};
pub use model::{ConfigFile, JobConfig, RawConfigFile, RetrySection, SchedulerSection};
pub use validate::validate_job_id;
