// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TickdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Duplicate job id: {0}")]
    DuplicateJob(String),

    #[error("Cycle detected in job dependencies: {0}")]
    DagCycle(String),

    #[error("No task registered under name '{0}'")]
    UnknownTask(String),

    #[error("Could not persist completion record: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TickdagError {
    /// Whether this error means a schedule document was rejected (as opposed
    /// to an IO or runtime failure).
    pub fn is_config_rejection(&self) -> bool {
        matches!(
            self,
            TickdagError::ConfigError(_)
                | TickdagError::DuplicateJob(_)
                | TickdagError::DagCycle(_)
                | TickdagError::TomlError(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TickdagError>;
