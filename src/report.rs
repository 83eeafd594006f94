// src/report.rs

//! Outbound notifications for operators.
//!
//! The scheduler never decides how alerts are delivered; it hands a
//! [`Report`] to whatever [`Reporter`] the binary (or a test) installed.

use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{error, warn};

use crate::types::JobId;

/// Why an instance was given up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonReason {
    /// Every allowed attempt failed.
    RetriesExhausted,
    /// Dependencies were not met within the job's dependency timeout.
    DependencyTimeout,
    /// Dropped because the job's waiting backlog exceeded its limit.
    Superseded,
}

impl fmt::Display for AbandonReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AbandonReason::RetriesExhausted => "retries exhausted",
            AbandonReason::DependencyTimeout => "dependency timeout",
            AbandonReason::Superseded => "superseded by newer instances",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Abandoned {
        job_id: JobId,
        fire_at: DateTime<Utc>,
        attempts: u32,
        reason: AbandonReason,
        last_error: Option<String>,
    },
    ConfigRejected {
        source: String,
        error: String,
    },
}

impl Report {
    pub fn job_id(&self) -> Option<&str> {
        match self {
            Report::Abandoned { job_id, .. } => Some(job_id),
            Report::ConfigRejected { .. } => None,
        }
    }
}

/// Alerting channel.
pub trait Reporter: Send + Sync {
    fn report(&self, report: &Report);
}

/// Reporter that emits every report as a structured log event.
#[derive(Debug, Clone, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&self, report: &Report) {
        match report {
            Report::Abandoned {
                job_id,
                fire_at,
                attempts,
                reason,
                last_error,
            } => error!(
                job = %job_id,
                fire_at = %fire_at,
                attempts,
                %reason,
                last_error = last_error.as_deref().unwrap_or("-"),
                "job instance abandoned"
            ),
            Report::ConfigRejected { source, error } => {
                warn!(%source, %error, "schedule change rejected")
            }
        }
    }
}
