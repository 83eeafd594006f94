// src/schedule/definition.rs

//! Runtime form of a job, built from a validated `[[job]]` entry.

use std::fmt;
use std::ops::RangeInclusive;
use std::time::Duration;

use crate::types::{CycleGranularity, CycleMatch, JobId, Payload};

/// One field of a cron trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CronField {
    Fixed(u32),
    Every,
}

impl CronField {
    /// Values of this field in `from..=max`, ascending.
    pub fn candidates(self, from: u32, max: u32) -> RangeInclusive<u32> {
        match self {
            CronField::Fixed(v) if v >= from && v <= max => v..=v,
            CronField::Fixed(_) => RangeInclusive::new(1, 0),
            CronField::Every => from..=max,
        }
    }

    /// Smallest value this field matches.
    pub fn first(self) -> u32 {
        match self {
            CronField::Fixed(v) => v,
            CronField::Every => 0,
        }
    }
}

impl fmt::Display for CronField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CronField::Fixed(v) => write!(f, "{v:02}"),
            CronField::Every => f.write_str("*"),
        }
    }
}

/// Hour/minute/second cron trigger, evaluated in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CronSpec {
    pub hour: CronField,
    pub minute: CronField,
    pub second: CronField,
}

/// When a job fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerSpec {
    Cron(CronSpec),
    Interval(Duration),
}

impl fmt::Display for TriggerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerSpec::Cron(c) => write!(f, "cron {}:{}:{}", c.hour, c.minute, c.second),
            TriggerSpec::Interval(d) => write!(f, "every {}s", d.as_secs()),
        }
    }
}

/// Upstream job plus the rule deciding which of its completions count.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    pub job: JobId,
    pub rule: CycleMatch,
}

/// Static description of a recurring unit of work.
///
/// Shared as `Arc<JobDefinition>`: instances keep the definition they were
/// created under even if the schedule is replaced while they are in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct JobDefinition {
    pub id: JobId,
    pub task: String,
    pub trigger: TriggerSpec,
    /// Lower is more urgent.
    pub priority: i32,
    pub depends_on: Vec<Dependency>,
    pub payload: Payload,
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
    pub cycle: CycleGranularity,
    pub dependency_timeout: Option<Duration>,
    /// Position in the schedule document.
    pub order: usize,
}

impl JobDefinition {
    pub fn dependency_ids(&self) -> impl Iterator<Item = &str> {
        self.depends_on.iter().map(|d| d.job.as_str())
    }
}
