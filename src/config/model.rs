// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::schedule::JobDefinition;
use crate::types::{CycleGranularity, CycleMatch, Payload};

/// Top-level schedule document as read from a TOML file.
///
/// ```toml
/// [scheduler]
/// workers = 3
///
/// [retry]
/// max_attempts = 3
///
/// [[job]]
/// id = "health_check"
/// task = "log"
/// trigger = "interval"
/// interval = { minutes = 1 }
/// priority = 0
/// ```
///
/// All sections are optional and have reasonable defaults. This is the raw
/// serde mapping; use [`ConfigFile`] (via `TryFrom`) for a validated view.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub scheduler: SchedulerSection,

    #[serde(default)]
    pub retry: RetrySection,

    /// All `[[job]]` entries, in document order.
    #[serde(default)]
    pub job: Vec<JobConfig>,
}

/// Validated schedule document.
///
/// Can only be constructed through `TryFrom<RawConfigFile>`, so holding one
/// means every job parsed into a [`JobDefinition`] and the dependency graph
/// is acyclic.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub scheduler: SchedulerSection,
    pub retry: RetrySection,
    pub jobs: Vec<JobDefinition>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        scheduler: SchedulerSection,
        retry: RetrySection,
        jobs: Vec<JobDefinition>,
    ) -> Self {
        Self {
            scheduler,
            retry,
            jobs,
        }
    }
}

/// `[scheduler]` section.
///
/// Read once at startup; a reload only swaps the job set.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerSection {
    /// Size of the worker pool.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// How often triggers are evaluated.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Upper bound between two config reload checks, even without a
    /// filesystem notification.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Directory holding persisted completion records. Relative paths are
    /// resolved against the config file's directory.
    #[serde(default = "default_state_dir")]
    pub state_dir: String,

    /// Completion records older than this are pruned at startup. Each
    /// job's newest record is kept regardless.
    #[serde(default = "default_completion_retention_days")]
    pub completion_retention_days: u32,

    /// Default time an instance may wait for its dependencies before being
    /// abandoned. `None` waits indefinitely.
    #[serde(default)]
    pub dependency_timeout_secs: Option<u64>,

    /// Maximum number of waiting instances per job; the oldest waiting
    /// instance is abandoned when exceeded. `None` is unbounded.
    #[serde(default)]
    pub max_backlog_per_job: Option<usize>,
}

fn default_workers() -> usize {
    3
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_state_dir() -> String {
    ".tickdag".to_string()
}

fn default_completion_retention_days() -> u32 {
    7
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            tick_interval_ms: default_tick_interval_ms(),
            poll_interval_secs: default_poll_interval_secs(),
            state_dir: default_state_dir(),
            completion_retention_days: default_completion_retention_days(),
            dependency_timeout_secs: None,
            max_backlog_per_job: None,
        }
    }
}

impl SchedulerSection {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn dependency_timeout(&self) -> Option<Duration> {
        self.dependency_timeout_secs.map(Duration::from_secs)
    }
}

/// `[retry]` section: defaults for jobs plus the global delay cap.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,

    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,

    /// Add uniform random jitter in `[0, base)` to every delay.
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_secs() -> u64 {
    5
}

fn default_max_delay_secs() -> u64 {
    300
}

fn default_jitter() -> bool {
    true
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
            jitter: default_jitter(),
        }
    }
}

/// Trigger kind named by `trigger = "..."`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    Cron,
    Interval,
}

/// One `[[job]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    /// Unique job id.
    pub id: String,

    /// Name of the task implementation, resolved through the task registry.
    pub task: String,

    pub trigger: TriggerKind,

    /// Required when `trigger = "cron"`.
    #[serde(default)]
    pub cron: Option<CronConfig>,

    /// Required when `trigger = "interval"`.
    #[serde(default)]
    pub interval: Option<IntervalConfig>,

    /// Lower is more urgent. Defaults to the middle of the 0..=9 range.
    #[serde(default)]
    pub priority: Option<i32>,

    /// Jobs that must have completed for the corresponding cycle first.
    #[serde(default)]
    pub depends_on: Vec<DependencyConfig>,

    /// Passed verbatim to the task.
    #[serde(default)]
    pub payload: Payload,

    /// How completions of this job are keyed; defaults depend on the trigger.
    #[serde(default)]
    pub cycle: Option<CycleGranularity>,

    /// Overrides `[retry].max_attempts`.
    #[serde(default)]
    pub max_attempts: Option<u32>,

    /// Overrides `[retry].base_delay_secs`.
    #[serde(default)]
    pub retry_delay_secs: Option<u64>,

    /// Overrides `[scheduler].dependency_timeout_secs`.
    #[serde(default)]
    pub dependency_timeout_secs: Option<u64>,
}

/// `cron = { hour = 9, minute = 30, second = "every" }`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CronConfig {
    #[serde(default)]
    pub hour: Option<CronFieldConfig>,
    #[serde(default)]
    pub minute: Option<CronFieldConfig>,
    #[serde(default)]
    pub second: Option<CronFieldConfig>,
}

/// A single cron field: a number or the word `"every"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CronFieldConfig {
    Value(i64),
    Word(String),
}

/// `interval = { minutes = 5 }`; exactly one unit must be given.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntervalConfig {
    #[serde(default)]
    pub seconds: Option<u64>,
    #[serde(default)]
    pub minutes: Option<u64>,
    #[serde(default)]
    pub hours: Option<u64>,
}

/// Entry of `depends_on`: either a bare job id (same-day rule) or a table
/// choosing the cycle rule explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DependencyConfig {
    Job(String),
    Detailed {
        job: String,
        #[serde(default, rename = "match")]
        rule: CycleMatch,
    },
}

impl DependencyConfig {
    pub fn job(&self) -> &str {
        match self {
            DependencyConfig::Job(job) => job,
            DependencyConfig::Detailed { job, .. } => job,
        }
    }

    pub fn rule(&self) -> CycleMatch {
        match self {
            DependencyConfig::Job(_) => CycleMatch::default(),
            DependencyConfig::Detailed { rule, .. } => *rule,
        }
    }
}
