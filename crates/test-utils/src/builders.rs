#![allow(dead_code)]

use tickdag::config::model::{
    CronConfig, CronFieldConfig, DependencyConfig, IntervalConfig, TriggerKind,
};
use tickdag::config::{ConfigFile, JobConfig, RawConfigFile, RetrySection, SchedulerSection};
use tickdag::errors::Result;
use tickdag::schedule::JobDefinition;
use tickdag::types::{CycleGranularity, CycleMatch, Payload};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                scheduler: SchedulerSection::default(),
                retry: RetrySection::default(),
                job: Vec::new(),
            },
        }
    }

    pub fn with_job(mut self, job: JobConfig) -> Self {
        self.config.job.push(job);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config.scheduler.workers = workers;
        self
    }

    pub fn with_retry(mut self, max_attempts: u32, base_delay_secs: u64, max_delay_secs: u64) -> Self {
        self.config.retry.max_attempts = max_attempts;
        self.config.retry.base_delay_secs = base_delay_secs;
        self.config.retry.max_delay_secs = max_delay_secs;
        self.config.retry.jitter = false;
        self
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }

    /// Just the validated job definitions.
    pub fn build_jobs(self) -> Vec<JobDefinition> {
        self.build().jobs
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `JobConfig`.
pub struct JobConfigBuilder {
    job: JobConfig,
}

impl JobConfigBuilder {
    fn base(id: &str, trigger: TriggerKind) -> Self {
        Self {
            job: JobConfig {
                id: id.to_string(),
                task: "log".to_string(),
                trigger,
                cron: None,
                interval: None,
                priority: None,
                depends_on: Vec::new(),
                payload: Payload::new(),
                cycle: None,
                max_attempts: None,
                retry_delay_secs: None,
                dependency_timeout_secs: None,
            },
        }
    }

    /// Job firing every `secs` seconds.
    pub fn every_secs(id: &str, secs: u64) -> Self {
        let mut b = Self::base(id, TriggerKind::Interval);
        b.job.interval = Some(IntervalConfig {
            seconds: Some(secs),
            ..IntervalConfig::default()
        });
        b
    }

    /// Job firing every `minutes` minutes.
    pub fn every_minutes(id: &str, minutes: u64) -> Self {
        let mut b = Self::base(id, TriggerKind::Interval);
        b.job.interval = Some(IntervalConfig {
            minutes: Some(minutes),
            ..IntervalConfig::default()
        });
        b
    }

    /// Job firing daily at `hour:minute:00` UTC.
    pub fn daily_at(id: &str, hour: i64, minute: i64) -> Self {
        let mut b = Self::base(id, TriggerKind::Cron);
        b.job.cron = Some(CronConfig {
            hour: Some(CronFieldConfig::Value(hour)),
            minute: Some(CronFieldConfig::Value(minute)),
            second: Some(CronFieldConfig::Value(0)),
        });
        b
    }

    pub fn task(mut self, task: &str) -> Self {
        self.job.task = task.to_string();
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.job.priority = Some(priority);
        self
    }

    /// Same-day dependency.
    pub fn after(mut self, dep: &str) -> Self {
        self.job.depends_on.push(DependencyConfig::Job(dep.to_string()));
        self
    }

    pub fn after_with(mut self, dep: &str, rule: CycleMatch) -> Self {
        self.job.depends_on.push(DependencyConfig::Detailed {
            job: dep.to_string(),
            rule,
        });
        self
    }

    pub fn cycle(mut self, cycle: CycleGranularity) -> Self {
        self.job.cycle = Some(cycle);
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.job.max_attempts = Some(n);
        self
    }

    pub fn retry_delay_secs(mut self, secs: u64) -> Self {
        self.job.retry_delay_secs = Some(secs);
        self
    }

    pub fn dependency_timeout_secs(mut self, secs: u64) -> Self {
        self.job.dependency_timeout_secs = Some(secs);
        self
    }

    pub fn payload_str(mut self, key: &str, value: &str) -> Self {
        self.job
            .payload
            .insert(key.to_string(), toml::Value::String(value.to_string()));
        self
    }

    pub fn build(self) -> JobConfig {
        self.job
    }
}
