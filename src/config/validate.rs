// src/config/validate.rs

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::config::model::{
    ConfigFile, CronConfig, CronFieldConfig, IntervalConfig, JobConfig, RawConfigFile,
    RetrySection, SchedulerSection, TriggerKind,
};
use crate::dag::graph::validate_definitions;
use crate::errors::{Result, TickdagError};
use crate::schedule::{CronField, CronSpec, Dependency, JobDefinition, TriggerSpec};
use crate::types::CycleGranularity;

/// Priority given to jobs that do not set one (middle of 0..=9).
pub const DEFAULT_PRIORITY: i32 = 5;

/// Job ids end up in the completion file, so they must not contain
/// whitespace or separators.
static JOB_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("static regex is valid"));

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::TickdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_global_config(&raw.scheduler, &raw.retry)?;

        let jobs = raw
            .job
            .iter()
            .enumerate()
            .map(|(order, job)| job_definition_from_config(job, order, &raw.scheduler, &raw.retry))
            .collect::<Result<Vec<_>>>()?;

        validate_definitions(&jobs)?;

        Ok(ConfigFile::new_unchecked(raw.scheduler, raw.retry, jobs))
    }
}

/// Check that a job id can be stored and referenced safely.
pub fn validate_job_id(id: &str) -> Result<()> {
    if JOB_ID_RE.is_match(id) {
        Ok(())
    } else {
        Err(TickdagError::ConfigError(format!(
            "job id '{id}' must be non-empty and contain only letters, digits, '_', '-' or '.'"
        )))
    }
}

fn validate_global_config(scheduler: &SchedulerSection, retry: &RetrySection) -> Result<()> {
    if scheduler.workers == 0 {
        return Err(TickdagError::ConfigError(
            "[scheduler].workers must be >= 1 (got 0)".to_string(),
        ));
    }
    if scheduler.tick_interval_ms == 0 {
        return Err(TickdagError::ConfigError(
            "[scheduler].tick_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if scheduler.poll_interval_secs == 0 {
        return Err(TickdagError::ConfigError(
            "[scheduler].poll_interval_secs must be >= 1 (got 0)".to_string(),
        ));
    }
    if scheduler.max_backlog_per_job == Some(0) {
        return Err(TickdagError::ConfigError(
            "[scheduler].max_backlog_per_job must be >= 1 when set".to_string(),
        ));
    }
    if retry.max_attempts == 0 {
        return Err(TickdagError::ConfigError(
            "[retry].max_attempts must be >= 1 (got 0)".to_string(),
        ));
    }
    if retry.max_delay_secs < retry.base_delay_secs {
        return Err(TickdagError::ConfigError(format!(
            "[retry].max_delay_secs ({}) must be >= base_delay_secs ({})",
            retry.max_delay_secs, retry.base_delay_secs
        )));
    }
    Ok(())
}

fn job_definition_from_config(
    job: &JobConfig,
    order: usize,
    scheduler: &SchedulerSection,
    retry: &RetrySection,
) -> Result<JobDefinition> {
    validate_job_id(&job.id)?;

    if job.task.trim().is_empty() {
        return Err(job_error(&job.id, "`task` must not be empty"));
    }

    let trigger = match job.trigger {
        TriggerKind::Cron => {
            if job.interval.is_some() {
                return Err(job_error(&job.id, "trigger is \"cron\" but an `interval` table is set"));
            }
            let cron = job
                .cron
                .as_ref()
                .ok_or_else(|| job_error(&job.id, "trigger is \"cron\" but `cron` is missing"))?;
            TriggerSpec::Cron(cron_spec(&job.id, cron)?)
        }
        TriggerKind::Interval => {
            if job.cron.is_some() {
                return Err(job_error(&job.id, "trigger is \"interval\" but a `cron` table is set"));
            }
            let interval = job.interval.as_ref().ok_or_else(|| {
                job_error(&job.id, "trigger is \"interval\" but `interval` is missing")
            })?;
            TriggerSpec::Interval(interval_duration(&job.id, interval)?)
        }
    };

    let max_attempts = job.max_attempts.unwrap_or(retry.max_attempts);
    if max_attempts == 0 {
        return Err(job_error(&job.id, "`max_attempts` must be >= 1"));
    }

    let cycle = job.cycle.unwrap_or(match trigger {
        TriggerSpec::Cron(_) => CycleGranularity::Daily,
        TriggerSpec::Interval(_) => CycleGranularity::PerFire,
    });

    let depends_on = job
        .depends_on
        .iter()
        .map(|dep| Dependency {
            job: dep.job().to_string(),
            rule: dep.rule(),
        })
        .collect();

    Ok(JobDefinition {
        id: job.id.clone(),
        task: job.task.trim().to_string(),
        trigger,
        priority: job.priority.unwrap_or(DEFAULT_PRIORITY),
        depends_on,
        payload: job.payload.clone(),
        max_attempts,
        retry_base_delay: Duration::from_secs(job.retry_delay_secs.unwrap_or(retry.base_delay_secs)),
        cycle,
        dependency_timeout: job
            .dependency_timeout_secs
            .map(Duration::from_secs)
            .or_else(|| scheduler.dependency_timeout()),
        order,
    })
}

fn cron_spec(job: &str, cron: &CronConfig) -> Result<CronSpec> {
    Ok(CronSpec {
        hour: cron_field(job, "hour", cron.hour.as_ref(), 23, CronField::Every)?,
        minute: cron_field(job, "minute", cron.minute.as_ref(), 59, CronField::Fixed(0))?,
        second: cron_field(job, "second", cron.second.as_ref(), 59, CronField::Fixed(0))?,
    })
}

fn cron_field(
    job: &str,
    name: &str,
    value: Option<&CronFieldConfig>,
    max: u32,
    default: CronField,
) -> Result<CronField> {
    match value {
        None => Ok(default),
        Some(CronFieldConfig::Value(v)) if (0..=i64::from(max)).contains(v) => {
            Ok(CronField::Fixed(*v as u32))
        }
        Some(CronFieldConfig::Value(v)) => Err(job_error(
            job,
            &format!("cron.{name} must be in 0..={max} (got {v})"),
        )),
        Some(CronFieldConfig::Word(w)) => match w.trim().to_lowercase().as_str() {
            "every" | "*" => Ok(CronField::Every),
            other => Err(job_error(
                job,
                &format!("cron.{name} must be a number or \"every\" (got \"{other}\")"),
            )),
        },
    }
}

fn interval_duration(job: &str, interval: &IntervalConfig) -> Result<Duration> {
    let units = [
        (interval.seconds, 1u64),
        (interval.minutes, 60),
        (interval.hours, 3600),
    ];
    let given: Vec<(u64, u64)> = units
        .iter()
        .filter_map(|(value, scale)| value.map(|v| (v, *scale)))
        .collect();

    match given.as_slice() {
        [(value, scale)] if *value > 0 => value
            .checked_mul(*scale)
            .map(Duration::from_secs)
            .ok_or_else(|| job_error(job, "interval is too large")),
        [(_, _)] => Err(job_error(job, "interval must be a positive integer")),
        _ => Err(job_error(
            job,
            "interval must set exactly one of `seconds`, `minutes` or `hours`",
        )),
    }
}

fn job_error(job: &str, msg: &str) -> TickdagError {
    TickdagError::ConfigError(format!("job '{job}': {msg}"))
}
