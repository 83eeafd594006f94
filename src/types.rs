use std::fmt;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::Deserialize;

/// Canonical job identifier used throughout the scheduler.
pub type JobId = String;

/// Opaque key/value payload handed verbatim to a task.
pub type Payload = toml::Table;

/// How completions of a job are keyed.
///
/// - `Daily`: every fire on the same calendar day shares one cycle key
///   (`2026-10-19`). Default for cron jobs.
/// - `PerFire`: every fire gets its own key, the RFC 3339 fire time
///   (`2026-10-19T09:05:00Z`). Default for interval jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleGranularity {
    Daily,
    PerFire,
}

/// Which completion of an upstream job satisfies a downstream instance.
///
/// Jobs often run at different cadences (a daily `start_trading` feeding a
/// five-minute `evaluate`), so the rule is chosen per dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleMatch {
    /// The upstream job completed on the same calendar day.
    SameDay,
    /// The upstream job completed for exactly the same cycle key.
    SameCycle,
    /// The upstream job has completed at least once, ever.
    Latest,
}

impl Default for CycleMatch {
    fn default() -> Self {
        CycleMatch::SameDay
    }
}

/// Label identifying which recurrence of a job a completion belongs to.
///
/// Keys always start with the `YYYY-MM-DD` calendar day of the fire time,
/// which is what [`CycleMatch::SameDay`] compares.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CycleKey(String);

impl CycleKey {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Derive the cycle key for an instance fired at `fire_at`.
    pub fn for_fire(granularity: CycleGranularity, fire_at: DateTime<Utc>) -> Self {
        match granularity {
            CycleGranularity::Daily => Self(fire_at.format("%Y-%m-%d").to_string()),
            CycleGranularity::PerFire => {
                Self(fire_at.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Calendar day this key belongs to, if it carries one.
    pub fn day(&self) -> Option<NaiveDate> {
        let prefix = self.0.get(..10)?;
        NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
    }
}

impl fmt::Display for CycleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn cycle_keys_share_the_calendar_day_prefix() {
        let at = Utc.with_ymd_and_hms(2026, 10, 19, 9, 5, 0).unwrap();
        let daily = CycleKey::for_fire(CycleGranularity::Daily, at);
        let per_fire = CycleKey::for_fire(CycleGranularity::PerFire, at);

        assert_eq!(daily.as_str(), "2026-10-19");
        assert_eq!(per_fire.as_str(), "2026-10-19T09:05:00Z");
        assert_eq!(daily.day(), per_fire.day());
    }

    #[test]
    fn free_form_keys_have_no_day() {
        assert_eq!(CycleKey::new("run-42").day(), None);
    }
}
