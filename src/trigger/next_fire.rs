// src/trigger/next_fire.rs

use chrono::{DateTime, Days, NaiveDate, TimeDelta, Timelike, Utc};

use crate::schedule::{CronSpec, TriggerSpec};

/// Next time `trigger` fires.
///
/// - Cron: the earliest whole second strictly after `after` whose hour,
///   minute and second all match, in UTC. `last_fire` is ignored.
/// - Interval: `last_fire + interval` when the job has fired before;
///   otherwise the first multiple of the interval (counted from the Unix
///   epoch) strictly after `after`, so fresh jobs line up on round times.
///
/// Pure and deterministic; monotonic in `after`.
pub fn next_fire_time(
    trigger: &TriggerSpec,
    after: DateTime<Utc>,
    last_fire: Option<DateTime<Utc>>,
) -> DateTime<Utc> {
    match trigger {
        TriggerSpec::Cron(spec) => next_cron_time(spec, after),
        TriggerSpec::Interval(period) => {
            let period_ms = i64::try_from(period.as_millis()).unwrap_or(i64::MAX).max(1);
            match last_fire {
                Some(last) => last
                    .checked_add_signed(TimeDelta::milliseconds(period_ms))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
                None => {
                    let slot = after.timestamp_millis().div_euclid(period_ms);
                    slot.checked_add(1)
                        .and_then(|s| s.checked_mul(period_ms))
                        .and_then(DateTime::from_timestamp_millis)
                        .unwrap_or(DateTime::<Utc>::MAX_UTC)
                }
            }
        }
    }
}

fn next_cron_time(spec: &CronSpec, after: DateTime<Utc>) -> DateTime<Utc> {
    // Search starts at the first whole second after `after`.
    let Some(start) = after
        .timestamp()
        .checked_add(1)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
    else {
        return DateTime::<Utc>::MAX_UTC;
    };

    let date = start.date_naive();
    if let Some((h, m, s)) = first_match_from(spec, start.hour(), start.minute(), start.second()) {
        if let Some(t) = at(date, h, m, s) {
            return t;
        }
    }

    // Nothing left today: the first matching second of tomorrow always exists.
    date.checked_add_days(Days::new(1))
        .and_then(|tomorrow| {
            at(
                tomorrow,
                spec.hour.first(),
                spec.minute.first(),
                spec.second.first(),
            )
        })
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Earliest (hour, minute, second) at or after the given time of day.
fn first_match_from(spec: &CronSpec, h0: u32, m0: u32, s0: u32) -> Option<(u32, u32, u32)> {
    for h in spec.hour.candidates(h0, 23) {
        let m_from = if h == h0 { m0 } else { 0 };
        for m in spec.minute.candidates(m_from, 59) {
            let s_from = if h == h0 && m == m0 { s0 } else { 0 };
            if let Some(s) = spec.second.candidates(s_from, 59).next() {
                return Some((h, m, s));
            }
        }
    }
    None
}

fn at(date: NaiveDate, h: u32, m: u32, s: u32) -> Option<DateTime<Utc>> {
    date.and_hms_opt(h, m, s).map(|t| t.and_utc())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;

    use super::*;
    use crate::schedule::CronField;

    fn utc(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, h, m, s).unwrap()
    }

    fn cron(hour: CronField, minute: CronField, second: CronField) -> TriggerSpec {
        TriggerSpec::Cron(CronSpec {
            hour,
            minute,
            second,
        })
    }

    #[test]
    fn daily_cron_before_and_after_the_time() {
        let nine = cron(CronField::Fixed(9), CronField::Fixed(0), CronField::Fixed(0));

        assert_eq!(next_fire_time(&nine, utc(8, 59, 59), None), utc(9, 0, 0));
        // Exactly at the fire time: strictly after means tomorrow.
        assert_eq!(
            next_fire_time(&nine, utc(9, 0, 0), None),
            Utc.with_ymd_and_hms(2026, 10, 20, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn every_minute_rolls_into_the_next_hour() {
        let each_minute = cron(CronField::Every, CronField::Every, CronField::Fixed(0));
        assert_eq!(next_fire_time(&each_minute, utc(10, 59, 30), None), utc(11, 0, 0));
        assert_eq!(next_fire_time(&each_minute, utc(10, 15, 0), None), utc(10, 16, 0));
    }

    #[test]
    fn fixed_minute_in_every_hour() {
        let half_past = cron(CronField::Every, CronField::Fixed(30), CronField::Fixed(0));
        assert_eq!(next_fire_time(&half_past, utc(10, 31, 0), None), utc(11, 30, 0));
        assert_eq!(
            next_fire_time(&half_past, utc(23, 45, 0), None),
            Utc.with_ymd_and_hms(2026, 10, 20, 0, 30, 0).unwrap()
        );
    }

    #[test]
    fn sub_second_after_still_moves_to_next_whole_second() {
        let every_second = cron(CronField::Every, CronField::Every, CronField::Every);
        let after = utc(12, 0, 0) + TimeDelta::milliseconds(400);
        assert_eq!(next_fire_time(&every_second, after, None), utc(12, 0, 1));
    }

    #[test]
    fn interval_aligns_to_epoch_without_history() {
        let five_min = TriggerSpec::Interval(Duration::from_secs(300));
        assert_eq!(next_fire_time(&five_min, utc(9, 2, 10), None), utc(9, 5, 0));
        assert_eq!(next_fire_time(&five_min, utc(9, 5, 0), None), utc(9, 10, 0));
    }

    #[test]
    fn interval_follows_last_fire() {
        let five_min = TriggerSpec::Interval(Duration::from_secs(300));
        let last = utc(9, 5, 0);
        assert_eq!(next_fire_time(&five_min, utc(9, 30, 0), Some(last)), utc(9, 10, 0));
    }
}
