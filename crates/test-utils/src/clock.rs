use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeDelta, TimeZone, Utc};

/// Shared, manually advanced clock for driving the dispatcher with
/// deterministic times.
#[derive(Debug, Clone)]
pub struct VirtualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl VirtualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    /// Clock starting at `2026-10-19T<h>:<m>:<s>Z`.
    pub fn at_hms(h: u32, m: u32, s: u32) -> Self {
        Self::at(utc(h, m, s))
    }

    pub fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap() = to;
    }

    pub fn advance_secs(&self, secs: i64) -> DateTime<Utc> {
        let mut now = self.now.lock().unwrap();
        *now += TimeDelta::seconds(secs);
        *now
    }
}

/// `2026-10-19T<h>:<m>:<s>Z`.
pub fn utc(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, h, m, s).unwrap()
}
