// src/engine/lanes.rs

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use super::JobInstance;

/// What a lane's single active instance is doing.
#[derive(Debug, Default)]
pub enum LaneSlot {
    #[default]
    Idle,
    /// In the ready queue.
    Queued { seq: u64 },
    /// Handed to a worker.
    Running { seq: u64 },
    /// Parked until `eligible_at`.
    RetryPending {
        instance: JobInstance,
        eligible_at: DateTime<Utc>,
    },
}

/// Per-job line of instances.
///
/// A job has at most one active instance (queued, running or waiting to
/// retry). Everything else waits here in fire-time order, which is what
/// keeps a job from overlapping itself or running out of order.
#[derive(Debug, Default)]
pub struct Lane {
    pub waiting: VecDeque<JobInstance>,
    pub slot: LaneSlot,
}

impl Lane {
    pub fn is_busy(&self) -> bool {
        !matches!(self.slot, LaneSlot::Idle)
    }

    /// Nothing active and nothing waiting.
    pub fn is_empty(&self) -> bool {
        !self.is_busy() && self.waiting.is_empty()
    }

    /// Insert keeping (fire_at, seq) order.
    pub fn enqueue(&mut self, instance: JobInstance) {
        let key = (instance.fire_at, instance.seq);
        let pos = self
            .waiting
            .iter()
            .position(|w| (w.fire_at, w.seq) > key)
            .unwrap_or(self.waiting.len());
        self.waiting.insert(pos, instance);
    }

    /// Take the retrying instance back if its delay has elapsed.
    pub fn take_due_retry(&mut self, now: DateTime<Utc>) -> Option<JobInstance> {
        match &self.slot {
            LaneSlot::RetryPending { eligible_at, .. } if *eligible_at <= now => {}
            _ => return None,
        }
        match std::mem::take(&mut self.slot) {
            LaneSlot::RetryPending { instance, .. } => Some(instance),
            other => {
                self.slot = other;
                None
            }
        }
    }

    pub fn is_running(&self, seq: u64) -> bool {
        matches!(self.slot, LaneSlot::Running { seq: s } if s == seq)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeDelta, TimeZone};

    use super::*;
    use crate::schedule::test_support::definition;

    #[test]
    fn enqueue_orders_by_fire_time() {
        let def = Arc::new(definition("a", &[]));
        let t0 = Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap();
        let mut lane = Lane::default();
        lane.enqueue(JobInstance::new(2, Arc::clone(&def), t0 + TimeDelta::minutes(1)));
        lane.enqueue(JobInstance::new(3, Arc::clone(&def), t0 + TimeDelta::minutes(2)));
        lane.enqueue(JobInstance::new(1, Arc::clone(&def), t0));

        let seqs: Vec<u64> = lane.waiting.iter().map(|i| i.seq).collect();
        assert_eq!(seqs, [1, 2, 3]);
    }

    #[test]
    fn retry_is_released_only_once_eligible() {
        let def = Arc::new(definition("a", &[]));
        let t0 = Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap();
        let mut lane = Lane {
            waiting: VecDeque::new(),
            slot: LaneSlot::RetryPending {
                instance: JobInstance::new(1, def, t0),
                eligible_at: t0 + TimeDelta::seconds(4),
            },
        };

        assert!(lane.take_due_retry(t0 + TimeDelta::seconds(3)).is_none());
        assert!(lane.is_busy());
        assert_eq!(lane.take_due_retry(t0 + TimeDelta::seconds(4)).map(|i| i.seq), Some(1));
        assert!(!lane.is_busy());
    }
}
