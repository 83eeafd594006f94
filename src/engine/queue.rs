// src/engine/queue.rs

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::trace;

use super::JobInstance;

/// Heap entry; `BinaryHeap` is a max-heap, so the ordering is reversed.
#[derive(Debug)]
struct Entry(JobInstance);

impl Entry {
    fn key(&self) -> (i32, chrono::DateTime<chrono::Utc>, u64) {
        (self.0.priority(), self.0.fire_at, self.0.seq)
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

/// Instances whose dependencies are met and which wait for a worker.
///
/// Pops in a total order: lower priority value first, then earlier fire
/// time, then lower first-seen sequence number.
#[derive(Debug, Default)]
pub struct ReadyQueue {
    heap: BinaryHeap<Entry>,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, instance: JobInstance) {
        trace!(
            job = %instance.job_id(),
            seq = instance.seq,
            priority = instance.priority(),
            "instance ready"
        );
        self.heap.push(Entry(instance));
    }

    /// Most urgent instance, if any.
    pub fn pop(&mut self) -> Option<JobInstance> {
        self.heap.pop().map(|e| e.0)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::schedule::test_support::definition;

    fn instance(id: &str, priority: i32, minute: u32, seq: u64) -> JobInstance {
        let mut def = definition(id, &[]);
        def.priority = priority;
        let at = Utc.with_ymd_and_hms(2026, 10, 19, 9, minute, 0).unwrap();
        JobInstance::new(seq, Arc::new(def), at)
    }

    #[test]
    fn pops_by_priority_then_fire_time_then_sequence() {
        let mut q = ReadyQueue::new();
        q.push(instance("a", 5, 0, 1));
        q.push(instance("b", 1, 5, 2));
        q.push(instance("c", 3, 0, 3));
        q.push(instance("d", 3, 0, 4));
        q.push(instance("e", 3, 1, 0));

        let order: Vec<String> = std::iter::from_fn(|| q.pop())
            .map(|i| i.job_id().to_string())
            .collect();
        assert_eq!(order, ["b", "c", "d", "e", "a"]);
    }
}
