// src/schedule/store.rs

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::dag::graph::{validate_definitions, DagGraph};
use crate::errors::Result;
use crate::schedule::hash::content_hash;
use crate::schedule::JobDefinition;

/// Immutable, fully validated view of every job at one point in time.
#[derive(Debug)]
pub struct ScheduleSnapshot {
    version: u64,
    content_hash: String,
    published_at: DateTime<Utc>,
    jobs: Vec<Arc<JobDefinition>>,
    graph: DagGraph,
}

impl ScheduleSnapshot {
    fn build(version: u64, defs: Vec<JobDefinition>) -> Result<Self> {
        let graph = validate_definitions(&defs)?;
        let content_hash = content_hash(&defs);
        Ok(Self {
            version,
            content_hash,
            published_at: Utc::now(),
            jobs: defs.into_iter().map(Arc::new).collect(),
            graph,
        })
    }

    fn empty() -> Self {
        Self {
            version: 0,
            content_hash: content_hash(&[]),
            published_at: Utc::now(),
            jobs: Vec::new(),
            graph: DagGraph::default(),
        }
    }

    /// Monotonic version; 0 is the empty schedule.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }

    /// Jobs in document order.
    pub fn jobs(&self) -> &[Arc<JobDefinition>] {
        &self.jobs
    }

    pub fn get(&self, id: &str) -> Option<&Arc<JobDefinition>> {
        self.jobs.iter().find(|j| j.id == id)
    }

    pub fn graph(&self) -> &DagGraph {
        &self.graph
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Owner of the active schedule.
///
/// Writers publish a brand-new validated snapshot; readers clone the `Arc`
/// and keep a consistent version for as long as they need it.
#[derive(Debug)]
pub struct ScheduleStore {
    current: RwLock<Arc<ScheduleSnapshot>>,
}

impl ScheduleStore {
    /// Store holding an empty schedule (version 0).
    pub fn empty() -> Self {
        Self {
            current: RwLock::new(Arc::new(ScheduleSnapshot::empty())),
        }
    }

    /// Store initialised with `defs` as version 1.
    pub fn new(defs: Vec<JobDefinition>) -> Result<Self> {
        let store = Self::empty();
        store.replace(defs)?;
        Ok(store)
    }

    /// The currently active snapshot.
    pub fn snapshot(&self) -> Arc<ScheduleSnapshot> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Validate `defs` and, only if valid, publish them as the next version.
    ///
    /// On error the active snapshot is untouched.
    pub fn replace(&self, defs: Vec<JobDefinition>) -> Result<Arc<ScheduleSnapshot>> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let next_version = guard.version + 1;

        let snapshot = match ScheduleSnapshot::build(next_version, defs) {
            Ok(s) => Arc::new(s),
            Err(err) => {
                warn!(
                    active_version = guard.version,
                    error = %err,
                    "rejected schedule; keeping active snapshot"
                );
                return Err(err);
            }
        };

        info!(
            version = snapshot.version,
            jobs = snapshot.len(),
            hash = %snapshot.content_hash,
            "published schedule snapshot"
        );
        *guard = Arc::clone(&snapshot);
        Ok(snapshot)
    }
}

impl Default for ScheduleStore {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TickdagError;
    use crate::schedule::test_support::definition;

    #[test]
    fn replace_bumps_version_and_publishes_jobs() {
        let store = ScheduleStore::empty();
        assert_eq!(store.snapshot().version(), 0);

        let snap = store
            .replace(vec![definition("a", &[]), definition("b", &["a"])])
            .unwrap();
        assert_eq!(snap.version(), 1);
        assert_eq!(store.snapshot().len(), 2);
        assert_eq!(store.snapshot().graph().dependents_of("a"), ["b"]);
    }

    #[test]
    fn cyclic_replacement_keeps_previous_snapshot() {
        let store = ScheduleStore::new(vec![definition("a", &[])]).unwrap();
        let before = store.snapshot();

        let err = store
            .replace(vec![definition("a", &["b"]), definition("b", &["a"])])
            .unwrap_err();
        assert!(matches!(err, TickdagError::DagCycle(_)));

        let after = store.snapshot();
        assert_eq!(after.version(), before.version());
        assert_eq!(after.content_hash(), before.content_hash());
        assert!(after.get("a").is_some());
        assert!(after.get("b").is_none());
    }

    #[test]
    fn readers_keep_their_snapshot_across_replace() {
        let store = ScheduleStore::new(vec![definition("x", &[])]).unwrap();
        let held = store.snapshot();

        store.replace(vec![definition("y", &[])]).unwrap();

        assert!(held.get("x").is_some());
        assert!(store.snapshot().get("x").is_none());
    }
}
