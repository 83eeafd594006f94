// src/dag/gate.rs

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::dag::completion::{CompletionRecord, CompletionStore, MemoryCompletionStore};
use crate::errors::{Result, TickdagError};
use crate::schedule::{Dependency, JobDefinition};
use crate::types::{CycleKey, CycleMatch, JobId};

struct GateState {
    /// job -> cycle -> completion time.
    index: HashMap<JobId, BTreeMap<CycleKey, DateTime<Utc>>>,
    store: Box<dyn CompletionStore>,
}

/// Decides whether an instance's dependencies are satisfied and records
/// completions.
///
/// Reads and writes are serialised by one mutex; the in-memory index is only
/// updated after the backing store accepted the record, so the index never
/// claims a completion that would be lost on restart.
pub struct DependencyGate {
    inner: Mutex<GateState>,
}

impl std::fmt::Debug for DependencyGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("DependencyGate")
            .field("jobs", &state.index.len())
            .finish_non_exhaustive()
    }
}

impl DependencyGate {
    /// Open a gate over `store`, loading every record it holds.
    pub fn open(store: Box<dyn CompletionStore>) -> Result<Self> {
        let records = store
            .load()
            .map_err(|e| TickdagError::Persistence(format!("{e:#}")))?;

        let mut index: HashMap<JobId, BTreeMap<CycleKey, DateTime<Utc>>> = HashMap::new();
        for record in records {
            index
                .entry(record.job_id)
                .or_default()
                .entry(record.cycle)
                .or_insert(record.completed_at);
        }
        info!(jobs = index.len(), "dependency gate loaded completion records");

        Ok(Self {
            inner: Mutex::new(GateState { index, store }),
        })
    }

    /// Gate backed by memory only.
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(GateState {
                index: HashMap::new(),
                store: Box::new(MemoryCompletionStore::new()),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, GateState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True iff every dependency of `def` has a completion matching `cycle`.
    pub fn is_ready(&self, def: &JobDefinition, cycle: &CycleKey) -> bool {
        let state = self.state();
        def.depends_on
            .iter()
            .all(|dep| satisfied(&state.index, dep, cycle))
    }

    /// Dependencies of `def` not yet satisfied for `cycle`, in declaration order.
    pub fn unmet_dependencies(&self, def: &JobDefinition, cycle: &CycleKey) -> Vec<JobId> {
        let state = self.state();
        def.depends_on
            .iter()
            .filter(|dep| !satisfied(&state.index, dep, cycle))
            .map(|dep| dep.job.clone())
            .collect()
    }

    /// Record that `job` completed `cycle` now. See [`Self::record_completion_at`].
    pub fn record_completion(&self, job: &str, cycle: &CycleKey) -> Result<bool> {
        self.record_completion_at(job, cycle, Utc::now())
    }

    /// Durably record a completion.
    ///
    /// Returns `Ok(false)` when the record already existed; nothing is
    /// written in that case.
    pub fn record_completion_at(
        &self,
        job: &str,
        cycle: &CycleKey,
        completed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut state = self.state();
        let exists = state
            .index
            .get(job)
            .is_some_and(|cycles| cycles.contains_key(cycle));
        if exists {
            debug!(job, %cycle, "completion already recorded");
            return Ok(false);
        }

        let record = CompletionRecord {
            job_id: job.to_string(),
            cycle: cycle.clone(),
            completed_at,
        };
        state
            .store
            .append(&record)
            .map_err(|e| TickdagError::Persistence(format!("{e:#}")))?;

        state
            .index
            .entry(record.job_id)
            .or_default()
            .insert(record.cycle, completed_at);
        debug!(job, %cycle, "completion recorded");
        Ok(true)
    }

    /// Most recent completion of `job`, by completion time.
    pub fn latest_completion(&self, job: &str) -> Option<CompletionRecord> {
        let state = self.state();
        state
            .index
            .get(job)?
            .iter()
            .max_by_key(|(_, at)| **at)
            .map(|(cycle, at)| CompletionRecord {
                job_id: job.to_string(),
                cycle: cycle.clone(),
                completed_at: *at,
            })
    }

    /// Drop records completed before `cutoff`. Returns how many were removed.
    ///
    /// The newest record of every job is always kept, so a `latest`
    /// dependency stays satisfied however old its last completion is.
    pub fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut state = self.state();
        let before: usize = state.index.values().map(BTreeMap::len).sum();

        let mut kept = Vec::new();
        for (job, cycles) in &state.index {
            let newest = cycles.values().max().copied();
            for (cycle, at) in cycles {
                if *at >= cutoff || Some(*at) == newest {
                    kept.push(CompletionRecord {
                        job_id: job.clone(),
                        cycle: cycle.clone(),
                        completed_at: *at,
                    });
                }
            }
        }
        let removed = before - kept.len();
        if removed == 0 {
            return Ok(0);
        }

        kept.sort_by(|a, b| a.completed_at.cmp(&b.completed_at));
        state
            .store
            .rewrite(&kept)
            .map_err(|e| TickdagError::Persistence(format!("{e:#}")))?;

        state.index.clear();
        for record in kept {
            state
                .index
                .entry(record.job_id)
                .or_default()
                .insert(record.cycle, record.completed_at);
        }
        info!(removed, %cutoff, "pruned old completion records");
        Ok(removed)
    }
}

fn satisfied(
    index: &HashMap<JobId, BTreeMap<CycleKey, DateTime<Utc>>>,
    dep: &Dependency,
    cycle: &CycleKey,
) -> bool {
    let Some(cycles) = index.get(&dep.job) else {
        return false;
    };
    match dep.rule {
        CycleMatch::Latest => !cycles.is_empty(),
        CycleMatch::SameCycle => cycles.contains_key(cycle),
        CycleMatch::SameDay => match cycle.day() {
            Some(day) => cycles.keys().any(|k| k.day() == Some(day)),
            None => {
                warn!(dependency = %dep.job, %cycle, "cycle key has no day; requiring exact match");
                cycles.contains_key(cycle)
            }
        },
    }
}
