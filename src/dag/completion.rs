// src/dag/completion.rs

//! Durable completion records.
//!
//! The on-disk format is one record per line:
//!
//! `<job_id>\t<cycle_key>\t<completed_at RFC 3339>`
//!
//! stored at `<state_dir>/completions`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, info, warn};

use crate::fs::FileSystem;
use crate::types::{CycleKey, JobId};

/// File name of the completion log inside the state directory.
pub const COMPLETIONS_FILE: &str = "completions";

/// Proof that a job finished successfully for one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRecord {
    pub job_id: JobId,
    pub cycle: CycleKey,
    pub completed_at: DateTime<Utc>,
}

impl CompletionRecord {
    fn to_line(&self) -> String {
        format!(
            "{}\t{}\t{}",
            self.job_id,
            self.cycle,
            self.completed_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }

    fn parse_line(line: &str) -> Option<Self> {
        let mut parts = line.split('\t');
        let job_id = parts.next()?.trim();
        let cycle = parts.next()?.trim();
        let completed_at = DateTime::parse_from_rfc3339(parts.next()?.trim()).ok()?;
        if job_id.is_empty() || cycle.is_empty() || parts.next().is_some() {
            return None;
        }
        Some(Self {
            job_id: job_id.to_string(),
            cycle: CycleKey::new(cycle),
            completed_at: completed_at.with_timezone(&Utc),
        })
    }
}

/// Abstract storage for completion records.
pub trait CompletionStore: Send + Sync {
    /// All stored records, oldest first.
    fn load(&self) -> Result<Vec<CompletionRecord>>;
    /// Durably store one record. Must not return before the record would
    /// survive a crash.
    fn append(&mut self, record: &CompletionRecord) -> Result<()>;
    /// Replace the stored set (used when pruning).
    fn rewrite(&mut self, records: &[CompletionRecord]) -> Result<()>;
}

/// Stores records in `<state_dir>/completions`.
pub struct FileCompletionStore {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl FileCompletionStore {
    pub fn new(state_dir: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            path: state_dir.into().join(COMPLETIONS_FILE),
            fs,
        }
    }
}

impl CompletionStore for FileCompletionStore {
    fn load(&self) -> Result<Vec<CompletionRecord>> {
        if !self.fs.exists(&self.path) {
            return Ok(Vec::new());
        }

        let contents = self
            .fs
            .read_to_string(&self.path)
            .with_context(|| format!("reading completion file at {:?}", self.path))?;

        let mut records = Vec::new();
        for (n, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match CompletionRecord::parse_line(line) {
                Some(record) => records.push(record),
                None => warn!(path = ?self.path, line = n + 1, "skipping malformed completion record"),
            }
        }

        debug!(path = ?self.path, records = records.len(), "loaded completion records");
        Ok(records)
    }

    fn append(&mut self, record: &CompletionRecord) -> Result<()> {
        self.fs
            .append_line(&self.path, &record.to_line())
            .with_context(|| format!("appending completion record to {:?}", self.path))
    }

    fn rewrite(&mut self, records: &[CompletionRecord]) -> Result<()> {
        let mut body = String::new();
        for record in records {
            body.push_str(&record.to_line());
            body.push('\n');
        }
        self.fs
            .write(&self.path, body.as_bytes())
            .with_context(|| format!("rewriting completion file at {:?}", self.path))?;
        info!(path = ?self.path, records = records.len(), "rewrote completion file");
        Ok(())
    }
}

/// Keeps records in memory only; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryCompletionStore {
    records: Vec<CompletionRecord>,
}

impl MemoryCompletionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CompletionStore for MemoryCompletionStore {
    fn load(&self) -> Result<Vec<CompletionRecord>> {
        Ok(self.records.clone())
    }

    fn append(&mut self, record: &CompletionRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn rewrite(&mut self, records: &[CompletionRecord]) -> Result<()> {
        self.records = records.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn record(job: &str, cycle: &str) -> CompletionRecord {
        CompletionRecord {
            job_id: job.to_string(),
            cycle: CycleKey::new(cycle),
            completed_at: Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 1).unwrap(),
        }
    }

    #[test]
    fn file_store_appends_tab_separated_lines() {
        let fs = MockFileSystem::new();
        let mut store = FileCompletionStore::new("/state", Arc::new(fs.clone()));

        store.append(&record("start_trading", "2026-10-19")).unwrap();

        assert_eq!(
            fs.contents("/state/completions").as_deref(),
            Some("start_trading\t2026-10-19\t2026-10-19T09:00:01Z\n")
        );
        assert_eq!(store.load().unwrap(), vec![record("start_trading", "2026-10-19")]);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "/state/completions",
            "a\t2026-10-19\t2026-10-19T09:00:01Z\ngarbage\n\nb\tx\tnot-a-time\n",
        );
        let store = FileCompletionStore::new("/state", Arc::new(fs));

        let records = store.load().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].job_id, "a");
    }

    #[test]
    fn rewrite_replaces_file() {
        let fs = MockFileSystem::new();
        let mut store = FileCompletionStore::new("/state", Arc::new(fs.clone()));
        store.append(&record("a", "2026-10-18")).unwrap();
        store.append(&record("b", "2026-10-19")).unwrap();

        store.rewrite(&[record("b", "2026-10-19")]).unwrap();

        assert_eq!(store.load().unwrap(), vec![record("b", "2026-10-19")]);
    }
}
