// src/schedule/watcher.rs

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Context;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::loader::load_from_str;
use crate::errors::{Result, TickdagError};
use crate::fs::FileSystem;
use crate::report::{Report, Reporter};
use crate::schedule::hash::content_hash;
use crate::schedule::store::ScheduleStore;

/// Editors often save in several steps; wait this long after a
/// notification before reading the file.
const SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Result of a successful [`ConfigWatcher::reload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// The document describes the same jobs as the active snapshot.
    Unchanged,
    /// A new snapshot was published.
    Replaced { version: u64 },
}

/// Keeps the schedule store in sync with the schedule file.
pub struct ConfigWatcher {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
    store: Arc<ScheduleStore>,
    reporter: Arc<dyn Reporter>,
    /// Fingerprint of the last document that was rejected, so a broken file
    /// is reported once rather than on every poll.
    last_rejected: Mutex<Option<String>>,
}

impl std::fmt::Debug for ConfigWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigWatcher")
            .field("path", &self.path)
            .finish()
    }
}

impl ConfigWatcher {
    pub fn new(
        path: impl Into<PathBuf>,
        fs: Arc<dyn FileSystem>,
        store: Arc<ScheduleStore>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            path: path.into(),
            fs,
            store,
            reporter,
            last_rejected: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read, parse and validate the schedule file and publish it if it
    /// differs from the active snapshot.
    ///
    /// Any error leaves the active snapshot in place; the error is reported
    /// once per distinct broken document and returned.
    pub fn reload(&self) -> Result<ReloadOutcome> {
        let contents = match self.fs.read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                let err = TickdagError::ConfigError(format!(
                    "cannot read {}: {e:#}",
                    self.path.display()
                ));
                self.reject("<unreadable>".to_string(), &err);
                return Err(err);
            }
        };

        let result = load_from_str(&contents).and_then(|cfg| {
            let incoming = content_hash(&cfg.jobs);
            if incoming == self.store.snapshot().content_hash() {
                debug!(path = %self.path.display(), "schedule unchanged");
                return Ok(ReloadOutcome::Unchanged);
            }
            let snapshot = self.store.replace(cfg.jobs)?;
            info!(
                path = %self.path.display(),
                version = snapshot.version(),
                "schedule reloaded"
            );
            Ok(ReloadOutcome::Replaced {
                version: snapshot.version(),
            })
        });

        match result {
            Ok(outcome) => {
                *self.rejected_guard() = None;
                Ok(outcome)
            }
            Err(err) => {
                self.reject(blake3::hash(contents.as_bytes()).to_hex().to_string(), &err);
                Err(err)
            }
        }
    }

    fn reject(&self, fingerprint: String, err: &TickdagError) {
        let mut last = self.rejected_guard();
        if last.as_deref() == Some(fingerprint.as_str()) {
            debug!(error = %err, "schedule still rejected");
            return;
        }
        warn!(path = %self.path.display(), error = %err, "keeping active schedule");
        self.reporter.report(&Report::ConfigRejected {
            source: self.path.display().to_string(),
            error: err.to_string(),
        });
        *last = Some(fingerprint);
    }

    fn rejected_guard(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.last_rejected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Watch the schedule file and reload on change.
    ///
    /// Filesystem notifications give prompt reloads; `poll_interval` bounds
    /// the delay when notifications are unavailable or missed. Must be
    /// called from within a Tokio runtime.
    pub fn spawn(self: Arc<Self>, poll_interval: Duration) -> anyhow::Result<WatcherHandle> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .with_context(|| format!("schedule path {:?} has no file name", self.path))?;

        // Channel from the blocking notify callback into the async world.
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<()>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let relevant = event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == Some(file_name.as_os_str()));
                    if relevant {
                        // Receiver gone means the watcher is shutting down.
                        let _ = event_tx.send(());
                    }
                }
                Err(err) => {
                    eprintln!("tickdag: schedule watch error: {err}");
                }
            },
            Config::default(),
        )?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("watching {:?}", dir))?;

        info!(path = %self.path.display(), ?poll_interval, "schedule watcher started");

        let task = tokio::spawn(async move {
            let mut poll = tokio::time::interval(poll_interval);
            poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; the schedule was just loaded.
            poll.tick().await;

            loop {
                tokio::select! {
                    notified = event_rx.recv() => {
                        if notified.is_none() {
                            break;
                        }
                        tokio::time::sleep(SETTLE_DELAY).await;
                        while event_rx.try_recv().is_ok() {}
                        debug!("schedule file changed");
                    }
                    _ = poll.tick() => {}
                }
                // Errors were already reported inside reload.
                let _ = self.reload();
            }
            debug!("schedule watcher loop finished");
        });

        Ok(WatcherHandle {
            _inner: watcher,
            task,
        })
    }
}

/// Handle for the schedule watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive; dropping the handle
/// stops both file watching and polling.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}
