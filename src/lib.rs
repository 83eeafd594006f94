// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod report;
pub mod schedule;
pub mod task;
pub mod trigger;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::{default_config_path, load_or_init, resolve_state_dir};
use crate::config::model::ConfigFile;
use crate::dag::{DependencyGate, FileCompletionStore};
use crate::engine::{DispatchCore, DispatchOptions, RetryPolicy, Runtime, RuntimeEvent};
use crate::exec::WorkerPool;
use crate::fs::{FileSystem, RealFileSystem};
use crate::report::{LogReporter, Reporter};
use crate::schedule::{ConfigWatcher, ScheduleSnapshot, ScheduleStore};
use crate::task::TaskRegistry;
use crate::trigger::{next_fire_time, spawn_trigger_loop};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (writing the default schedule if needed)
/// - completion state + dependency gate
/// - schedule store + config watcher
/// - trigger loop, dispatcher core and worker pool
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args
        .config
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

    let mut cfg = load_or_init(fs.as_ref(), &config_path)?;
    apply_overrides(&mut cfg, &args);

    let registry = Arc::new(TaskRegistry::with_builtins());
    warn_unknown_tasks(&cfg, &registry);

    let store = Arc::new(ScheduleStore::new(cfg.jobs.clone())?);
    if args.dry_run {
        print_dry_run(&cfg, &store.snapshot(), Utc::now());
        return Ok(());
    }

    // Completion state.
    let state_dir = resolve_state_dir(&config_path, &cfg.scheduler.state_dir);
    let gate = Arc::new(DependencyGate::open(Box::new(FileCompletionStore::new(
        &state_dir,
        Arc::clone(&fs),
    )))?);
    let retention = TimeDelta::days(i64::from(cfg.scheduler.completion_retention_days));
    if let Some(cutoff) = Utc::now().checked_sub_signed(retention) {
        gate.prune_older_than(cutoff)?;
    }
    info!(state_dir = %state_dir.display(), "completion state ready");

    // Live schedule.
    let reporter: Arc<dyn Reporter> = Arc::new(LogReporter);
    let _watcher_handle = Arc::new(ConfigWatcher::new(
        &config_path,
        Arc::clone(&fs),
        Arc::clone(&store),
        Arc::clone(&reporter),
    ))
    .spawn(cfg.scheduler.poll_interval())?;

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::unbounded_channel::<RuntimeEvent>();

    let trigger_loop = spawn_trigger_loop(
        Arc::clone(&store),
        cfg.scheduler.tick_interval(),
        rt_tx.clone(),
    );

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested);
        });
    }

    let options = DispatchOptions {
        workers: cfg.scheduler.workers,
        retry: RetryPolicy::from_section(&cfg.retry),
        max_backlog_per_job: cfg.scheduler.max_backlog_per_job,
    };
    let pool = WorkerPool::new(options.workers, registry, Arc::clone(&gate), rt_tx);

    // Construct the pure core (single source of truth for dispatch semantics)
    // and the async IO shell around it.
    let core = DispatchCore::new(gate, options);
    let runtime = Runtime::new(core, rt_rx, pool, reporter);
    runtime.run().await?;

    trigger_loop.abort();
    Ok(())
}

fn apply_overrides(cfg: &mut ConfigFile, args: &CliArgs) {
    if let Some(workers) = args.workers {
        cfg.scheduler.workers = workers.max(1);
    }
    if let Some(ref dir) = args.state_dir {
        cfg.scheduler.state_dir = dir.clone();
    }
}

fn warn_unknown_tasks(cfg: &ConfigFile, registry: &TaskRegistry) {
    for job in &cfg.jobs {
        if registry.get(&job.task).is_none() {
            warn!(
                job = %job.id,
                task = %job.task,
                known = ?registry.names(),
                "job names an unregistered task; its attempts will fail"
            );
        }
    }
}

/// Simple dry-run output: print jobs upstream first, with their next fire
/// time and the jobs they unblock.
fn print_dry_run(cfg: &ConfigFile, snapshot: &ScheduleSnapshot, now: DateTime<Utc>) {
    println!("tickdag dry-run (now = {now})");
    println!("  scheduler.workers = {}", cfg.scheduler.workers);
    println!("  scheduler.tick_interval_ms = {}", cfg.scheduler.tick_interval_ms);
    println!("  scheduler.state_dir = {}", cfg.scheduler.state_dir);
    println!();

    println!("jobs ({}):", snapshot.len());
    let graph = snapshot.graph();
    for id in graph.topological_order() {
        let Some(job) = snapshot.get(id) else {
            continue;
        };
        println!("  - {}", job.id);
        println!("      task: {}", job.task);
        println!("      trigger: {}", job.trigger);
        println!("      priority: {}", job.priority);
        if !job.depends_on.is_empty() {
            let deps: Vec<String> = job
                .depends_on
                .iter()
                .map(|d| format!("{} ({:?})", d.job, d.rule))
                .collect();
            println!("      depends_on: {}", deps.join(", "));
        }
        let dependents = graph.dependents_of(id);
        if !dependents.is_empty() {
            println!("      unblocks: {}", dependents.join(", "));
        }
        println!("      max_attempts: {}", job.max_attempts);
        println!("      next fire: {}", next_fire_time(&job.trigger, now, None));
    }

    debug!("dry-run complete (no execution)");
}
