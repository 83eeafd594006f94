// tests/dispatcher.rs

mod common;
use crate::common::*;

use chrono::TimeDelta;

use tickdag::engine::{CoreCommand, DispatchCore, InstanceStatus, TaskOutcome};
use tickdag::report::{AbandonReason, Report};
use tickdag::types::{CycleGranularity, CycleKey};
use tickdag_test_utils::builders::{ConfigFileBuilder, JobConfigBuilder};

#[test]
fn single_worker_runs_ready_instances_by_priority() {
    init_tracing();
    let defs = by_id(
        ConfigFileBuilder::new()
            .with_job(JobConfigBuilder::every_minutes("low", 1).priority(5).build())
            .with_job(JobConfigBuilder::every_minutes("urgent", 1).priority(1).build())
            .with_job(JobConfigBuilder::every_minutes("mid", 1).priority(3).build())
            .build_jobs(),
    );
    let (mut core, _gate) = new_core(1);
    let mut ids = Instances::default();
    let t0 = utc(9, 0, 0);

    let step = tick(
        &mut core,
        t0,
        vec![
            ids.fire(&defs["low"], t0),
            ids.fire(&defs["urgent"], t0),
            ids.fire(&defs["mid"], t0),
        ],
    );

    let mut order = Vec::new();
    let mut running = dispatched(&step);
    let mut at = t0;
    while let Some(instance) = running.pop() {
        assert_eq!(core.in_flight(), 1, "never more than one worker busy");
        order.push(instance.priority());
        at += TimeDelta::seconds(1);
        running = dispatched(&finish(&mut core, instance, TaskOutcome::Success, at));
    }

    assert_eq!(order, [1, 3, 5]);
    assert!(core.is_idle());
}

#[test]
fn equal_priority_breaks_ties_by_fire_time() {
    let defs = by_id(
        ConfigFileBuilder::new()
            .with_job(JobConfigBuilder::every_minutes("late", 1).build())
            .with_job(JobConfigBuilder::every_minutes("early", 1).build())
            .build_jobs(),
    );
    let (mut core, _gate) = new_core(1);
    let mut ids = Instances::default();
    let t0 = utc(9, 0, 0);

    let step = tick(
        &mut core,
        t0 + TimeDelta::seconds(5),
        vec![
            ids.fire(&defs["late"], t0 + TimeDelta::seconds(1)),
            ids.fire(&defs["early"], t0),
        ],
    );
    assert_eq!(dispatched_ids(&step), ["early"]);
}

#[test]
fn a_job_never_overlaps_itself() {
    let defs = by_id(
        ConfigFileBuilder::new()
            .with_job(JobConfigBuilder::every_secs("poll", 10).build())
            .build_jobs(),
    );
    let (mut core, _gate) = new_core(3);
    let mut ids = Instances::default();
    let t0 = utc(9, 0, 0);

    let first = dispatched(&tick(&mut core, t0, vec![ids.fire(&defs["poll"], t0)]));
    assert_eq!(first.len(), 1);

    // Two more fires while the first attempt is still running.
    for secs in [10, 20] {
        let at = t0 + TimeDelta::seconds(secs);
        let step = tick(&mut core, at, vec![ids.fire(&defs["poll"], at)]);
        assert!(dispatched(&step).is_empty());
    }
    assert_eq!(core.in_flight(), 1);
    assert_eq!(core.waiting_len("poll"), 2);

    let next = dispatched(&finish(
        &mut core,
        first[0].clone(),
        TaskOutcome::Success,
        t0 + TimeDelta::seconds(25),
    ));
    assert_eq!(next.len(), 1);
    assert_eq!(next[0].fire_at, t0 + TimeDelta::seconds(10));
    assert_eq!(core.in_flight(), 1);
}

#[test]
fn failing_job_backs_off_exponentially_then_is_abandoned() {
    init_tracing();
    let defs = by_id(
        ConfigFileBuilder::new()
            .with_job(
                JobConfigBuilder::every_minutes("flaky", 60)
                    .max_attempts(5)
                    .retry_delay_secs(1)
                    .build(),
            )
            .build_jobs(),
    );
    let (mut core, _gate) = new_core(1);
    let mut ids = Instances::default();
    let t0 = utc(9, 0, 0);

    let mut running = dispatched(&tick(&mut core, t0, vec![ids.fire(&defs["flaky"], t0)]));
    let mut now = t0;
    let mut delays = Vec::new();

    for attempt in 1..=4 {
        let instance = running.pop().expect("attempt dispatched");
        assert_eq!(instance.attempt, attempt);

        let step = finish(&mut core, instance, TaskOutcome::Failed("boom".into()), now);
        assert!(reports(&step).is_empty());
        let eligible = core.retry_eligible_at("flaky").expect("retry scheduled");
        delays.push((eligible - now).num_seconds());

        // One second early: still parked.
        let early = tick(&mut core, eligible - TimeDelta::seconds(1), vec![]);
        assert!(dispatched(&early).is_empty());

        now = eligible;
        running = dispatched(&tick(&mut core, now, vec![]));
    }
    assert_eq!(delays, [1, 2, 4, 8]);

    let last = running.pop().expect("fifth attempt dispatched");
    assert_eq!(last.attempt, 5);
    let step = finish(&mut core, last, TaskOutcome::Failed("still broken".into()), now);

    match reports(&step).as_slice() {
        [Report::Abandoned {
            job_id,
            attempts,
            reason,
            last_error,
            ..
        }] => {
            assert_eq!(job_id, "flaky");
            assert_eq!(*attempts, 5);
            assert_eq!(*reason, AbandonReason::RetriesExhausted);
            assert_eq!(last_error.as_deref(), Some("still broken"));
        }
        other => panic!("expected one abandonment report, got {other:?}"),
    }
    assert!(core.is_idle());
}

#[test]
fn unmet_dependencies_expire_after_the_timeout() {
    let defs = by_id(
        ConfigFileBuilder::new()
            .with_job(JobConfigBuilder::daily_at("start_trading", 9, 0).build())
            .with_job(
                JobConfigBuilder::every_minutes("evaluate", 5)
                    .after("start_trading")
                    .dependency_timeout_secs(30)
                    .build(),
            )
            .build_jobs(),
    );
    let (mut core, _gate) = new_core(2);
    let mut ids = Instances::default();
    let t0 = utc(9, 5, 0);

    let step = tick(&mut core, t0, vec![ids.fire(&defs["evaluate"], t0)]);
    assert!(dispatched(&step).is_empty());
    assert_eq!(core.waiting_len("evaluate"), 1);

    let step = tick(&mut core, t0 + TimeDelta::seconds(29), vec![]);
    assert!(reports(&step).is_empty());

    let step = tick(&mut core, t0 + TimeDelta::seconds(30), vec![]);
    match reports(&step).as_slice() {
        [Report::Abandoned {
            job_id,
            reason,
            attempts,
            last_error,
            ..
        }] => {
            assert_eq!(job_id, "evaluate");
            assert_eq!(*reason, AbandonReason::DependencyTimeout);
            assert_eq!(*attempts, 0);
            assert!(last_error.as_deref().unwrap_or("").contains("start_trading"));
        }
        other => panic!("expected a dependency timeout, got {other:?}"),
    }
    assert_eq!(core.waiting_len("evaluate"), 0);
}

#[test]
fn waiting_instance_is_admitted_once_its_dependency_completes() {
    let defs = by_id(
        ConfigFileBuilder::new()
            .with_job(JobConfigBuilder::daily_at("start_trading", 9, 0).build())
            .with_job(
                JobConfigBuilder::every_minutes("evaluate", 5)
                    .after("start_trading")
                    .build(),
            )
            .build_jobs(),
    );
    let (mut core, gate) = new_core(2);
    let mut ids = Instances::default();
    let t0 = utc(9, 5, 0);

    tick(&mut core, t0, vec![ids.fire(&defs["evaluate"], t0)]);
    assert_eq!(core.active_status("evaluate"), None);

    gate.record_completion_at(
        "start_trading",
        &CycleKey::for_fire(CycleGranularity::Daily, utc(9, 0, 0)),
        t0,
    )
    .unwrap();

    let step = tick(&mut core, t0 + TimeDelta::seconds(1), vec![]);
    assert_eq!(dispatched_ids(&step), ["evaluate"]);
    assert_eq!(core.active_status("evaluate"), Some(InstanceStatus::Running));
}

#[test]
fn backlog_cap_supersedes_the_oldest_waiting_instance() {
    let defs = by_id(
        ConfigFileBuilder::new()
            .with_job(JobConfigBuilder::every_secs("poll", 10).build())
            .build_jobs(),
    );
    let gate = std::sync::Arc::new(tickdag::dag::DependencyGate::in_memory());
    let mut core = DispatchCore::new(
        gate,
        tickdag::engine::DispatchOptions {
            max_backlog_per_job: Some(2),
            ..options(1)
        },
    );
    let mut ids = Instances::default();
    let t0 = utc(9, 0, 0);

    tick(&mut core, t0, vec![ids.fire(&defs["poll"], t0)]);
    assert_eq!(core.in_flight(), 1);

    let late: Vec<_> = (1..=3)
        .map(|n| ids.fire(&defs["poll"], t0 + TimeDelta::seconds(10 * n)))
        .collect();
    let oldest_fire = late[0].fire_at;
    let step = tick(&mut core, t0 + TimeDelta::seconds(30), late);

    match reports(&step).as_slice() {
        [Report::Abandoned { reason, fire_at, .. }] => {
            assert_eq!(*reason, AbandonReason::Superseded);
            assert_eq!(*fire_at, oldest_fire);
        }
        other => panic!("expected one superseded report, got {other:?}"),
    }
    assert_eq!(core.waiting_len("poll"), 2);
}

#[test]
fn shutdown_cancels_and_waits_for_running_attempts() {
    let defs = by_id(
        ConfigFileBuilder::new()
            .with_job(JobConfigBuilder::every_secs("a", 10).build())
            .with_job(JobConfigBuilder::every_secs("b", 10).build())
            .build_jobs(),
    );
    let (mut core, _gate) = new_core(1);
    let mut ids = Instances::default();
    let t0 = utc(9, 0, 0);

    let running = dispatched(&tick(
        &mut core,
        t0,
        vec![ids.fire(&defs["a"], t0), ids.fire(&defs["b"], t0)],
    ));
    assert_eq!(running.len(), 1);
    assert_eq!(core.ready_len(), 1);

    let step = core.step(tickdag::engine::RuntimeEvent::ShutdownRequested);
    assert!(matches!(step.commands.as_slice(), [CoreCommand::CancelRunning]));
    assert!(step.keep_running);

    // New fires are ignored once shutting down.
    let at = t0 + TimeDelta::seconds(10);
    let step = tick(&mut core, at, vec![ids.fire(&defs["a"], at)]);
    assert!(dispatched(&step).is_empty());
    assert!(step.keep_running);

    // The queued instance is not started when the worker frees up.
    let step = finish(&mut core, running[0].clone(), TaskOutcome::Success, at);
    assert!(dispatched(&step).is_empty());
    assert!(!step.keep_running);
}

#[test]
fn idle_core_stops_immediately_on_shutdown() {
    let (mut core, _gate) = new_core(2);
    let step = core.step(tickdag::engine::RuntimeEvent::ShutdownRequested);
    assert!(!step.keep_running);
}

#[test]
fn stale_unmet_instances_are_superseded_once_a_later_one_is_ready() {
    init_tracing();
    let defs = by_id(
        ConfigFileBuilder::new()
            .with_job(JobConfigBuilder::daily_at("start_trading", 9, 0).build())
            .with_job(
                JobConfigBuilder::every_minutes("evaluate", 5)
                    .after("start_trading")
                    .build(),
            )
            .build_jobs(),
    );
    let (mut core, gate) = new_core(2);
    let mut ids = Instances::default();
    let next_day = |h, m, s| utc(h, m, s) + TimeDelta::days(1);

    // Started after 09:00, so today's start_trading never ran.
    let day_one = utc(10, 0, 0);
    let step = tick(&mut core, day_one, vec![ids.fire(&defs["evaluate"], day_one)]);
    assert!(dispatched(&step).is_empty());

    let early = next_day(8, 55, 0);
    let step = tick(&mut core, early, vec![ids.fire(&defs["evaluate"], early)]);
    assert!(dispatched(&step).is_empty());
    assert!(reports(&step).is_empty());
    assert_eq!(core.waiting_len("evaluate"), 2);

    gate.record_completion_at(
        "start_trading",
        &CycleKey::for_fire(CycleGranularity::Daily, next_day(9, 0, 0)),
        next_day(9, 0, 1),
    )
    .unwrap();

    let due = next_day(9, 5, 0);
    let step = tick(&mut core, due, vec![ids.fire(&defs["evaluate"], due)]);

    let running = dispatched(&step);
    assert_eq!(running.len(), 1);
    assert_eq!(running[0].fire_at, due);

    let superseded: Vec<_> = reports(&step)
        .into_iter()
        .map(|r| match r {
            Report::Abandoned {
                fire_at,
                reason,
                last_error,
                ..
            } => {
                assert_eq!(reason, AbandonReason::Superseded);
                (fire_at, last_error)
            }
            other => panic!("expected superseded reports, got {other:?}"),
        })
        .collect();
    assert_eq!(superseded.len(), 2);
    assert_eq!(superseded[0].0, day_one);
    assert!(superseded[0].1.as_deref().unwrap_or("").contains("start_trading"));
    assert_eq!(superseded[1].0, early);
    assert_eq!(core.waiting_len("evaluate"), 0);
}

#[test]
fn unmet_head_with_nothing_ready_behind_it_keeps_waiting() {
    let defs = by_id(
        ConfigFileBuilder::new()
            .with_job(JobConfigBuilder::daily_at("start_trading", 9, 0).build())
            .with_job(
                JobConfigBuilder::every_minutes("evaluate", 5)
                    .after("start_trading")
                    .build(),
            )
            .build_jobs(),
    );
    let (mut core, _gate) = new_core(1);
    let mut ids = Instances::default();

    for minute in [0, 5, 10] {
        let at = utc(8, minute, 0);
        let step = tick(&mut core, at, vec![ids.fire(&defs["evaluate"], at)]);
        assert!(dispatched(&step).is_empty());
        assert!(reports(&step).is_empty());
    }
    assert_eq!(core.waiting_len("evaluate"), 3);
}

/// Run everything to completion on one worker, recording each success the
/// way a worker would, and return the job ids in dispatch order.
fn drain_in_order(
    core: &mut DispatchCore,
    gate: &tickdag::dag::DependencyGate,
    first: tickdag::engine::CoreStep,
    start: chrono::DateTime<chrono::Utc>,
) -> Vec<String> {
    let mut order = Vec::new();
    let mut running = dispatched(&first);
    let mut at = start;
    while let Some(instance) = running.pop() {
        assert!(running.is_empty(), "one worker runs one instance");
        order.push(instance.job_id().to_string());
        at += TimeDelta::seconds(1);
        gate.record_completion_at(instance.job_id(), &instance.cycle, at).unwrap();
        running = dispatched(&finish(core, instance, TaskOutcome::Success, at));
    }
    order
}

#[test]
fn ready_dependent_is_ordered_by_its_priority() {
    let defs = by_id(
        ConfigFileBuilder::new()
            .with_job(JobConfigBuilder::daily_at("start_trading", 9, 0).build())
            .with_job(JobConfigBuilder::every_minutes("health_check", 1).priority(0).build())
            .with_job(
                JobConfigBuilder::every_minutes("evaluate", 5)
                    .after("start_trading")
                    .priority(3)
                    .build(),
            )
            .with_job(JobConfigBuilder::every_minutes("report", 5).priority(5).build())
            .build_jobs(),
    );
    let (mut core, gate) = new_core(1);
    let mut ids = Instances::default();
    gate.record_completion_at(
        "start_trading",
        &CycleKey::for_fire(CycleGranularity::Daily, utc(9, 0, 0)),
        utc(9, 0, 1),
    )
    .unwrap();

    let t0 = utc(9, 5, 0);
    let step = tick(
        &mut core,
        t0,
        vec![
            ids.fire(&defs["report"], t0),
            ids.fire(&defs["evaluate"], t0),
            ids.fire(&defs["health_check"], t0),
        ],
    );

    assert_eq!(
        drain_in_order(&mut core, &gate, step, t0),
        ["health_check", "evaluate", "report"]
    );
    assert!(core.is_idle());
}

#[test]
fn dependent_admitted_mid_run_overtakes_less_urgent_queued_work() {
    let defs = by_id(
        ConfigFileBuilder::new()
            .with_job(JobConfigBuilder::daily_at("start_trading", 9, 0).priority(1).build())
            .with_job(JobConfigBuilder::every_minutes("health_check", 1).priority(0).build())
            .with_job(
                JobConfigBuilder::every_minutes("evaluate", 5)
                    .after("start_trading")
                    .priority(3)
                    .build(),
            )
            .with_job(JobConfigBuilder::every_minutes("report", 5).priority(5).build())
            .build_jobs(),
    );
    let (mut core, gate) = new_core(1);
    let mut ids = Instances::default();

    let t0 = utc(9, 0, 0);
    let step = tick(
        &mut core,
        t0,
        vec![
            ids.fire(&defs["start_trading"], t0),
            ids.fire(&defs["report"], t0),
            ids.fire(&defs["evaluate"], t0),
            ids.fire(&defs["health_check"], t0),
        ],
    );

    assert_eq!(
        drain_in_order(&mut core, &gate, step, t0),
        ["health_check", "start_trading", "evaluate", "report"]
    );
    assert!(core.is_idle());
}
