mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::*;
use resync_scheduler::{DenyReason, RunOutcome, SchedulerError, SchedulerState};

fn completed(outcome: RunOutcome) -> resync_core::Stat {
    match outcome {
        RunOutcome::Completed(stat) => stat,
        other => panic!("expected a completed run, got {other:?}"),
    }
}

#[tokio::test]
async fn second_trigger_while_running_is_skipped() {
    let h = harness(config(vec![("A", shell_sync("sleep 1", NEVER))]), sh());
    h.scheduler.start().unwrap();

    let first = h.scheduler.trigger("A").unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(h.scheduler.active_jobs().await, vec!["A"]);

    let second = h.scheduler.trigger("A").unwrap().await.unwrap().unwrap();
    assert!(matches!(second, RunOutcome::Skipped(DenyReason::AlreadyRunning)));

    let stat = completed(first.await.unwrap().unwrap());
    assert!(stat.success);
    assert!(stat.duration >= Duration::from_secs(1));
    assert!(h.scheduler.active_jobs().await.is_empty());
    assert_eq!(h.store.stats().len(), 1);

    h.scheduler.stop().await;
}

#[tokio::test]
async fn overlapping_schedule_never_runs_concurrently() {
    let runner = Arc::new(CountingRunner::new());
    let h = harness(
        config(vec![("A", shell_sync("sleep 2", EVERY_SECOND))]),
        runner.clone(),
    );
    h.scheduler.start().unwrap();

    tokio::time::sleep(Duration::from_millis(3500)).await;

    let started = runner.started.load(Ordering::SeqCst);
    assert!(started >= 1);
    // At least three firings happened in 3.5 s; a 2 s job admits at most two.
    assert!(started <= 2, "started {started} runs");
    assert_eq!(runner.max_concurrent.load(Ordering::SeqCst), 1);

    h.scheduler.stop().await;
    assert_eq!(runner.current.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn independent_jobs_run_concurrently() {
    let runner = Arc::new(CountingRunner::new());
    let h = harness(
        config(vec![
            ("A", shell_sync("sleep 1", NEVER)),
            ("B", shell_sync("sleep 1", NEVER)),
        ]),
        runner.clone(),
    );
    h.scheduler.start().unwrap();

    let a = h.scheduler.trigger("A").unwrap();
    let b = h.scheduler.trigger("B").unwrap();
    assert!(completed(a.await.unwrap().unwrap()).success);
    assert!(completed(b.await.unwrap().unwrap()).success);
    assert_eq!(runner.max_concurrent.load(Ordering::SeqCst), 2);

    h.scheduler.stop().await;
}

#[tokio::test]
async fn time_limit_cancels_and_records_failure() {
    let mut sync = shell_sync("sleep 10", NEVER);
    sync.time_limit = Some("1s".into());
    let h = harness(config(vec![("slow", sync)]), sh());
    h.scheduler.start().unwrap();

    let started = Instant::now();
    let stat = completed(h.scheduler.trigger("slow").unwrap().await.unwrap().unwrap());
    let elapsed = started.elapsed();

    assert!(!stat.success);
    assert!(elapsed >= Duration::from_secs(1), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "{elapsed:?}");

    let stored = h.store.stats();
    assert_eq!(stored.len(), 1);
    assert!(!stored[0].success);

    h.scheduler.stop().await;
}

#[tokio::test]
async fn global_time_limit_applies_without_own_limit() {
    let mut config = config(vec![("slow", shell_sync("sleep 10", NEVER))]);
    config.time_limit = Some("500ms".into());
    let h = harness(config, sh());
    h.scheduler.start().unwrap();

    let started = Instant::now();
    let stat = completed(h.scheduler.trigger("slow").unwrap().await.unwrap().unwrap());
    assert!(!stat.success);
    assert!(started.elapsed() < Duration::from_secs(5));

    h.scheduler.stop().await;
}

#[tokio::test]
async fn stop_waits_for_cancelled_run() {
    let h = harness(config(vec![("long", shell_sync("sleep 10", NEVER))]), sh());
    h.scheduler.start().unwrap();

    let run = h.scheduler.trigger("long").unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.scheduler.active_jobs().await, vec!["long"]);

    let started = Instant::now();
    h.scheduler.stop().await;
    assert!(started.elapsed() < Duration::from_secs(8));

    // Stop only returns after the runner reported completion.
    assert!(run.is_finished());
    assert_eq!(h.scheduler.state(), SchedulerState::Stopped);
    assert!(h.scheduler.active_jobs().await.is_empty());

    let stat = completed(run.await.unwrap().unwrap());
    assert!(!stat.success);
    assert_eq!(h.store.stats().len(), 1);
}

#[tokio::test]
async fn abandoned_stop_still_allows_restart() {
    let h = harness(
        config(vec![
            ("stubborn", shell_sync("trap '' TERM; sleep 10 & wait", NEVER)),
            ("quick", shell_sync("true", NEVER)),
        ]),
        sh(),
    );
    h.scheduler.start().unwrap();

    let run = h.scheduler.trigger("stubborn").unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    // The child ignores SIGTERM, so the drain outlasts this timeout.
    let abandoned = tokio::time::timeout(Duration::from_millis(50), h.scheduler.stop()).await;
    assert!(abandoned.is_err());
    assert_eq!(h.scheduler.state(), SchedulerState::Stopped);

    // The old instance still drains on its own.
    let stat = completed(run.await.unwrap().unwrap());
    assert!(!stat.success);

    h.scheduler.start().unwrap();
    assert_eq!(h.scheduler.state(), SchedulerState::Running);
    assert!(completed(h.scheduler.trigger("quick").unwrap().await.unwrap().unwrap()).success);
    h.scheduler.stop().await;
}

#[tokio::test]
async fn start_and_stop_are_idempotent() {
    let h = harness(config(vec![("A", shell_sync("true", NEVER))]), sh());

    // Stop before start returns at once.
    h.scheduler.stop().await;
    assert_eq!(h.scheduler.state(), SchedulerState::Idle);

    h.scheduler.start().unwrap();
    h.scheduler.start().unwrap();
    assert_eq!(h.scheduler.state(), SchedulerState::Running);

    assert!(completed(h.scheduler.trigger("A").unwrap().await.unwrap().unwrap()).success);

    h.scheduler.stop().await;
    h.scheduler.stop().await;
    assert_eq!(h.scheduler.state(), SchedulerState::Stopped);
}

#[tokio::test]
async fn restart_after_stop() {
    let h = harness(config(vec![("A", shell_sync("true", NEVER))]), sh());

    h.scheduler.start().unwrap();
    h.scheduler.stop().await;
    assert!(matches!(h.scheduler.trigger("A"), Err(SchedulerError::NotRunning)));

    h.scheduler.start().unwrap();
    assert_eq!(h.scheduler.state(), SchedulerState::Running);
    assert!(completed(h.scheduler.trigger("A").unwrap().await.unwrap().unwrap()).success);
    h.scheduler.stop().await;

    assert_eq!(h.store.stats().len(), 1);
}

#[tokio::test]
async fn unknown_job_is_an_error() {
    let h = harness(config(vec![("A", shell_sync("true", NEVER))]), sh());
    h.scheduler.start().unwrap();
    assert!(matches!(
        h.scheduler.trigger("nope"),
        Err(SchedulerError::JobNotFound { .. })
    ));
    h.scheduler.stop().await;
}

#[tokio::test]
async fn invalid_schedule_fails_start() {
    let h = harness(config(vec![("A", shell_sync("true", "* * * * *"))]), sh());
    let err = h.scheduler.start().unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidSchedule { .. }));
    assert_eq!(h.scheduler.state(), SchedulerState::Idle);
}

#[tokio::test]
async fn failure_notification_only_for_failed_runs() {
    let mut config = config(vec![
        ("bad", shell_sync("exit 1", NEVER)),
        ("good", shell_sync("true", NEVER)),
    ]);
    config.email = Some(email(true, None));
    let h = harness(config, sh());
    h.scheduler.start().unwrap();

    assert!(!completed(h.scheduler.trigger("bad").unwrap().await.unwrap().unwrap()).success);
    assert!(completed(h.scheduler.trigger("good").unwrap().await.unwrap().unwrap()).success);

    let notified = h.notifier.notified.lock().unwrap().clone();
    assert_eq!(notified.len(), 1);
    assert_eq!(notified[0].name, "bad");

    h.scheduler.stop().await;
}

#[tokio::test]
async fn no_notification_without_on_failure() {
    let mut config = config(vec![("bad", shell_sync("exit 1", NEVER))]);
    config.email = Some(email(false, None));
    let h = harness(config, sh());
    h.scheduler.start().unwrap();

    h.scheduler.trigger("bad").unwrap().await.unwrap().unwrap();
    assert!(h.notifier.notified.lock().unwrap().is_empty());

    h.scheduler.stop().await;
}

#[tokio::test]
async fn retention_disabled_skips_store() {
    let mut config = config(vec![("A", shell_sync("true", NEVER))]);
    config.retention = 0;
    let h = harness(config, sh());
    h.scheduler.start().unwrap();

    assert!(completed(h.scheduler.trigger("A").unwrap().await.unwrap().unwrap()).success);
    assert!(h.store.stats().is_empty());

    let mut out = Vec::new();
    assert!(matches!(
        h.scheduler.dump(&mut out),
        Err(SchedulerError::RetentionDisabled)
    ));

    h.scheduler.stop().await;
}

#[tokio::test]
async fn panic_in_one_job_is_isolated() {
    let h = harness(
        config(vec![
            ("bomb", shell_sync("bomb", NEVER)),
            ("ok", shell_sync("sleep 1", NEVER)),
        ]),
        Arc::new(PanickyRunner::new()),
    );
    h.scheduler.start().unwrap();

    let ok = h.scheduler.trigger("ok").unwrap();
    let bomb = completed(h.scheduler.trigger("bomb").unwrap().await.unwrap().unwrap());
    assert!(!bomb.success);

    // The other job keeps running and the panicking one can run again.
    assert!(completed(ok.await.unwrap().unwrap()).success);
    assert!(h.scheduler.active_jobs().await.is_empty());
    let again = h.scheduler.trigger("bomb").unwrap().await.unwrap().unwrap();
    assert!(matches!(again, RunOutcome::Completed(_)));

    h.scheduler.stop().await;
    assert_eq!(h.store.stats().len(), 3);
}

#[tokio::test]
async fn rotation_failure_does_not_fail_the_run() {
    let logger = NullLogger {
        broken: true,
        ..Default::default()
    };
    let h = harness_with_logger(config(vec![("A", shell_sync("true", NEVER))]), sh(), logger);
    h.scheduler.start().unwrap();

    assert!(completed(h.scheduler.trigger("A").unwrap().await.unwrap().unwrap()).success);
    assert_eq!(h.logger.rotations.load(Ordering::SeqCst), 1);

    h.scheduler.stop().await;
}

#[tokio::test]
async fn dump_prints_stored_history() {
    let h = harness(
        config(vec![
            ("alpha", shell_sync("true", NEVER)),
            ("beta", shell_sync("exit 2", NEVER)),
        ]),
        sh(),
    );
    h.scheduler.start().unwrap();
    h.scheduler.trigger("alpha").unwrap().await.unwrap().unwrap();
    h.scheduler.trigger("beta").unwrap().await.unwrap().unwrap();
    h.scheduler.stop().await;

    // Works without a running scheduler.
    let mut out = Vec::new();
    h.scheduler.dump(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert!(text.starts_with("NAME"));
    assert!(text.lines().any(|l| l.starts_with("alpha") && l.contains("true")));
    assert!(text.lines().any(|l| l.starts_with("beta") && l.contains("false")));
}

#[tokio::test]
async fn history_trigger_fires_notifier() {
    let mut config = config(vec![("A", shell_sync("true", NEVER))]);
    config.email = Some(email(false, Some(EVERY_SECOND)));
    let h = harness(config, sh());
    h.scheduler.start().unwrap();

    tokio::time::sleep(Duration::from_millis(2200)).await;
    h.scheduler.stop().await;

    let sent = h.notifier.histories.load(Ordering::SeqCst);
    assert!(sent >= 1, "history sent {sent} times");

    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(h.notifier.histories.load(Ordering::SeqCst), sent);
}
