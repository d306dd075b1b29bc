#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs::File;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use resync_core::config::{EmailConfig, SyncConfig};
use resync_core::{
    Notifier, OutputLogger, OutputSinks, ResyncConfig, ResyncError, Stat, StatHistory, StatStore,
};
use resync_exec::{CommandRunner, ExecContext, ProcessRunner};
use resync_scheduler::Scheduler;

/// Far-future schedule so only manual triggers run.
pub const NEVER: &str = "0 0 0 1 1 *";
pub const EVERY_SECOND: &str = "* * * * * *";

/// A sync running `sh -c <script>`.
pub fn shell_sync(script: &str, schedule: &str) -> SyncConfig {
    SyncConfig {
        rsync_args: "-c".into(),
        rsync_source: vec![script.into()],
        rsync_destination: "resync-test".into(),
        schedule: schedule.into(),
        time_limit: None,
    }
}

pub fn config(syncs: Vec<(&str, SyncConfig)>) -> ResyncConfig {
    ResyncConfig {
        seconds_field: true,
        time_format: "%H:%M:%S%.3f".into(),
        syncs: syncs
            .into_iter()
            .map(|(name, sync)| (name.to_string(), sync))
            .collect::<BTreeMap<_, _>>(),
        ..Default::default()
    }
}

pub fn email(on_failure: bool, history_schedule: Option<&str>) -> EmailConfig {
    EmailConfig {
        host: "localhost".into(),
        port: 2525,
        user: None,
        pass: None,
        starttls: false,
        insecure_skip_verify: false,
        ssl: false,
        from: "resync@example.com".into(),
        to: vec!["ops@example.com".into()],
        history_subject: "Resync History".into(),
        history_schedule: history_schedule.map(str::to_string),
        history_template: None,
        on_failure,
    }
}

#[derive(Default)]
pub struct MemoryStore {
    stats: Mutex<Vec<Stat>>,
}

impl MemoryStore {
    pub fn stats(&self) -> Vec<Stat> {
        self.stats.lock().unwrap().clone()
    }
}

impl StatStore for MemoryStore {
    fn insert(&self, stat: &Stat) -> resync_core::Result<()> {
        self.stats.lock().unwrap().push(stat.clone());
        Ok(())
    }

    fn list(&self) -> resync_core::Result<StatHistory> {
        let mut history = StatHistory::new();
        for stat in self.stats.lock().unwrap().iter().rev() {
            history.entry(stat.name.clone()).or_default().push(stat.clone());
        }
        Ok(history)
    }

    fn prune(&self) -> resync_core::Result<()> {
        Ok(())
    }
}

/// Discards output, or fails every rotation when `broken`.
#[derive(Default)]
pub struct NullLogger {
    pub broken: bool,
    pub rotations: AtomicUsize,
}

impl OutputLogger for NullLogger {
    fn rotate(&self, _name: &str) -> resync_core::Result<Option<OutputSinks>> {
        self.rotations.fetch_add(1, Ordering::SeqCst);
        if self.broken {
            return Err(ResyncError::Log("disk full".into()));
        }
        Ok(None)
    }

    fn stdout(&self, _name: &str) -> resync_core::Result<File> {
        Err(ResyncError::Log("not captured".into()))
    }

    fn stderr(&self, _name: &str) -> resync_core::Result<File> {
        Err(ResyncError::Log("not captured".into()))
    }

    fn export(&self) -> resync_core::Result<Vec<u8>> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub notified: Mutex<Vec<Stat>>,
    pub histories: AtomicUsize,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, stat: &Stat) -> resync_core::Result<()> {
        self.notified.lock().unwrap().push(stat.clone());
        Ok(())
    }

    async fn notify_history(&self) -> resync_core::Result<()> {
        self.histories.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Wraps a real process runner and records how many runs overlap.
pub struct CountingRunner {
    inner: ProcessRunner,
    pub started: AtomicUsize,
    pub current: AtomicUsize,
    pub max_concurrent: AtomicUsize,
}

impl CountingRunner {
    pub fn new() -> Self {
        Self {
            inner: ProcessRunner::new("sh").with_grace_period(Duration::from_secs(1)),
            started: AtomicUsize::new(0),
            current: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CommandRunner for CountingRunner {
    async fn run(
        &self,
        ctx: &ExecContext,
        args: &[String],
        sinks: Option<OutputSinks>,
    ) -> resync_exec::Result<()> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(now, Ordering::SeqCst);
        let result = self.inner.run(ctx, args, sinks).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Panics for the sync named "bomb", runs everything else for real.
pub struct PanickyRunner {
    inner: ProcessRunner,
}

impl PanickyRunner {
    pub fn new() -> Self {
        Self {
            inner: ProcessRunner::new("sh"),
        }
    }
}

#[async_trait]
impl CommandRunner for PanickyRunner {
    async fn run(
        &self,
        ctx: &ExecContext,
        args: &[String],
        sinks: Option<OutputSinks>,
    ) -> resync_exec::Result<()> {
        if args.iter().any(|arg| arg == "bomb") {
            panic!("runner exploded");
        }
        self.inner.run(ctx, args, sinks).await
    }
}

pub struct Harness {
    pub scheduler: Scheduler,
    pub store: Arc<MemoryStore>,
    pub logger: Arc<NullLogger>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn harness(config: ResyncConfig, command: Arc<dyn CommandRunner>) -> Harness {
    harness_with_logger(config, command, NullLogger::default())
}

pub fn harness_with_logger(
    config: ResyncConfig,
    command: Arc<dyn CommandRunner>,
    logger: NullLogger,
) -> Harness {
    let store = Arc::new(MemoryStore::default());
    let logger = Arc::new(logger);
    let notifier = Arc::new(RecordingNotifier::default());
    let scheduler = Scheduler::new(
        Arc::new(config),
        store.clone(),
        logger.clone(),
        notifier.clone(),
        command,
    );
    Harness {
        scheduler,
        store,
        logger,
        notifier,
    }
}

pub fn sh() -> Arc<dyn CommandRunner> {
    Arc::new(ProcessRunner::new("sh").with_grace_period(Duration::from_secs(1)))
}
