use std::io::Write;
use std::sync::{Arc, Mutex};

use resync_core::{JobSource, Notifier, OutputLogger, ResyncConfig, StatStore};
use resync_exec::CommandRunner;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::coordinator::{Coordinator, CoordinatorHandle};
use crate::dump::write_history;
use crate::error::{Result, SchedulerError};
use crate::runner::{Collaborators, JobRunner, RunOutcome, RunSettings};
use crate::schedule::Schedules;
use crate::trigger::spawn_trigger;

/// Observable lifecycle of a [`Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

enum Lifecycle {
    Idle,
    Running(Running),
    Stopping,
    Stopped,
}

/// Everything owned by one started instance. Rebuilt on every `start`.
struct Running {
    coordinator: CoordinatorHandle,
    coordinator_task: JoinHandle<()>,
    tracker: TaskTracker,
    triggers: CancellationToken,
    runner: Arc<JobRunner>,
}

/// Turns the configured syncs into cron-driven, deduplicated, cancellable runs.
///
/// ```text
/// Idle ──start──▶ Running ──stop──▶ Stopping ──drained──▶ Stopped
///                    ▲                                       │
///                    └────────────────start──────────────────┘
/// ```
pub struct Scheduler {
    config: Arc<ResyncConfig>,
    collaborators: Collaborators,
    state: Mutex<Lifecycle>,
}

impl Scheduler {
    pub fn new(
        config: Arc<ResyncConfig>,
        store: Arc<dyn StatStore>,
        logger: Arc<dyn OutputLogger>,
        notifier: Arc<dyn Notifier>,
        command: Arc<dyn CommandRunner>,
    ) -> Self {
        let jobs: Arc<dyn JobSource> = config.clone();
        Self {
            config,
            collaborators: Collaborators {
                jobs,
                store,
                logger,
                notifier,
                command,
            },
            state: Mutex::new(Lifecycle::Idle),
        }
    }

    pub fn config(&self) -> &ResyncConfig {
        &self.config
    }

    pub fn state(&self) -> SchedulerState {
        match *self.state.lock().unwrap() {
            Lifecycle::Idle => SchedulerState::Idle,
            Lifecycle::Running(_) => SchedulerState::Running,
            Lifecycle::Stopping => SchedulerState::Stopping,
            Lifecycle::Stopped => SchedulerState::Stopped,
        }
    }

    /// Arm one trigger per sync (plus the history trigger, if configured).
    ///
    /// Must be called from within a Tokio runtime. A no-op while running.
    /// Every schedule is parsed before anything is spawned, so an invalid
    /// expression leaves the scheduler untouched.
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match *state {
            Lifecycle::Running(_) => {
                debug!("scheduler already running");
                return Ok(());
            }
            Lifecycle::Stopping => return Err(SchedulerError::Stopping),
            Lifecycle::Idle | Lifecycle::Stopped => {}
        }

        let runtime =
            tokio::runtime::Handle::try_current().map_err(|e| SchedulerError::NoRuntime(e.to_string()))?;

        let Schedules { syncs, history } = Schedules::from_config(&self.config)?;

        let triggers = CancellationToken::new();
        let (coordinator, handle) = Coordinator::new(triggers.clone());
        let coordinator_task = runtime.spawn(coordinator.run());
        let tracker = TaskTracker::new();
        let runner = Arc::new(JobRunner::new(
            self.collaborators.clone(),
            handle.clone(),
            RunSettings::from_config(&self.config),
        ));

        for (name, schedule) in syncs {
            info!(job = %name, schedule = %schedule.expr(), "scheduling sync");
            let runner = runner.clone();
            let spawner = tracker.clone();
            let label = name.clone();
            spawn_trigger(&tracker, triggers.clone(), label, schedule, move || {
                spawn_run(&spawner, runner.clone(), name.clone());
            });
        }

        if let Some(schedule) = history {
            info!(schedule = %schedule.expr(), "scheduling history notification");
            let notifier = self.collaborators.notifier.clone();
            let spawner = tracker.clone();
            spawn_trigger(&tracker, triggers.clone(), "history".into(), schedule, move || {
                let notifier = notifier.clone();
                spawner.spawn(async move {
                    if let Err(e) = notifier.notify_history().await {
                        error!(error = %e, "history notification failed");
                    }
                });
            });
        }

        *state = Lifecycle::Running(Running {
            coordinator: handle,
            coordinator_task,
            tracker,
            triggers,
            runner,
        });
        info!(syncs = self.config.syncs.len(), "scheduler started");
        Ok(())
    }

    /// Stop firing, cancel every active run and wait until all of them (and
    /// every task of this instance) have finished. A no-op unless running.
    pub async fn stop(&self) {
        let running = {
            let mut state = self.state.lock().unwrap();
            match std::mem::replace(&mut *state, Lifecycle::Stopping) {
                Lifecycle::Running(running) => running,
                other => {
                    *state = other;
                    debug!("scheduler not running, nothing to stop");
                    return;
                }
            }
        };

        info!("stopping scheduler");
        let Running {
            coordinator,
            coordinator_task,
            tracker,
            triggers,
            runner,
        } = running;
        // Reaches Stopped even when this future is dropped part way.
        let _stopped = StoppedOnDrop {
            state: &self.state,
            triggers: triggers.clone(),
        };

        coordinator.shutdown().await;
        triggers.cancel();
        tracker.close();
        tracker.wait().await;
        drop(runner);
        drop(coordinator);
        if let Err(e) = coordinator_task.await {
            error!(error = %e, "coordinator task failed");
        }

        info!("scheduler stopped");
    }

    /// Fire `name` now, through the same admission path as its schedule.
    pub fn trigger(&self, name: &str) -> Result<JoinHandle<Result<RunOutcome>>> {
        self.collaborators.jobs.job(name)?;
        let state = self.state.lock().unwrap();
        let Lifecycle::Running(running) = &*state else {
            return Err(SchedulerError::NotRunning);
        };

        let runner = running.runner.clone();
        let name = name.to_string();
        Ok(running.tracker.spawn(async move { runner.run(&name).await }))
    }

    /// Names of the syncs running right now.
    pub async fn active_jobs(&self) -> Vec<String> {
        let coordinator = match &*self.state.lock().unwrap() {
            Lifecycle::Running(running) => running.coordinator.clone(),
            _ => return Vec::new(),
        };
        coordinator.active().await
    }

    /// Print the stored history of every sync.
    pub fn dump<W: Write + ?Sized>(&self, w: &mut W) -> Result<()> {
        if !self.config.retention_enabled() {
            return Err(SchedulerError::RetentionDisabled);
        }
        let history = self.collaborators.store.list()?;
        write_history(w, &history)?;
        Ok(())
    }
}

/// Moves the lifecycle out of `Stopping`. If `stop` was abandoned before
/// the drain finished, the old instance's runs keep draining on their own
/// (the coordinator already received the shutdown) while a new `start` is
/// allowed.
struct StoppedOnDrop<'a> {
    state: &'a Mutex<Lifecycle>,
    triggers: CancellationToken,
}

impl Drop for StoppedOnDrop<'_> {
    fn drop(&mut self) {
        self.triggers.cancel();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *state = Lifecycle::Stopped;
    }
}

fn spawn_run(tracker: &TaskTracker, runner: Arc<JobRunner>, name: String) {
    tracker.spawn(async move {
        if let Err(e) = runner.run(&name).await {
            warn!(job = %name, error = %e, "sync could not run");
        }
    });
}
