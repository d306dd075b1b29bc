use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use resync_core::{JobDescriptor, JobSource, Notifier, OutputLogger, OutputSinks, ResyncConfig, Stat, StatStore};
use resync_exec::{CommandRunner, ExecContext, ExecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::coordinator::{Admission, CoordinatorHandle, DenyReason};
use crate::error::Result;

/// Per-run settings taken from the config at scheduler start.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub time_format: String,
    pub retention_enabled: bool,
    pub notify_on_failure: bool,
}

impl RunSettings {
    pub fn from_config(config: &ResyncConfig) -> Self {
        Self {
            time_format: config.time_format.clone(),
            retention_enabled: config.retention_enabled(),
            notify_on_failure: config.notify_on_failure(),
        }
    }
}

/// What became of one firing.
#[derive(Debug)]
pub enum RunOutcome {
    /// Not admitted; nothing was executed.
    Skipped(DenyReason),
    /// Executed; the finished record tells success or failure.
    Completed(Stat),
    /// A collaborator panicked after the command finished. Already logged.
    Panicked,
}

impl RunOutcome {
    pub fn stat(&self) -> Option<&Stat> {
        match self {
            RunOutcome::Completed(stat) => Some(stat),
            _ => None,
        }
    }
}

/// Collaborators the runner drives. Shared by every run of one scheduler.
#[derive(Clone)]
pub struct Collaborators {
    pub jobs: Arc<dyn JobSource>,
    pub store: Arc<dyn StatStore>,
    pub logger: Arc<dyn OutputLogger>,
    pub notifier: Arc<dyn Notifier>,
    pub command: Arc<dyn CommandRunner>,
}

/// Executes one firing of one job end to end.
pub struct JobRunner {
    collaborators: Collaborators,
    coordinator: CoordinatorHandle,
    settings: RunSettings,
}

impl JobRunner {
    pub fn new(collaborators: Collaborators, coordinator: CoordinatorHandle, settings: RunSettings) -> Self {
        Self {
            collaborators,
            coordinator,
            settings,
        }
    }

    /// Admit, execute, record, release.
    ///
    /// Only an unknown job name is an error. Command failures end up in the
    /// returned `Stat`; side-effect failures are logged.
    pub async fn run(&self, name: &str) -> Result<RunOutcome> {
        let job = self.collaborators.jobs.job(name)?;

        let cancel = CancellationToken::new();
        let slot = match self.coordinator.request_admission(name, cancel.clone()).await {
            Admission::Granted(slot) => slot,
            Admission::Denied(reason) => {
                info!(job = %name, ?reason, "sync skipped");
                return Ok(RunOutcome::Skipped(reason));
            }
        };

        let span = info_span!("run", job = %name, run_id = %slot.run_id());
        let outcome = AssertUnwindSafe(self.execute(job, cancel).instrument(span))
            .catch_unwind()
            .await;

        // reports completion
        drop(slot);

        match outcome {
            Ok(stat) => Ok(RunOutcome::Completed(stat)),
            Err(panic) => {
                error!(job = %name, panic = %panic_message(&*panic), "sync run panicked");
                Ok(RunOutcome::Panicked)
            }
        }
    }

    async fn execute(&self, job: JobDescriptor, cancel: CancellationToken) -> Stat {
        let ctx = ExecContext::new(cancel, job.time_limit);
        let sinks = self.open_sinks(&job.name);

        info!(time_limit = ?job.time_limit, "sync started");
        let stat = Stat::new(job.name.as_str(), &self.settings.time_format);

        let result = AssertUnwindSafe(self.collaborators.command.run(&ctx, &job.args, sinks))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(ExecError::Panicked(panic_message(&*panic))));

        let stat = stat.finish(&result);
        match &result {
            Ok(()) => info!(duration = %stat.human_duration(), "sync complete"),
            Err(e) if e.is_interrupted() => {
                warn!(error = %e, duration = %stat.human_duration(), "sync interrupted")
            }
            Err(e) => error!(error = %e, duration = %stat.human_duration(), "sync failed"),
        }

        self.record(&stat).await;
        stat
    }

    /// Rotation failure loses the output, never the run.
    fn open_sinks(&self, name: &str) -> Option<OutputSinks> {
        match self.collaborators.logger.rotate(name) {
            Ok(sinks) => sinks,
            Err(e) => {
                warn!(error = %e, "log rotation failed, discarding output");
                None
            }
        }
    }

    async fn record(&self, stat: &Stat) {
        if self.settings.retention_enabled {
            match self.collaborators.store.insert(stat) {
                Ok(()) => debug!("stat stored"),
                Err(e) => error!(error = %e, "failed to store stat"),
            }
        }

        if !stat.success && self.settings.notify_on_failure {
            if let Err(e) = self.collaborators.notifier.notify(stat).await {
                error!(error = %e, "failed to send failure notification");
            }
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
