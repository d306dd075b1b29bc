use resync_core::ResyncError;
use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The cron expression could not be parsed or has the wrong field count.
    #[error("Invalid schedule {expr:?}: {reason}")]
    InvalidSchedule { expr: String, reason: String },

    /// No sync with the given name is configured.
    #[error("Sync doesn't exist with name: {name}")]
    JobNotFound { name: String },

    /// `dump` needs stored stats.
    #[error("Retention must be greater than 0 to dump stats")]
    RetentionDisabled,

    /// The operation needs a running scheduler.
    #[error("Scheduler is not running")]
    NotRunning,

    /// `start` was called while a `stop` is still draining.
    #[error("Scheduler is stopping")]
    Stopping,

    /// `start` was called outside a Tokio runtime.
    #[error("No Tokio runtime available: {0}")]
    NoRuntime(String),

    /// A collaborator (config, store, logger, notifier) failed.
    #[error(transparent)]
    Collaborator(ResyncError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ResyncError> for SchedulerError {
    fn from(e: ResyncError) -> Self {
        match e {
            ResyncError::JobNotFound { name } => SchedulerError::JobNotFound { name },
            other => SchedulerError::Collaborator(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
