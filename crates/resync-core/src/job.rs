use std::time::Duration;

use crate::error::Result;

/// Everything the scheduler needs to launch one sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescriptor {
    /// Unique key, as written under `syncs` in the config file.
    pub name: String,
    /// Arguments handed to the mirroring tool, in order.
    pub args: Vec<String>,
    /// Cron expression driving the job.
    pub schedule: String,
    /// Resolved time limit (own limit, else the global default).
    pub time_limit: Option<Duration>,
}

/// Read-only lookup of job descriptors by name.
pub trait JobSource: Send + Sync {
    /// Returns `JobNotFound` when no sync is configured under `name`.
    fn job(&self, name: &str) -> Result<JobDescriptor>;

    /// The sync's own time limit, falling back to the global one.
    fn time_limit(&self, name: &str) -> Option<Duration>;

    /// All configured job names in a stable order.
    fn job_names(&self) -> Vec<String>;
}
