use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use resync_core::OutputSinks;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::context::ExecContext;
use crate::error::{ExecError, Result};

/// Time a child gets between SIGTERM and SIGKILL.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Runs one invocation of an external command under an [`ExecContext`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion. `Ok(())` only for a zero exit status.
    ///
    /// `sinks` receive the child's stdout/stderr; `None` discards both.
    async fn run(
        &self,
        ctx: &ExecContext,
        args: &[String],
        sinks: Option<OutputSinks>,
    ) -> Result<()>;
}

/// [`CommandRunner`] backed by `tokio::process`.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: String,
    grace: Duration,
}

enum Interrupt {
    Cancelled,
    Deadline,
}

impl ProcessRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            grace: DEFAULT_GRACE_PERIOD,
        }
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn spawn(&self, args: &[String], sinks: Option<OutputSinks>) -> Result<Child> {
        let (stdout, stderr) = match sinks {
            Some(sinks) => (Stdio::from(sinks.stdout), Stdio::from(sinks.stderr)),
            None => (Stdio::null(), Stdio::null()),
        };

        Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecError::Spawn {
                program: self.program.clone(),
                source,
            })
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        ctx: &ExecContext,
        args: &[String],
        sinks: Option<OutputSinks>,
    ) -> Result<()> {
        if ctx.is_cancelled() {
            return Err(ExecError::Cancelled);
        }

        let mut child = self.spawn(args, sinks)?;
        debug!(program = %self.program, pid = ?child.id(), ?args, "spawned");

        let interrupt = tokio::select! {
            status = child.wait() => {
                let status = status?;
                return if status.success() {
                    Ok(())
                } else {
                    Err(ExecError::Exited { code: status.code() })
                };
            }
            _ = ctx.token().cancelled() => Interrupt::Cancelled,
            _ = ctx.expired() => Interrupt::Deadline,
        };

        terminate(&mut child, self.grace).await?;

        match interrupt {
            Interrupt::Cancelled => Err(ExecError::Cancelled),
            Interrupt::Deadline => Err(ExecError::TimedOut {
                limit: ctx.time_limit().unwrap_or_default(),
            }),
        }
    }
}

/// SIGTERM, wait up to `grace`, then SIGKILL. Returns once the child is reaped.
async fn terminate(child: &mut Child, grace: Duration) -> Result<()> {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // Safety: pid is our own child and has not been reaped yet.
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }
            if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
                debug!(pid, status = ?status.as_ref().ok(), "child exited after SIGTERM");
                status?;
                return Ok(());
            }
            warn!(pid, ?grace, "child ignored SIGTERM, killing");
        }
    }
    #[cfg(not(unix))]
    let _ = grace;

    child.kill().await?;
    Ok(())
}
