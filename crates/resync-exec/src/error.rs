//! Error types for the resync-exec crate.

use std::time::Duration;

use thiserror::Error;

/// Why a command did not complete successfully.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The child process could not be started.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on or signalling the child failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The child exited unsuccessfully. `code` is `None` when it died from a signal.
    #[error("command exited with {}", describe_exit(.code))]
    Exited { code: Option<i32> },

    /// The run was cancelled before or while the child was running.
    #[error("command cancelled")]
    Cancelled,

    /// The time limit expired and the child was terminated.
    #[error("command exceeded its time limit of {limit:?}")]
    TimedOut { limit: Duration },

    /// The runner itself panicked; the child (if any) was killed on drop.
    #[error("command runner panicked: {0}")]
    Panicked(String),
}

impl ExecError {
    /// Cancellation and time-limit expiry both come from the execution context.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Cancelled | Self::TimedOut { .. })
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, ExecError>;
