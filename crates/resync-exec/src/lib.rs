//! resync-exec: launches the mirroring tool as a child process that can be
//! cancelled or time-limited.
//!
//! Cancellation is cooperative: the caller cancels the [`ExecContext`] token
//! and [`ProcessRunner`] translates that into SIGTERM, then SIGKILL after a
//! grace period. A run never returns while its child is still alive.

pub mod context;
pub mod error;
pub mod runner;

pub use context::ExecContext;
pub use error::{ExecError, Result};
pub use runner::{CommandRunner, ProcessRunner, DEFAULT_GRACE_PERIOD};
