//! resync-logs: per-sync stdout/stderr capture on the filesystem.
//!
//! Layout under `log_path`:
//!
//! ```text
//! <log_path>/<sync>/stdout.log      current run
//! <log_path>/<sync>/stdout.log.1    previous run
//! <log_path>/<sync>/stdout.log.N    oldest kept (N = retention)
//! ```

pub mod error;
pub mod fs;

pub use error::{LogError, Result};
pub use fs::{FsLogger, STDERR_FILE, STDOUT_FILE};
