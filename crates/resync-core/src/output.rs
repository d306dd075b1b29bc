use std::fs::File;

use crate::error::Result;

/// Fresh write targets for one run's output streams.
#[derive(Debug)]
pub struct OutputSinks {
    pub stdout: File,
    pub stderr: File,
}

/// Captures and retains the output of sync runs.
///
/// Implementations must serialize their own file operations: several job
/// runners call into the same logger concurrently.
pub trait OutputLogger: Send + Sync {
    /// Rotate the previous run's logs for `name` and open new ones.
    ///
    /// `Ok(None)` means output capture is disabled and the run's output
    /// should be discarded.
    fn rotate(&self, name: &str) -> Result<Option<OutputSinks>>;

    /// Open the most recent stdout capture for `name`.
    fn stdout(&self, name: &str) -> Result<File>;

    /// Open the most recent stderr capture for `name`.
    fn stderr(&self, name: &str) -> Result<File>;

    /// Zip archive bytes holding every retained log file.
    fn export(&self) -> Result<Vec<u8>>;
}
