use async_trait::async_trait;

use crate::error::Result;
use crate::stat::Stat;

/// Outbound notifications about sync runs.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Report a single finished run.
    async fn notify(&self, stat: &Stat) -> Result<()>;

    /// Send a summary of the stored history.
    async fn notify_history(&self) -> Result<()>;
}
