use std::collections::BTreeMap;

use crate::error::Result;
use crate::stat::Stat;

/// Stored history: job name → records, most recent first.
pub type StatHistory = BTreeMap<String, Vec<Stat>>;

/// Persistent storage for finished runs.
pub trait StatStore: Send + Sync {
    /// Persist one finished `Stat`, then enforce retention for its job.
    fn insert(&self, stat: &Stat) -> Result<()>;

    /// Every stored record grouped by job name, newest first.
    fn list(&self) -> Result<StatHistory>;

    /// Drop records beyond the retention count. No-op when retention < 1.
    fn prune(&self) -> Result<()>;
}
