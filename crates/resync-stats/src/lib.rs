//! resync-stats: SQLite-backed history of finished sync runs.

pub mod db;
pub mod error;
pub mod store;

pub use error::{Result, StatsError};
pub use store::{SqliteStatStore, DB_FILE};
