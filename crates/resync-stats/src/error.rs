use resync_core::ResyncError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt stats row {id}: {reason}")]
    Corrupt { id: i64, reason: String },

    #[error("run of {name} has not finished yet")]
    Unfinished { name: String },
}

impl From<StatsError> for ResyncError {
    fn from(e: StatsError) -> Self {
        match e {
            StatsError::Io(io) => ResyncError::Io(io),
            other => ResyncError::Database(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, StatsError>;
