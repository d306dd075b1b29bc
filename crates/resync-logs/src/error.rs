use resync_core::ResyncError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("log capture is disabled (retention < 1)")]
    Disabled,

    #[error("invalid sync name for a log directory: {0:?}")]
    InvalidName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl From<LogError> for ResyncError {
    fn from(e: LogError) -> Self {
        match e {
            LogError::Io(io) => ResyncError::Io(io),
            other => ResyncError::Log(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, LogError>;
