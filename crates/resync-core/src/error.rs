use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Sync doesn't exist with name: {name}")]
    JobNotFound { name: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Log capture error: {0}")]
    Log(String),

    #[error("Notification error: {0}")]
    Notify(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ResyncError>;
