use resync_core::ResyncError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("invalid content type: {0}")]
    ContentType(String),

    #[error("No stats available")]
    EmptyHistory,

    #[error("history template {path}: {source}")]
    Template {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("attachment task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("{0}")]
    Collaborator(#[from] ResyncError),
}

impl From<NotifyError> for ResyncError {
    fn from(e: NotifyError) -> Self {
        match e {
            NotifyError::Collaborator(inner) => inner,
            other => ResyncError::Notify(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, NotifyError>;
