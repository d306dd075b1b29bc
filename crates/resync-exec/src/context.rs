use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation handle plus optional deadline for one run.
///
/// The deadline is fixed when the context is created, so the time limit
/// covers the whole run including log rotation and process start.
#[derive(Debug, Clone)]
pub struct ExecContext {
    token: CancellationToken,
    time_limit: Option<Duration>,
    deadline: Option<Instant>,
}

impl ExecContext {
    pub fn new(token: CancellationToken, time_limit: Option<Duration>) -> Self {
        Self {
            token,
            time_limit,
            deadline: time_limit.map(|limit| Instant::now() + limit),
        }
    }

    /// A context that is never cancelled and has no deadline.
    pub fn unbounded() -> Self {
        Self::new(CancellationToken::new(), None)
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the deadline passes; never resolves without a time limit.
    pub async fn expired(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}
