//! resync-notify: email delivery of failed runs and periodic history reports.

pub mod email;
pub mod error;
pub mod render;

pub use email::EmailNotifier;
pub use error::{NotifyError, Result};
