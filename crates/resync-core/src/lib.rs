//! `resync-core`: configuration, the `Stat` record and the collaborator
//! contracts shared by every other resync crate.

pub mod config;
pub mod error;
pub mod job;
pub mod notify;
pub mod output;
pub mod stat;
pub mod store;

pub use config::ResyncConfig;
pub use error::{Result, ResyncError};
pub use job::{JobDescriptor, JobSource};
pub use notify::Notifier;
pub use output::{OutputLogger, OutputSinks};
pub use stat::Stat;
pub use store::{StatHistory, StatStore};
