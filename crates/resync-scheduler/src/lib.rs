//! `resync-scheduler`: cron-driven execution of the configured syncs.
//!
//! # Overview
//!
//! [`Scheduler::start`] arms one trigger task per sync. Each firing spawns a
//! [`runner::JobRunner`] that asks the [`coordinator::Coordinator`] for a run
//! slot; a sync that is still running from an earlier firing is skipped.
//! [`Scheduler::stop`] silences the triggers, cancels every active run and
//! returns once all of them have reported completion.
//!
//! | Module        | Role                                                |
//! |---------------|-----------------------------------------------------|
//! | `coordinator` | serialized owner of the active-run set              |
//! | `runner`      | one firing: admission, process, stat, side effects  |
//! | `trigger`     | cron tick loop per sync                             |
//! | `schedule`    | cron expression parsing                             |
//! | `scheduler`   | lifecycle (`start`/`stop`), manual trigger, dump    |

pub mod coordinator;
pub mod dump;
pub mod error;
pub mod runner;
pub mod schedule;
pub mod scheduler;
mod trigger;

pub use coordinator::{Admission, DenyReason};
pub use error::{Result, SchedulerError};
pub use runner::{RunOutcome, RunSettings};
pub use schedule::{CronSchedule, Schedules};
pub use scheduler::{Scheduler, SchedulerState};
