use std::time::Duration;

use chrono::Local;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::schedule::CronSchedule;

/// Spawn a loop on `tracker` that calls `fire` at every tick of `schedule`
/// until `token` is cancelled.
///
/// `fire` must only start work (e.g. spawn a runner) and return, so a slow
/// job never delays its own or any other trigger.
pub(crate) fn spawn_trigger<F>(
    tracker: &TaskTracker,
    token: CancellationToken,
    label: String,
    schedule: CronSchedule,
    fire: F,
) where
    F: Fn() + Send + 'static,
{
    tracker.spawn(async move {
        debug!(trigger = %label, schedule = %schedule.expr(), "trigger armed");
        let mut last = Local::now();
        loop {
            let from = last.max(Local::now());
            let Some(next) = schedule.next_after(&from) else {
                warn!(trigger = %label, schedule = %schedule.expr(), "schedule has no upcoming fire time");
                return;
            };
            let wait = (next - Local::now()).to_std().unwrap_or(Duration::ZERO);

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
            last = next;

            if token.is_cancelled() {
                break;
            }
            debug!(trigger = %label, at = %next, "trigger fired");
            fire();
        }
        debug!(trigger = %label, "trigger stopped");
    });
}
