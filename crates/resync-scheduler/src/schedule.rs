use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Local};
use resync_core::ResyncConfig;

use crate::error::{Result, SchedulerError};

/// A parsed cron expression, evaluated in local time.
///
/// Expressions use classic cron numbering for the day of week (0 or 7 is
/// Sunday, 1 is Monday). With `seconds_field` off they have five fields and
/// fire at second 0; with it on they carry a leading seconds field.
/// Descriptors such as `@daily` are accepted in both modes.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expr: String,
    schedule: cron::Schedule,
}

impl CronSchedule {
    pub fn parse(expr: &str, seconds_field: bool) -> Result<Self> {
        let normalized = normalize(expr, seconds_field)?;
        let schedule = cron::Schedule::from_str(&normalized).map_err(|e| invalid(expr, e))?;
        Ok(Self {
            expr: expr.trim().to_string(),
            schedule,
        })
    }

    /// Expression as written in the config.
    pub fn expr(&self) -> &str {
        &self.expr
    }

    /// First fire time strictly after `from`.
    pub fn next_after(&self, from: &DateTime<Local>) -> Option<DateTime<Local>> {
        self.schedule.after(from).next()
    }
}

/// Every cron expression of one config, parsed up front.
#[derive(Debug, Clone)]
pub struct Schedules {
    /// One entry per sync, in config order.
    pub syncs: Vec<(String, CronSchedule)>,
    /// The history mail schedule; only kept when retention is enabled.
    pub history: Option<CronSchedule>,
}

impl Schedules {
    /// Fails on the first expression that does not parse, naming the sync.
    pub fn from_config(config: &ResyncConfig) -> Result<Self> {
        let seconds_field = config.seconds_field;
        let syncs = config
            .syncs
            .iter()
            .map(|(name, sync)| {
                CronSchedule::parse(&sync.schedule, seconds_field)
                    .map(|schedule| (name.clone(), schedule))
                    .map_err(|e| in_sync(name, e))
            })
            .collect::<Result<Vec<_>>>()?;

        let history = match config.history_schedule() {
            Some(expr) if config.retention_enabled() => Some(
                CronSchedule::parse(expr, seconds_field).map_err(|e| in_sync("history", e))?,
            ),
            _ => None,
        };

        Ok(Self { syncs, history })
    }
}

fn in_sync(name: &str, e: SchedulerError) -> SchedulerError {
    match e {
        SchedulerError::InvalidSchedule { expr, reason } => SchedulerError::InvalidSchedule {
            expr,
            reason: format!("{reason} (sync {name})"),
        },
        other => other,
    }
}

fn invalid(expr: &str, reason: impl ToString) -> SchedulerError {
    SchedulerError::InvalidSchedule {
        expr: expr.to_string(),
        reason: reason.to_string(),
    }
}

/// Rewrite `expr` into the six-field form the `cron` crate parses.
fn normalize(expr: &str, seconds_field: bool) -> Result<String> {
    let trimmed = expr.trim();
    if trimmed.starts_with('@') {
        return Ok(trimmed.to_string());
    }

    let mut fields: Vec<String> = trimmed.split_whitespace().map(str::to_string).collect();
    let expected = if seconds_field { 6 } else { 5 };
    if fields.len() != expected {
        return Err(invalid(
            expr,
            format!("expected {expected} fields, found {}", fields.len()),
        ));
    }
    if !seconds_field {
        fields.insert(0, "0".to_string());
    }

    fields[5] = weekday_field(&fields[5]).ok_or_else(|| invalid(expr, "bad day-of-week field"))?;
    Ok(fields.join(" "))
}

/// Rewrite numeric weekdays from classic numbering (0-7, Sunday = 0 or 7)
/// to the `cron` crate's (1-7, Sunday = 1).
///
/// Numeric items are expanded to the days they cover and re-emitted as
/// compact ranges, so a trailing 7 in a range stays the end of the week.
/// Names and `*` pass through unchanged. Mixing a name and a number in one
/// range is rejected.
fn weekday_field(field: &str) -> Option<String> {
    let mut days = BTreeSet::new();
    let mut passthrough = Vec::new();

    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => (range, Some(step)),
            None => (item, None),
        };

        let (lo, hi) = match range.split_once('-') {
            Some((lo, hi)) => match (weekday(lo)?, weekday(hi)?) {
                (Some(lo), Some(hi)) if lo <= hi => (lo, hi),
                (None, None) => {
                    passthrough.push(item.to_string());
                    continue;
                }
                _ => return None,
            },
            None => match weekday(range)? {
                // n/step runs to the end of the week
                Some(n) if step.is_some() => (n, 6),
                Some(n) => (n, n),
                None => {
                    passthrough.push(item.to_string());
                    continue;
                }
            },
        };

        let step = match step {
            Some(step) => step.parse::<usize>().ok().filter(|s| *s > 0)?,
            None => 1,
        };
        for day in (lo..=hi).step_by(step) {
            days.insert(day % 7 + 1);
        }
    }

    let mut out = compact(&days);
    out.extend(passthrough);
    Some(out.join(","))
}

/// `Some(None)` for non-numeric tokens, `None` for numbers out of range.
fn weekday(token: &str) -> Option<Option<u8>> {
    match token.parse::<u8>() {
        Ok(n @ 0..=7) => Some(Some(n)),
        Ok(_) => None,
        Err(_) => Some(None),
    }
}

/// Sorted days as `a-b` runs, e.g. {1, 2, 3, 6} becomes `1-3,6`.
fn compact(days: &BTreeSet<u8>) -> Vec<String> {
    let mut runs: Vec<(u8, u8)> = Vec::new();
    for &day in days {
        match runs.last_mut() {
            Some((_, end)) if *end + 1 == day => *end = day,
            _ => runs.push((day, day)),
        }
    }
    runs.into_iter()
        .map(|(lo, hi)| if lo == hi { lo.to_string() } else { format!("{lo}-{hi}") })
        .collect()
}
