use std::fmt::Write as _;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};

/// Outcome of a single sync run.
///
/// Created when the run starts (`success = false`, no end) and finalized once
/// by [`Stat::finish`]. A finished `Stat` is never changed again.
#[derive(Debug, Clone, Serialize)]
pub struct Stat {
    pub name: String,
    pub success: bool,
    /// Start time rendered with the configured `time_format`.
    pub start: String,
    /// End time rendered with the configured `time_format`; empty until finished.
    pub end: String,
    #[serde(serialize_with = "serialize_duration")]
    pub duration: Duration,
    #[serde(skip)]
    started_at: DateTime<Local>,
    #[serde(skip)]
    ended_at: Option<DateTime<Local>>,
    #[serde(skip)]
    format: String,
}

impl Stat {
    /// Begin a run of `name` now.
    pub fn new(name: impl Into<String>, format: &str) -> Self {
        let started_at = Local::now();
        Self {
            name: name.into(),
            success: false,
            start: format_time(&started_at, format),
            end: String::new(),
            duration: Duration::ZERO,
            started_at,
            ended_at: None,
            format: format.to_string(),
        }
    }

    /// Rebuild an already finished record, e.g. when reading it back from storage.
    pub fn restored(
        name: String,
        success: bool,
        start: String,
        end: String,
        duration: Duration,
        started_at: DateTime<Local>,
        ended_at: DateTime<Local>,
    ) -> Self {
        Self {
            name,
            success,
            start,
            end,
            duration,
            started_at,
            ended_at: Some(ended_at),
            format: String::new(),
        }
    }

    /// Finalize from the command's outcome: success iff `outcome` is `Ok`.
    ///
    /// End time and duration are taken at this call. Calling it on a record
    /// that is already finished returns the record unchanged.
    pub fn finish<T, E>(mut self, outcome: &std::result::Result<T, E>) -> Self {
        if self.ended_at.is_some() {
            return self;
        }

        let ended_at = Local::now();
        self.success = outcome.is_ok();
        self.end = format_time(&ended_at, &self.format);
        self.duration = (ended_at - self.started_at).to_std().unwrap_or_default();
        self.ended_at = Some(ended_at);
        self
    }

    pub fn is_finished(&self) -> bool {
        self.ended_at.is_some()
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Local>> {
        self.ended_at
    }

    /// Duration rounded to milliseconds in humantime notation, e.g. `1m 2s 5ms`.
    pub fn human_duration(&self) -> String {
        human_duration(self.duration)
    }
}

/// Render `d` at millisecond precision (`0s` for sub-millisecond runs).
pub fn human_duration(d: Duration) -> String {
    let millis = Duration::from_millis(d.as_millis() as u64);
    if millis.is_zero() {
        return "0s".to_string();
    }
    humantime::format_duration(millis).to_string()
}

/// strftime rendering that never panics: a bad pattern falls back to RFC 3339.
fn format_time(t: &DateTime<Local>, format: &str) -> String {
    let mut out = String::new();
    if write!(out, "{}", t.format(format)).is_err() {
        return t.to_rfc3339();
    }
    out
}

fn serialize_duration<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&human_duration(*d))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_TIME_FORMAT;

    #[test]
    fn new_stat_is_unfinished() {
        let stat = Stat::new("SUCCESS", DEFAULT_TIME_FORMAT);
        assert_eq!(stat.name, "SUCCESS");
        assert!(!stat.success);
        assert!(!stat.start.is_empty());
        assert!(stat.end.is_empty());
        assert_eq!(stat.duration, Duration::ZERO);
        assert!(!stat.is_finished());
    }

    #[test]
    fn finish_ok_marks_success() {
        let stat = Stat::new("SUCCESS", DEFAULT_TIME_FORMAT);
        std::thread::sleep(Duration::from_millis(5));
        let stat = stat.finish(&Ok::<(), &str>(()));

        assert!(stat.success);
        assert!(stat.is_finished());
        assert!(!stat.end.is_empty());
        assert!(stat.duration >= Duration::from_millis(5));
    }

    #[test]
    fn finish_err_marks_failure() {
        let stat = Stat::new("FAIL", DEFAULT_TIME_FORMAT).finish(&Err::<(), _>("fail"));

        assert_eq!(stat.name, "FAIL");
        assert!(!stat.success);
        assert!(stat.is_finished());
        assert!(!stat.end.is_empty());
    }

    #[test]
    fn second_finish_is_ignored() {
        let first = Stat::new("ONCE", DEFAULT_TIME_FORMAT).finish(&Err::<(), _>("boom"));
        let end = first.end.clone();
        let ended_at = first.ended_at();
        let duration = first.duration;

        std::thread::sleep(Duration::from_millis(2));
        let second = first.finish(&Ok::<(), &str>(()));

        assert!(!second.success);
        assert_eq!(second.end, end);
        assert_eq!(second.ended_at(), ended_at);
        assert_eq!(second.duration, duration);
    }

    #[test]
    fn human_duration_rounds_to_millis() {
        assert_eq!(human_duration(Duration::from_micros(10)), "0s");
        assert_eq!(human_duration(Duration::from_millis(1500)), "1s 500ms");
        assert_eq!(human_duration(Duration::from_nanos(2_000_000_123)), "2s");
    }

    #[test]
    fn serializes_duration_as_text() {
        let stat = Stat::new("JSON", DEFAULT_TIME_FORMAT).finish(&Ok::<(), ()>(()));
        let json = serde_json::to_value(&stat).unwrap();
        assert_eq!(json["name"], "JSON");
        assert_eq!(json["success"], true);
        assert!(json["duration"].is_string());
        assert!(json.get("started_at").is_none());
    }
}
