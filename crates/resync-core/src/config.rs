use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use figment::{
    providers::{Env, Format, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ResyncError};
use crate::job::{JobDescriptor, JobSource};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/resync/resync.toml";
pub const DEFAULT_LOG_PATH: &str = "/var/log/resync";
pub const DEFAULT_LIB_PATH: &str = "/var/lib/resync";
pub const DEFAULT_LOG_LEVEL: &str = "error";
pub const DEFAULT_TIME_FORMAT: &str = "%a %b %d %I:%M:%S %p %Z";
pub const DEFAULT_RETENTION: i64 = 7;
pub const DEFAULT_HTTP_ADDR: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 4050;
pub const DEFAULT_SMTP_PORT: u16 = 25;
pub const DEFAULT_HISTORY_SUBJECT: &str = "Resync History";

/// Top-level config (resync.toml / resync.yaml + RESYNC_* env overrides).
///
/// Read-only once loaded: the scheduler shares it behind an `Arc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResyncConfig {
    /// Mirroring tool binary.
    #[serde(default = "default_rsync_path")]
    pub rsync_path: String,
    /// Directory holding per-sync output logs and the daemon log.
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,
    /// trace, debug, info, warn or error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory holding the stats database.
    #[serde(default = "default_lib_path")]
    pub lib_path: PathBuf,
    /// strftime pattern for the start/end strings of a `Stat`.
    #[serde(default = "default_time_format")]
    pub time_format: String,
    /// Stats and log generations kept per sync. Less than 1 disables both.
    #[serde(default = "default_retention")]
    pub retention: i64,
    /// Cron expressions carry a leading seconds field (6 fields).
    #[serde(default)]
    pub seconds_field: bool,
    /// Default time limit for every sync, e.g. `5h` or `1h 30m`.
    #[serde(default)]
    pub time_limit: Option<String>,
    #[serde(default)]
    pub http: Option<HttpConfig>,
    #[serde(default)]
    pub email: Option<EmailConfig>,
    #[serde(default)]
    pub syncs: BTreeMap<String, SyncConfig>,
}

impl Default for ResyncConfig {
    fn default() -> Self {
        Self {
            rsync_path: default_rsync_path(),
            log_path: default_log_path(),
            log_level: default_log_level(),
            lib_path: default_lib_path(),
            time_format: default_time_format(),
            retention: DEFAULT_RETENTION,
            seconds_field: false,
            time_limit: None,
            http: None,
            email: None,
            syncs: BTreeMap::new(),
        }
    }
}

/// A single sync: one mirroring command on one cron schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Option flags, split on whitespace.
    pub rsync_args: String,
    #[serde(default)]
    pub rsync_source: Vec<String>,
    pub rsync_destination: String,
    pub schedule: String,
    #[serde(default)]
    pub time_limit: Option<String>,
}

impl SyncConfig {
    /// Argument list: flags, then every source, then the destination.
    pub fn args(&self) -> Vec<String> {
        self.rsync_args
            .split_whitespace()
            .map(str::to_string)
            .chain(self.rsync_source.iter().cloned())
            .chain(std::iter::once(self.rsync_destination.clone()))
            .collect()
    }
}

/// Health check listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_addr")]
    pub addr: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            addr: default_http_addr(),
            port: DEFAULT_HTTP_PORT,
        }
    }
}

/// SMTP settings for failure and history mails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub pass: Option<String>,
    /// Upgrade with STARTTLS. Takes precedence over `ssl`.
    #[serde(default)]
    pub starttls: bool,
    #[serde(default)]
    pub insecure_skip_verify: bool,
    /// Implicit TLS from the first byte.
    #[serde(default)]
    pub ssl: bool,
    pub from: String,
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default = "default_history_subject")]
    pub history_subject: String,
    /// Cron expression for the periodic history mail.
    #[serde(default)]
    pub history_schedule: Option<String>,
    /// HTML file whose `{{ history }}` placeholder receives the history tables.
    #[serde(default)]
    pub history_template: Option<PathBuf>,
    /// Mail every failed run.
    #[serde(default)]
    pub on_failure: bool,
}

fn default_rsync_path() -> String {
    if cfg!(windows) {
        "rsync.exe".to_string()
    } else {
        "rsync".to_string()
    }
}
fn default_log_path() -> PathBuf {
    PathBuf::from(DEFAULT_LOG_PATH)
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_lib_path() -> PathBuf {
    PathBuf::from(DEFAULT_LIB_PATH)
}
fn default_time_format() -> String {
    DEFAULT_TIME_FORMAT.to_string()
}
fn default_retention() -> i64 {
    DEFAULT_RETENTION
}
fn default_http_addr() -> String {
    DEFAULT_HTTP_ADDR.to_string()
}
fn default_http_port() -> u16 {
    DEFAULT_HTTP_PORT
}
fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}
fn default_history_subject() -> String {
    DEFAULT_HISTORY_SUBJECT.to_string()
}

impl ResyncConfig {
    /// Load config from a TOML or YAML file (by extension) with RESYNC_* env
    /// var overrides, then validate it.
    ///
    /// Nested env keys use a double underscore: `RESYNC_EMAIL__HOST`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ResyncError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }

        let figment = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Figment::new().merge(Yaml::file(path)),
            _ => Figment::new().merge(Toml::file(path)),
        };

        let mut config: ResyncConfig = figment
            .merge(Env::prefixed("RESYNC_").split("__"))
            .extract()
            .map_err(|e| ResyncError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Check every field and normalise the ones with aliases.
    pub fn validate(&mut self) -> Result<()> {
        self.log_level = normalize_log_level(&self.log_level)?;

        if StrftimeItems::new(&self.time_format).any(|item| matches!(item, Item::Error)) {
            return Err(ResyncError::Config(format!(
                "Invalid time_format: {}",
                self.time_format
            )));
        }

        if let Some(ref limit) = self.time_limit {
            parse_time_limit(limit)?;
        }

        if let Some(ref mut email) = self.email {
            if email.host.trim().is_empty() {
                return Err(ResyncError::Config("Missing host entry for smtp".into()));
            }
            if email.from.trim().is_empty() {
                return Err(ResyncError::Config("Missing from entry for smtp".into()));
            }
            if email.to.is_empty() {
                return Err(ResyncError::Config("Missing to entry for smtp".into()));
            }
            if email.starttls {
                email.ssl = false;
            }
        }

        if self.syncs.is_empty() {
            return Err(ResyncError::Config(
                "configuration file doesn't contain any sync entries".into(),
            ));
        }

        for (name, sync) in &self.syncs {
            if sync.schedule.trim().is_empty() {
                return Err(ResyncError::Config(format!(
                    "Missing schedule entry for sync: {name}"
                )));
            }
            if sync.rsync_source.is_empty() {
                return Err(ResyncError::Config(format!(
                    "At least one rsync_source entry is required per sync: {name}"
                )));
            }
            if sync.rsync_destination.trim().is_empty() {
                return Err(ResyncError::Config(format!(
                    "Missing rsync_destination entry for sync: {name}"
                )));
            }
            if let Some(ref limit) = sync.time_limit {
                parse_time_limit(limit)
                    .map_err(|e| ResyncError::Config(format!("sync {name}: {e}")))?;
            }
        }

        Ok(())
    }

    /// Stats and logs are only kept with a positive retention.
    pub fn retention_enabled(&self) -> bool {
        self.retention > 0
    }

    /// Whether failed runs should be mailed.
    pub fn notify_on_failure(&self) -> bool {
        self.email.as_ref().is_some_and(|email| email.on_failure)
    }

    /// Cron expression of the history mail, if one is configured.
    pub fn history_schedule(&self) -> Option<&str> {
        self.email
            .as_ref()
            .and_then(|email| email.history_schedule.as_deref())
    }
}

impl JobSource for ResyncConfig {
    fn job(&self, name: &str) -> Result<JobDescriptor> {
        let sync = self
            .syncs
            .get(name)
            .ok_or_else(|| ResyncError::JobNotFound {
                name: name.to_string(),
            })?;

        Ok(JobDescriptor {
            name: name.to_string(),
            args: sync.args(),
            schedule: sync.schedule.clone(),
            time_limit: self.time_limit(name),
        })
    }

    fn time_limit(&self, name: &str) -> Option<Duration> {
        self.syncs
            .get(name)
            .and_then(|sync| sync.time_limit.as_deref())
            .or(self.time_limit.as_deref())
            .and_then(|limit| parse_time_limit(limit).ok())
    }

    fn job_names(&self) -> Vec<String> {
        self.syncs.keys().cloned().collect()
    }
}

/// Parse a humantime duration such as `5h`, `90s` or `1h 30m`.
pub fn parse_time_limit(value: &str) -> Result<Duration> {
    let limit = humantime::parse_duration(value.trim())
        .map_err(|e| ResyncError::Config(format!("Invalid time_limit {value:?}: {e}")))?;
    if limit.is_zero() {
        return Err(ResyncError::Config(format!(
            "Invalid time_limit {value:?}: must be greater than zero"
        )));
    }
    Ok(limit)
}

fn normalize_log_level(level: &str) -> Result<String> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace".into()),
        "debug" => Ok("debug".into()),
        "info" => Ok("info".into()),
        "warn" | "warning" => Ok("warn".into()),
        // tracing has nothing above error
        "error" | "fatal" | "panic" => Ok("error".into()),
        other => Err(ResyncError::Config(format!("Invalid log_level: {other}"))),
    }
}
