use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Local, SecondsFormat, Utc};
use resync_core::{Stat, StatHistory, StatStore};
use rusqlite::Connection;
use tracing::{debug, info};

use crate::db::init_db;
use crate::error::{Result, StatsError};

/// Database file name inside `lib_path`.
pub const DB_FILE: &str = "resync.db";

/// [`StatStore`] on SQLite, keeping `retention` records per job.
///
/// With retention < 1 nothing is opened and every call is a no-op.
pub struct SqliteStatStore {
    db: Option<Mutex<Connection>>,
    retention: i64,
}

impl SqliteStatStore {
    /// Open (or create) `<lib_path>/resync.db` and prune it to `retention`.
    pub fn open(lib_path: &Path, retention: i64) -> Result<Self> {
        if retention < 1 {
            return Ok(Self::disabled());
        }
        std::fs::create_dir_all(lib_path)?;
        let path = lib_path.join(DB_FILE);
        info!(path = %path.display(), retention, "opening stats database");
        Self::with_connection(Connection::open(path)?, retention)
    }

    /// Use an already open connection, e.g. `Connection::open_in_memory()`.
    pub fn with_connection(conn: Connection, retention: i64) -> Result<Self> {
        if retention < 1 {
            return Ok(Self::disabled());
        }
        init_db(&conn)?;
        let store = Self {
            db: Some(Mutex::new(conn)),
            retention,
        };
        store.prune_rows()?;
        Ok(store)
    }

    /// Private in-memory database, gone when the store is dropped.
    pub fn in_memory(retention: i64) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, retention)
    }

    pub fn disabled() -> Self {
        Self {
            db: None,
            retention: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.db.is_some()
    }

    pub fn retention(&self) -> i64 {
        self.retention
    }

    fn insert_row(&self, stat: &Stat) -> Result<()> {
        let Some(db) = &self.db else {
            return Ok(());
        };
        let ended_at = stat.ended_at().ok_or_else(|| StatsError::Unfinished {
            name: stat.name.clone(),
        })?;

        {
            let conn = db.lock().unwrap();
            conn.execute(
                "INSERT INTO stats
                 (name, success, start_label, end_label, duration_ms, started_at, ended_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    stat.name,
                    stat.success,
                    stat.start,
                    stat.end,
                    stat.duration.as_millis() as i64,
                    timestamp(stat.started_at()),
                    timestamp(ended_at),
                ],
            )?;
        }
        debug!(job = %stat.name, success = stat.success, "stat stored");

        self.prune_rows()
    }

    fn list_rows(&self) -> Result<StatHistory> {
        let mut history = StatHistory::new();
        let Some(db) = &self.db else {
            return Ok(history);
        };

        let conn = db.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, success, start_label, end_label, duration_ms, started_at, ended_at
             FROM stats
             ORDER BY name, started_at DESC, id DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Row {
                id: row.get(0)?,
                name: row.get(1)?,
                success: row.get(2)?,
                start: row.get(3)?,
                end: row.get(4)?,
                duration_ms: row.get(5)?,
                started_at: row.get(6)?,
                ended_at: row.get(7)?,
            })
        })?;

        for row in rows {
            let stat = row?.into_stat()?;
            history.entry(stat.name.clone()).or_default().push(stat);
        }
        Ok(history)
    }

    fn prune_rows(&self) -> Result<()> {
        let Some(db) = &self.db else {
            return Ok(());
        };
        let conn = db.lock().unwrap();
        let removed = conn.execute(
            "DELETE FROM stats WHERE id IN (
                SELECT id FROM (
                    SELECT id, ROW_NUMBER() OVER (
                        PARTITION BY name ORDER BY started_at DESC, id DESC
                    ) AS pos
                    FROM stats
                ) WHERE pos > ?1
            )",
            [self.retention],
        )?;
        if removed > 0 {
            debug!(removed, retention = self.retention, "pruned stats");
        }
        Ok(())
    }
}

impl StatStore for SqliteStatStore {
    fn insert(&self, stat: &Stat) -> resync_core::Result<()> {
        Ok(self.insert_row(stat)?)
    }

    fn list(&self) -> resync_core::Result<StatHistory> {
        Ok(self.list_rows()?)
    }

    fn prune(&self) -> resync_core::Result<()> {
        Ok(self.prune_rows()?)
    }
}

struct Row {
    id: i64,
    name: String,
    success: bool,
    start: String,
    end: String,
    duration_ms: i64,
    started_at: String,
    ended_at: String,
}

impl Row {
    fn into_stat(self) -> Result<Stat> {
        let id = self.id;
        let parse = |value: &str| {
            DateTime::parse_from_rfc3339(value)
                .map(|t| t.with_timezone(&Local))
                .map_err(|e| StatsError::Corrupt {
                    id,
                    reason: format!("bad timestamp {value:?}: {e}"),
                })
        };
        let started_at = parse(&self.started_at)?;
        let ended_at = parse(&self.ended_at)?;

        Ok(Stat::restored(
            self.name,
            self.success,
            self.start,
            self.end,
            Duration::from_millis(self.duration_ms.max(0) as u64),
            started_at,
            ended_at,
        ))
    }
}

/// Fixed-width UTC timestamps so text order matches time order.
fn timestamp(t: DateTime<Local>) -> String {
    t.with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Nanos, true)
}
