use rusqlite::{Connection, Result};

/// Initialise the stats table. Safe to call on every startup (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS stats (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            name         TEXT NOT NULL,
            success      INTEGER NOT NULL,
            start_label  TEXT NOT NULL,
            end_label    TEXT NOT NULL,
            duration_ms  INTEGER NOT NULL,
            started_at   TEXT NOT NULL,
            ended_at     TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_stats_name_started
            ON stats(name, started_at DESC);",
    )
}
