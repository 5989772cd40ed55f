//! Embedded SQLite store.
//!
//! Two connections share the same on-disk file: `writer` serializes every
//! mutation (target upserts, raw-result appends, the stats engine's
//! sweep-and-recompute pass) behind one mutex, while `reader` serves window
//! queries and target listings behind a separate mutex so readers never
//! wait on the writer. WAL journaling is what actually makes the two
//! connections safe to use concurrently; the mutexes exist only to keep
//! each connection's own API calls from racing each other, not as a
//! storage-engine correctness requirement.

use std::path::Path;
use std::sync::Mutex;

use chrono::Local;
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use super::models::*;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("migration failed: {0}")]
    Migration(String),
    #[error("target {0} not found")]
    NotFound(i64),
}

/// Timestamp format shared by every write path, local wall clock with
/// sub-second precision.
const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

fn now_text() -> String {
    Local::now().format(TS_FORMAT).to_string()
}

pub struct Store {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
}

impl Store {
    /// Open (creating if absent) the store at `path`, apply pragmas,
    /// run migrations, and recreate the rolling-window views.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let path = path.as_ref();
        let writer = Connection::open(path)?;
        let reader = Connection::open(path)?;

        configure_connection(&writer)?;
        configure_connection(&reader)?;

        writer
            .execute_batch(include_str!("../../migrations/000001_init.up.sql"))
            .map_err(|e| DbError::Migration(format!("000001_init: {e}")))?;
        writer
            .execute_batch(include_str!("views.sql"))
            .map_err(|e| DbError::Migration(format!("views: {e}")))?;

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
        })
    }

    // --- Target registry sync ---

    /// Upsert a target by `target_id`: insert if new, otherwise replace
    /// address/description and refresh `updated_at`.
    pub fn upsert_target(&self, target: &Target) -> Result<(), DbError> {
        let conn = self.writer.lock().unwrap();
        let now = now_text();
        let tests_json = serde_json::to_string(&target.tests).unwrap_or_else(|_| "[]".to_string());

        conn.execute(
            "INSERT INTO targets (target_id, address, description, tests, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(target_id) DO UPDATE SET
                address = excluded.address,
                description = excluded.description,
                tests = excluded.tests,
                updated_at = excluded.updated_at",
            params![target.target_id, target.address, target.description, tests_json, now],
        )?;
        Ok(())
    }

    /// List all registered targets, ordered by `target_id`.
    pub fn targets(&self) -> Result<Vec<Target>, DbError> {
        let conn = self.reader.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT target_id, address, description, tests FROM targets ORDER BY target_id",
        )?;

        let rows = stmt
            .query_map([], |row| {
                let tests_json: String = row.get(3)?;
                let tests: Vec<String> = serde_json::from_str(&tests_json).unwrap_or_default();
                Ok(Target {
                    target_id: row.get(0)?,
                    address: row.get(1)?,
                    description: row.get(2)?,
                    tests,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    // --- Raw results ---

    /// Append a single probe outcome, timestamped `now`. `success = false`
    /// implies `latency_ms`, `ttl`, and `bytes` are all absent.
    pub fn append_result(&self, result: &ProbeResult) -> Result<(), DbError> {
        self.append_result_at(result, &now_text())
    }

    /// Append a single probe outcome with an explicit timestamp. Exposed
    /// separately from `append_result` so callers (tests, in particular)
    /// can insert a back-dated row to exercise window boundaries and the
    /// retention sweep without waiting on the wall clock.
    pub fn append_result_at(&self, result: &ProbeResult, timestamp: &str) -> Result<(), DbError> {
        let conn = self.writer.lock().unwrap();
        conn.execute(
            "INSERT INTO results (target_id, timestamp, success, latency_ms, ttl, bytes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                result.target_id,
                timestamp,
                result.success as i64,
                result.latency_ms,
                result.ttl,
                result.bytes,
            ],
        )?;
        Ok(())
    }

    /// Query one window's aggregates for a target. All numeric fields are
    /// `None`/zero when the window has no samples.
    pub fn query_window(&self, target_id: i64, window: Window) -> Result<WindowStats, DbError> {
        let conn = self.reader.lock().unwrap();
        query_window_with(&conn, target_id, window)
    }

    /// Remove result rows older than `retention`, return the row count
    /// deleted.
    pub fn prune_older_than(&self, retention: std::time::Duration) -> Result<usize, DbError> {
        let conn = self.writer.lock().unwrap();
        prune_with(&conn, retention)
    }

    /// Persist the durable per-target stats row (last writer wins).
    pub fn save_ping_stat(
        &self,
        target_id: i64,
        snapshot: &TargetSnapshot,
    ) -> Result<(), DbError> {
        let conn = self.writer.lock().unwrap();
        save_ping_stat_with(&conn, target_id, snapshot)
    }

    /// Run the stats engine's periodic pass — retention sweep followed by
    /// a window query and `ping_stats` persist for every target — all
    /// under one acquisition of the writer lock, as required by the
    /// engine's "under the Store write lock" contract.
    pub fn stats_pass<F>(
        &self,
        retention: std::time::Duration,
        mut select_and_snapshot: F,
    ) -> Result<Vec<(i64, TargetSnapshot)>, DbError>
    where
        F: FnMut(i64, WindowStats, WindowStats, WindowStats) -> TargetSnapshot,
    {
        let conn = self.writer.lock().unwrap();

        prune_with(&conn, retention)?;

        let mut stmt = conn.prepare("SELECT target_id FROM targets ORDER BY target_id")?;
        let target_ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        let mut out = Vec::with_capacity(target_ids.len());
        for target_id in target_ids {
            let w15 = query_window_with(&conn, target_id, Window::FifteenMin)?;
            let w5 = query_window_with(&conn, target_id, Window::FiveMin)?;
            let w1 = query_window_with(&conn, target_id, Window::OneMin)?;

            let snapshot = select_and_snapshot(target_id, w15, w5, w1);
            save_ping_stat_with(&conn, target_id, &snapshot)?;
            out.push((target_id, snapshot));
        }

        Ok(out)
    }
}

fn configure_connection(conn: &Connection) -> Result<(), DbError> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "cache_size", -10_000i64)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

fn query_window_with(conn: &Connection, target_id: i64, window: Window) -> Result<WindowStats, DbError> {
    let row = conn
        .query_row(&window.query(), params![target_id], |row| {
            Ok(WindowStats {
                avg_latency: row.get(0)?,
                min_latency: row.get(1)?,
                max_latency: row.get(2)?,
                success_rate: row.get(3)?,
                total: row.get(4)?,
                successes: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
                failures: row.get(6)?,
                variance: row.get(7)?,
            })
        })
        .optional()?;

    Ok(row.unwrap_or_default())
}

fn prune_with(conn: &Connection, retention: std::time::Duration) -> Result<usize, DbError> {
    let cutoff = Local::now() - chrono::Duration::from_std(retention).unwrap_or_default();
    let cutoff_text = cutoff.format(TS_FORMAT).to_string();
    let deleted = conn.execute("DELETE FROM results WHERE timestamp < ?1", params![cutoff_text])?;
    Ok(deleted)
}

fn save_ping_stat_with(conn: &Connection, target_id: i64, snapshot: &TargetSnapshot) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO ping_stats (target_id, chosen_window, avg_latency, success_rate, total, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(target_id) DO UPDATE SET
            chosen_window = excluded.chosen_window,
            avg_latency = excluded.avg_latency,
            success_rate = excluded.success_rate,
            total = excluded.total,
            updated_at = excluded.updated_at",
        params![
            target_id,
            snapshot.chosen_window.as_str(),
            snapshot.avg_latency,
            snapshot.success_rate,
            snapshot.total,
            now_text(),
        ],
    )?;
    Ok(())
}
