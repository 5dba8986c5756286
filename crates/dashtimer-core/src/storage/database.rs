//! SQLite-based engine storage and session log.
//!
//! Provides persistent storage for:
//! - Engine snapshots (key-value table, one row per engine)
//! - Completed Pomodoro phases
//! - Session statistics (daily and all-time)

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::data_dir;
use super::snapshot::StateStore;
use crate::error::StoreError;
use crate::pomodoro::SessionType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    pub session_type: String,
    pub duration_secs: u64,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Stats {
    pub total_sessions: u64,
    pub completed_pomodoros: u64,
    pub total_focus_min: u64,
    pub total_break_min: u64,
    pub today_pomodoros: u64,
    pub today_focus_min: u64,
}

/// SQLite database backing the engine snapshots.
///
/// The connection sits behind a mutex so one handle can be shared by all
/// engines in a process.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `<data_dir>/dashtimer.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StoreError> {
        Self::open_at(&data_dir()?.join("dashtimer.db"))
    }

    /// Open (or create) the database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("database lock poisoned".into()))
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.conn()?.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                session_type  TEXT NOT NULL,
                duration_secs INTEGER NOT NULL,
                completed_at  TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_completed_at ON sessions(completed_at);",
        )?;
        Ok(())
    }

    /// Record a completed Pomodoro phase.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn record_session(
        &self,
        session_type: SessionType,
        duration_secs: u64,
        completed_at: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sessions (session_type, duration_secs, completed_at)
             VALUES (?1, ?2, ?3)",
            params![
                session_type.as_str(),
                duration_secs,
                completed_at.to_rfc3339()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent sessions first.
    pub fn recent_sessions(&self, limit: usize) -> Result<Vec<SessionRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, session_type, duration_secs, completed_at
             FROM sessions ORDER BY completed_at DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            let completed_at: String = row.get(3)?;
            Ok(SessionRecord {
                id: row.get(0)?,
                session_type: row.get(1)?,
                duration_secs: row.get(2)?,
                completed_at: DateTime::parse_from_rfc3339(&completed_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_default(),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Totals over all recorded sessions plus today's focus numbers.
    pub fn stats_all(&self, now: DateTime<Utc>) -> Result<Stats, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT session_type, COUNT(*), COALESCE(SUM(duration_secs), 0)
             FROM sessions
             GROUP BY session_type",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, u64>(2)?,
            ))
        })?;

        let mut stats = Stats::default();
        for row in rows {
            let (session_type, count, secs) = row?;
            stats.total_sessions += count;
            if session_type == SessionType::Focus.as_str() {
                stats.completed_pomodoros += count;
                stats.total_focus_min += secs / 60;
            } else {
                stats.total_break_min += secs / 60;
            }
        }

        let today = now.format("%Y-%m-%d").to_string();
        let (today_count, today_secs) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(duration_secs), 0)
             FROM sessions
             WHERE session_type = ?1 AND completed_at >= ?2",
            params![
                SessionType::Focus.as_str(),
                format!("{today}T00:00:00+00:00")
            ],
            |row| Ok((row.get::<_, u64>(0)?, row.get::<_, u64>(1)?)),
        )?;
        stats.today_pomodoros = today_count;
        stats.today_focus_min = today_secs / 60;

        Ok(stats)
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

impl StateStore for Database {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.kv_get(key)
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.kv_set(key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn record_and_query() {
        let db = Database::open_memory().unwrap();
        let now = Utc::now();
        db.record_session(SessionType::Focus, 25 * 60, now).unwrap();
        db.record_session(SessionType::ShortBreak, 5 * 60, now).unwrap();
        db.record_session(SessionType::Focus, 25 * 60, now - Duration::days(2))
            .unwrap();

        let stats = db.stats_all(now).unwrap();
        assert_eq!(stats.total_sessions, 3);
        assert_eq!(stats.completed_pomodoros, 2);
        assert_eq!(stats.total_focus_min, 50);
        assert_eq!(stats.total_break_min, 5);
        assert_eq!(stats.today_pomodoros, 1);
        assert_eq!(stats.today_focus_min, 25);
    }

    #[test]
    fn recent_sessions_newest_first() {
        let db = Database::open_memory().unwrap();
        let now = Utc::now();
        db.record_session(SessionType::Focus, 60, now - Duration::minutes(10))
            .unwrap();
        db.record_session(SessionType::LongBreak, 120, now).unwrap();
        let recent = db.recent_sessions(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].session_type, "long_break");
        assert_eq!(recent[1].duration_secs, 60);
    }

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
        db.kv_set("test", "again").unwrap();
        assert_eq!(db.load("test").unwrap().as_deref(), Some("again"));
    }
}
