//! SQLite-backed persistence.
//!
//! Provides durable storage for:
//! - Key-value application state (streak, passes, milestones)
//! - Locally logged daily activity totals

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{data_dir, migrations, KvStore};
use crate::day::DayKey;
use crate::error::{CoreError, DatabaseError, Result};
use crate::record::ActivitySource;

/// One logged day of activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub day: DayKey,
    pub count: u64,
}

/// SQLite database for state and activity storage.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `~/.config/stride/stride.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(data_dir()?.join("stride.db"))
    }

    /// Open (or create) a database file at an explicit path.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        migrations::migrate(&conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CoreError::Database(DatabaseError::Poisoned))
    }

    /// Set the activity total for `day`, replacing any earlier value.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub fn record_activity(&self, day: DayKey, count: u64) -> Result<()> {
        let count = i64::try_from(count).map_err(|_| {
            DatabaseError::QueryFailed(format!("activity count {count} out of range"))
        })?;
        self.conn()?.execute(
            "INSERT INTO activity (day, count, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(day) DO UPDATE SET count = excluded.count, updated_at = excluded.updated_at",
            params![day.to_string(), count, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Add `delta` to the total for `day` and return the new total.
    pub fn add_activity(&self, day: DayKey, delta: u64) -> Result<u64> {
        let total = self
            .activity_for(day)?
            .unwrap_or(0)
            .saturating_add(delta);
        self.record_activity(day, total)?;
        Ok(total)
    }

    /// The logged total for `day`, `None` if nothing was logged.
    pub fn activity_for(&self, day: DayKey) -> Result<Option<u64>> {
        let count = self
            .conn()?
            .query_row(
                "SELECT count FROM activity WHERE day = ?1",
                params![day.to_string()],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(count.map(|c| c.max(0) as u64))
    }

    /// Logged days in `[from, to]`, oldest first.
    pub fn activity_between(&self, from: DayKey, to: DayKey) -> Result<Vec<ActivityEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT day, count FROM activity
             WHERE day >= ?1 AND day <= ?2
             ORDER BY day ASC",
        )?;
        let rows = stmt.query_map(params![from.to_string(), to.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (day, count) = row?;
            match DayKey::parse(&day) {
                Ok(day) => entries.push(ActivityEntry {
                    day,
                    count: count.max(0) as u64,
                }),
                Err(e) => tracing::warn!(day = %day, "skipping malformed activity row: {}", e),
            }
        }
        Ok(entries)
    }
}

impl KvStore for Database {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value = self
            .conn()?
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, Vec<u8>>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// All entries commit in one transaction or none do.
    fn set_many(&self, entries: &[(&str, &[u8])]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare("INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)")?;
            for (key, value) in entries {
                stmt.execute(params![key, value])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

impl ActivitySource for Database {
    fn fetch_count(&self, day: DayKey) -> Result<u64> {
        self.activity_for(day)
            .map(|count| count.unwrap_or(0))
            .map_err(|e| CoreError::DataUnavailable {
                day,
                reason: e.to_string(),
            })
    }
}
