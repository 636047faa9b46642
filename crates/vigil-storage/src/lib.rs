//! SQLite persistence for events, problems, tasks and the configuration
//! tables the engine reads.
//!
//! A [`Store`] owns one connection. Every worker opens its own store on the
//! shared database file; WAL mode lets readers proceed while a cycle holds
//! the write transaction.

pub mod error;
pub mod filter;
mod schema;
pub mod store;


use error::{Result, StorageError};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

pub use filter::Predicate;
pub use store::events::{CorrelatedProblem, EventRow, OpenProblem, ProblemRow, RecoveryRow, SuppressRow};
pub use store::tasks::{
    AcknowledgeTask, CheckNowTask, CloseProblemTarget, NewTask, RemoteCommandResult, TaskDetail,
    TaskRow,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Opens (creating if needed) the database file and applies the schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(schema::IDS_SCHEMA)?;
        conn.execute_batch(schema::LOCK_SCHEMA)?;
        conn.execute_batch(schema::EVENTS_SCHEMA)?;
        conn.execute_batch(schema::CONFIG_SCHEMA)?;
        conn.execute_batch(schema::CORRELATION_SCHEMA)?;
        conn.execute_batch(schema::TASK_SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs `f` with the underlying connection.
    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.lock();
        f(&conn)
    }

    pub fn begin(&self) -> Result<()> {
        self.lock().execute_batch("BEGIN IMMEDIATE;")?;
        Ok(())
    }

    pub fn commit(&self) -> Result<()> {
        self.lock().execute_batch("COMMIT;")?;
        Ok(())
    }

    /// Rolls back the open transaction, if any.
    pub fn rollback(&self) -> Result<()> {
        let conn = self.lock();
        if !conn.is_autocommit() {
            conn.execute_batch("ROLLBACK;")?;
        }
        Ok(())
    }

    /// Runs `f` inside a transaction, committing on success and rolling
    /// back when it fails.
    pub fn transaction<F, T, E>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Self) -> std::result::Result<T, E>,
        E: From<StorageError>,
    {
        self.begin()?;
        match f(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = self.rollback() {
                    tracing::error!(error = %rollback_err, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Runs `f` holding the database write lock.
    ///
    /// Outside a transaction this opens a `BEGIN IMMEDIATE` one around `f`,
    /// so other processes sharing the file wait until it commits. Inside a
    /// transaction `f` simply joins it.
    pub(crate) fn with_write_lock<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.lock();
        if !conn.is_autocommit() {
            return f(&conn);
        }

        conn.execute_batch("BEGIN IMMEDIATE;")?;
        match f(&conn) {
            Ok(value) => {
                conn.execute_batch("COMMIT;")?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = conn.execute_batch("ROLLBACK;") {
                    tracing::error!(error = %rollback_err, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Reserves `count` consecutive ids for `table.field` and returns the
    /// first one.
    ///
    /// The counter starts after the largest id already stored in the table.
    /// Reservations from stores on the same database file never overlap.
    pub fn reserve_ids(&self, table: &'static str, field: &'static str, count: u64) -> Result<u64> {
        self.with_write_lock(|conn| {
            conn.execute(
                &format!(
                    "INSERT OR IGNORE INTO ids (table_name, field_name, nextid) \
                     SELECT ?1, ?2, COALESCE(MAX({field}), 0) FROM {table}"
                ),
                rusqlite::params![table, field],
            )?;

            let last: i64 = conn.query_row(
                "UPDATE ids SET nextid = nextid + ?1 WHERE table_name = ?2 AND field_name = ?3 \
                 RETURNING nextid",
                rusqlite::params![count as i64, table, field],
                |row| row.get(0),
            )?;

            Ok((last - count as i64) as u64 + 1)
        })
    }
}

/// Converts a stored enum code, failing on values no variant maps to.
pub(crate) fn decode<T>(
    column: &'static str,
    value: i64,
    from: impl FnOnce(i32) -> Option<T>,
) -> Result<T> {
    i32::try_from(value)
        .ok()
        .and_then(from)
        .ok_or(StorageError::UnexpectedValue { column, value })
}

/// `?, ?, ?` with `n` placeholders.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

pub(crate) fn id_params(ids: &[u64]) -> Vec<rusqlite::types::Value> {
    ids.iter()
        .map(|id| rusqlite::types::Value::Integer(*id as i64))
        .collect()
}
