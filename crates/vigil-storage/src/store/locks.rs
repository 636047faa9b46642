//! Trigger locks shared through the database by every process that opens it.

use crate::error::Result;
use crate::{id_params, placeholders, Store};
use rusqlite::OptionalExtension;

impl Store {
    /// Takes the locks on `triggerids` that nobody holds yet and returns the
    /// acquired ids, sorted.
    pub fn lock_triggers(&self, owner: &str, pid: u32, clock: i64, triggerids: &[u64]) -> Result<Vec<u64>> {
        if triggerids.is_empty() {
            return Ok(Vec::new());
        }
        self.with_write_lock(|conn| {
            let mut stmt = conn.prepare_cached(
                "INSERT OR IGNORE INTO trigger_lock (triggerid, owner, pid, clock) VALUES (?1, ?2, ?3, ?4)",
            )?;
            let mut acquired = Vec::new();
            for &triggerid in triggerids {
                if stmt.execute(rusqlite::params![triggerid as i64, owner, pid, clock])? == 1 {
                    acquired.push(triggerid);
                }
            }
            acquired.sort_unstable();
            acquired.dedup();
            Ok(acquired)
        })
    }

    /// Releases the locks `owner` holds on `triggerids`.
    pub fn unlock_triggers(&self, owner: &str, triggerids: &[u64]) -> Result<()> {
        if triggerids.is_empty() {
            return Ok(());
        }
        self.with_write_lock(|conn| {
            let sql = format!(
                "DELETE FROM trigger_lock WHERE owner = ? AND triggerid IN ({})",
                placeholders(triggerids.len())
            );
            let mut params = vec![rusqlite::types::Value::Text(owner.to_string())];
            params.extend(id_params(triggerids));
            conn.execute(&sql, rusqlite::params_from_iter(params))?;
            Ok(())
        })
    }

    /// Drops every lock recorded for `owner`, left behind by a process that
    /// did not shut down cleanly.
    pub fn release_trigger_locks(&self, owner: &str) -> Result<usize> {
        self.with_write_lock(|conn| {
            Ok(conn.execute("DELETE FROM trigger_lock WHERE owner = ?1", [owner])?)
        })
    }

    pub fn trigger_lock_owner(&self, triggerid: u64) -> Result<Option<String>> {
        self.with_connection(|conn| {
            Ok(conn
                .query_row(
                    "SELECT owner FROM trigger_lock WHERE triggerid = ?1",
                    [triggerid as i64],
                    |row| row.get(0),
                )
                .optional()?)
        })
    }
}
