//! [`TriggerLocker`] implementations.

use crate::error::Result;
use crate::TriggerLocker;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use vigil_storage::Store;

/// Trigger locks shared by the workers of one process.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTriggerLocker {
    locked: Arc<Mutex<HashSet<u64>>>,
}

impl InMemoryTriggerLocker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_locked(&self, triggerid: u64) -> bool {
        self.locked
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains(&triggerid)
    }
}

impl TriggerLocker for InMemoryTriggerLocker {
    fn lock(&self, triggerids: &[u64]) -> Vec<u64> {
        let mut locked = self.locked.lock().unwrap_or_else(|p| p.into_inner());
        let mut acquired: Vec<u64> = triggerids
            .iter()
            .copied()
            .filter(|id| locked.insert(*id))
            .collect();
        acquired.sort_unstable();
        acquired
    }

    fn unlock(&self, triggerids: &[u64]) {
        let mut locked = self.locked.lock().unwrap_or_else(|p| p.into_inner());
        for id in triggerids {
            locked.remove(id);
        }
    }
}

/// Trigger locks kept in the `trigger_lock` table, visible to every process
/// that opens the same database.
///
/// A storage failure while locking is reported as "nothing acquired", so
/// callers treat the triggers as busy and retry on their next round.
pub struct StoreTriggerLocker {
    store: Arc<Store>,
    owner: String,
    pid: u32,
}

impl StoreTriggerLocker {
    pub fn new(store: Arc<Store>, owner: impl Into<String>) -> Self {
        Self {
            store,
            owner: owner.into(),
            pid: std::process::id(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Removes locks a previous run under the same owner left behind.
    pub fn release_stale(&self) -> Result<usize> {
        let released = self.store.release_trigger_locks(&self.owner)?;
        if released > 0 {
            tracing::warn!(owner = %self.owner, released, "Released stale trigger locks");
        }
        Ok(released)
    }

    pub fn is_locked(&self, triggerid: u64) -> bool {
        matches!(self.store.trigger_lock_owner(triggerid), Ok(Some(_)))
    }
}

impl TriggerLocker for StoreTriggerLocker {
    fn lock(&self, triggerids: &[u64]) -> Vec<u64> {
        let now = chrono::Utc::now().timestamp();
        match self.store.lock_triggers(&self.owner, self.pid, now, triggerids) {
            Ok(acquired) => acquired,
            Err(e) => {
                tracing::error!(owner = %self.owner, error = %e, "Cannot lock triggers");
                Vec::new()
            }
        }
    }

    fn unlock(&self, triggerids: &[u64]) {
        if let Err(e) = self.store.unlock_triggers(&self.owner, triggerids) {
            tracing::error!(owner = %self.owner, error = %e, "Cannot unlock triggers");
        }
    }
}
