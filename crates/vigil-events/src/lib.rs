//! Event correlation and escalation engine.
//!
//! Callers stage the events produced by trigger evaluation in an
//! [`EventProcessor`], then run one processing cycle. A cycle resolves
//! same-trigger recoveries, applies global correlation rules, closes
//! correlated problems under trigger locks, recalculates trigger values,
//! tags suppressed problems and persists everything in one transaction
//! before handing the batch to the action dispatcher.

pub mod cache;
mod correlation;
pub mod error;
mod flush;
pub mod locker;
mod persist;
pub mod processor;
mod recalc;
mod resolver;
pub mod snapshot;
mod suppress;
pub mod tags;

#[cfg(test)]
mod tests;

pub use cache::{CloseIntent, EventCache, EventRecovery};
pub use processor::EventProcessor;
pub use locker::{InMemoryTriggerLocker, StoreTriggerLocker};
pub use snapshot::ConfigSnapshot;

use vigil_common::config::{HostInfo, ItemInfo, TriggerDependency, TriggerInfo};
use vigil_common::correlation::CorrelationRules;
use vigil_common::types::{Tag, TriggerDiffs};

/// Maintenance lookup request for one problem event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuppressQuery {
    pub eventid: u64,
    /// Functions of the trigger expression and recovery expression.
    pub functionids: Vec<u64>,
    pub tags: Vec<Tag>,
    /// Filled by the lookup: `(maintenanceid, suppress_until)`.
    pub maintenances: Vec<(u64, i64)>,
}

/// Read side of the shared configuration cache.
pub trait ConfigCache: Send + Sync {
    /// Dependency state of the given triggers, sorted by triggerid.
    /// Triggers without relevant dependencies are omitted.
    fn trigger_dependencies(&self, triggerids: &[u64]) -> Vec<TriggerDependency>;

    fn correlation_rules(&self) -> CorrelationRules;

    /// One entry per requested id, `None` for unknown triggers.
    fn triggers_by_ids(&self, triggerids: &[u64]) -> Vec<Option<TriggerInfo>>;

    /// Items referenced by the functions, in function order, without
    /// duplicates.
    fn items_by_functionids(&self, functionids: &[u64]) -> Vec<ItemInfo>;

    /// Hosts referenced by the functions, in function order, without
    /// duplicates.
    fn hosts_by_functionids(&self, functionids: &[u64]) -> Vec<HostInfo>;

    /// Groups of the hosts a trigger's items belong to, sorted.
    fn trigger_hostgroup_ids(&self, triggerid: u64) -> Vec<u64>;

    /// The group and all groups nested below it, sorted.
    fn nested_hostgroup_ids(&self, groupid: u64) -> Vec<u64>;

    /// Distinct names of the groups the hosts belong to, sorted.
    fn host_group_names(&self, hostids: &[u64]) -> Vec<String>;

    /// Maintenances active at `now`, sorted.
    fn running_maintenance_ids(&self, now: i64) -> Vec<u64>;

    /// Fills the maintenances of each query from the `running` set.
    /// Returns false when no query matched any maintenance.
    fn event_maintenances(&self, queries: &mut [SuppressQuery], running: &[u64]) -> bool;

    /// Applies committed trigger changes to the cached trigger records.
    fn apply_trigger_changes(&self, diffs: &TriggerDiffs);
}

/// Cross-process mutual exclusion scoped to trigger ids.
pub trait TriggerLocker: Send + Sync {
    /// Locks the triggers that are not held by anyone else and returns them.
    fn lock(&self, triggerids: &[u64]) -> Vec<u64>;

    fn unlock(&self, triggerids: &[u64]);
}

/// Poller side hook used by check-now tasks.
pub trait ItemScheduler: Send + Sync {
    /// Schedules the items for an immediate check. Returns, per item, the
    /// proxy that monitors it or 0 when the server does.
    fn reschedule_items(&self, itemids: &[u64], now: i64) -> Vec<u64>;
}
