//! In-process configuration snapshot.

use crate::error::Result;
use crate::{ConfigCache, ItemScheduler, SuppressQuery};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, RwLock};
use vigil_common::config::{
    DependencyStatus, FunctionRef, HostGroup, HostInfo, ItemInfo, Maintenance, TriggerDependency,
    TriggerInfo,
};
use vigil_common::correlation::{Correlation, CorrelationRules};
use vigil_common::types::{DiffFlags, TriggerDiffs, TriggerValue};
use vigil_storage::Store;

/// Configuration records the engine reads during a cycle.
///
/// Built from the database with [`ConfigSnapshot::load`] or assembled
/// record by record.
#[derive(Debug, Default)]
pub struct ConfigSnapshot {
    triggers: RwLock<BTreeMap<u64, TriggerInfo>>,
    /// triggerid_down -> triggerid_up
    dependencies: BTreeMap<u64, Vec<u64>>,
    functions: BTreeMap<u64, FunctionRef>,
    items: HashMap<u64, ItemInfo>,
    hosts: HashMap<u64, HostInfo>,
    groups: BTreeMap<u64, HostGroup>,
    correlations: Vec<Correlation>,
    maintenances: BTreeMap<u64, Maintenance>,
    nextchecks: Mutex<HashMap<u64, i64>>,
}

impl ConfigSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(store: &Store) -> Result<Self> {
        let mut snapshot = Self::new();
        for trigger in store.load_triggers()? {
            snapshot.add_trigger(trigger);
        }
        for (down, up) in store.load_trigger_dependencies()? {
            snapshot.add_dependency(down, up);
        }
        for function in store.load_functions()? {
            snapshot.add_function(function);
        }
        for item in store.load_items()? {
            snapshot.add_item(item);
        }
        for host in store.load_hosts()? {
            snapshot.add_host(host);
        }
        for group in store.load_host_groups()? {
            snapshot.add_host_group(group);
        }
        for correlation in store.load_correlations()? {
            snapshot.add_correlation(correlation);
        }
        for maintenance in store.load_maintenances()? {
            snapshot.add_maintenance(maintenance);
        }
        tracing::info!(
            triggers = snapshot.read_triggers().len(),
            correlations = snapshot.correlations.len(),
            maintenances = snapshot.maintenances.len(),
            "Configuration snapshot loaded"
        );
        Ok(snapshot)
    }

    pub fn add_trigger(&mut self, trigger: TriggerInfo) {
        self.triggers
            .get_mut()
            .unwrap_or_else(|p| p.into_inner())
            .insert(trigger.triggerid, trigger);
    }

    pub fn add_dependency(&mut self, triggerid_down: u64, triggerid_up: u64) {
        let ups = self.dependencies.entry(triggerid_down).or_default();
        if !ups.contains(&triggerid_up) {
            ups.push(triggerid_up);
        }
    }

    pub fn add_function(&mut self, function: FunctionRef) {
        self.functions.insert(function.functionid, function);
    }

    pub fn add_item(&mut self, item: ItemInfo) {
        self.items.insert(item.itemid, item);
    }

    pub fn add_host(&mut self, host: HostInfo) {
        self.hosts.insert(host.hostid, host);
    }

    pub fn add_host_group(&mut self, group: HostGroup) {
        self.groups.insert(group.groupid, group);
    }

    pub fn add_correlation(&mut self, correlation: Correlation) {
        self.correlations
            .retain(|c| c.correlationid != correlation.correlationid);
        self.correlations.push(correlation);
    }

    pub fn add_maintenance(&mut self, maintenance: Maintenance) {
        self.maintenances.insert(maintenance.maintenanceid, maintenance);
    }

    pub fn trigger(&self, triggerid: u64) -> Option<TriggerInfo> {
        self.read_triggers().get(&triggerid).cloned()
    }

    /// Last time the item was scheduled by a check-now request.
    pub fn nextcheck(&self, itemid: u64) -> Option<i64> {
        self.nextchecks
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(&itemid)
            .copied()
    }

    fn read_triggers(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<u64, TriggerInfo>> {
        self.triggers.read().unwrap_or_else(|p| p.into_inner())
    }

    fn hostids_by_functionids(&self, functionids: &[u64]) -> Vec<u64> {
        let mut hostids = Vec::new();
        for functionid in functionids {
            let Some(function) = self.functions.get(functionid) else {
                continue;
            };
            let Some(item) = self.items.get(&function.itemid) else {
                continue;
            };
            if !hostids.contains(&item.hostid) {
                hostids.push(item.hostid);
            }
        }
        hostids
    }

    fn host_groupids(&self, hostids: &[u64]) -> BTreeSet<u64> {
        hostids
            .iter()
            .filter_map(|id| self.hosts.get(id))
            .flat_map(|h| h.groupids.iter().copied())
            .collect()
    }
}

impl ConfigCache for ConfigSnapshot {
    fn trigger_dependencies(&self, triggerids: &[u64]) -> Vec<TriggerDependency> {
        let triggers = self.read_triggers();
        let requested: HashSet<u64> = triggerids.iter().copied().collect();
        let mut ids = triggerids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let mut deps = Vec::new();
        for triggerid in ids {
            let mut status = DependencyStatus::Unresolved;
            let mut masterids = Vec::new();
            let mut visited = HashSet::from([triggerid]);
            let mut pending: Vec<u64> = self.dependencies.get(&triggerid).cloned().unwrap_or_default();

            while let Some(masterid) = pending.pop() {
                if !visited.insert(masterid) {
                    continue;
                }
                if requested.contains(&masterid) {
                    masterids.push(masterid);
                } else if triggers
                    .get(&masterid)
                    .is_some_and(|t| t.value == TriggerValue::Problem)
                {
                    status = DependencyStatus::Fail;
                    break;
                }
                if let Some(ups) = self.dependencies.get(&masterid) {
                    pending.extend(ups.iter().copied());
                }
            }

            if status == DependencyStatus::Fail || !masterids.is_empty() {
                masterids.sort_unstable();
                deps.push(TriggerDependency {
                    triggerid,
                    status,
                    masterids,
                });
            }
        }
        deps
    }

    fn correlation_rules(&self) -> CorrelationRules {
        CorrelationRules::new(self.correlations.clone())
    }

    fn triggers_by_ids(&self, triggerids: &[u64]) -> Vec<Option<TriggerInfo>> {
        let triggers = self.read_triggers();
        triggerids.iter().map(|id| triggers.get(id).cloned()).collect()
    }

    fn items_by_functionids(&self, functionids: &[u64]) -> Vec<ItemInfo> {
        let mut items: Vec<ItemInfo> = Vec::new();
        for functionid in functionids {
            let Some(function) = self.functions.get(functionid) else {
                continue;
            };
            if items.iter().any(|i| i.itemid == function.itemid) {
                continue;
            }
            if let Some(item) = self.items.get(&function.itemid) {
                items.push(item.clone());
            }
        }
        items
    }

    fn hosts_by_functionids(&self, functionids: &[u64]) -> Vec<HostInfo> {
        self.hostids_by_functionids(functionids)
            .iter()
            .filter_map(|id| self.hosts.get(id).cloned())
            .collect()
    }

    fn trigger_hostgroup_ids(&self, triggerid: u64) -> Vec<u64> {
        let functionids: Vec<u64> = self
            .functions
            .values()
            .filter(|f| f.triggerid == triggerid)
            .map(|f| f.functionid)
            .collect();
        let hostids = self.hostids_by_functionids(&functionids);
        self.host_groupids(&hostids).into_iter().collect()
    }

    fn nested_hostgroup_ids(&self, groupid: u64) -> Vec<u64> {
        let Some(group) = self.groups.get(&groupid) else {
            return vec![groupid];
        };
        let prefix = format!("{}/", group.name);
        self.groups
            .values()
            .filter(|g| g.name == group.name || g.name.starts_with(&prefix))
            .map(|g| g.groupid)
            .collect()
    }

    fn host_group_names(&self, hostids: &[u64]) -> Vec<String> {
        let names: BTreeSet<String> = self
            .host_groupids(hostids)
            .iter()
            .filter_map(|id| self.groups.get(id))
            .map(|g| g.name.clone())
            .collect();
        names.into_iter().collect()
    }

    fn running_maintenance_ids(&self, now: i64) -> Vec<u64> {
        self.maintenances
            .values()
            .filter(|m| m.is_running(now))
            .map(|m| m.maintenanceid)
            .collect()
    }

    fn event_maintenances(&self, queries: &mut [SuppressQuery], running: &[u64]) -> bool {
        let mut matched = false;
        for query in queries.iter_mut() {
            let hostids = self.hostids_by_functionids(&query.functionids);
            let groupids = self.host_groupids(&hostids);

            for maintenanceid in running {
                let Some(maintenance) = self.maintenances.get(maintenanceid) else {
                    continue;
                };
                let host_match = maintenance.hostids.iter().any(|id| hostids.contains(id))
                    || maintenance.groupids.iter().any(|groupid| {
                        self.nested_hostgroup_ids(*groupid)
                            .iter()
                            .any(|id| groupids.contains(id))
                    });
                if !host_match || !maintenance.tags_match(&query.tags) {
                    continue;
                }
                query
                    .maintenances
                    .push((maintenance.maintenanceid, maintenance.active_till));
                matched = true;
            }
        }
        matched
    }

    fn apply_trigger_changes(&self, diffs: &TriggerDiffs) {
        let mut triggers = self.triggers.write().unwrap_or_else(|p| p.into_inner());
        for diff in diffs.iter() {
            let Some(trigger) = triggers.get_mut(&diff.triggerid) else {
                continue;
            };
            if diff.flags.contains(DiffFlags::UPDATE_VALUE) {
                trigger.value = diff.value;
            }
            if diff.flags.contains(DiffFlags::UPDATE_LASTCHANGE) {
                trigger.lastchange = diff.lastchange;
            }
            if diff.flags.contains(DiffFlags::UPDATE_STATE) {
                trigger.state = diff.state;
            }
        }
    }
}

impl ItemScheduler for ConfigSnapshot {
    fn reschedule_items(&self, itemids: &[u64], now: i64) -> Vec<u64> {
        let mut nextchecks = self.nextchecks.lock().unwrap_or_else(|p| p.into_inner());
        itemids
            .iter()
            .map(|itemid| match self.items.get(itemid) {
                Some(item) => {
                    nextchecks.insert(*itemid, now);
                    self.hosts
                        .get(&item.hostid)
                        .map(|h| h.proxy_hostid)
                        .unwrap_or(0)
                }
                None => 0,
            })
            .collect()
    }
}
