#![allow(dead_code)]

use anyhow::Result;
use std::sync::Arc;
use tempfile::TempDir;
use vigil_common::config::{FunctionRef, HostInfo, ItemInfo, TriggerInfo};
use vigil_common::types::{TaskStatus, Timespec, TriggerDiffs, TriggerValue};
use vigil_dispatch::{ActionDispatcher, LoggingDispatcher};
use vigil_events::{ConfigSnapshot, EventProcessor, InMemoryTriggerLocker};
use vigil_server::config::TaskManagerConfig;
use vigil_server::taskmanager::TaskManager;
use vigil_storage::{NewTask, Store, TaskDetail};

pub const NOW: i64 = 1_700_000_000;

pub struct TestContext {
    pub temp_dir: TempDir,
    pub store: Arc<Store>,
    pub snapshot: Arc<ConfigSnapshot>,
    pub locker: InMemoryTriggerLocker,
}

/// Trigger 1 on host 1001 (monitored by the server, item 101) and host
/// 1002 behind proxy 900 (item 102).
pub fn build_test_context() -> Result<TestContext> {
    let temp_dir = tempfile::tempdir()?;
    let store = Arc::new(Store::open(&temp_dir.path().join("vigil.db"))?);

    let mut snapshot = ConfigSnapshot::new();
    for (hostid, proxy_hostid, itemid) in [(1001, 0, 101), (1002, 900, 102)] {
        snapshot.add_host(HostInfo {
            hostid,
            host: format!("host-{hostid}"),
            name: format!("Host {hostid}"),
            proxy_hostid,
            groupids: vec![],
        });
        snapshot.add_item(ItemInfo {
            itemid,
            hostid,
            key: "agent.ping".into(),
            tags: vec![],
        });
    }
    snapshot.add_function(FunctionRef {
        functionid: 11,
        itemid: 101,
        triggerid: 1,
    });
    snapshot.add_trigger(TriggerInfo::new(1, "Host unreachable", "{11}=0"));

    Ok(TestContext {
        temp_dir,
        store,
        snapshot: Arc::new(snapshot),
        locker: InMemoryTriggerLocker::new(),
    })
}

impl TestContext {
    pub fn processor(&self) -> EventProcessor {
        EventProcessor::new(
            self.store.clone(),
            self.snapshot.clone(),
            Arc::new(self.locker.clone()),
            Arc::new(LoggingDispatcher),
        )
    }

    pub fn manager(&self) -> TaskManager {
        self.manager_with(TaskManagerConfig::default())
    }

    pub fn manager_with(&self, config: TaskManagerConfig) -> TaskManager {
        self.manager_from(Arc::new(LoggingDispatcher), config)
    }

    pub fn manager_from(&self, dispatcher: Arc<dyn ActionDispatcher>, config: TaskManagerConfig) -> TaskManager {
        TaskManager::new(
            self.store.clone(),
            Arc::new(self.locker.clone()),
            self.snapshot.clone(),
            dispatcher,
            self.processor(),
            config,
        )
    }

    /// Opens a problem for trigger 1 and returns its eventid.
    pub fn open_problem(&self) -> Result<u64> {
        let mut processor = self.processor();
        let trigger = self
            .snapshot
            .trigger(1)
            .ok_or_else(|| anyhow::anyhow!("trigger 1 missing"))?;
        processor.stage_trigger(&trigger, Timespec::new(NOW - 60, 0), TriggerValue::Problem);
        let mut diffs = TriggerDiffs::new();
        let mut locked = Vec::new();
        processor.process_events(&mut diffs, &mut locked)?;
        self.query("SELECT MAX(eventid) FROM problem").map(|id| id as u64)
    }

    pub fn create_task(&self, taskid: u64, clock: i64, ttl: i64, proxy_hostid: u64, detail: TaskDetail) -> Result<()> {
        self.store.create_task(&NewTask {
            taskid,
            clock,
            ttl,
            proxy_hostid,
            detail,
        })?;
        Ok(())
    }

    pub fn status(&self, taskid: u64) -> Option<TaskStatus> {
        self.store.task_status(taskid).ok().flatten()
    }

    pub fn query(&self, sql: &str) -> Result<i64> {
        Ok(self
            .store
            .with_connection(|conn| Ok(conn.query_row(sql, [], |row| row.get(0))?))?)
    }
}
