//! Periodic processing of server tasks.
//!
//! Each task moves `new -> in progress -> done | expired`; only tasks in the
//! first two states are picked up, so a finished task is never touched again.

use crate::config::TaskManagerConfig;
use anyhow::Result;
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use vigil_common::types::{AlertStatus, TaskStatus, TaskType};
use vigil_dispatch::{Acknowledgement, ActionDispatcher};
use vigil_events::{EventProcessor, ItemScheduler, TriggerLocker};
use vigil_storage::{CheckNowTask, Store, TaskRow};

const REMOTE_COMMAND_EXPIRED: &str = "Remote command has been expired.";

pub struct TaskManager {
    store: Arc<Store>,
    locker: Arc<dyn TriggerLocker>,
    scheduler: Arc<dyn ItemScheduler>,
    dispatcher: Arc<dyn ActionDispatcher>,
    processor: EventProcessor,
    config: TaskManagerConfig,
}

impl TaskManager {
    pub fn new(
        store: Arc<Store>,
        locker: Arc<dyn TriggerLocker>,
        scheduler: Arc<dyn ItemScheduler>,
        dispatcher: Arc<dyn ActionDispatcher>,
        processor: EventProcessor,
        config: TaskManagerConfig,
    ) -> Self {
        Self {
            store,
            locker,
            scheduler,
            dispatcher,
            processor,
            config,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(
            process_period_secs = self.config.process_period_secs,
            cleanup_period_secs = self.config.cleanup_period_secs,
            "Task manager started"
        );

        let mut process_tick = interval(Duration::from_secs(self.config.process_period_secs.max(1)));
        process_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cleanup_tick = interval(Duration::from_secs(self.config.cleanup_period_secs.max(1)));
        cleanup_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = process_tick.tick() => {
                    let now = chrono::Utc::now().timestamp();
                    match self.process_tasks(now) {
                        Ok(0) => {}
                        Ok(processed) => tracing::debug!(processed, "Tasks processed"),
                        Err(e) => tracing::error!(error = %e, "Task processing cycle failed"),
                    }
                }
                _ = cleanup_tick.tick() => {
                    let now = chrono::Utc::now().timestamp();
                    match self.remove_old_tasks(now) {
                        Ok(0) => {}
                        Ok(removed) => tracing::info!(removed, "Removed finished tasks"),
                        Err(e) => tracing::error!(error = %e, "Task cleanup failed"),
                    }
                }
            }
        }
    }

    /// Runs every pending task once and returns how many were processed or
    /// expired. A failing task or batch is logged and left for the next
    /// round; only failing to read the pending tasks is an error.
    pub fn process_tasks(&mut self, now: i64) -> Result<usize> {
        let tasks = self.store.pending_tasks()?;
        let mut processed = 0;
        let mut ack_taskids = Vec::new();
        let mut check_now_taskids = Vec::new();
        let mut expire_taskids = Vec::new();

        for task in &tasks {
            match task.task_type {
                TaskType::CloseProblem => match self.close_problem(task.taskid) {
                    Ok(true) => processed += 1,
                    Ok(false) => {}
                    Err(e) => tracing::error!(taskid = task.taskid, error = %e, "Close problem task failed"),
                },
                TaskType::RemoteCommand => {
                    if is_expired(task, now) {
                        match self.expire_remote_command(task.taskid) {
                            Ok(()) => processed += 1,
                            Err(e) => {
                                tracing::error!(taskid = task.taskid, error = %e, "Cannot expire remote command")
                            }
                        }
                    }
                }
                TaskType::RemoteCommandResult => match self.remote_command_result(task.taskid) {
                    Ok(true) => processed += 1,
                    Ok(false) => {}
                    Err(e) => {
                        tracing::error!(taskid = task.taskid, error = %e, "Remote command result task failed")
                    }
                },
                TaskType::Acknowledge => ack_taskids.push(task.taskid),
                TaskType::CheckNow => {
                    if is_expired(task, now) {
                        expire_taskids.push(task.taskid);
                    } else {
                        check_now_taskids.push(task.taskid);
                    }
                }
                TaskType::UpdateEventNames => {
                    tracing::debug!(taskid = task.taskid, "Event name update tasks are not handled by the server");
                }
            }
        }

        if !ack_taskids.is_empty() {
            match self.process_acknowledgements(&ack_taskids) {
                Ok(count) => processed += count,
                Err(e) => tracing::error!(tasks = ack_taskids.len(), error = %e, "Acknowledge tasks failed"),
            }
        }
        if !check_now_taskids.is_empty() {
            match self.process_check_now(&check_now_taskids, now) {
                Ok(count) => processed += count,
                Err(e) => tracing::error!(tasks = check_now_taskids.len(), error = %e, "Check now tasks failed"),
            }
        }
        if !expire_taskids.is_empty() {
            match self.store.set_task_status(&expire_taskids, TaskStatus::Expired) {
                Ok(()) => processed += expire_taskids.len(),
                Err(e) => tracing::error!(tasks = expire_taskids.len(), error = %e, "Cannot expire check now tasks"),
            }
        }
        Ok(processed)
    }

    /// Returns false when the source trigger is busy; the task stays new.
    fn close_problem(&mut self, taskid: u64) -> Result<bool> {
        let Some(target) = self.store.close_problem_target(taskid)? else {
            tracing::debug!(taskid, "Close problem task has no acknowledged event");
            self.store.set_task_status(&[taskid], TaskStatus::Done)?;
            return Ok(true);
        };

        let locked = self.locker.lock(&[target.triggerid]);
        if locked.is_empty() {
            tracing::debug!(taskid, triggerid = target.triggerid, "Trigger is locked, retrying later");
            return Ok(false);
        }

        let result = self
            .processor
            .close_problem(target.triggerid, target.eventid, target.userid);
        self.locker.unlock(&locked);
        result?;

        self.store.set_task_status(&[taskid], TaskStatus::Done)?;
        Ok(true)
    }

    fn expire_remote_command(&self, taskid: u64) -> Result<()> {
        self.store.transaction(|store| -> Result<()> {
            if let Some(Some(alertid)) = store.remote_command_alert(taskid)? {
                store.update_alert(alertid, AlertStatus::Failed, REMOTE_COMMAND_EXPIRED)?;
            }
            store.set_task_status(&[taskid], TaskStatus::Expired)?;
            Ok(())
        })?;
        tracing::info!(taskid, "Remote command expired");
        Ok(())
    }

    fn remote_command_result(&self, taskid: u64) -> Result<bool> {
        self.store.transaction(|store| -> Result<bool> {
            let Some(result) = store.remote_command_result(taskid)? else {
                store.set_task_status(&[taskid], TaskStatus::Done)?;
                return Ok(false);
            };

            if result.alertid != 0 {
                if result.status == 0 {
                    store.update_alert(result.alertid, AlertStatus::Sent, "")?;
                } else {
                    store.update_alert(result.alertid, AlertStatus::Failed, &result.info)?;
                }
            }

            let mut taskids = vec![taskid];
            if result.parent_taskid != 0 {
                taskids.push(result.parent_taskid);
            }
            store.set_task_status(&taskids, TaskStatus::Done)?;
            Ok(true)
        })
    }

    /// Every listed task is marked done, including those whose event is gone.
    fn process_acknowledgements(&self, taskids: &[u64]) -> Result<usize> {
        let tasks = self.store.acknowledge_tasks(taskids)?;

        let mut acknowledgements = Vec::with_capacity(tasks.len());
        for task in tasks {
            let Some(eventid) = task.eventid else {
                tracing::debug!(taskid = task.taskid, "Acknowledged event was removed");
                continue;
            };
            acknowledgements.push(Acknowledgement {
                acknowledgeid: task.acknowledgeid,
                eventid,
                objectid: task.objectid,
                userid: task.userid,
                clock: task.clock,
                message: task.message,
                action: task.action,
            });
        }

        let processed = if acknowledgements.is_empty() {
            0
        } else {
            self.dispatcher.process_acknowledgements(&acknowledgements)?
        };

        self.store.set_task_status(taskids, TaskStatus::Done)?;
        Ok(processed)
    }

    fn process_check_now(&self, taskids: &[u64], now: i64) -> Result<usize> {
        let mut done = Vec::new();
        let mut pending: Vec<(CheckNowTask, u64)> = Vec::new();

        for task in self.store.check_now_tasks(taskids)? {
            match task.itemid {
                None => done.push(task.taskid),
                // already handed over to the proxy
                Some(_) if task.proxy_hostid != 0 && task.status == TaskStatus::InProgress => {
                    done.push(task.taskid)
                }
                Some(itemid) => pending.push((task, itemid)),
            }
        }

        let mut processed = 0;
        if !pending.is_empty() {
            let itemids: Vec<u64> = pending.iter().map(|(_, itemid)| *itemid).collect();
            let proxies = self.scheduler.reschedule_items(&itemids, now);

            for ((task, _), proxy_hostid) in pending.iter().zip(proxies) {
                if proxy_hostid == 0 {
                    self.store.finish_tasks_clear_proxy(&[task.taskid])?;
                    processed += 1;
                } else if proxy_hostid != task.proxy_hostid {
                    self.store.update_task_proxy(task.taskid, proxy_hostid)?;
                }
            }
        }

        self.store.set_task_status(&done, TaskStatus::Done)?;
        Ok(processed)
    }

    /// Deletes done and expired tasks older than the retention window.
    pub fn remove_old_tasks(&self, now: i64) -> Result<usize> {
        let removed = self
            .store
            .remove_finished_tasks(now - self.config.task_retention_secs)?;
        Ok(removed)
    }
}

fn is_expired(task: &TaskRow, now: i64) -> bool {
    task.ttl != 0 && task.clock + task.ttl < now
}
