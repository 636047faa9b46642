use super::nullable;
use crate::error::Result;
use crate::{decode, id_params, placeholders, Store};
use rusqlite::OptionalExtension;
use vigil_common::types::{AlertStatus, TaskStatus, TaskType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRow {
    pub taskid: u64,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub clock: i64,
    pub ttl: i64,
    /// 0 when the task is not bound to a proxy.
    pub proxy_hostid: u64,
}

/// Type specific payload written together with a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskDetail {
    CloseProblem { acknowledgeid: u64 },
    RemoteCommand { command: String, alertid: u64, parent_taskid: u64, hostid: u64 },
    RemoteCommandResult { status: i32, parent_taskid: u64, info: String },
    Acknowledge { acknowledgeid: u64 },
    CheckNow { itemid: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub taskid: u64,
    pub clock: i64,
    pub ttl: i64,
    pub proxy_hostid: u64,
    pub detail: TaskDetail,
}

impl NewTask {
    pub fn task_type(&self) -> TaskType {
        match self.detail {
            TaskDetail::CloseProblem { .. } => TaskType::CloseProblem,
            TaskDetail::RemoteCommand { .. } => TaskType::RemoteCommand,
            TaskDetail::RemoteCommandResult { .. } => TaskType::RemoteCommandResult,
            TaskDetail::Acknowledge { .. } => TaskType::Acknowledge,
            TaskDetail::CheckNow { .. } => TaskType::CheckNow,
        }
    }
}

/// Problem a close-problem task refers to, resolved through its
/// acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseProblemTarget {
    pub userid: u64,
    pub eventid: u64,
    pub triggerid: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommandResult {
    pub status: i32,
    pub info: String,
    pub parent_taskid: u64,
    /// Alert of the parent remote command, 0 when it has none.
    pub alertid: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcknowledgeTask {
    pub taskid: u64,
    pub acknowledgeid: u64,
    pub userid: u64,
    pub clock: i64,
    pub message: String,
    pub action: i32,
    /// `None` when the acknowledged event no longer exists.
    pub eventid: Option<u64>,
    pub objectid: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckNowTask {
    pub taskid: u64,
    pub status: TaskStatus,
    pub proxy_hostid: u64,
    /// `None` when the item was removed.
    pub itemid: Option<u64>,
}

impl Store {
    pub fn create_task(&self, task: &NewTask) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO task (taskid, type, status, clock, ttl, proxy_hostid) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    task.taskid as i64,
                    task.task_type().as_i32(),
                    TaskStatus::New.as_i32(),
                    task.clock,
                    task.ttl,
                    nullable(task.proxy_hostid),
                ],
            )?;

            let taskid = task.taskid as i64;
            match &task.detail {
                TaskDetail::CloseProblem { acknowledgeid } => conn.execute(
                    "INSERT INTO task_close_problem (taskid, acknowledgeid) VALUES (?1, ?2)",
                    rusqlite::params![taskid, *acknowledgeid as i64],
                )?,
                TaskDetail::RemoteCommand {
                    command,
                    alertid,
                    parent_taskid,
                    hostid,
                } => conn.execute(
                    "INSERT INTO task_remote_command (taskid, command, alertid, parent_taskid, hostid)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    rusqlite::params![
                        taskid,
                        command,
                        nullable(*alertid),
                        *parent_taskid as i64,
                        *hostid as i64,
                    ],
                )?,
                TaskDetail::RemoteCommandResult {
                    status,
                    parent_taskid,
                    info,
                } => conn.execute(
                    "INSERT INTO task_remote_command_result (taskid, status, parent_taskid, info)
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![taskid, status, *parent_taskid as i64, info],
                )?,
                TaskDetail::Acknowledge { acknowledgeid } => conn.execute(
                    "INSERT INTO task_acknowledge (taskid, acknowledgeid) VALUES (?1, ?2)",
                    rusqlite::params![taskid, *acknowledgeid as i64],
                )?,
                TaskDetail::CheckNow { itemid } => conn.execute(
                    "INSERT INTO task_check_now (taskid, itemid) VALUES (?1, ?2)",
                    rusqlite::params![taskid, *itemid as i64],
                )?,
            };
            Ok(())
        })
    }

    /// Tasks waiting for the server, new or in progress, ordered by taskid.
    pub fn pending_tasks(&self) -> Result<Vec<TaskRow>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT taskid, type, status, clock, ttl, proxy_hostid FROM task
                 WHERE status IN (?1, ?2) ORDER BY taskid",
            )?;
            let rows = stmt.query_map(
                rusqlite::params![TaskStatus::New.as_i32(), TaskStatus::InProgress.as_i32()],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, Option<i64>>(5)?,
                    ))
                },
            )?;

            let mut tasks = Vec::new();
            for row in rows {
                let (taskid, task_type, status, clock, ttl, proxy_hostid) = row?;
                let task_type = match TaskType::from_i32(task_type as i32) {
                    Some(task_type) => task_type,
                    None => {
                        tracing::debug!(taskid, task_type, "Skipping task of unknown type");
                        continue;
                    }
                };
                tasks.push(TaskRow {
                    taskid: taskid as u64,
                    task_type,
                    status: decode("task.status", status, TaskStatus::from_i32)?,
                    clock,
                    ttl,
                    proxy_hostid: proxy_hostid.unwrap_or(0) as u64,
                });
            }
            Ok(tasks)
        })
    }

    pub fn task_status(&self, taskid: u64) -> Result<Option<TaskStatus>> {
        self.with_connection(|conn| {
            let status: Option<i64> = conn
                .query_row(
                    "SELECT status FROM task WHERE taskid = ?1",
                    rusqlite::params![taskid as i64],
                    |row| row.get(0),
                )
                .optional()?;
            status
                .map(|s| decode("task.status", s, TaskStatus::from_i32))
                .transpose()
        })
    }

    pub fn task_proxy(&self, taskid: u64) -> Result<Option<u64>> {
        self.with_connection(|conn| {
            let proxy: Option<Option<i64>> = conn
                .query_row(
                    "SELECT proxy_hostid FROM task WHERE taskid = ?1",
                    rusqlite::params![taskid as i64],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(proxy.flatten().map(|p| p as u64))
        })
    }

    pub fn set_task_status(&self, taskids: &[u64], status: TaskStatus) -> Result<()> {
        if taskids.is_empty() {
            return Ok(());
        }
        self.with_connection(|conn| {
            let sql = format!(
                "UPDATE task SET status = ? WHERE taskid IN ({})",
                placeholders(taskids.len())
            );
            let mut params = vec![rusqlite::types::Value::Integer(status.as_i32() as i64)];
            params.extend(id_params(taskids));
            conn.execute(&sql, rusqlite::params_from_iter(params))?;
            Ok(())
        })
    }

    /// Marks tasks done and drops their proxy binding.
    pub fn finish_tasks_clear_proxy(&self, taskids: &[u64]) -> Result<()> {
        if taskids.is_empty() {
            return Ok(());
        }
        self.with_connection(|conn| {
            let sql = format!(
                "UPDATE task SET status = ?, proxy_hostid = NULL WHERE taskid IN ({})",
                placeholders(taskids.len())
            );
            let mut params = vec![rusqlite::types::Value::Integer(TaskStatus::Done.as_i32() as i64)];
            params.extend(id_params(taskids));
            conn.execute(&sql, rusqlite::params_from_iter(params))?;
            Ok(())
        })
    }

    pub fn update_task_proxy(&self, taskid: u64, proxy_hostid: u64) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "UPDATE task SET proxy_hostid = ?1 WHERE taskid = ?2",
                rusqlite::params![nullable(proxy_hostid), taskid as i64],
            )?;
            Ok(())
        })
    }

    /// Deletes finished tasks created at or before `before`.
    pub fn remove_finished_tasks(&self, before: i64) -> Result<usize> {
        self.with_connection(|conn| {
            let removed = conn.execute(
                "DELETE FROM task WHERE status IN (?1, ?2) AND clock <= ?3",
                rusqlite::params![TaskStatus::Done.as_i32(), TaskStatus::Expired.as_i32(), before],
            )?;
            for table in [
                "task_close_problem",
                "task_remote_command",
                "task_remote_command_result",
                "task_acknowledge",
                "task_check_now",
            ] {
                conn.execute(
                    &format!("DELETE FROM {table} WHERE taskid NOT IN (SELECT taskid FROM task)"),
                    [],
                )?;
            }
            Ok(removed)
        })
    }

    pub fn close_problem_target(&self, taskid: u64) -> Result<Option<CloseProblemTarget>> {
        self.with_connection(|conn| {
            let target = conn
                .query_row(
                    "SELECT a.userid, a.eventid, e.objectid
                     FROM task_close_problem tcp, acknowledges a, events e
                     WHERE tcp.acknowledgeid = a.acknowledgeid AND a.eventid = e.eventid AND tcp.taskid = ?1",
                    rusqlite::params![taskid as i64],
                    |row| {
                        Ok(CloseProblemTarget {
                            userid: row.get::<_, i64>(0)? as u64,
                            eventid: row.get::<_, i64>(1)? as u64,
                            triggerid: row.get::<_, i64>(2)? as u64,
                        })
                    },
                )
                .optional()?;
            Ok(target)
        })
    }

    /// Alert of a remote command task: outer `None` when the task has no
    /// detail row, inner `None` when no alert is attached.
    pub fn remote_command_alert(&self, taskid: u64) -> Result<Option<Option<u64>>> {
        self.with_connection(|conn| {
            let alertid: Option<Option<i64>> = conn
                .query_row(
                    "SELECT alertid FROM task_remote_command WHERE taskid = ?1",
                    rusqlite::params![taskid as i64],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(alertid.map(|a| a.map(|id| id as u64)))
        })
    }

    pub fn remote_command_result(&self, taskid: u64) -> Result<Option<RemoteCommandResult>> {
        self.with_connection(|conn| {
            let result = conn
                .query_row(
                    "SELECT r.status, r.info, r.parent_taskid, c.alertid
                     FROM task_remote_command_result r
                     LEFT JOIN task_remote_command c ON c.taskid = r.parent_taskid
                     WHERE r.taskid = ?1",
                    rusqlite::params![taskid as i64],
                    |row| {
                        Ok(RemoteCommandResult {
                            status: row.get(0)?,
                            info: row.get(1)?,
                            parent_taskid: row.get::<_, i64>(2)? as u64,
                            alertid: row.get::<_, Option<i64>>(3)?.unwrap_or(0) as u64,
                        })
                    },
                )
                .optional()?;
            Ok(result)
        })
    }

    /// Acknowledge tasks still in status new, joined to their events.
    pub fn acknowledge_tasks(&self, taskids: &[u64]) -> Result<Vec<AcknowledgeTask>> {
        if taskids.is_empty() {
            return Ok(Vec::new());
        }
        self.with_connection(|conn| {
            let sql = format!(
                "SELECT ta.taskid, ta.acknowledgeid, a.userid, a.clock, a.message, a.action, e.eventid, e.objectid
                 FROM task t
                 JOIN task_acknowledge ta ON ta.taskid = t.taskid
                 JOIN acknowledges a ON a.acknowledgeid = ta.acknowledgeid
                 LEFT JOIN events e ON e.eventid = a.eventid
                 WHERE t.status = ? AND t.taskid IN ({})
                 ORDER BY t.taskid",
                placeholders(taskids.len())
            );
            let mut params = vec![rusqlite::types::Value::Integer(TaskStatus::New.as_i32() as i64)];
            params.extend(id_params(taskids));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| {
                Ok(AcknowledgeTask {
                    taskid: row.get::<_, i64>(0)? as u64,
                    acknowledgeid: row.get::<_, i64>(1)? as u64,
                    userid: row.get::<_, i64>(2)? as u64,
                    clock: row.get(3)?,
                    message: row.get(4)?,
                    action: row.get(5)?,
                    eventid: row.get::<_, Option<i64>>(6)?.map(|id| id as u64),
                    objectid: row.get::<_, Option<i64>>(7)?.unwrap_or(0) as u64,
                })
            })?;
            let mut tasks = Vec::new();
            for row in rows {
                tasks.push(row?);
            }
            Ok(tasks)
        })
    }

    pub fn check_now_tasks(&self, taskids: &[u64]) -> Result<Vec<CheckNowTask>> {
        if taskids.is_empty() {
            return Ok(Vec::new());
        }
        self.with_connection(|conn| {
            let sql = format!(
                "SELECT t.taskid, t.status, t.proxy_hostid, tcn.itemid
                 FROM task t LEFT JOIN task_check_now tcn ON tcn.taskid = t.taskid
                 WHERE t.taskid IN ({}) ORDER BY t.taskid",
                placeholders(taskids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(id_params(taskids)), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                ))
            })?;
            let mut tasks = Vec::new();
            for row in rows {
                let (taskid, status, proxy_hostid, itemid) = row?;
                tasks.push(CheckNowTask {
                    taskid: taskid as u64,
                    status: decode("task.status", status, TaskStatus::from_i32)?,
                    proxy_hostid: proxy_hostid.unwrap_or(0) as u64,
                    itemid: itemid.map(|id| id as u64),
                });
            }
            Ok(tasks)
        })
    }

    pub fn insert_acknowledge(
        &self,
        acknowledgeid: u64,
        userid: u64,
        eventid: u64,
        clock: i64,
        message: &str,
    ) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO acknowledges (acknowledgeid, userid, eventid, clock, message) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![acknowledgeid as i64, userid as i64, eventid as i64, clock, message],
            )?;
            Ok(())
        })
    }

    pub fn insert_alert(&self, alertid: u64, eventid: u64, clock: i64, message: &str) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO alerts (alertid, eventid, clock, message, status) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    alertid as i64,
                    eventid as i64,
                    clock,
                    message,
                    AlertStatus::NotSent.as_i32(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn update_alert(&self, alertid: u64, status: AlertStatus, error: &str) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "UPDATE alerts SET status = ?1, error = ?2 WHERE alertid = ?3",
                rusqlite::params![status.as_i32(), error, alertid as i64],
            )?;
            Ok(())
        })
    }

    /// Status and error of an alert.
    pub fn alert(&self, alertid: u64) -> Result<Option<(AlertStatus, String)>> {
        self.with_connection(|conn| {
            let row: Option<(i64, String)> = conn
                .query_row(
                    "SELECT status, error FROM alerts WHERE alertid = ?1",
                    rusqlite::params![alertid as i64],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            match row {
                Some((status, error)) => Ok(Some((
                    decode("alerts.status", status, AlertStatus::from_i32)?,
                    error,
                ))),
                None => Ok(None),
            }
        })
    }
}
