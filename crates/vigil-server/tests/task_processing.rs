mod common;

use common::{build_test_context, NOW};
use std::sync::Arc;
use std::time::Duration;
use vigil_common::types::{AlertStatus, Event, TaskStatus, TriggerValue};
use vigil_dispatch::error::{DispatchError, Result as DispatchResult};
use vigil_dispatch::{Acknowledgement, ActionDispatcher, LoggingDispatcher, RecoveryPair};
use vigil_events::{EventProcessor, StoreTriggerLocker, TriggerLocker};
use vigil_server::config::TaskManagerConfig;
use vigil_server::taskmanager::TaskManager;
use vigil_storage::{Store, TaskDetail};

#[test]
fn close_problem_task_closes_problem_once() {
    let ctx = build_test_context().unwrap();
    let eventid = ctx.open_problem().unwrap();
    ctx.store.insert_acknowledge(1, 5, eventid, NOW, "closing").unwrap();
    ctx.create_task(10, NOW, 0, 0, TaskDetail::CloseProblem { acknowledgeid: 1 })
        .unwrap();

    let mut manager = ctx.manager();
    assert_eq!(manager.process_tasks(NOW).unwrap(), 1);
    assert_eq!(ctx.status(10), Some(TaskStatus::Done));
    assert_eq!(ctx.query("SELECT COUNT(*) FROM problem WHERE r_eventid IS NULL").unwrap(), 0);
    assert_eq!(ctx.query("SELECT userid FROM event_recovery").unwrap(), 5);
    assert_eq!(ctx.snapshot.trigger(1).unwrap().value, TriggerValue::Ok);
    assert!(!ctx.locker.is_locked(1));

    // finished tasks are never picked up again
    assert_eq!(manager.process_tasks(NOW).unwrap(), 0);
    assert_eq!(ctx.query("SELECT COUNT(*) FROM event_recovery").unwrap(), 1);
    assert_eq!(ctx.query("SELECT COUNT(*) FROM events").unwrap(), 2);
}

#[test]
fn close_problem_task_on_closed_problem_adds_no_recovery() {
    let ctx = build_test_context().unwrap();
    let eventid = ctx.open_problem().unwrap();
    assert!(ctx.processor().close_problem(1, eventid, 3).unwrap());

    ctx.store.insert_acknowledge(1, 5, eventid, NOW, "closing").unwrap();
    ctx.create_task(10, NOW, 0, 0, TaskDetail::CloseProblem { acknowledgeid: 1 })
        .unwrap();

    let mut manager = ctx.manager();
    manager.process_tasks(NOW).unwrap();
    assert_eq!(ctx.status(10), Some(TaskStatus::Done));
    assert_eq!(ctx.query("SELECT COUNT(*) FROM event_recovery").unwrap(), 1);
    assert_eq!(ctx.query("SELECT userid FROM event_recovery").unwrap(), 3);
}

#[test]
fn close_problem_task_waits_for_trigger_lock() {
    let ctx = build_test_context().unwrap();
    let eventid = ctx.open_problem().unwrap();
    ctx.store.insert_acknowledge(1, 5, eventid, NOW, "closing").unwrap();
    ctx.create_task(10, NOW, 0, 0, TaskDetail::CloseProblem { acknowledgeid: 1 })
        .unwrap();

    assert_eq!(ctx.locker.lock(&[1]), vec![1]);
    let mut manager = ctx.manager();
    assert_eq!(manager.process_tasks(NOW).unwrap(), 0);
    assert_eq!(ctx.status(10), Some(TaskStatus::New));
    assert_eq!(ctx.query("SELECT COUNT(*) FROM problem WHERE r_eventid IS NULL").unwrap(), 1);

    ctx.locker.unlock(&[1]);
    assert_eq!(manager.process_tasks(NOW).unwrap(), 1);
    assert_eq!(ctx.status(10), Some(TaskStatus::Done));
}

#[test]
fn close_problem_task_waits_for_lock_held_by_another_process() {
    let ctx = build_test_context().unwrap();
    let eventid = ctx.open_problem().unwrap();
    ctx.store.insert_acknowledge(1, 5, eventid, NOW, "closing").unwrap();
    ctx.create_task(10, NOW, 0, 0, TaskDetail::CloseProblem { acknowledgeid: 1 })
        .unwrap();

    let other = Arc::new(Store::open(&ctx.temp_dir.path().join("vigil.db")).unwrap());
    let cli = StoreTriggerLocker::new(other, "close-problem-4242");
    assert_eq!(cli.lock(&[1]), vec![1]);

    let locker = Arc::new(StoreTriggerLocker::new(ctx.store.clone(), "task-manager"));
    let processor = EventProcessor::new(
        ctx.store.clone(),
        ctx.snapshot.clone(),
        locker.clone(),
        Arc::new(LoggingDispatcher),
    );
    let mut manager = TaskManager::new(
        ctx.store.clone(),
        locker.clone(),
        ctx.snapshot.clone(),
        Arc::new(LoggingDispatcher),
        processor,
        TaskManagerConfig::default(),
    );
    assert_eq!(manager.process_tasks(NOW).unwrap(), 0);
    assert_eq!(ctx.status(10), Some(TaskStatus::New));

    cli.unlock(&[1]);
    assert_eq!(manager.process_tasks(NOW).unwrap(), 1);
    assert_eq!(ctx.status(10), Some(TaskStatus::Done));
    assert!(!locker.is_locked(1));
    assert_eq!(ctx.query("SELECT COUNT(*) FROM trigger_lock").unwrap(), 0);
}

#[test]
fn remote_command_expires_after_ttl() {
    let ctx = build_test_context().unwrap();
    ctx.store.insert_alert(7, 1, NOW - 100, "restart nginx").unwrap();
    let command = |alertid| TaskDetail::RemoteCommand {
        command: "systemctl restart nginx".into(),
        alertid,
        parent_taskid: 0,
        hostid: 1001,
    };
    ctx.create_task(20, NOW - 100, 30, 0, command(7)).unwrap();
    ctx.create_task(21, NOW - 100, 0, 0, command(0)).unwrap();
    ctx.create_task(22, NOW - 10, 30, 0, command(0)).unwrap();

    let mut manager = ctx.manager();
    assert_eq!(manager.process_tasks(NOW).unwrap(), 1);
    assert_eq!(ctx.status(20), Some(TaskStatus::Expired));
    assert_eq!(ctx.status(21), Some(TaskStatus::New));
    assert_eq!(ctx.status(22), Some(TaskStatus::New));
    assert_eq!(
        ctx.store.alert(7).unwrap(),
        Some((AlertStatus::Failed, "Remote command has been expired.".to_string()))
    );
}

#[test]
fn remote_command_result_updates_alert_and_parent() {
    let ctx = build_test_context().unwrap();
    ctx.store.insert_alert(7, 1, NOW, "ok command").unwrap();
    ctx.store.insert_alert(8, 1, NOW, "failing command").unwrap();
    for (taskid, alertid) in [(30, 7), (32, 8)] {
        ctx.create_task(
            taskid,
            NOW,
            0,
            900,
            TaskDetail::RemoteCommand {
                command: "uptime".into(),
                alertid,
                parent_taskid: 0,
                hostid: 1002,
            },
        )
        .unwrap();
    }
    ctx.create_task(
        31,
        NOW,
        0,
        0,
        TaskDetail::RemoteCommandResult {
            status: 0,
            parent_taskid: 30,
            info: String::new(),
        },
    )
    .unwrap();
    ctx.create_task(
        33,
        NOW,
        0,
        0,
        TaskDetail::RemoteCommandResult {
            status: -1,
            parent_taskid: 32,
            info: "Connection refused".into(),
        },
    )
    .unwrap();

    let mut manager = ctx.manager();
    assert_eq!(manager.process_tasks(NOW).unwrap(), 2);
    for taskid in [30, 31, 32, 33] {
        assert_eq!(ctx.status(taskid), Some(TaskStatus::Done), "task {taskid}");
    }
    assert_eq!(ctx.store.alert(7).unwrap().unwrap().0, AlertStatus::Sent);
    assert_eq!(
        ctx.store.alert(8).unwrap(),
        Some((AlertStatus::Failed, "Connection refused".to_string()))
    );
}

#[test]
fn acknowledge_tasks_are_done_even_without_event() {
    let ctx = build_test_context().unwrap();
    let eventid = ctx.open_problem().unwrap();
    ctx.store.insert_acknowledge(1, 5, eventid, NOW, "looking").unwrap();
    ctx.store.insert_acknowledge(2, 5, 999_999, NOW, "gone").unwrap();
    ctx.create_task(40, NOW, 0, 0, TaskDetail::Acknowledge { acknowledgeid: 1 })
        .unwrap();
    ctx.create_task(41, NOW, 0, 0, TaskDetail::Acknowledge { acknowledgeid: 2 })
        .unwrap();

    let mut manager = ctx.manager();
    assert_eq!(manager.process_tasks(NOW).unwrap(), 1);
    assert_eq!(ctx.status(40), Some(TaskStatus::Done));
    assert_eq!(ctx.status(41), Some(TaskStatus::Done));
}

struct FailingAcknowledgements;

impl ActionDispatcher for FailingAcknowledgements {
    fn process_events(&self, _events: &[Event], _closed: &[RecoveryPair]) -> DispatchResult<()> {
        Ok(())
    }

    fn process_acknowledgements(&self, _acknowledgements: &[Acknowledgement]) -> DispatchResult<usize> {
        Err(DispatchError::Action("escalator unavailable".into()))
    }
}

#[test]
fn failing_acknowledgements_do_not_block_other_tasks() {
    let ctx = build_test_context().unwrap();
    let eventid = ctx.open_problem().unwrap();
    ctx.store.insert_acknowledge(1, 5, eventid, NOW, "looking").unwrap();
    ctx.create_task(40, NOW, 0, 0, TaskDetail::Acknowledge { acknowledgeid: 1 })
        .unwrap();
    ctx.create_task(50, NOW, 0, 0, TaskDetail::CheckNow { itemid: 101 }).unwrap();
    ctx.create_task(51, NOW - 100, 10, 0, TaskDetail::CheckNow { itemid: 101 })
        .unwrap();

    let mut manager = ctx.manager_from(Arc::new(FailingAcknowledgements), TaskManagerConfig::default());
    assert_eq!(manager.process_tasks(NOW).unwrap(), 2);
    assert_eq!(ctx.status(40), Some(TaskStatus::New));
    assert_eq!(ctx.status(50), Some(TaskStatus::Done));
    assert_eq!(ctx.status(51), Some(TaskStatus::Expired));
}

#[test]
fn check_now_reschedules_items() {
    let ctx = build_test_context().unwrap();
    ctx.create_task(50, NOW, 0, 0, TaskDetail::CheckNow { itemid: 101 }).unwrap();
    ctx.create_task(51, NOW, 0, 0, TaskDetail::CheckNow { itemid: 102 }).unwrap();
    ctx.create_task(52, NOW, 0, 0, TaskDetail::CheckNow { itemid: 555 }).unwrap();
    ctx.create_task(53, NOW - 100, 10, 0, TaskDetail::CheckNow { itemid: 101 })
        .unwrap();
    ctx.create_task(54, NOW, 0, 900, TaskDetail::CheckNow { itemid: 102 })
        .unwrap();
    ctx.create_task(55, NOW, 0, 900, TaskDetail::CheckNow { itemid: 102 })
        .unwrap();
    ctx.store.set_task_status(&[55], TaskStatus::InProgress).unwrap();

    let mut manager = ctx.manager();
    manager.process_tasks(NOW).unwrap();

    // server monitored and unknown items are done
    assert_eq!(ctx.status(50), Some(TaskStatus::Done));
    assert_eq!(ctx.status(52), Some(TaskStatus::Done));
    assert_eq!(ctx.snapshot.nextcheck(101), Some(NOW));

    // handed to the proxy that monitors the item
    assert_eq!(ctx.status(51), Some(TaskStatus::New));
    assert_eq!(ctx.store.task_proxy(51).unwrap(), Some(900));
    assert_eq!(ctx.status(54), Some(TaskStatus::New));
    assert_eq!(ctx.store.task_proxy(54).unwrap(), Some(900));

    assert_eq!(ctx.status(53), Some(TaskStatus::Expired));
    assert_eq!(ctx.status(55), Some(TaskStatus::Done));
}

#[test]
fn cleanup_removes_old_finished_tasks() {
    let ctx = build_test_context().unwrap();
    let detail = || TaskDetail::CheckNow { itemid: 101 };
    ctx.create_task(60, NOW - 100_000, 0, 0, detail()).unwrap();
    ctx.create_task(61, NOW - 100_000, 0, 0, detail()).unwrap();
    ctx.create_task(62, NOW - 10, 0, 0, detail()).unwrap();
    ctx.store.set_task_status(&[60, 62], TaskStatus::Done).unwrap();

    let manager = ctx.manager();
    assert_eq!(manager.remove_old_tasks(NOW).unwrap(), 1);
    assert_eq!(ctx.status(60), None);
    assert_eq!(ctx.status(61), Some(TaskStatus::New));
    assert_eq!(ctx.status(62), Some(TaskStatus::Done));
    assert_eq!(ctx.query("SELECT COUNT(*) FROM task_check_now").unwrap(), 2);
}

#[tokio::test]
async fn run_loop_processes_tasks() {
    let ctx = build_test_context().unwrap();
    ctx.create_task(70, NOW, 0, 0, TaskDetail::CheckNow { itemid: 101 }).unwrap();

    let manager = ctx.manager_with(TaskManagerConfig {
        process_period_secs: 1,
        cleanup_period_secs: 3600,
        task_retention_secs: 86400,
    });
    let handle = tokio::spawn(manager.run());

    let mut status = ctx.status(70);
    for _ in 0..50 {
        if status == Some(TaskStatus::Done) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        status = ctx.status(70);
    }
    handle.abort();
    assert_eq!(status, Some(TaskStatus::Done));
}
