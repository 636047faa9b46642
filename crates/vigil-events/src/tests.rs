use crate::cache::{CloseIntent, EventCache};
use crate::{ConfigSnapshot, EventProcessor, InMemoryTriggerLocker, TriggerLocker};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use vigil_common::config::{
    FunctionRef, HostGroup, HostInfo, ItemInfo, Maintenance, MaintenanceTagEval, TriggerInfo,
};
use vigil_common::correlation::{Condition, ConditionKind, Correlation, EvalType, Operation};
use vigil_common::types::{
    CorrelationMode, Event, EventFlags, EventObject, ItemState, Severity, Tag, Timespec,
    TriggerDiffs, TriggerState, TriggerValue,
};
use vigil_dispatch::error::Result as DispatchResult;
use vigil_dispatch::export::ProblemExporter;
use vigil_dispatch::{Acknowledgement, ActionDispatcher, RecoveryPair};
use vigil_storage::Store;

#[derive(Default)]
struct RecordingDispatcher {
    batches: Mutex<Vec<(Vec<Event>, Vec<RecoveryPair>)>>,
}

impl RecordingDispatcher {
    fn batches(&self) -> Vec<(Vec<Event>, Vec<RecoveryPair>)> {
        self.batches.lock().unwrap().clone()
    }
}

impl ActionDispatcher for RecordingDispatcher {
    fn process_events(&self, events: &[Event], closed: &[RecoveryPair]) -> DispatchResult<()> {
        self.batches
            .lock()
            .unwrap()
            .push((events.to_vec(), closed.to_vec()));
        Ok(())
    }

    fn process_acknowledgements(&self, acknowledgements: &[Acknowledgement]) -> DispatchResult<usize> {
        Ok(acknowledgements.len())
    }
}

fn trigger(triggerid: u64, functionid: u64) -> TriggerInfo {
    let mut trigger = TriggerInfo::new(
        triggerid,
        format!("Trigger {triggerid} on {{HOST.NAME}}"),
        format!("{{{functionid}}}>90"),
    );
    trigger.priority = Severity::High;
    trigger
}

/// Two triggers on one host: trigger 1 uses function 11 on item 101,
/// trigger 2 uses function 12 on item 102.
fn base_config() -> ConfigSnapshot {
    let mut config = ConfigSnapshot::new();
    config.add_host_group(HostGroup {
        groupid: 50,
        name: "Linux servers".into(),
    });
    config.add_host(HostInfo {
        hostid: 1001,
        host: "web-01".into(),
        name: "Web 01".into(),
        proxy_hostid: 0,
        groupids: vec![50],
    });
    for (triggerid, functionid, itemid) in [(1, 11, 101), (2, 12, 102)] {
        config.add_item(ItemInfo {
            itemid,
            hostid: 1001,
            key: format!("system.cpu[{itemid}]"),
            tags: vec![],
        });
        config.add_function(FunctionRef {
            functionid,
            itemid,
            triggerid,
        });
        config.add_trigger(trigger(triggerid, functionid));
    }
    config
}

fn rule(correlationid: u64, kind: ConditionKind, operation: Operation) -> Correlation {
    Correlation {
        correlationid,
        name: format!("rule {correlationid}"),
        evaltype: EvalType::Custom,
        formula: "{1}".into(),
        conditions: vec![Condition {
            corr_conditionid: 1,
            kind,
        }],
        operations: vec![operation],
    }
}

struct Harness {
    _dir: TempDir,
    store: Arc<Store>,
    config: Arc<ConfigSnapshot>,
    locker: InMemoryTriggerLocker,
    dispatcher: Arc<RecordingDispatcher>,
    processor: EventProcessor,
}

impl Harness {
    fn new(config: ConfigSnapshot, correlations: &[Correlation]) -> Self {
        Self::build(config, correlations, None)
    }

    fn build(mut config: ConfigSnapshot, correlations: &[Correlation], exporter: Option<ProblemExporter>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(&dir.path().join("vigil.db")).unwrap());
        for correlation in correlations {
            store.save_correlation(correlation).unwrap();
            config.add_correlation(correlation.clone());
        }
        let config = Arc::new(config);
        let locker = InMemoryTriggerLocker::new();
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let mut processor = EventProcessor::new(
            store.clone(),
            config.clone(),
            Arc::new(locker.clone()),
            dispatcher.clone(),
        );
        if let Some(exporter) = exporter {
            processor = processor.with_exporter(exporter);
        }
        Self {
            _dir: dir,
            store,
            config,
            locker,
            dispatcher,
            processor,
        }
    }

    fn stage(&mut self, triggerid: u64, value: TriggerValue, tags: &[(&str, &str)]) {
        let mut trigger = self.config.trigger(triggerid).unwrap();
        trigger.tags = tags.iter().map(|(t, v)| Tag::new(*t, *v)).collect();
        self.processor.stage_trigger(&trigger, Timespec::new(1000, 0), value);
    }

    fn cycle(&mut self) -> (usize, TriggerDiffs, Vec<u64>) {
        let mut diffs = TriggerDiffs::new();
        let mut locked = Vec::new();
        let processed = self.processor.process_events(&mut diffs, &mut locked).unwrap();
        (processed, diffs, locked)
    }

    fn query(&self, sql: &str) -> i64 {
        self.store
            .with_connection(|conn| Ok(conn.query_row(sql, [], |row| row.get(0))?))
            .unwrap()
    }
}

#[test]
fn problem_event_opens_problem() {
    let mut h = Harness::new(base_config(), &[]);
    h.stage(1, TriggerValue::Problem, &[("service", "web")]);

    let (processed, diffs, _) = h.cycle();
    assert_eq!(processed, 1);
    assert_eq!(h.query("SELECT COUNT(*) FROM problem WHERE objectid = 1 AND r_eventid IS NULL"), 1);
    assert_eq!(h.query("SELECT severity FROM problem"), Severity::High.as_i32() as i64);
    assert_eq!(h.query("SELECT COUNT(*) FROM problem_tag WHERE tag = 'service' AND value = 'web'"), 1);

    let diff = diffs.find(1).unwrap();
    assert_eq!(diff.value, TriggerValue::Problem);
    assert_eq!(diff.problem_count, 1);
    assert_eq!(diff.lastchange, 1000);
    assert_eq!(h.config.trigger(1).unwrap().value, TriggerValue::Problem);

    let batches = h.dispatcher.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].0[0].name, "Trigger 1 on Web 01");
    assert!(h.processor.cache().is_empty());
}

#[test]
fn ok_event_recovers_every_problem_without_tag_correlation() {
    let mut h = Harness::new(base_config(), &[]);
    h.stage(1, TriggerValue::Problem, &[]);
    h.stage(1, TriggerValue::Problem, &[]);
    h.cycle();
    assert_eq!(h.query("SELECT COUNT(*) FROM problem WHERE r_eventid IS NULL"), 2);

    h.stage(1, TriggerValue::Ok, &[]);
    let (processed, diffs, _) = h.cycle();
    assert_eq!(processed, 1);
    assert_eq!(h.query("SELECT COUNT(*) FROM problem WHERE r_eventid IS NULL"), 0);
    assert_eq!(h.query("SELECT COUNT(*) FROM event_recovery"), 2);

    let diff = diffs.find(1).unwrap();
    assert_eq!(diff.value, TriggerValue::Ok);
    assert_eq!(diff.problem_count, 0);

    let (_, closed) = h.dispatcher.batches().pop().unwrap();
    assert_eq!(closed.len(), 2);
    assert!(closed[0].problem_eventid < closed[1].problem_eventid);
}

#[test]
fn tag_correlated_ok_event_keeps_unmatched_problems() {
    let mut config = base_config();
    let mut t1 = trigger(1, 11);
    t1.correlation_mode = CorrelationMode::Tag;
    t1.correlation_tag = "service".into();
    config.add_trigger(t1);
    let mut h = Harness::new(config, &[]);

    h.stage(1, TriggerValue::Problem, &[("service", "db")]);
    h.stage(1, TriggerValue::Problem, &[("service", "web")]);
    h.cycle();

    h.stage(1, TriggerValue::Ok, &[("service", "db")]);
    let (processed, diffs, _) = h.cycle();
    assert_eq!(processed, 1);
    assert_eq!(h.query("SELECT COUNT(*) FROM problem WHERE r_eventid IS NULL"), 1);
    assert_eq!(
        h.query(
            "SELECT COUNT(*) FROM problem p JOIN problem_tag t ON p.eventid = t.eventid
             WHERE p.r_eventid IS NULL AND t.value = 'web'"
        ),
        1
    );
    let diff = diffs.find(1).unwrap();
    assert_eq!(diff.value, TriggerValue::Problem);
    assert_eq!(diff.problem_count, 1);

    // nothing matches: the OK event itself is dropped
    h.stage(1, TriggerValue::Ok, &[("service", "cache")]);
    let (processed, diffs, _) = h.cycle();
    assert_eq!(processed, 0);
    assert_eq!(h.query("SELECT COUNT(*) FROM problem WHERE r_eventid IS NULL"), 1);
    assert_eq!(diffs.find(1).unwrap().value, TriggerValue::Problem);
}

#[test]
fn empty_cycle_writes_nothing() {
    let mut h = Harness::new(base_config(), &[]);
    let (processed, diffs, locked) = h.cycle();
    assert_eq!(processed, 0);
    assert!(diffs.is_empty());
    assert!(locked.is_empty());
    assert_eq!(h.query("SELECT COUNT(*) FROM ids"), 0);
    assert_eq!(h.query("SELECT COUNT(*) FROM events"), 0);
    assert!(h.dispatcher.batches().is_empty());
}

#[test]
fn problem_recovered_once_when_resolver_and_correlation_agree() {
    let correlation = rule(
        10,
        ConditionKind::OldEventTag {
            tag: "service".into(),
        },
        Operation::CloseOld,
    );
    let mut h = Harness::new(base_config(), &[correlation]);
    h.stage(1, TriggerValue::Problem, &[("service", "db")]);
    h.cycle();

    h.stage(1, TriggerValue::Ok, &[]);
    let (processed, _, locked) = h.cycle();
    assert_eq!(processed, 1);
    assert!(locked.is_empty());
    assert_eq!(h.query("SELECT COUNT(*) FROM event_recovery"), 1);
    assert_eq!(h.query("SELECT COUNT(*) FROM events"), 2);
    assert_eq!(h.processor.cache().closing_queue().count(), 0);
}

#[test]
fn new_event_condition_without_tag_queues_nothing() {
    let correlation = rule(
        11,
        ConditionKind::NewEventTag {
            tag: "incident".into(),
        },
        Operation::CloseOld,
    );
    let mut h = Harness::new(base_config(), &[correlation]);
    h.stage(2, TriggerValue::Problem, &[]);
    h.cycle();

    h.stage(1, TriggerValue::Problem, &[("service", "db")]);
    let (_, _, locked) = h.cycle();
    assert!(locked.is_empty());
    assert_eq!(h.processor.cache().closing_queue().count(), 0);
    assert_eq!(h.query("SELECT COUNT(*) FROM problem WHERE r_eventid IS NULL"), 2);
}

fn tag_pair_rule() -> Correlation {
    rule(
        20,
        ConditionKind::EventTagPair {
            oldtag: "service".into(),
            newtag: "service".into(),
        },
        Operation::CloseOld,
    )
}

#[test]
fn close_old_closes_problem_under_trigger_lock() {
    let mut h = Harness::new(base_config(), &[tag_pair_rule()]);
    h.stage(2, TriggerValue::Problem, &[("service", "db")]);
    h.cycle();
    let old = h.query("SELECT eventid FROM problem WHERE objectid = 2");

    h.stage(1, TriggerValue::Problem, &[("service", "db")]);
    let (processed, diffs, locked) = h.cycle();
    assert_eq!(processed, 2);
    assert_eq!(locked, vec![2]);
    assert!(h.locker.is_locked(2));

    let new = h.query("SELECT eventid FROM problem WHERE objectid = 1");
    assert_eq!(
        h.query(&format!("SELECT COUNT(*) FROM problem WHERE eventid = {old} AND r_eventid IS NOT NULL")),
        1
    );
    assert_eq!(h.query(&format!("SELECT correlationid FROM event_recovery WHERE eventid = {old}")), 20);
    assert_eq!(h.query(&format!("SELECT c_eventid FROM event_recovery WHERE eventid = {old}")), new);

    assert_eq!(diffs.find(2).unwrap().value, TriggerValue::Ok);
    assert_eq!(diffs.find(2).unwrap().problem_count, 0);
    assert_eq!(diffs.find(1).unwrap().value, TriggerValue::Problem);
    assert_eq!(h.config.trigger(2).unwrap().value, TriggerValue::Ok);
}

#[test]
fn close_old_waits_for_busy_trigger() {
    let mut h = Harness::new(base_config(), &[tag_pair_rule()]);
    h.stage(2, TriggerValue::Problem, &[("service", "db")]);
    h.cycle();
    let old = h.query("SELECT eventid FROM problem WHERE objectid = 2");

    assert_eq!(h.locker.lock(&[2]), vec![2]);
    h.stage(1, TriggerValue::Problem, &[("service", "db")]);
    let (_, _, locked) = h.cycle();
    assert!(locked.is_empty());
    assert_eq!(h.processor.cache().closing_queue().count(), 1);
    assert_eq!(
        h.query(&format!("SELECT COUNT(*) FROM problem WHERE eventid = {old} AND r_eventid IS NULL")),
        1
    );

    h.locker.unlock(&[2]);
    let (processed, diffs, locked) = h.cycle();
    assert_eq!(processed, 1);
    assert_eq!(locked, vec![2]);
    assert_eq!(h.processor.cache().closing_queue().count(), 0);
    assert_eq!(
        h.query(&format!("SELECT COUNT(*) FROM problem WHERE eventid = {old} AND r_eventid IS NULL")),
        0
    );
    assert_eq!(diffs.find(2).unwrap().value, TriggerValue::Ok);
}

#[test]
fn close_new_recovers_new_problem_without_actions() {
    let correlation = rule(
        30,
        ConditionKind::NewEventTag { tag: "noise".into() },
        Operation::CloseNew,
    );
    let mut h = Harness::new(base_config(), &[correlation]);
    h.stage(1, TriggerValue::Problem, &[("noise", "yes")]);

    let (processed, diffs, locked) = h.cycle();
    assert_eq!(processed, 2);
    assert!(locked.is_empty());
    assert_eq!(h.query("SELECT COUNT(*) FROM problem WHERE r_eventid IS NULL"), 0);
    assert_eq!(h.query("SELECT correlationid FROM problem"), 30);

    let (events, closed) = h.dispatcher.batches().pop().unwrap();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.flags.contains(EventFlags::NO_ACTION)));
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].problem_eventid, events[0].eventid);

    let diff = diffs.find(1).unwrap();
    assert_eq!(diff.value, TriggerValue::Ok);
    assert_eq!(diff.problem_count, 0);
}

#[test]
fn broken_rules_are_skipped_and_valid_rule_still_fires() {
    let condition = |corr_conditionid| Condition {
        corr_conditionid,
        kind: ConditionKind::NewEventTag { tag: "noise".into() },
    };
    let unknown_condition = Correlation {
        formula: "{51} or {99}".into(),
        conditions: vec![condition(51)],
        ..rule(5, ConditionKind::NewEventTag { tag: "noise".into() }, Operation::CloseOld)
    };
    let malformed = Correlation {
        formula: "{61} and".into(),
        conditions: vec![condition(61)],
        ..rule(6, ConditionKind::NewEventTag { tag: "noise".into() }, Operation::CloseNew)
    };
    let valid = rule(
        30,
        ConditionKind::NewEventTag { tag: "noise".into() },
        Operation::CloseNew,
    );
    let mut h = Harness::new(base_config(), &[unknown_condition, malformed, valid]);
    h.stage(2, TriggerValue::Problem, &[("noise", "yes")]);
    h.cycle();
    assert_eq!(h.query("SELECT correlationid FROM problem WHERE objectid = 2"), 30);

    h.stage(1, TriggerValue::Problem, &[("noise", "yes")]);
    let mut diffs = TriggerDiffs::new();
    let mut locked = Vec::new();
    let processed = h.processor.process_events(&mut diffs, &mut locked);
    assert_eq!(processed.ok(), Some(2));
    assert!(locked.is_empty());
    assert_eq!(h.processor.cache().closing_queue().count(), 0);
    assert_eq!(h.query("SELECT COUNT(*) FROM problem WHERE r_eventid IS NULL"), 0);
    assert_eq!(h.query("SELECT correlationid FROM problem WHERE objectid = 1"), 30);
}

#[test]
fn recovery_from_leading_flush_is_not_correlated() {
    let close_all = Correlation {
        formula: String::new(),
        conditions: vec![],
        ..rule(40, ConditionKind::NewEventTag { tag: "unused".into() }, Operation::CloseOld)
    };
    let mut config = base_config();
    config.add_dependency(2, 1);
    let mut h = Harness::new(config, &[close_all]);

    h.stage(2, TriggerValue::Problem, &[]);
    h.cycle();

    assert_eq!(h.locker.lock(&[2]), vec![2]);
    h.stage(1, TriggerValue::Problem, &[]);
    h.cycle();
    assert_eq!(h.processor.cache().closing_queue().count(), 1);
    h.locker.unlock(&[2]);

    // trigger 1 is now a failing master, so this event is dropped
    h.stage(2, TriggerValue::Problem, &[]);
    let (processed, _, locked) = h.cycle();
    assert_eq!(processed, 1);
    assert_eq!(locked, vec![2]);
    assert_eq!(h.query("SELECT COUNT(*) FROM problem WHERE objectid = 2 AND r_eventid IS NULL"), 0);
    assert_eq!(h.query("SELECT COUNT(*) FROM problem WHERE objectid = 1 AND r_eventid IS NULL"), 1);
}

#[test]
fn dependency_on_failed_trigger_drops_event() {
    let mut config = base_config();
    let mut master = trigger(1, 11);
    master.value = TriggerValue::Problem;
    config.add_trigger(master);
    config.add_dependency(2, 1);
    let mut h = Harness::new(config, &[]);

    h.stage(2, TriggerValue::Problem, &[]);
    let (processed, diffs, _) = h.cycle();
    assert_eq!(processed, 0);
    assert_eq!(h.query("SELECT COUNT(*) FROM problem"), 0);
    assert!(diffs.find(2).unwrap().flags.is_unset());
}

#[test]
fn dependency_on_master_failing_in_same_cycle() {
    let mut config = base_config();
    config.add_dependency(2, 1);
    let mut h = Harness::new(config, &[]);

    h.stage(1, TriggerValue::Problem, &[]);
    h.stage(2, TriggerValue::Problem, &[]);
    let (processed, _, _) = h.cycle();
    assert_eq!(processed, 1);
    assert_eq!(h.query("SELECT objectid FROM problem"), 1);
}

#[test]
fn maintenance_suppresses_new_problem() {
    let mut config = base_config();
    let maintenance = |maintenanceid| Maintenance {
        maintenanceid,
        name: format!("window {maintenanceid}"),
        active_since: 0,
        active_till: 4_102_444_800,
        hostids: vec![1001],
        groupids: vec![],
        tags_evaltype: MaintenanceTagEval::AndOr,
        tags: vec![],
    };
    config.add_maintenance(maintenance(5));
    // known to the snapshot only, as if deleted meanwhile
    config.add_maintenance(maintenance(6));
    let mut h = Harness::new(config, &[]);
    h.store.save_maintenance(&maintenance(5)).unwrap();

    h.stage(1, TriggerValue::Problem, &[]);
    h.cycle();
    assert_eq!(h.query("SELECT COUNT(*) FROM event_suppress"), 1);
    assert_eq!(h.query("SELECT maintenanceid FROM event_suppress"), 5);
    assert_eq!(h.query("SELECT suppress_until FROM event_suppress"), 4_102_444_800);

    let (events, _) = h.dispatcher.batches().pop().unwrap();
    assert!(events[0].suppressed);
}

#[test]
fn close_problem_records_user_and_is_not_repeated() {
    let mut h = Harness::new(base_config(), &[]);
    h.stage(1, TriggerValue::Problem, &[]);
    h.cycle();
    let eventid = h.query("SELECT eventid FROM problem") as u64;

    assert!(h.processor.close_problem(1, eventid, 7).unwrap());
    assert_eq!(h.query("SELECT userid FROM problem"), 7);
    assert_eq!(h.query("SELECT userid FROM event_recovery"), 7);
    assert_eq!(h.config.trigger(1).unwrap().value, TriggerValue::Ok);

    assert!(!h.processor.close_problem(1, eventid, 7).unwrap());
    assert!(!h.processor.close_problem(99, eventid, 7).unwrap());
    assert_eq!(h.query("SELECT COUNT(*) FROM event_recovery"), 1);
    assert_eq!(h.query("SELECT COUNT(*) FROM events"), 2);
}

#[test]
fn export_writes_problem_and_recovery_lines() {
    let export_dir = tempfile::tempdir().unwrap();
    let exporter = ProblemExporter::new(export_dir.path(), "test", 1, 0, Duration::from_millis(10));
    let path = exporter.path().to_path_buf();
    let mut h = Harness::build(base_config(), &[], Some(exporter));

    h.stage(1, TriggerValue::Problem, &[("service", "web")]);
    h.cycle();
    h.stage(1, TriggerValue::Ok, &[]);
    h.cycle();

    let content = std::fs::read_to_string(path).unwrap();
    let lines: Vec<serde_json::Value> = content
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);

    let problem = &lines[0];
    assert_eq!(problem["name"], "Trigger 1 on Web 01");
    assert_eq!(problem["value"], 1);
    assert_eq!(problem["severity"], 4);
    assert_eq!(problem["hosts"][0]["host"], "web-01");
    assert_eq!(problem["hosts"][0]["name"], "Web 01");
    assert_eq!(problem["groups"][0], "Linux servers");
    assert_eq!(problem["tags"][0]["tag"], "service");

    let recovery = &lines[1];
    assert_eq!(recovery["value"], 0);
    assert_eq!(recovery["p_eventid"], problem["eventid"]);
}

#[test]
fn internal_item_problem_recovers_on_normal_state() {
    let mut h = Harness::new(base_config(), &[]);
    let ts = Timespec::new(1000, 0);
    h.processor.stage_internal(
        EventObject::Item,
        101,
        ts,
        ItemState::NotSupported.as_i32(),
        Some("Cannot connect"),
    );
    let (processed, _, _) = h.cycle();
    assert_eq!(processed, 1);
    assert_eq!(h.query("SELECT COUNT(*) FROM problem WHERE source = 3 AND object = 4"), 1);
    assert_eq!(
        h.query("SELECT COUNT(*) FROM problem WHERE name = 'Cannot connect'"),
        1
    );

    h.processor
        .stage_internal(EventObject::Item, 101, ts, ItemState::Normal.as_i32(), None);
    h.cycle();
    assert_eq!(h.query("SELECT COUNT(*) FROM problem WHERE r_eventid IS NULL"), 0);
}

#[test]
fn internal_trigger_event_obeys_dependencies() {
    let mut config = base_config();
    let mut master = trigger(1, 11);
    master.value = TriggerValue::Problem;
    config.add_trigger(master);
    config.add_dependency(2, 1);
    let mut h = Harness::new(config, &[]);

    h.processor.stage_internal(
        EventObject::Trigger,
        2,
        Timespec::new(1000, 0),
        TriggerState::Unknown.as_i32(),
        Some("Division by zero"),
    );
    let (processed, _, _) = h.cycle();
    assert_eq!(processed, 0);
    assert_eq!(h.query("SELECT COUNT(*) FROM events"), 0);
}

#[test]
fn cache_keeps_queue_across_cycles_until_cleared() {
    let mut cache = EventCache::new();
    let config = base_config();
    let t1 = config.trigger(1).unwrap();
    cache.stage_trigger(&config, &t1, Timespec::new(1000, 0), TriggerValue::Ok);
    assert!(cache.recover_event(7, 1, 0));
    assert!(!cache.recover_event(7, 1, 0));

    let intent = |eventid| CloseIntent {
        eventid,
        c_eventid: 1,
        correlationid: 3,
        objectid: 2,
        ts: Timespec::new(1000, 0),
    };
    assert!(!cache.queue_close(intent(7)));
    assert!(cache.queue_close(intent(8)));
    assert!(!cache.queue_close(intent(8)));

    cache.reset_recovery();
    assert!(!cache.has_recovery(7));
    assert_eq!(cache.len(), 1);

    cache.clear_events();
    assert!(cache.is_empty());
    assert!(cache.is_queued(8));

    cache.clear();
    assert!(!cache.is_queued(8));
}
