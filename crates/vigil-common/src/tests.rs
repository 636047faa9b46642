use crate::config::{Maintenance, MaintenanceTag, MaintenanceTagEval};
use crate::correlation::{ConditionOperator, EvalType};
use crate::expr::{evaluate, ExprError, Value};
use crate::types::{
    DiffFlags, Event, EventFlags, EventObject, EventPayload, EventSource, Severity, Tag,
    TriggerDiff, TriggerDiffs, TriggerValue,
};

fn maintenance(evaltype: MaintenanceTagEval, tags: Vec<MaintenanceTag>) -> Maintenance {
    Maintenance {
        maintenanceid: 1,
        name: "weekly".into(),
        active_since: 100,
        active_till: 200,
        hostids: vec![],
        groupids: vec![],
        tags_evaltype: evaltype,
        tags,
    }
}

fn mtag(tag: &str, value: &str, operator: ConditionOperator) -> MaintenanceTag {
    MaintenanceTag {
        tag: tag.into(),
        value: value.into(),
        operator,
    }
}

#[test]
fn evaluator_respects_precedence() {
    assert_eq!(evaluate("1 or 0 and 0").unwrap(), Value::Number(1.0));
    assert_eq!(evaluate("(1 or 0) and 0").unwrap(), Value::Number(0.0));
    assert_eq!(evaluate("2 + 3 * 4 = 14").unwrap(), Value::Number(1.0));
    assert_eq!(evaluate("-2 < 1").unwrap(), Value::Number(1.0));
    assert_eq!(evaluate("not 1 = 0").unwrap(), Value::Number(1.0));
}

#[test]
fn evaluator_propagates_unknown() {
    assert_eq!(evaluate("unknown + 1").unwrap(), Value::Unknown);
    assert_eq!(evaluate("unknown and 0").unwrap(), Value::Number(0.0));
    assert_eq!(evaluate("not unknown").unwrap(), Value::Unknown);
    assert!(!evaluate("unknown").unwrap().is_one());
}

#[test]
fn evaluator_reports_errors() {
    assert_eq!(evaluate("1 / 0"), Err(ExprError::DivisionByZero));
    assert_eq!(evaluate(""), Err(ExprError::UnexpectedEnd));
    assert!(matches!(evaluate("1 xor 0"), Err(ExprError::UnexpectedToken(_))));
    assert!(matches!(evaluate("(1"), Err(ExprError::UnexpectedEnd)));
    assert!(matches!(evaluate("1 1"), Err(ExprError::UnexpectedToken(_))));
}

#[test]
fn trigger_diffs_stay_sorted() {
    let mut diffs = TriggerDiffs::new();
    for id in [30, 10, 20] {
        assert!(diffs.insert(TriggerDiff::new(id, Severity::High, TriggerValue::Ok)));
    }
    assert!(!diffs.insert(TriggerDiff::new(20, Severity::Warning, TriggerValue::Problem)));

    let ids: Vec<u64> = diffs.iter().map(|d| d.triggerid).collect();
    assert_eq!(ids, vec![10, 20, 30]);
    assert_eq!(diffs.find(20).map(|d| d.priority), Some(Severity::High));
    assert!(diffs.find(40).is_none());
}

#[test]
fn flag_sets_behave_as_bitsets() {
    let mut flags = DiffFlags::UPDATE_VALUE | DiffFlags::RECALCULATE_PROBLEM_COUNT;
    assert!(flags.contains(DiffFlags::UPDATE_VALUE));
    assert!(flags.intersects(DiffFlags::UPDATE_TRIGGER));
    flags.remove(DiffFlags::UPDATE_VALUE);
    assert!(!flags.intersects(DiffFlags::UPDATE_TRIGGER));
    assert!(!flags.contains(DiffFlags::UNSET));

    let mut event_flags = EventFlags::CREATE;
    event_flags.insert(EventFlags::NO_ACTION);
    assert!(event_flags.contains(EventFlags::CREATE | EventFlags::NO_ACTION));
    event_flags = EventFlags::UNSET;
    assert!(event_flags.is_unset());
}

#[test]
fn internal_events_open_problems_by_state() {
    let mut event = Event {
        eventid: 0,
        objectid: 5,
        clock: 0,
        ns: 0,
        value: 1,
        severity: Severity::NotClassified,
        suppressed: false,
        flags: EventFlags::CREATE,
        name: String::new(),
        tags: vec![],
        payload: EventPayload::Internal {
            object: EventObject::Item,
            error: Some("timeout".into()),
        },
    };
    assert_eq!(event.source(), EventSource::Internal);
    assert!(event.opens_problem());
    assert!(!event.is_trigger_problem());

    event.value = 0;
    assert!(!event.opens_problem());

    event.payload = EventPayload::Other {
        source: EventSource::Discovery,
        object: EventObject::DiscoveredHost,
    };
    event.value = 1;
    assert!(!event.opens_problem());
}

#[test]
fn maintenance_and_or_tags_need_every_name() {
    let m = maintenance(
        MaintenanceTagEval::AndOr,
        vec![
            mtag("env", "prod", ConditionOperator::Equal),
            mtag("env", "stage", ConditionOperator::Equal),
            mtag("service", "db", ConditionOperator::Like),
        ],
    );
    assert!(m.tags_match(&[Tag::new("env", "stage"), Tag::new("service", "mydb")]));
    assert!(!m.tags_match(&[Tag::new("env", "stage")]));
    assert!(!m.tags_match(&[Tag::new("env", "dev"), Tag::new("service", "db")]));
}

#[test]
fn maintenance_or_tags_need_any() {
    let m = maintenance(
        MaintenanceTagEval::Or,
        vec![
            mtag("env", "prod", ConditionOperator::Equal),
            mtag("service", "db", ConditionOperator::Equal),
        ],
    );
    assert!(m.tags_match(&[Tag::new("service", "db")]));
    assert!(!m.tags_match(&[Tag::new("service", "web")]));
    assert!(maintenance(MaintenanceTagEval::Or, vec![]).tags_match(&[]));
}

#[test]
fn maintenance_running_window_is_half_open() {
    let m = maintenance(MaintenanceTagEval::AndOr, vec![]);
    assert!(!m.is_running(99));
    assert!(m.is_running(100));
    assert!(m.is_running(199));
    assert!(!m.is_running(200));
}

#[test]
fn eval_type_codes_round_trip_through_storage_values() {
    for code in 0..4 {
        let evaltype = EvalType::from_i32(code).expect("known evaltype");
        assert_eq!(evaltype.as_i32(), code);
    }
    assert!(EvalType::from_i32(9).is_none());
}
