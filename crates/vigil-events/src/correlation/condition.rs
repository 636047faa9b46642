//! Evaluation of single correlation conditions.
//!
//! New event conditions are decided in memory. Old event conditions are
//! turned into predicates over the open problem's tags.

use crate::ConfigCache;
use vigil_common::correlation::{ConditionKind, ConditionOperator};
use vigil_common::types::Event;
use vigil_storage::Predicate;

fn event_in_hostgroup(event: &Event, groupid: u64, config: &dyn ConfigCache) -> bool {
    let nested = config.nested_hostgroup_ids(groupid);
    config
        .trigger_hostgroup_ids(event.objectid)
        .iter()
        .any(|id| nested.binary_search(id).is_ok())
}

/// Matches a condition against the new event. Conditions on old events
/// evaluate to `old_value`; a tag pair also needs the new tag.
pub(crate) fn match_new_event(
    kind: &ConditionKind,
    event: &Event,
    config: &dyn ConfigCache,
    old_value: bool,
) -> bool {
    match kind {
        ConditionKind::OldEventTag { .. } | ConditionKind::OldEventTagValue { .. } => old_value,
        ConditionKind::EventTagPair { newtag, .. } => old_value && event.has_tag(newtag),
        ConditionKind::NewEventTag { tag } => event.has_tag(tag),
        ConditionKind::NewEventTagValue {
            tag,
            value,
            operator,
        } => event
            .tags
            .iter()
            .any(|t| t.tag == *tag && operator.matches(&t.value, value)),
        ConditionKind::NewEventHostGroup { groupid, operator } => {
            let in_group = event_in_hostgroup(event, *groupid, config);
            match operator {
                ConditionOperator::NotEqual => !in_group,
                _ => in_group,
            }
        }
    }
}

/// Filter a condition puts on open problems for the given new event.
pub(crate) fn old_event_filter(
    kind: &ConditionKind,
    event: &Event,
    config: &dyn ConfigCache,
) -> Predicate {
    match kind {
        ConditionKind::NewEventTag { .. }
        | ConditionKind::NewEventTagValue { .. }
        | ConditionKind::NewEventHostGroup { .. } => {
            Predicate::Const(match_new_event(kind, event, config, true))
        }
        ConditionKind::OldEventTag { tag } => Predicate::HasTag(tag.clone()),
        ConditionKind::EventTagPair { oldtag, newtag } => {
            let values: Vec<String> = event
                .tags
                .iter()
                .filter(|t| t.tag == *newtag)
                .map(|t| t.value.clone())
                .collect();
            if values.is_empty() {
                Predicate::Const(false)
            } else {
                Predicate::TagValueIn {
                    tag: oldtag.clone(),
                    values,
                }
            }
        }
        ConditionKind::OldEventTagValue {
            tag,
            value,
            operator,
        } => {
            let substring = matches!(operator, ConditionOperator::Like | ConditionOperator::NotLike);
            let predicate = Predicate::TagValue {
                tag: tag.clone(),
                value: value.clone(),
                substring,
            };
            match operator {
                ConditionOperator::NotEqual | ConditionOperator::NotLike => predicate.negate(),
                _ => predicate,
            }
        }
    }
}
