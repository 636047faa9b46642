//! Same-trigger recovery and dependency checks.

use crate::cache::EventCache;
use crate::error::Result;
use crate::ConfigCache;
use std::collections::BTreeSet;
use vigil_common::config::{DependencyStatus, TriggerDependency};
use vigil_common::types::{
    CorrelationMode, DiffFlags, Event, EventFlags, EventObject, Tag, TriggerDiff, TriggerDiffs,
    TriggerValue,
};
use vigil_storage::Store;

/// False when a master trigger of the event's trigger is in PROBLEM state,
/// either already or as decided earlier in this cycle.
fn dependency_passes(triggerid: u64, deps: &[TriggerDependency], diffs: &TriggerDiffs) -> bool {
    let Ok(idx) = deps.binary_search_by_key(&triggerid, |d| d.triggerid) else {
        return true;
    };
    let dep = &deps[idx];
    if dep.status == DependencyStatus::Fail {
        return false;
    }
    !dep.masterids.iter().any(|masterid| {
        diffs.find(*masterid).is_some_and(|diff| {
            diff.flags.contains(DiffFlags::UPDATE_VALUE) && diff.value == TriggerValue::Problem
        })
    })
}

fn dependencies_of(cache: &EventCache, config: &dyn ConfigCache, indices: &[usize]) -> Vec<TriggerDependency> {
    let triggerids: BTreeSet<u64> = indices.iter().map(|&i| cache.events()[i].objectid).collect();
    let triggerids: Vec<u64> = triggerids.into_iter().collect();
    config.trigger_dependencies(&triggerids)
}

/// Drops internal trigger events, together with their trigger changes,
/// whose trigger depends on a trigger in PROBLEM state.
pub(crate) fn check_internal_dependencies(
    cache: &mut EventCache,
    config: &dyn ConfigCache,
    internal: &[usize],
    trigger_events: &[usize],
    diffs: &mut TriggerDiffs,
) {
    let all: Vec<usize> = internal.iter().chain(trigger_events).copied().collect();
    let deps = dependencies_of(cache, config, &all);

    for &idx in internal {
        let triggerid = cache.events()[idx].objectid;
        if dependency_passes(triggerid, &deps, diffs) {
            continue;
        }
        tracing::debug!(triggerid, "Internal event suppressed by trigger dependency");
        cache.events_mut()[idx].flags = EventFlags::UNSET;
        if let Some(diff) = diffs.find_mut(triggerid) {
            diff.flags = DiffFlags::UNSET;
        }
    }
}

/// Recovers the open internal problems of objects that returned to the
/// normal state.
pub(crate) fn recover_internal_problems(
    cache: &mut EventCache,
    store: &Store,
    ok_events: &[usize],
) -> Result<()> {
    for object in [EventObject::Trigger, EventObject::Item, EventObject::LldRule] {
        let mine: Vec<usize> = ok_events
            .iter()
            .copied()
            .filter(|&i| {
                let event = &cache.events()[i];
                event.object() == object && !event.flags.is_unset()
            })
            .collect();
        if mine.is_empty() {
            continue;
        }

        let objectids: BTreeSet<u64> = mine.iter().map(|&i| cache.events()[i].objectid).collect();
        let objectids: Vec<u64> = objectids.into_iter().collect();
        for problem in store.open_internal_problems(object, &objectids)? {
            let r_event = mine
                .iter()
                .rev()
                .copied()
                .find(|&i| cache.events()[i].objectid == problem.objectid);
            if let Some(r_event) = r_event {
                cache.recover_event(problem.eventid, problem.objectid, r_event);
            }
        }
    }
    Ok(())
}

/// True when both tag sets carry a tag `name` with the same value.
fn match_tag(name: &str, problem_tags: &[Tag], event_tags: &[Tag]) -> bool {
    problem_tags
        .iter()
        .filter(|t| t.tag == name)
        .any(|t| event_tags.iter().any(|e| e.tag == name && e.value == t.value))
}

fn diff_for<'a>(diffs: &'a mut TriggerDiffs, event: &Event) -> Option<&'a mut TriggerDiff> {
    if diffs.find(event.objectid).is_none() {
        let trigger = event.trigger()?;
        diffs.insert(TriggerDiff::new(event.objectid, trigger.priority, trigger.value));
    }
    diffs.find_mut(event.objectid)
}

/// Applies trigger dependencies and recovers the open problems that the
/// staged OK events close.
pub(crate) fn process_trigger_events(
    cache: &mut EventCache,
    store: &Store,
    config: &dyn ConfigCache,
    trigger_events: &[usize],
    diffs: &mut TriggerDiffs,
) -> Result<()> {
    let ok_triggerids: BTreeSet<u64> = trigger_events
        .iter()
        .map(|&i| &cache.events()[i])
        .filter(|e| e.value == TriggerValue::Ok.as_i32())
        .map(|e| e.objectid)
        .collect();
    let ok_triggerids: Vec<u64> = ok_triggerids.into_iter().collect();
    let problems = store.open_trigger_problems(&ok_triggerids)?;
    let deps = dependencies_of(cache, config, trigger_events);

    for &idx in trigger_events {
        let event = cache.events()[idx].clone();
        let passes = dependency_passes(event.objectid, &deps, diffs);
        let Some(diff) = diff_for(diffs, &event) else {
            continue;
        };

        if !passes {
            tracing::debug!(triggerid = event.objectid, "Trigger event suppressed by dependency");
            diff.flags = DiffFlags::UNSET;
            cache.events_mut()[idx].flags = EventFlags::UNSET;
            continue;
        }
        diff.flags.insert(DiffFlags::RECALCULATE_PROBLEM_COUNT);

        if event.value == TriggerValue::Problem.as_i32() {
            diff.value = TriggerValue::Problem;
            diff.lastchange = event.clock;
            diff.flags
                .insert(DiffFlags::UPDATE_VALUE | DiffFlags::UPDATE_LASTCHANGE);
            continue;
        }

        let Some(trigger) = event.trigger() else {
            continue;
        };
        let own = problems.iter().filter(|p| p.objectid == event.objectid);

        match trigger.correlation_mode {
            CorrelationMode::None => {
                for problem in own {
                    cache.recover_event(problem.eventid, event.objectid, idx);
                }
                diff.value = TriggerValue::Ok;
            }
            CorrelationMode::Tag => {
                let mut value = TriggerValue::Ok;
                let mut flags = EventFlags::UNSET;
                for problem in own {
                    if match_tag(&trigger.correlation_tag, &problem.tags, &event.tags) {
                        cache.recover_event(problem.eventid, event.objectid, idx);
                        flags = EventFlags::CREATE;
                    } else {
                        value = TriggerValue::Problem;
                    }
                }
                cache.events_mut()[idx].flags = flags;
                diff.value = value;
            }
        }
        diff.flags.insert(DiffFlags::UPDATE_VALUE);
    }
    Ok(())
}
