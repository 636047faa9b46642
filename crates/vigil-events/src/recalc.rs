//! Problem count and value recalculation of changed triggers.

use crate::cache::EventCache;
use crate::error::Result;
use vigil_common::types::{DiffFlags, EventObject, EventSource, TriggerDiffs, TriggerValue};
use vigil_storage::Store;

/// Reloads the open problem count of every diff flagged for recalculation.
fn update_problem_counts(store: &Store, diffs: &mut TriggerDiffs) -> Result<()> {
    let mut triggerids = Vec::new();
    for diff in diffs.iter_mut() {
        if !diff.flags.contains(DiffFlags::RECALCULATE_PROBLEM_COUNT) {
            continue;
        }
        diff.problem_count = 0;
        diff.flags.insert(DiffFlags::UPDATE_PROBLEM_COUNT);
        triggerids.push(diff.triggerid);
    }
    if triggerids.is_empty() {
        return Ok(());
    }

    for (triggerid, count) in store.open_problem_counts(&triggerids)? {
        if let Some(diff) = diffs.find_mut(triggerid) {
            diff.problem_count = count;
        }
    }
    Ok(())
}

/// Brings trigger values in line with their open problems. Must run after
/// the cycle's problems and recoveries are written.
pub(crate) fn update_trigger_changes(
    cache: &EventCache,
    store: &Store,
    diffs: &mut TriggerDiffs,
) -> Result<()> {
    update_problem_counts(store, diffs)?;

    for event in cache.events() {
        if event.source() != EventSource::Triggers || event.object() != EventObject::Trigger {
            continue;
        }
        let Some(diff) = diffs.find_mut(event.objectid) else {
            tracing::error!(triggerid = event.objectid, "Trigger event without trigger changes");
            continue;
        };
        if !event.is_created() {
            diff.flags
                .remove(DiffFlags::UPDATE_PROBLEM_COUNT | DiffFlags::UPDATE_LASTCHANGE);
            continue;
        }
        diff.lastchange = event.clock;
        diff.flags.insert(DiffFlags::UPDATE_LASTCHANGE);
    }

    for diff in diffs.iter_mut() {
        if !diff.flags.contains(DiffFlags::UPDATE_PROBLEM_COUNT) {
            continue;
        }
        let value = if diff.problem_count == 0 {
            TriggerValue::Ok
        } else {
            TriggerValue::Problem
        };
        if value != diff.value {
            diff.value = value;
            diff.flags.insert(DiffFlags::UPDATE_VALUE);
        }
    }
    Ok(())
}
