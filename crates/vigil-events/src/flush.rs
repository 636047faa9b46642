//! Executes queued close-old intents under trigger locks.

use crate::cache::{CloseIntent, EventCache};
use crate::error::Result;
use crate::{ConfigCache, TriggerLocker};
use vigil_common::types::{DiffFlags, TriggerDiff, TriggerDiffs};
use vigil_storage::Store;

/// Locks the source triggers of queued intents and closes the problems
/// that are still open. Triggers locked here are appended to `locked`; the
/// caller unlocks them after the cycle. Intents whose trigger could not be
/// locked stay queued. Returns the number of problems closed.
pub(crate) fn flush_closing_queue(
    cache: &mut EventCache,
    store: &Store,
    config: &dyn ConfigCache,
    locker: &dyn TriggerLocker,
    diffs: &mut TriggerDiffs,
    locked: &mut Vec<u64>,
) -> Result<usize> {
    let intents: Vec<CloseIntent> = cache.closing_queue().copied().collect();
    if intents.is_empty() {
        return Ok(0);
    }

    locked.sort_unstable();
    let mut triggerids = Vec::new();
    let mut lockids = Vec::new();
    for intent in &intents {
        if locked.binary_search(&intent.objectid).is_ok() {
            triggerids.push(intent.objectid);
        } else {
            lockids.push(intent.objectid);
        }
    }

    if !lockids.is_empty() {
        lockids.sort_unstable();
        lockids.dedup();
        let acquired = locker.lock(&lockids);
        tracing::debug!(requested = lockids.len(), acquired = acquired.len(), "Locked correlated triggers");
        triggerids.extend_from_slice(&acquired);
        locked.extend(acquired);
        locked.sort_unstable();
    }

    if triggerids.is_empty() {
        return Ok(0);
    }
    triggerids.sort_unstable();
    triggerids.dedup();

    let triggers = config.triggers_by_ids(&triggerids);
    for trigger in triggers.iter().flatten() {
        match diffs.find_mut(trigger.triggerid) {
            Some(diff) => diff.flags.insert(DiffFlags::RECALCULATE_PROBLEM_COUNT),
            None => {
                let mut diff = TriggerDiff::new(trigger.triggerid, trigger.priority, trigger.value);
                diff.flags = DiffFlags::RECALCULATE_PROBLEM_COUNT;
                diffs.insert(diff);
            }
        }
    }

    let trigger_of = |triggerid: u64| {
        triggerids
            .binary_search(&triggerid)
            .ok()
            .and_then(|i| triggers[i].as_ref())
    };
    let locked_intents: Vec<&CloseIntent> = intents
        .iter()
        .filter(|i| triggerids.binary_search(&i.objectid).is_ok())
        .collect();

    let candidates: Vec<u64> = locked_intents
        .iter()
        .filter(|i| trigger_of(i.objectid).is_some())
        .map(|i| i.eventid)
        .collect();
    let open = store.open_problem_eventids(&candidates)?;

    let mut closed = 0;
    for intent in locked_intents {
        if let Some(trigger) = trigger_of(intent.objectid) {
            if open.binary_search(&intent.eventid).is_ok() {
                let closed_event = cache.close_trigger_event(
                    config,
                    intent.eventid,
                    &trigger.snapshot(),
                    intent.ts,
                    0,
                    intent.correlationid,
                    intent.c_eventid,
                );
                if closed_event.is_some() {
                    closed += 1;
                }
            } else {
                tracing::debug!(eventid = intent.eventid, "Correlated problem already closed");
            }
        }
        cache.take_close_intent(intent.eventid);
    }

    tracing::debug!(closed, remaining = cache.closing_queue().count(), "Flushed correlation queue");
    Ok(closed)
}
