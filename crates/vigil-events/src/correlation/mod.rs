//! Global correlation: matches new trigger events against correlation
//! rules and executes their close-new and close-old operations.

mod condition;
mod formula;

use crate::cache::{CloseIntent, EventCache};
use crate::error::{EventsError, Result};
use crate::ConfigCache;
use condition::{match_new_event, old_event_filter};
use vigil_common::correlation::{Correlation, Operation};
use vigil_common::expr;
use vigil_common::expression::substitute_references;
use vigil_common::types::{DiffFlags, Event, EventFlags, EventObject, EventSource, TriggerDiffs};
use vigil_storage::{Predicate, Store};

/// Evaluates the rule formula against the new event, with conditions on
/// old events replaced by `old_value`.
fn match_rule(
    rule: &Correlation,
    event: &Event,
    config: &dyn ConfigCache,
    old_value: bool,
) -> std::result::Result<bool, EventsError> {
    let formula = rule.effective_formula();
    if formula.trim().is_empty() {
        return Ok(true);
    }

    let expression = substitute_references(&formula, |id| {
        rule.condition(id).map(|c| {
            let matched = match_new_event(&c.kind, event, config, old_value);
            if matched { "1" } else { "0" }.to_string()
        })
    })
    .map_err(|conditionid| EventsError::UnknownCondition {
        correlationid: rule.correlationid,
        conditionid,
    })?;

    let value = expr::evaluate(&expression).map_err(|e| EventsError::Formula {
        correlationid: rule.correlationid,
        formula: formula.clone(),
        message: e.to_string(),
    })?;
    Ok(value.is_one())
}

/// Filter selecting the open problems the rule correlates with `event`.
fn old_filter(
    rule: &Correlation,
    event: &Event,
    config: &dyn ConfigCache,
) -> std::result::Result<Predicate, EventsError> {
    let formula = rule.effective_formula();
    let tree = formula::parse(&formula).map_err(|message| EventsError::Formula {
        correlationid: rule.correlationid,
        formula: formula.clone(),
        message,
    })?;
    let Some(tree) = tree else {
        return Ok(Predicate::Const(true));
    };
    tree.to_predicate(&mut |id| {
        rule.condition(id)
            .map(|c| old_event_filter(&c.kind, event, config))
    })
    .map_err(|conditionid| EventsError::UnknownCondition {
        correlationid: rule.correlationid,
        conditionid,
    })
}

/// Executes the rule operations for the event at `idx`. `old` is the open
/// problem `(eventid, objectid)` the rule matched, if any.
fn execute_operations(
    cache: &mut EventCache,
    config: &dyn ConfigCache,
    rule: &Correlation,
    idx: usize,
    old: Option<(u64, u64)>,
) {
    for operation in &rule.operations {
        let event = &cache.events()[idx];
        match operation {
            Operation::CloseOld => {
                let Some((old_eventid, old_objectid)) = old else {
                    continue;
                };
                let intent = CloseIntent {
                    eventid: old_eventid,
                    c_eventid: event.eventid,
                    correlationid: rule.correlationid,
                    objectid: old_objectid,
                    ts: event.ts(),
                };
                if cache.queue_close(intent) {
                    tracing::debug!(
                        eventid = old_eventid,
                        correlationid = rule.correlationid,
                        "Queued correlated problem for closing"
                    );
                }
            }
            Operation::CloseNew => {
                if !event.is_trigger_problem() || cache.has_recovery(event.eventid) {
                    continue;
                }
                let Some(trigger) = event.trigger().cloned() else {
                    continue;
                };
                let (eventid, ts) = (event.eventid, event.ts());
                let Some(r_event) = cache.close_trigger_event(
                    config,
                    eventid,
                    &trigger,
                    ts,
                    0,
                    rule.correlationid,
                    eventid,
                ) else {
                    continue;
                };
                let events = cache.events_mut();
                events[idx].flags.insert(EventFlags::NO_ACTION);
                events[r_event].flags.insert(EventFlags::NO_ACTION);
            }
        }
    }
}

enum Route {
    /// Needs the open problems selected by the predicate.
    Old(Predicate),
    /// Decided by the new event alone.
    New,
}

fn route_rule(
    rule: &Correlation,
    event: &Event,
    config: &dyn ConfigCache,
) -> std::result::Result<Option<Route>, EventsError> {
    if !match_rule(rule, event, config, true)? {
        return Ok(None);
    }
    if rule.has_old_event_conditions() || rule.closes_old_events() {
        return old_filter(rule, event, config).map(|p| Some(Route::Old(p)));
    }
    Ok(match_rule(rule, event, config, false)?.then_some(Route::New))
}

fn is_correlated_event(event: &Event) -> bool {
    event.source() == EventSource::Triggers
        && event.object() == EventObject::Trigger
        && event.is_created()
}

/// Applies the global correlation rules to the trigger events at
/// `triggers`, the same events the resolver saw. Events dropped since are
/// skipped.
pub(crate) fn correlate_events(
    cache: &mut EventCache,
    store: &Store,
    config: &dyn ConfigCache,
    triggers: &[usize],
    diffs: &mut TriggerDiffs,
) -> Result<()> {
    let rules = config.correlation_rules();
    if rules.is_empty() {
        return Ok(());
    }

    let indices: Vec<usize> = triggers
        .iter()
        .copied()
        .filter(|&i| cache.events().get(i).is_some_and(is_correlated_event))
        .collect();

    for idx in indices {
        let event = cache.events()[idx].clone();
        let mut corr_old: Vec<(u64, Predicate)> = Vec::new();
        let mut corr_new: Vec<u64> = Vec::new();

        for rule in rules.iter() {
            match route_rule(rule, &event, config) {
                Ok(Some(Route::Old(predicate))) => corr_old.push((rule.correlationid, predicate)),
                Ok(Some(Route::New)) => corr_new.push(rule.correlationid),
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(error = %e, correlationid = rule.correlationid, "Skipping correlation rule");
                }
            }
        }

        for correlationid in corr_new {
            if let Some(rule) = rules.find(correlationid) {
                execute_operations(cache, config, rule, idx, None);
            }
        }

        if !corr_old.is_empty() {
            for row in store.select_correlated_problems(&corr_old)? {
                if cache.is_queued(row.eventid) {
                    continue;
                }
                match rules.find(row.correlationid) {
                    Some(rule) => {
                        execute_operations(cache, config, rule, idx, Some((row.eventid, row.objectid)))
                    }
                    None => {
                        tracing::error!(correlationid = row.correlationid, "Correlation rule vanished during cycle")
                    }
                }
            }
        }

        let event = &cache.events()[idx];
        if event.flags.contains(EventFlags::NO_ACTION) {
            if let Some(diff) = diffs.find_mut(event.objectid) {
                diff.flags.insert(DiffFlags::RECALCULATE_PROBLEM_COUNT);
            }
        }
    }

    Ok(())
}
