//! Maintenance suppression of new problems.

use crate::cache::EventCache;
use crate::error::Result;
use crate::{ConfigCache, SuppressQuery};
use vigil_common::expression::functionids;
use vigil_common::types::{EventSource, TriggerValue};
use vigil_storage::{Store, SuppressRow};

/// Records the running maintenances that cover each new trigger problem and
/// marks those problems suppressed. Returns the number of rows written.
pub(crate) fn update_event_suppress_data(
    cache: &mut EventCache,
    store: &Store,
    config: &dyn ConfigCache,
    now: i64,
) -> Result<usize> {
    let mut refs = Vec::new();
    let mut queries = Vec::new();
    for (idx, event) in cache.events().iter().enumerate() {
        if !event.is_created()
            || event.source() != EventSource::Triggers
            || event.value != TriggerValue::Problem.as_i32()
        {
            continue;
        }
        let Some(trigger) = event.trigger() else {
            continue;
        };
        let mut ids = functionids(&trigger.expression);
        ids.extend(functionids(&trigger.recovery_expression));
        ids.sort_unstable();
        ids.dedup();

        refs.push(idx);
        queries.push(SuppressQuery {
            eventid: event.eventid,
            functionids: ids,
            tags: event.tags.clone(),
            maintenances: Vec::new(),
        });
    }
    if queries.is_empty() {
        return Ok(0);
    }

    let running = config.running_maintenance_ids(now);
    if running.is_empty() || !config.event_maintenances(&mut queries, &running) {
        return Ok(0);
    }

    // Maintenances deleted since the snapshot was taken drop out here.
    let valid = store.lock_maintenances(&running)?;

    let mut rows = Vec::new();
    for (query, &idx) in queries.iter().zip(&refs) {
        for &(maintenanceid, suppress_until) in &query.maintenances {
            if valid.binary_search(&maintenanceid).is_err() {
                continue;
            }
            rows.push(SuppressRow {
                eventid: query.eventid,
                maintenanceid,
                suppress_until,
            });
            cache.events_mut()[idx].suppressed = true;
        }
    }
    store.insert_event_suppress(&rows)?;
    tracing::debug!(rows = rows.len(), "Suppressed problems in maintenance");
    Ok(rows.len())
}
