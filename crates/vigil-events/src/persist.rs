use crate::cache::EventCache;
use crate::error::Result;
use vigil_common::types::{EventSource, Tag};
use vigil_dispatch::RecoveryPair;
use vigil_storage::{EventRow, ProblemRow, RecoveryRow, Store};

/// Writes the created events and their tags, assigning ids to events
/// generated after the cycle reserved its ids. Returns the number written.
pub(crate) fn save_events(cache: &mut EventCache, store: &Store) -> Result<usize> {
    let missing = cache
        .events()
        .iter()
        .filter(|e| e.is_created() && e.eventid == 0)
        .count() as u64;
    if missing != 0 {
        let mut next = store.reserve_ids("events", "eventid", missing)?;
        for event in cache.events_mut() {
            if event.is_created() && event.eventid == 0 {
                event.eventid = next;
                next += 1;
            }
        }
    }

    let mut rows = Vec::new();
    let mut tags: Vec<(u64, Tag)> = Vec::new();
    for event in cache.events().iter().filter(|e| e.is_created()) {
        rows.push(EventRow {
            eventid: event.eventid,
            source: event.source(),
            object: event.object(),
            objectid: event.objectid,
            clock: event.clock,
            ns: event.ns,
            value: event.value,
            name: event.name.clone(),
            severity: event.severity.as_i32(),
        });
        if event.source() == EventSource::Triggers {
            tags.extend(event.tags.iter().map(|t| (event.eventid, t.clone())));
        }
    }

    store.insert_events(&rows)?;
    store.insert_event_tags(&tags)?;
    Ok(rows.len())
}

/// Opens problems for the created trigger problems and internal problems.
pub(crate) fn save_problems(cache: &EventCache, store: &Store) -> Result<()> {
    let mut rows = Vec::new();
    let mut tags: Vec<(u64, Tag)> = Vec::new();
    for event in cache.events() {
        if !event.is_created() || !event.opens_problem() {
            continue;
        }
        rows.push(ProblemRow {
            eventid: event.eventid,
            source: event.source(),
            object: event.object(),
            objectid: event.objectid,
            clock: event.clock,
            ns: event.ns,
            name: event.name.clone(),
            severity: event.severity.as_i32(),
        });
        if event.source() == EventSource::Triggers {
            tags.extend(event.tags.iter().map(|t| (event.eventid, t.clone())));
        }
    }
    if rows.is_empty() {
        return Ok(());
    }
    store.insert_problems(&rows)?;
    store.insert_problem_tags(&tags)?;
    Ok(())
}

/// Links recovered problems to their recovery events and closes them.
pub(crate) fn save_recoveries(cache: &EventCache, store: &Store) -> Result<()> {
    let rows: Vec<RecoveryRow> = cache
        .recoveries()
        .map(|r| {
            let r_event = &cache.events()[r.r_event];
            RecoveryRow {
                eventid: r.eventid,
                r_eventid: r_event.eventid,
                r_clock: r_event.clock,
                r_ns: r_event.ns,
                c_eventid: r.c_eventid,
                correlationid: r.correlationid,
                userid: r.userid,
            }
        })
        .collect();
    if rows.is_empty() {
        return Ok(());
    }
    store.insert_recoveries(&rows)?;
    Ok(())
}

/// Closed problems of the cycle, sorted by problem eventid.
pub(crate) fn closed_pairs(cache: &EventCache) -> Vec<RecoveryPair> {
    let mut pairs: Vec<RecoveryPair> = cache
        .recoveries()
        .map(|r| RecoveryPair {
            problem_eventid: r.eventid,
            recovery_eventid: cache.events()[r.r_event].eventid,
        })
        .collect();
    pairs.sort();
    pairs
}
