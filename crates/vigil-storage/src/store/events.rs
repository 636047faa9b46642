use super::nullable;
use crate::error::Result;
use crate::filter::Predicate;
use crate::{id_params, placeholders, Store};
use std::collections::HashMap;
use vigil_common::types::{DiffFlags, EventObject, EventSource, Tag, TriggerDiffs};

#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    pub eventid: u64,
    pub source: EventSource,
    pub object: EventObject,
    pub objectid: u64,
    pub clock: i64,
    pub ns: i32,
    pub value: i32,
    pub name: String,
    pub severity: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProblemRow {
    pub eventid: u64,
    pub source: EventSource,
    pub object: EventObject,
    pub objectid: u64,
    pub clock: i64,
    pub ns: i32,
    pub name: String,
    pub severity: i32,
}

/// Link between a problem and the event that recovered it. Zero ids are
/// stored as NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryRow {
    pub eventid: u64,
    pub r_eventid: u64,
    pub r_clock: i64,
    pub r_ns: i32,
    pub c_eventid: u64,
    pub correlationid: u64,
    pub userid: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuppressRow {
    pub eventid: u64,
    pub maintenanceid: u64,
    pub suppress_until: i64,
}

/// A problem that has not been recovered yet.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenProblem {
    pub eventid: u64,
    pub objectid: u64,
    pub tags: Vec<Tag>,
}

/// Open problem selected by a correlation rule's old event filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelatedProblem {
    pub eventid: u64,
    pub objectid: u64,
    pub correlationid: u64,
}

impl Store {
    pub fn insert_events(&self, events: &[EventRow]) -> Result<()> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare_cached(
                "INSERT INTO events (eventid, source, object, objectid, clock, ns, value, name, severity)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for e in events {
                stmt.execute(rusqlite::params![
                    e.eventid as i64,
                    e.source.as_i32(),
                    e.object.as_i32(),
                    e.objectid as i64,
                    e.clock,
                    e.ns,
                    e.value,
                    &e.name,
                    e.severity,
                ])?;
            }
            Ok(())
        })
    }

    pub fn insert_event_tags(&self, tags: &[(u64, Tag)]) -> Result<()> {
        self.insert_tags("INSERT INTO event_tag (eventid, tag, value) VALUES (?1, ?2, ?3)", tags)
    }

    pub fn insert_problem_tags(&self, tags: &[(u64, Tag)]) -> Result<()> {
        self.insert_tags("INSERT INTO problem_tag (eventid, tag, value) VALUES (?1, ?2, ?3)", tags)
    }

    fn insert_tags(&self, sql: &str, tags: &[(u64, Tag)]) -> Result<()> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare_cached(sql)?;
            for (eventid, tag) in tags {
                stmt.execute(rusqlite::params![*eventid as i64, &tag.tag, &tag.value])?;
            }
            Ok(())
        })
    }

    pub fn insert_problems(&self, problems: &[ProblemRow]) -> Result<()> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare_cached(
                "INSERT INTO problem (eventid, source, object, objectid, clock, ns, name, severity)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for p in problems {
                stmt.execute(rusqlite::params![
                    p.eventid as i64,
                    p.source.as_i32(),
                    p.object.as_i32(),
                    p.objectid as i64,
                    p.clock,
                    p.ns,
                    &p.name,
                    p.severity,
                ])?;
            }
            Ok(())
        })
    }

    /// Inserts recovery links and closes the referenced problem rows.
    pub fn insert_recoveries(&self, recoveries: &[RecoveryRow]) -> Result<()> {
        self.with_connection(|conn| {
            let mut insert = conn.prepare_cached(
                "INSERT INTO event_recovery (eventid, r_eventid, correlationid, c_eventid, userid)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for r in recoveries {
                insert.execute(rusqlite::params![
                    r.eventid as i64,
                    r.r_eventid as i64,
                    nullable(r.correlationid),
                    nullable(r.c_eventid),
                    nullable(r.userid),
                ])?;

                if r.correlationid != 0 {
                    conn.execute(
                        "UPDATE problem SET r_eventid = ?1, r_clock = ?2, r_ns = ?3, userid = ?4, correlationid = ?5
                         WHERE eventid = ?6",
                        rusqlite::params![
                            r.r_eventid as i64,
                            r.r_clock,
                            r.r_ns,
                            nullable(r.userid),
                            r.correlationid as i64,
                            r.eventid as i64,
                        ],
                    )?;
                } else {
                    conn.execute(
                        "UPDATE problem SET r_eventid = ?1, r_clock = ?2, r_ns = ?3, userid = ?4
                         WHERE eventid = ?5",
                        rusqlite::params![
                            r.r_eventid as i64,
                            r.r_clock,
                            r.r_ns,
                            nullable(r.userid),
                            r.eventid as i64,
                        ],
                    )?;
                }
            }
            Ok(())
        })
    }

    pub fn insert_event_suppress(&self, rows: &[SuppressRow]) -> Result<()> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare_cached(
                "INSERT INTO event_suppress (eventid, maintenanceid, suppress_until) VALUES (?1, ?2, ?3)",
            )?;
            for s in rows {
                stmt.execute(rusqlite::params![
                    s.eventid as i64,
                    s.maintenanceid as i64,
                    s.suppress_until,
                ])?;
            }
            Ok(())
        })
    }

    /// Returns the maintenance ids that still exist. Must run inside the
    /// cycle transaction, whose write lock keeps them from being deleted
    /// until commit.
    pub fn lock_maintenances(&self, maintenanceids: &[u64]) -> Result<Vec<u64>> {
        if maintenanceids.is_empty() {
            return Ok(Vec::new());
        }
        self.with_connection(|conn| {
            let sql = format!(
                "SELECT maintenanceid FROM maintenances WHERE maintenanceid IN ({}) ORDER BY maintenanceid",
                placeholders(maintenanceids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(id_params(maintenanceids)), |row| {
                row.get::<_, i64>(0)
            })?;
            let mut locked = Vec::new();
            for row in rows {
                locked.push(row? as u64);
            }
            Ok(locked)
        })
    }

    /// Open trigger problems of the given triggers with their tags, ordered
    /// by eventid.
    pub fn open_trigger_problems(&self, triggerids: &[u64]) -> Result<Vec<OpenProblem>> {
        if triggerids.is_empty() {
            return Ok(Vec::new());
        }
        self.with_connection(|conn| {
            let sql = format!(
                "SELECT eventid, objectid FROM problem
                 WHERE source = ?1 AND object = ?2 AND r_eventid IS NULL AND objectid IN ({})
                 ORDER BY eventid",
                placeholders(triggerids.len())
            );
            let mut params = vec![
                rusqlite::types::Value::Integer(EventSource::Triggers.as_i32() as i64),
                rusqlite::types::Value::Integer(EventObject::Trigger.as_i32() as i64),
            ];
            params.extend(id_params(triggerids));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
            })?;
            let mut problems = Vec::new();
            for row in rows {
                let (eventid, objectid) = row?;
                problems.push(OpenProblem {
                    eventid: eventid as u64,
                    objectid: objectid as u64,
                    tags: Vec::new(),
                });
            }
            if problems.is_empty() {
                return Ok(problems);
            }

            let eventids: Vec<u64> = problems.iter().map(|p| p.eventid).collect();
            let sql = format!(
                "SELECT eventid, tag, value FROM problem_tag WHERE eventid IN ({}) ORDER BY problemtagid",
                placeholders(eventids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(id_params(&eventids)), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
            })?;
            let index: HashMap<u64, usize> = problems
                .iter()
                .enumerate()
                .map(|(i, p)| (p.eventid, i))
                .collect();
            for row in rows {
                let (eventid, tag, value) = row?;
                if let Some(&i) = index.get(&(eventid as u64)) {
                    problems[i].tags.push(Tag { tag, value });
                }
            }
            Ok(problems)
        })
    }

    /// Open internal problems of the given objects.
    pub fn open_internal_problems(&self, object: EventObject, objectids: &[u64]) -> Result<Vec<OpenProblem>> {
        if objectids.is_empty() {
            return Ok(Vec::new());
        }
        self.with_connection(|conn| {
            let sql = format!(
                "SELECT eventid, objectid FROM problem
                 WHERE source = ?1 AND object = ?2 AND r_eventid IS NULL AND objectid IN ({})
                 ORDER BY eventid",
                placeholders(objectids.len())
            );
            let mut params = vec![
                rusqlite::types::Value::Integer(EventSource::Internal.as_i32() as i64),
                rusqlite::types::Value::Integer(object.as_i32() as i64),
            ];
            params.extend(id_params(objectids));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| {
                Ok(OpenProblem {
                    eventid: row.get::<_, i64>(0)? as u64,
                    objectid: row.get::<_, i64>(1)? as u64,
                    tags: Vec::new(),
                })
            })?;
            let mut problems = Vec::new();
            for row in rows {
                problems.push(row?);
            }
            Ok(problems)
        })
    }

    /// The subset of `eventids` that are still open problems, sorted.
    pub fn open_problem_eventids(&self, eventids: &[u64]) -> Result<Vec<u64>> {
        if eventids.is_empty() {
            return Ok(Vec::new());
        }
        self.with_connection(|conn| {
            let sql = format!(
                "SELECT eventid FROM problem WHERE r_eventid IS NULL AND eventid IN ({}) ORDER BY eventid",
                placeholders(eventids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(id_params(eventids)), |row| {
                row.get::<_, i64>(0)
            })?;
            let mut open = Vec::new();
            for row in rows {
                open.push(row? as u64);
            }
            Ok(open)
        })
    }

    pub fn is_problem_open(&self, eventid: u64) -> Result<bool> {
        Ok(!self.open_problem_eventids(&[eventid])?.is_empty())
    }

    /// Number of open trigger problems per trigger. Triggers without open
    /// problems are absent from the result.
    pub fn open_problem_counts(&self, triggerids: &[u64]) -> Result<HashMap<u64, u32>> {
        if triggerids.is_empty() {
            return Ok(HashMap::new());
        }
        self.with_connection(|conn| {
            let sql = format!(
                "SELECT objectid, COUNT(objectid) FROM problem
                 WHERE r_eventid IS NULL AND source = ?1 AND object = ?2 AND objectid IN ({})
                 GROUP BY objectid",
                placeholders(triggerids.len())
            );
            let mut params = vec![
                rusqlite::types::Value::Integer(EventSource::Triggers.as_i32() as i64),
                rusqlite::types::Value::Integer(EventObject::Trigger.as_i32() as i64),
            ];
            params.extend(id_params(triggerids));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| {
                Ok((row.get::<_, i64>(0)? as u64, row.get::<_, i64>(1)? as u32))
            })?;
            let mut counts = HashMap::new();
            for row in rows {
                let (triggerid, count) = row?;
                counts.insert(triggerid, count);
            }
            Ok(counts)
        })
    }

    /// Open trigger problems matched by each correlation's old event filter.
    ///
    /// All filters run as one query against `correlation`, so only
    /// correlations present in that table can match.
    pub fn select_correlated_problems(&self, filters: &[(u64, Predicate)]) -> Result<Vec<CorrelatedProblem>> {
        if filters.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = String::from(
            "SELECT p.eventid, p.objectid, c.correlationid FROM correlation c, problem p
             WHERE p.r_eventid IS NULL AND p.source = ? AND p.object = ? AND (",
        );
        let mut params = vec![
            rusqlite::types::Value::Integer(EventSource::Triggers.as_i32() as i64),
            rusqlite::types::Value::Integer(EventObject::Trigger.as_i32() as i64),
        ];
        for (i, (correlationid, predicate)) in filters.iter().enumerate() {
            if i > 0 {
                sql.push_str(" or ");
            }
            sql.push_str("(c.correlationid = ? and ");
            params.push(rusqlite::types::Value::Integer(*correlationid as i64));
            predicate.render(&mut sql, &mut params);
            sql.push(')');
        }
        sql.push_str(") ORDER BY p.eventid, c.correlationid");

        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| {
                Ok(CorrelatedProblem {
                    eventid: row.get::<_, i64>(0)? as u64,
                    objectid: row.get::<_, i64>(1)? as u64,
                    correlationid: row.get::<_, i64>(2)? as u64,
                })
            })?;
            let mut matched = Vec::new();
            for row in rows {
                matched.push(row?);
            }
            Ok(matched)
        })
    }

    /// Writes value, lastchange, state and error of the triggers whose diff
    /// carries the matching update flag.
    pub fn save_trigger_changes(&self, diffs: &TriggerDiffs) -> Result<usize> {
        self.with_connection(|conn| {
            let mut updated = 0;
            for diff in diffs.iter() {
                if !diff.flags.intersects(DiffFlags::UPDATE_TRIGGER) {
                    continue;
                }

                let mut sets = Vec::new();
                let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
                if diff.flags.contains(DiffFlags::UPDATE_LASTCHANGE) {
                    sets.push("lastchange = ?");
                    params.push(Box::new(diff.lastchange));
                }
                if diff.flags.contains(DiffFlags::UPDATE_VALUE) {
                    sets.push("value = ?");
                    params.push(Box::new(diff.value.as_i32()));
                }
                if diff.flags.contains(DiffFlags::UPDATE_STATE) {
                    sets.push("state = ?");
                    params.push(Box::new(diff.state.as_i32()));
                }
                if diff.flags.contains(DiffFlags::UPDATE_ERROR) {
                    sets.push("error = ?");
                    params.push(Box::new(diff.error.clone().unwrap_or_default()));
                }
                params.push(Box::new(diff.triggerid as i64));

                let sql = format!("UPDATE triggers SET {} WHERE triggerid = ?", sets.join(", "));
                let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
                updated += conn.execute(&sql, param_refs.as_slice())?;
            }
            Ok(updated)
        })
    }
}
