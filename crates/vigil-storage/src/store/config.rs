//! Configuration tables: triggers, hosts, items, maintenances and
//! correlation rules.

use super::nullable;
use crate::error::Result;
use crate::{decode, Store};
use rusqlite::Connection;
use std::collections::HashMap;
use vigil_common::config::{
    FunctionRef, HostGroup, HostInfo, ItemInfo, Maintenance, MaintenanceTag, MaintenanceTagEval,
    TriggerInfo,
};
use vigil_common::correlation::{
    Condition, ConditionKind, ConditionOperator, Correlation, EvalType, Operation,
};
use vigil_common::types::{CorrelationMode, Severity, Tag, TriggerState, TriggerValue};

const CORRELATION_ENABLED: i32 = 0;

fn load_tags(conn: &Connection, sql: &str) -> Result<HashMap<u64, Vec<Tag>>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, i64>(0)? as u64, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
    })?;
    let mut tags: HashMap<u64, Vec<Tag>> = HashMap::new();
    for row in rows {
        let (id, tag, value) = row?;
        tags.entry(id).or_default().push(Tag { tag, value });
    }
    Ok(tags)
}

fn load_id_pairs(conn: &Connection, sql: &str) -> Result<Vec<(u64, u64)>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, i64>(0)? as u64, row.get::<_, i64>(1)? as u64))
    })?;
    let mut pairs = Vec::new();
    for row in rows {
        pairs.push(row?);
    }
    Ok(pairs)
}

impl Store {
    pub fn load_triggers(&self) -> Result<Vec<TriggerInfo>> {
        self.with_connection(|conn| {
            let mut tags = load_tags(
                conn,
                "SELECT triggerid, tag, value FROM trigger_tag ORDER BY triggertagid",
            )?;
            let mut stmt = conn.prepare(
                "SELECT triggerid, description, expression, recovery_expression, priority, type, value,
                        state, lastchange, correlation_mode, correlation_tag, opdata
                 FROM triggers ORDER BY triggerid",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i32>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, i64>(7)?,
                    row.get::<_, i64>(8)?,
                    row.get::<_, i64>(9)?,
                    row.get::<_, String>(10)?,
                    row.get::<_, String>(11)?,
                ))
            })?;

            let mut triggers = Vec::new();
            for row in rows {
                let (
                    triggerid,
                    description,
                    expression,
                    recovery_expression,
                    priority,
                    trigger_type,
                    value,
                    state,
                    lastchange,
                    correlation_mode,
                    correlation_tag,
                    opdata,
                ) = row?;
                let triggerid = triggerid as u64;
                triggers.push(TriggerInfo {
                    triggerid,
                    description,
                    expression,
                    recovery_expression,
                    priority: decode("triggers.priority", priority, Severity::from_i32)?,
                    trigger_type,
                    value: decode("triggers.value", value, TriggerValue::from_i32)?,
                    state: decode("triggers.state", state, TriggerState::from_i32)?,
                    lastchange,
                    correlation_mode: decode(
                        "triggers.correlation_mode",
                        correlation_mode,
                        CorrelationMode::from_i32,
                    )?,
                    correlation_tag,
                    opdata,
                    tags: tags.remove(&triggerid).unwrap_or_default(),
                });
            }
            Ok(triggers)
        })
    }

    pub fn save_trigger(&self, trigger: &TriggerInfo) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO triggers (triggerid, description, expression, recovery_expression, priority,
                        type, value, state, lastchange, correlation_mode, correlation_tag, opdata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                rusqlite::params![
                    trigger.triggerid as i64,
                    &trigger.description,
                    &trigger.expression,
                    &trigger.recovery_expression,
                    trigger.priority.as_i32(),
                    trigger.trigger_type,
                    trigger.value.as_i32(),
                    trigger.state.as_i32(),
                    trigger.lastchange,
                    trigger.correlation_mode.as_i32(),
                    &trigger.correlation_tag,
                    &trigger.opdata,
                ],
            )?;
            conn.execute(
                "DELETE FROM trigger_tag WHERE triggerid = ?1",
                rusqlite::params![trigger.triggerid as i64],
            )?;
            let mut stmt =
                conn.prepare_cached("INSERT INTO trigger_tag (triggerid, tag, value) VALUES (?1, ?2, ?3)")?;
            for tag in &trigger.tags {
                stmt.execute(rusqlite::params![trigger.triggerid as i64, &tag.tag, &tag.value])?;
            }
            Ok(())
        })
    }

    /// `(triggerid_down, triggerid_up)` pairs.
    pub fn load_trigger_dependencies(&self) -> Result<Vec<(u64, u64)>> {
        self.with_connection(|conn| {
            load_id_pairs(
                conn,
                "SELECT triggerid_down, triggerid_up FROM trigger_depends ORDER BY triggerid_down, triggerid_up",
            )
        })
    }

    pub fn save_trigger_dependency(&self, triggerid_down: u64, triggerid_up: u64) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO trigger_depends (triggerid_down, triggerid_up) VALUES (?1, ?2)",
                rusqlite::params![triggerid_down as i64, triggerid_up as i64],
            )?;
            Ok(())
        })
    }

    pub fn load_functions(&self) -> Result<Vec<FunctionRef>> {
        self.with_connection(|conn| {
            let mut stmt =
                conn.prepare("SELECT functionid, itemid, triggerid FROM functions ORDER BY functionid")?;
            let rows = stmt.query_map([], |row| {
                Ok(FunctionRef {
                    functionid: row.get::<_, i64>(0)? as u64,
                    itemid: row.get::<_, i64>(1)? as u64,
                    triggerid: row.get::<_, i64>(2)? as u64,
                })
            })?;
            let mut functions = Vec::new();
            for row in rows {
                functions.push(row?);
            }
            Ok(functions)
        })
    }

    pub fn save_function(&self, function: &FunctionRef) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO functions (functionid, itemid, triggerid) VALUES (?1, ?2, ?3)",
                rusqlite::params![
                    function.functionid as i64,
                    function.itemid as i64,
                    function.triggerid as i64,
                ],
            )?;
            Ok(())
        })
    }

    pub fn load_items(&self) -> Result<Vec<ItemInfo>> {
        self.with_connection(|conn| {
            let mut tags = load_tags(conn, "SELECT itemid, tag, value FROM item_tag ORDER BY itemtagid")?;
            let mut stmt = conn.prepare("SELECT itemid, hostid, key_ FROM items ORDER BY itemid")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, i64>(0)? as u64, row.get::<_, i64>(1)? as u64, row.get::<_, String>(2)?))
            })?;
            let mut items = Vec::new();
            for row in rows {
                let (itemid, hostid, key) = row?;
                items.push(ItemInfo {
                    itemid,
                    hostid,
                    key,
                    tags: tags.remove(&itemid).unwrap_or_default(),
                });
            }
            Ok(items)
        })
    }

    pub fn save_item(&self, item: &ItemInfo) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO items (itemid, hostid, key_) VALUES (?1, ?2, ?3)",
                rusqlite::params![item.itemid as i64, item.hostid as i64, &item.key],
            )?;
            conn.execute(
                "DELETE FROM item_tag WHERE itemid = ?1",
                rusqlite::params![item.itemid as i64],
            )?;
            let mut stmt =
                conn.prepare_cached("INSERT INTO item_tag (itemid, tag, value) VALUES (?1, ?2, ?3)")?;
            for tag in &item.tags {
                stmt.execute(rusqlite::params![item.itemid as i64, &tag.tag, &tag.value])?;
            }
            Ok(())
        })
    }

    pub fn load_hosts(&self) -> Result<Vec<HostInfo>> {
        self.with_connection(|conn| {
            let memberships = load_id_pairs(
                conn,
                "SELECT hostid, groupid FROM hosts_groups ORDER BY hostid, groupid",
            )?;
            let mut groups: HashMap<u64, Vec<u64>> = HashMap::new();
            for (hostid, groupid) in memberships {
                groups.entry(hostid).or_default().push(groupid);
            }

            let mut stmt =
                conn.prepare("SELECT hostid, host, name, proxy_hostid FROM hosts ORDER BY hostid")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)? as u64,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                ))
            })?;
            let mut hosts = Vec::new();
            for row in rows {
                let (hostid, host, name, proxy_hostid) = row?;
                hosts.push(HostInfo {
                    hostid,
                    host,
                    name,
                    proxy_hostid: proxy_hostid.unwrap_or(0) as u64,
                    groupids: groups.remove(&hostid).unwrap_or_default(),
                });
            }
            Ok(hosts)
        })
    }

    pub fn save_host(&self, host: &HostInfo) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO hosts (hostid, host, name, proxy_hostid) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![host.hostid as i64, &host.host, &host.name, nullable(host.proxy_hostid)],
            )?;
            conn.execute(
                "DELETE FROM hosts_groups WHERE hostid = ?1",
                rusqlite::params![host.hostid as i64],
            )?;
            let mut stmt =
                conn.prepare_cached("INSERT INTO hosts_groups (hostid, groupid) VALUES (?1, ?2)")?;
            for groupid in &host.groupids {
                stmt.execute(rusqlite::params![host.hostid as i64, *groupid as i64])?;
            }
            Ok(())
        })
    }

    pub fn load_host_groups(&self) -> Result<Vec<HostGroup>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT groupid, name FROM hstgrp ORDER BY groupid")?;
            let rows = stmt.query_map([], |row| {
                Ok(HostGroup {
                    groupid: row.get::<_, i64>(0)? as u64,
                    name: row.get(1)?,
                })
            })?;
            let mut groups = Vec::new();
            for row in rows {
                groups.push(row?);
            }
            Ok(groups)
        })
    }

    pub fn save_host_group(&self, group: &HostGroup) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO hstgrp (groupid, name) VALUES (?1, ?2)",
                rusqlite::params![group.groupid as i64, &group.name],
            )?;
            Ok(())
        })
    }

    pub fn load_maintenances(&self) -> Result<Vec<Maintenance>> {
        self.with_connection(|conn| {
            let mut hosts: HashMap<u64, Vec<u64>> = HashMap::new();
            for (maintenanceid, hostid) in load_id_pairs(
                conn,
                "SELECT maintenanceid, hostid FROM maintenances_hosts ORDER BY maintenanceid, hostid",
            )? {
                hosts.entry(maintenanceid).or_default().push(hostid);
            }
            let mut groups: HashMap<u64, Vec<u64>> = HashMap::new();
            for (maintenanceid, groupid) in load_id_pairs(
                conn,
                "SELECT maintenanceid, groupid FROM maintenances_groups ORDER BY maintenanceid, groupid",
            )? {
                groups.entry(maintenanceid).or_default().push(groupid);
            }

            let mut tags: HashMap<u64, Vec<MaintenanceTag>> = HashMap::new();
            {
                let mut stmt = conn.prepare(
                    "SELECT maintenanceid, tag, operator, value FROM maintenance_tag ORDER BY maintenancetagid",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok((
                        row.get::<_, i64>(0)? as u64,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })?;
                for row in rows {
                    let (maintenanceid, tag, operator, value) = row?;
                    tags.entry(maintenanceid).or_default().push(MaintenanceTag {
                        tag,
                        value,
                        operator: decode("maintenance_tag.operator", operator, ConditionOperator::from_i32)?,
                    });
                }
            }

            let mut stmt = conn.prepare(
                "SELECT maintenanceid, name, active_since, active_till, tags_evaltype
                 FROM maintenances ORDER BY maintenanceid",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)? as u64,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?;
            let mut maintenances = Vec::new();
            for row in rows {
                let (maintenanceid, name, active_since, active_till, evaltype) = row?;
                maintenances.push(Maintenance {
                    maintenanceid,
                    name,
                    active_since,
                    active_till,
                    hostids: hosts.remove(&maintenanceid).unwrap_or_default(),
                    groupids: groups.remove(&maintenanceid).unwrap_or_default(),
                    tags_evaltype: decode("maintenances.tags_evaltype", evaltype, MaintenanceTagEval::from_i32)?,
                    tags: tags.remove(&maintenanceid).unwrap_or_default(),
                });
            }
            Ok(maintenances)
        })
    }

    pub fn save_maintenance(&self, maintenance: &Maintenance) -> Result<()> {
        self.with_connection(|conn| {
            let id = maintenance.maintenanceid as i64;
            let evaltype = match maintenance.tags_evaltype {
                MaintenanceTagEval::AndOr => 0,
                MaintenanceTagEval::Or => 2,
            };
            conn.execute(
                "INSERT OR REPLACE INTO maintenances (maintenanceid, name, active_since, active_till, tags_evaltype)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, &maintenance.name, maintenance.active_since, maintenance.active_till, evaltype],
            )?;
            for table in ["maintenances_hosts", "maintenances_groups", "maintenance_tag"] {
                conn.execute(
                    &format!("DELETE FROM {table} WHERE maintenanceid = ?1"),
                    rusqlite::params![id],
                )?;
            }
            for hostid in &maintenance.hostids {
                conn.execute(
                    "INSERT INTO maintenances_hosts (maintenanceid, hostid) VALUES (?1, ?2)",
                    rusqlite::params![id, *hostid as i64],
                )?;
            }
            for groupid in &maintenance.groupids {
                conn.execute(
                    "INSERT INTO maintenances_groups (maintenanceid, groupid) VALUES (?1, ?2)",
                    rusqlite::params![id, *groupid as i64],
                )?;
            }
            for tag in &maintenance.tags {
                conn.execute(
                    "INSERT INTO maintenance_tag (maintenanceid, tag, operator, value) VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![id, &tag.tag, tag.operator.as_i32(), &tag.value],
                )?;
            }
            Ok(())
        })
    }

    pub fn delete_maintenance(&self, maintenanceid: u64) -> Result<()> {
        self.with_connection(|conn| {
            for table in ["maintenances", "maintenances_hosts", "maintenances_groups", "maintenance_tag"] {
                conn.execute(
                    &format!("DELETE FROM {table} WHERE maintenanceid = ?1"),
                    rusqlite::params![maintenanceid as i64],
                )?;
            }
            Ok(())
        })
    }

    /// Enabled correlation rules with their conditions and operations.
    pub fn load_correlations(&self) -> Result<Vec<Correlation>> {
        self.with_connection(|conn| {
            let mut conditions: HashMap<u64, Vec<Condition>> = HashMap::new();
            {
                let mut stmt = conn.prepare(
                    "SELECT c.corr_conditionid, c.correlationid, c.type,
                            t.tag, g.operator, g.groupid, tp.oldtag, tp.newtag, tv.tag, tv.operator, tv.value
                     FROM corr_condition c
                     LEFT JOIN corr_condition_tag t ON t.corr_conditionid = c.corr_conditionid
                     LEFT JOIN corr_condition_group g ON g.corr_conditionid = c.corr_conditionid
                     LEFT JOIN corr_condition_tagpair tp ON tp.corr_conditionid = c.corr_conditionid
                     LEFT JOIN corr_condition_tagvalue tv ON tv.corr_conditionid = c.corr_conditionid
                     ORDER BY c.corr_conditionid",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok((
                        row.get::<_, i64>(0)? as u64,
                        row.get::<_, i64>(1)? as u64,
                        row.get::<_, i64>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<i64>>(4)?,
                        row.get::<_, Option<i64>>(5)?,
                        row.get::<_, Option<String>>(6)?,
                        row.get::<_, Option<String>>(7)?,
                        row.get::<_, Option<String>>(8)?,
                        row.get::<_, Option<i64>>(9)?,
                        row.get::<_, Option<String>>(10)?,
                    ))
                })?;
                for row in rows {
                    let (id, correlationid, kind, tag, g_op, groupid, oldtag, newtag, tv_tag, tv_op, tv_value) =
                        row?;
                    let operator = |op: Option<i64>| {
                        decode("corr_condition.operator", op.unwrap_or(0), ConditionOperator::from_i32)
                    };
                    let kind = match kind {
                        0 => ConditionKind::OldEventTag { tag: tag.unwrap_or_default() },
                        1 => ConditionKind::NewEventTag { tag: tag.unwrap_or_default() },
                        2 => ConditionKind::NewEventHostGroup {
                            groupid: groupid.unwrap_or(0) as u64,
                            operator: operator(g_op)?,
                        },
                        3 => ConditionKind::EventTagPair {
                            oldtag: oldtag.unwrap_or_default(),
                            newtag: newtag.unwrap_or_default(),
                        },
                        4 => ConditionKind::OldEventTagValue {
                            tag: tv_tag.unwrap_or_default(),
                            value: tv_value.unwrap_or_default(),
                            operator: operator(tv_op)?,
                        },
                        5 => ConditionKind::NewEventTagValue {
                            tag: tv_tag.unwrap_or_default(),
                            value: tv_value.unwrap_or_default(),
                            operator: operator(tv_op)?,
                        },
                        other => {
                            tracing::error!(corr_conditionid = id, kind = other, "Unknown correlation condition type");
                            continue;
                        }
                    };
                    conditions.entry(correlationid).or_default().push(Condition {
                        corr_conditionid: id,
                        kind,
                    });
                }
            }

            let mut operations: HashMap<u64, Vec<Operation>> = HashMap::new();
            {
                let mut stmt =
                    conn.prepare("SELECT correlationid, type FROM corr_operation ORDER BY corr_operationid")?;
                let rows = stmt.query_map([], |row| {
                    Ok((row.get::<_, i64>(0)? as u64, row.get::<_, i64>(1)?))
                })?;
                for row in rows {
                    let (correlationid, op) = row?;
                    operations
                        .entry(correlationid)
                        .or_default()
                        .push(decode("corr_operation.type", op, Operation::from_i32)?);
                }
            }

            let mut stmt = conn.prepare(
                "SELECT correlationid, name, evaltype, formula FROM correlation WHERE status = ?1 ORDER BY correlationid",
            )?;
            let rows = stmt.query_map(rusqlite::params![CORRELATION_ENABLED], |row| {
                Ok((
                    row.get::<_, i64>(0)? as u64,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?;
            let mut correlations = Vec::new();
            for row in rows {
                let (correlationid, name, evaltype, formula) = row?;
                correlations.push(Correlation {
                    correlationid,
                    name,
                    evaltype: decode("correlation.evaltype", evaltype, EvalType::from_i32)?,
                    formula,
                    conditions: conditions.remove(&correlationid).unwrap_or_default(),
                    operations: operations.remove(&correlationid).unwrap_or_default(),
                });
            }
            Ok(correlations)
        })
    }

    pub fn save_correlation(&self, correlation: &Correlation) -> Result<()> {
        self.with_connection(|conn| {
            let id = correlation.correlationid as i64;
            conn.execute(
                "INSERT OR REPLACE INTO correlation (correlationid, name, evaltype, status, formula)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    id,
                    &correlation.name,
                    correlation.evaltype.as_i32(),
                    CORRELATION_ENABLED,
                    &correlation.formula,
                ],
            )?;

            let old_conditions = {
                let mut stmt = conn.prepare("SELECT corr_conditionid FROM corr_condition WHERE correlationid = ?1")?;
                let rows = stmt.query_map(rusqlite::params![id], |row| row.get::<_, i64>(0))?;
                let mut ids = Vec::new();
                for row in rows {
                    ids.push(row?);
                }
                ids
            };
            for conditionid in old_conditions {
                for table in [
                    "corr_condition",
                    "corr_condition_tag",
                    "corr_condition_group",
                    "corr_condition_tagpair",
                    "corr_condition_tagvalue",
                ] {
                    conn.execute(
                        &format!("DELETE FROM {table} WHERE corr_conditionid = ?1"),
                        rusqlite::params![conditionid],
                    )?;
                }
            }
            conn.execute("DELETE FROM corr_operation WHERE correlationid = ?1", rusqlite::params![id])?;

            for condition in &correlation.conditions {
                let cid = condition.corr_conditionid as i64;
                conn.execute(
                    "INSERT INTO corr_condition (corr_conditionid, correlationid, type) VALUES (?1, ?2, ?3)",
                    rusqlite::params![cid, id, condition.kind.type_code()],
                )?;
                match &condition.kind {
                    ConditionKind::OldEventTag { tag } | ConditionKind::NewEventTag { tag } => {
                        conn.execute(
                            "INSERT INTO corr_condition_tag (corr_conditionid, tag) VALUES (?1, ?2)",
                            rusqlite::params![cid, tag],
                        )?;
                    }
                    ConditionKind::NewEventHostGroup { groupid, operator } => {
                        conn.execute(
                            "INSERT INTO corr_condition_group (corr_conditionid, operator, groupid) VALUES (?1, ?2, ?3)",
                            rusqlite::params![cid, operator.as_i32(), *groupid as i64],
                        )?;
                    }
                    ConditionKind::EventTagPair { oldtag, newtag } => {
                        conn.execute(
                            "INSERT INTO corr_condition_tagpair (corr_conditionid, oldtag, newtag) VALUES (?1, ?2, ?3)",
                            rusqlite::params![cid, oldtag, newtag],
                        )?;
                    }
                    ConditionKind::OldEventTagValue { tag, value, operator }
                    | ConditionKind::NewEventTagValue { tag, value, operator } => {
                        conn.execute(
                            "INSERT INTO corr_condition_tagvalue (corr_conditionid, tag, operator, value)
                             VALUES (?1, ?2, ?3, ?4)",
                            rusqlite::params![cid, tag, operator.as_i32(), value],
                        )?;
                    }
                }
            }
            for operation in &correlation.operations {
                conn.execute(
                    "INSERT INTO corr_operation (correlationid, type) VALUES (?1, ?2)",
                    rusqlite::params![id, operation.as_i32()],
                )?;
            }
            Ok(())
        })
    }
}
