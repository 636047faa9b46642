pub(crate) const IDS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS ids (
    table_name TEXT NOT NULL,
    field_name TEXT NOT NULL,
    nextid INTEGER NOT NULL,
    PRIMARY KEY (table_name, field_name)
);
";

pub(crate) const LOCK_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS trigger_lock (
    triggerid INTEGER PRIMARY KEY,
    owner TEXT NOT NULL,
    pid INTEGER NOT NULL DEFAULT 0,
    clock INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS trigger_lock_1 ON trigger_lock(owner);
";

pub(crate) const EVENTS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS events (
    eventid INTEGER PRIMARY KEY,
    source INTEGER NOT NULL DEFAULT 0,
    object INTEGER NOT NULL DEFAULT 0,
    objectid INTEGER NOT NULL DEFAULT 0,
    clock INTEGER NOT NULL DEFAULT 0,
    ns INTEGER NOT NULL DEFAULT 0,
    value INTEGER NOT NULL DEFAULT 0,
    acknowledged INTEGER NOT NULL DEFAULT 0,
    name TEXT NOT NULL DEFAULT '',
    severity INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS events_1 ON events(source, object, objectid, clock);
CREATE INDEX IF NOT EXISTS events_2 ON events(source, object, clock);

CREATE TABLE IF NOT EXISTS event_tag (
    eventtagid INTEGER PRIMARY KEY AUTOINCREMENT,
    eventid INTEGER NOT NULL,
    tag TEXT NOT NULL DEFAULT '',
    value TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS event_tag_1 ON event_tag(eventid);

CREATE TABLE IF NOT EXISTS problem (
    eventid INTEGER PRIMARY KEY,
    source INTEGER NOT NULL DEFAULT 0,
    object INTEGER NOT NULL DEFAULT 0,
    objectid INTEGER NOT NULL DEFAULT 0,
    clock INTEGER NOT NULL DEFAULT 0,
    ns INTEGER NOT NULL DEFAULT 0,
    r_eventid INTEGER,
    r_clock INTEGER NOT NULL DEFAULT 0,
    r_ns INTEGER NOT NULL DEFAULT 0,
    correlationid INTEGER,
    userid INTEGER,
    name TEXT NOT NULL DEFAULT '',
    acknowledged INTEGER NOT NULL DEFAULT 0,
    severity INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS problem_1 ON problem(source, object, objectid);
CREATE INDEX IF NOT EXISTS problem_2 ON problem(clock, ns);
CREATE INDEX IF NOT EXISTS problem_3 ON problem(r_clock);

CREATE TABLE IF NOT EXISTS problem_tag (
    problemtagid INTEGER PRIMARY KEY AUTOINCREMENT,
    eventid INTEGER NOT NULL,
    tag TEXT NOT NULL DEFAULT '',
    value TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS problem_tag_1 ON problem_tag(eventid, tag, value);

CREATE TABLE IF NOT EXISTS event_recovery (
    eventid INTEGER PRIMARY KEY,
    r_eventid INTEGER NOT NULL,
    c_eventid INTEGER,
    correlationid INTEGER,
    userid INTEGER
);
CREATE INDEX IF NOT EXISTS event_recovery_1 ON event_recovery(r_eventid);

CREATE TABLE IF NOT EXISTS event_suppress (
    event_suppressid INTEGER PRIMARY KEY AUTOINCREMENT,
    eventid INTEGER NOT NULL,
    maintenanceid INTEGER,
    suppress_until INTEGER NOT NULL DEFAULT 0,
    UNIQUE (eventid, maintenanceid)
);
CREATE INDEX IF NOT EXISTS event_suppress_1 ON event_suppress(suppress_until);
";

pub(crate) const CONFIG_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS triggers (
    triggerid INTEGER PRIMARY KEY,
    expression TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    status INTEGER NOT NULL DEFAULT 0,
    value INTEGER NOT NULL DEFAULT 0,
    priority INTEGER NOT NULL DEFAULT 0,
    lastchange INTEGER NOT NULL DEFAULT 0,
    error TEXT NOT NULL DEFAULT '',
    type INTEGER NOT NULL DEFAULT 0,
    state INTEGER NOT NULL DEFAULT 0,
    recovery_expression TEXT NOT NULL DEFAULT '',
    correlation_mode INTEGER NOT NULL DEFAULT 0,
    correlation_tag TEXT NOT NULL DEFAULT '',
    opdata TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS trigger_tag (
    triggertagid INTEGER PRIMARY KEY AUTOINCREMENT,
    triggerid INTEGER NOT NULL,
    tag TEXT NOT NULL DEFAULT '',
    value TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS trigger_tag_1 ON trigger_tag(triggerid);

CREATE TABLE IF NOT EXISTS trigger_depends (
    triggerdepid INTEGER PRIMARY KEY AUTOINCREMENT,
    triggerid_down INTEGER NOT NULL,
    triggerid_up INTEGER NOT NULL,
    UNIQUE (triggerid_down, triggerid_up)
);

CREATE TABLE IF NOT EXISTS hosts (
    hostid INTEGER PRIMARY KEY,
    proxy_hostid INTEGER,
    host TEXT NOT NULL DEFAULT '',
    name TEXT NOT NULL DEFAULT '',
    status INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS hstgrp (
    groupid INTEGER PRIMARY KEY,
    name TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS hosts_groups (
    hostgroupid INTEGER PRIMARY KEY AUTOINCREMENT,
    hostid INTEGER NOT NULL,
    groupid INTEGER NOT NULL,
    UNIQUE (hostid, groupid)
);

CREATE TABLE IF NOT EXISTS items (
    itemid INTEGER PRIMARY KEY,
    hostid INTEGER NOT NULL,
    key_ TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS item_tag (
    itemtagid INTEGER PRIMARY KEY AUTOINCREMENT,
    itemid INTEGER NOT NULL,
    tag TEXT NOT NULL DEFAULT '',
    value TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS functions (
    functionid INTEGER PRIMARY KEY,
    itemid INTEGER NOT NULL,
    triggerid INTEGER NOT NULL,
    name TEXT NOT NULL DEFAULT '',
    parameter TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS functions_1 ON functions(triggerid);

CREATE TABLE IF NOT EXISTS maintenances (
    maintenanceid INTEGER PRIMARY KEY,
    name TEXT NOT NULL DEFAULT '',
    active_since INTEGER NOT NULL DEFAULT 0,
    active_till INTEGER NOT NULL DEFAULT 0,
    tags_evaltype INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS maintenances_hosts (
    maintenance_hostid INTEGER PRIMARY KEY AUTOINCREMENT,
    maintenanceid INTEGER NOT NULL,
    hostid INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS maintenances_groups (
    maintenance_groupid INTEGER PRIMARY KEY AUTOINCREMENT,
    maintenanceid INTEGER NOT NULL,
    groupid INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS maintenance_tag (
    maintenancetagid INTEGER PRIMARY KEY AUTOINCREMENT,
    maintenanceid INTEGER NOT NULL,
    tag TEXT NOT NULL DEFAULT '',
    operator INTEGER NOT NULL DEFAULT 2,
    value TEXT NOT NULL DEFAULT ''
);
";

pub(crate) const CORRELATION_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS correlation (
    correlationid INTEGER PRIMARY KEY,
    name TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    evaltype INTEGER NOT NULL DEFAULT 0,
    status INTEGER NOT NULL DEFAULT 0,
    formula TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS corr_condition (
    corr_conditionid INTEGER PRIMARY KEY,
    correlationid INTEGER NOT NULL,
    type INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS corr_condition_1 ON corr_condition(correlationid);

CREATE TABLE IF NOT EXISTS corr_condition_tag (
    corr_conditionid INTEGER PRIMARY KEY,
    tag TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS corr_condition_group (
    corr_conditionid INTEGER PRIMARY KEY,
    operator INTEGER NOT NULL DEFAULT 0,
    groupid INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS corr_condition_tagpair (
    corr_conditionid INTEGER PRIMARY KEY,
    oldtag TEXT NOT NULL DEFAULT '',
    newtag TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS corr_condition_tagvalue (
    corr_conditionid INTEGER PRIMARY KEY,
    tag TEXT NOT NULL DEFAULT '',
    operator INTEGER NOT NULL DEFAULT 0,
    value TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS corr_operation (
    corr_operationid INTEGER PRIMARY KEY AUTOINCREMENT,
    correlationid INTEGER NOT NULL,
    type INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS corr_operation_1 ON corr_operation(correlationid);
";

pub(crate) const TASK_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS acknowledges (
    acknowledgeid INTEGER PRIMARY KEY,
    userid INTEGER NOT NULL,
    eventid INTEGER NOT NULL,
    clock INTEGER NOT NULL DEFAULT 0,
    message TEXT NOT NULL DEFAULT '',
    action INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS alerts (
    alertid INTEGER PRIMARY KEY,
    eventid INTEGER NOT NULL DEFAULT 0,
    clock INTEGER NOT NULL DEFAULT 0,
    message TEXT NOT NULL DEFAULT '',
    status INTEGER NOT NULL DEFAULT 0,
    error TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS task (
    taskid INTEGER PRIMARY KEY,
    type INTEGER NOT NULL,
    status INTEGER NOT NULL DEFAULT 0,
    clock INTEGER NOT NULL DEFAULT 0,
    ttl INTEGER NOT NULL DEFAULT 0,
    proxy_hostid INTEGER
);
CREATE INDEX IF NOT EXISTS task_1 ON task(status, proxy_hostid);

CREATE TABLE IF NOT EXISTS task_close_problem (
    taskid INTEGER PRIMARY KEY,
    acknowledgeid INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS task_remote_command (
    taskid INTEGER PRIMARY KEY,
    command TEXT NOT NULL DEFAULT '',
    alertid INTEGER,
    parent_taskid INTEGER NOT NULL DEFAULT 0,
    hostid INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS task_remote_command_result (
    taskid INTEGER PRIMARY KEY,
    status INTEGER NOT NULL DEFAULT 0,
    parent_taskid INTEGER NOT NULL,
    info TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS task_acknowledge (
    taskid INTEGER PRIMARY KEY,
    acknowledgeid INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS task_check_now (
    taskid INTEGER PRIMARY KEY,
    itemid INTEGER NOT NULL
);
";
