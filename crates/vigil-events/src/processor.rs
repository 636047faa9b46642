//! Cycle entry points: event processing and interactive problem closing.

use crate::cache::EventCache;
use crate::correlation::correlate_events;
use crate::error::Result;
use crate::flush::flush_closing_queue;
use crate::persist::{closed_pairs, save_events, save_problems, save_recoveries};
use crate::recalc::update_trigger_changes;
use crate::resolver::{check_internal_dependencies, process_trigger_events, recover_internal_problems};
use crate::suppress::update_event_suppress_data;
use crate::{ConfigCache, TriggerLocker};
use std::sync::Arc;
use vigil_common::config::TriggerInfo;
use vigil_common::expression::functionids;
use vigil_common::types::{
    DiffFlags, Event, EventObject, EventSource, ItemState, Timespec, TriggerDiff, TriggerDiffs,
    TriggerState, TriggerValue,
};
use vigil_dispatch::export::{ExportHost, ProblemExporter, ProblemRecord, RecoveryRecord};
use vigil_dispatch::ActionDispatcher;
use vigil_storage::Store;

/// Owns the staging cache of one worker and runs its processing cycles.
pub struct EventProcessor {
    store: Arc<Store>,
    config: Arc<dyn ConfigCache>,
    locker: Arc<dyn TriggerLocker>,
    dispatcher: Arc<dyn ActionDispatcher>,
    exporter: Option<ProblemExporter>,
    cache: EventCache,
}

/// Staged events split by how a cycle treats them.
#[derive(Default)]
struct EventClasses {
    triggers: Vec<usize>,
    internal_triggers: Vec<usize>,
    internal_ok: Vec<usize>,
}

impl EventClasses {
    fn classify(events: &[Event], staged: usize) -> Self {
        let mut classes = Self::default();
        for (idx, event) in events.iter().enumerate().take(staged) {
            match (event.source(), event.object()) {
                (EventSource::Triggers, EventObject::Trigger) => classes.triggers.push(idx),
                (EventSource::Internal, EventObject::Trigger) => {
                    if event.value == TriggerState::Normal.as_i32() {
                        classes.internal_ok.push(idx);
                    }
                    classes.internal_triggers.push(idx);
                }
                (EventSource::Internal, EventObject::Item | EventObject::LldRule) => {
                    if event.value == ItemState::Normal.as_i32() {
                        classes.internal_ok.push(idx);
                    }
                }
                _ => {}
            }
        }
        classes
    }
}

impl EventProcessor {
    pub fn new(
        store: Arc<Store>,
        config: Arc<dyn ConfigCache>,
        locker: Arc<dyn TriggerLocker>,
        dispatcher: Arc<dyn ActionDispatcher>,
    ) -> Self {
        Self {
            store,
            config,
            locker,
            dispatcher,
            exporter: None,
            cache: EventCache::new(),
        }
    }

    pub fn with_exporter(mut self, exporter: ProblemExporter) -> Self {
        self.exporter = Some(exporter);
        self
    }

    pub fn cache(&self) -> &EventCache {
        &self.cache
    }

    pub fn stage_trigger(&mut self, trigger: &TriggerInfo, ts: Timespec, value: TriggerValue) -> &Event {
        self.cache.stage_trigger(&*self.config, trigger, ts, value)
    }

    pub fn stage_internal(
        &mut self,
        object: EventObject,
        objectid: u64,
        ts: Timespec,
        value: i32,
        error: Option<&str>,
    ) -> &Event {
        self.cache.stage_internal(object, objectid, ts, value, error)
    }

    pub fn reset_recovery(&mut self) {
        self.cache.reset_recovery();
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Processes the staged events and returns how many were persisted.
    ///
    /// `diffs` holds the changes of the triggers that generated the events
    /// and gains entries for triggers touched by correlation. `locked` lists
    /// the triggers the caller holds; triggers locked while closing
    /// correlated problems are appended and must be unlocked by the caller.
    pub fn process_events(&mut self, diffs: &mut TriggerDiffs, locked: &mut Vec<u64>) -> Result<usize> {
        let staged = self.cache.len();

        // Intents left over from earlier cycles get another chance to lock
        // their triggers even when nothing new was staged.
        if self.cache.closing_queue().next().is_some() {
            flush_closing_queue(
                &mut self.cache,
                &self.store,
                &*self.config,
                &*self.locker,
                diffs,
                locked,
            )?;
        }

        if self.cache.is_empty() {
            return Ok(0);
        }

        let result = self.run_cycle(staged, diffs, locked);
        if let Err(e) = &result {
            tracing::error!(error = %e, events = self.cache.len(), "Event processing cycle failed");
            self.cache.clear_events();
        }
        result
    }

    fn run_cycle(&mut self, staged: usize, diffs: &mut TriggerDiffs, locked: &mut Vec<u64>) -> Result<usize> {
        let unassigned = self.cache.events().iter().filter(|e| e.eventid == 0).count() as u64;
        if unassigned != 0 {
            let mut next = self.store.reserve_ids("events", "eventid", unassigned)?;
            for event in self.cache.events_mut() {
                if event.eventid == 0 {
                    event.eventid = next;
                    next += 1;
                }
            }
        }

        let classes = EventClasses::classify(self.cache.events(), staged);
        let config = &*self.config;

        if !classes.internal_triggers.is_empty() {
            check_internal_dependencies(
                &mut self.cache,
                config,
                &classes.internal_triggers,
                &classes.triggers,
                diffs,
            );
        }
        if !classes.internal_ok.is_empty() {
            recover_internal_problems(&mut self.cache, &self.store, &classes.internal_ok)?;
        }
        if !classes.triggers.is_empty() {
            process_trigger_events(&mut self.cache, &self.store, config, &classes.triggers, diffs)?;
            correlate_events(&mut self.cache, &self.store, config, &classes.triggers, diffs)?;
            flush_closing_queue(&mut self.cache, &self.store, config, &*self.locker, diffs, locked)?;
        }

        let processed = self.persist(diffs)?;
        tracing::debug!(processed, staged, "Events processed");
        Ok(processed)
    }

    /// Writes the cycle in one transaction, then publishes it.
    fn persist(&mut self, diffs: &mut TriggerDiffs) -> Result<usize> {
        let store = Arc::clone(&self.store);
        let config = Arc::clone(&self.config);
        let cache = &mut self.cache;
        let now = chrono::Utc::now().timestamp();

        let processed = store.transaction(|store| -> Result<usize> {
            let processed = save_events(cache, store)?;
            save_problems(cache, store)?;
            save_recoveries(cache, store)?;
            update_event_suppress_data(cache, store, &*config, now)?;
            update_trigger_changes(cache, store, diffs)?;
            store.save_trigger_changes(diffs)?;
            Ok(processed)
        })?;

        self.config.apply_trigger_changes(diffs);
        self.dispatch();
        self.export_events();
        self.cache.clear_events();
        Ok(processed)
    }

    fn dispatch(&self) {
        let closed = closed_pairs(&self.cache);
        if let Err(e) = self.dispatcher.process_events(self.cache.events(), &closed) {
            tracing::error!(error = %e, "Action dispatch failed");
        }
    }

    /// Closes problem `eventid` of `triggerid` on behalf of a user. The
    /// caller must hold the trigger lock. Returns false when the trigger is
    /// unknown or nothing was written.
    pub fn close_problem(&mut self, triggerid: u64, eventid: u64, userid: u64) -> Result<bool> {
        let Some(Some(trigger)) = self.config.triggers_by_ids(&[triggerid]).pop() else {
            tracing::debug!(triggerid, "Cannot close problem of unknown trigger");
            return Ok(false);
        };

        let mut diff = TriggerDiff::new(triggerid, trigger.priority, trigger.value);
        diff.flags = DiffFlags::RECALCULATE_PROBLEM_COUNT;
        let mut diffs = TriggerDiffs::from(vec![diff]);
        let ts = Timespec::now();

        let store = Arc::clone(&self.store);
        let config = Arc::clone(&self.config);
        let cache = &mut self.cache;
        let result = store.transaction(|store| -> Result<usize> {
            if !store.is_problem_open(eventid)? {
                tracing::debug!(eventid, "Problem is already closed");
                return Ok(0);
            }
            if cache
                .close_trigger_event(&*config, eventid, &trigger.snapshot(), ts, userid, 0, 0)
                .is_none()
            {
                return Ok(0);
            }
            let processed = save_events(cache, store)?;
            save_problems(cache, store)?;
            save_recoveries(cache, store)?;
            update_event_suppress_data(cache, store, &*config, ts.sec)?;
            update_trigger_changes(cache, store, &mut diffs)?;
            store.save_trigger_changes(&diffs)?;
            Ok(processed)
        });

        let processed = match result {
            Ok(processed) => processed,
            Err(e) => {
                self.cache.clear_events();
                return Err(e);
            }
        };

        self.config.apply_trigger_changes(&diffs);
        self.dispatch();
        self.export_events();
        self.cache.clear_events();

        tracing::info!(triggerid, eventid, userid, closed = processed != 0, "Problem close requested");
        Ok(processed != 0)
    }

    /// Appends the new problems and recoveries of the current cycle to the
    /// export file. Does nothing when export is disabled.
    pub fn export_events(&mut self) {
        let Some(exporter) = self.exporter.as_mut() else {
            return;
        };

        for event in self.cache.events() {
            if !event.is_created() || !event.is_trigger_problem() {
                continue;
            }
            let Some(trigger) = event.trigger() else {
                continue;
            };
            let hosts = self.config.hosts_by_functionids(&functionids(&trigger.expression));
            let hostids: Vec<u64> = hosts.iter().map(|h| h.hostid).collect();
            let record = ProblemRecord {
                clock: event.clock,
                ns: event.ns,
                value: event.value,
                eventid: event.eventid,
                name: event.name.clone(),
                severity: event.severity.as_i32(),
                groups: self.config.host_group_names(&hostids),
                hosts: hosts
                    .into_iter()
                    .map(|h| ExportHost {
                        host: h.host,
                        name: h.name,
                    })
                    .collect(),
                tags: event.tags.clone(),
            };
            if let Err(e) = exporter.export_problem(&record) {
                tracing::error!(error = %e, eventid = event.eventid, "Cannot export problem");
            }
        }

        for recovery in self.cache.recoveries() {
            let r_event = &self.cache.events()[recovery.r_event];
            if r_event.source() != EventSource::Triggers {
                continue;
            }
            let record = RecoveryRecord {
                clock: r_event.clock,
                ns: r_event.ns,
                value: r_event.value,
                eventid: r_event.eventid,
                p_eventid: recovery.eventid,
            };
            if let Err(e) = exporter.export_recovery(&record) {
                tracing::error!(error = %e, eventid = recovery.eventid, "Cannot export recovery");
            }
        }
    }
}
