//! Per-cycle event staging cache.
//!
//! Holds the events created during one processing cycle, the recoveries
//! decided for already open problems and the queue of problems a global
//! correlation rule wants closed once their triggers are locked.

use crate::tags::{add_tag, expand_macros, MacroContext};
use crate::ConfigCache;
use std::collections::BTreeMap;
use vigil_common::config::TriggerInfo;
use vigil_common::expression::functionids;
use vigil_common::types::{
    CorrelationMode, Event, EventFlags, EventObject, EventPayload, Severity, Tag, Timespec,
    TriggerSnapshot, TriggerValue,
};

/// A problem closed in this cycle. `r_event` indexes the recovery event in
/// the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRecovery {
    pub eventid: u64,
    pub objectid: u64,
    pub r_event: usize,
    pub correlationid: u64,
    pub c_eventid: u64,
    pub userid: u64,
}

/// Deferred close of an old problem requested by a correlation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseIntent {
    pub eventid: u64,
    pub c_eventid: u64,
    pub correlationid: u64,
    /// Trigger that generated the old problem.
    pub objectid: u64,
    pub ts: Timespec,
}

#[derive(Debug, Default)]
pub struct EventCache {
    events: Vec<Event>,
    recoveries: BTreeMap<u64, EventRecovery>,
    closing: BTreeMap<u64, CloseIntent>,
}

impl EventCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages a trigger event. Name, correlation tag and tags are expanded
    /// from the trigger configuration and the items its expression uses.
    pub fn stage_trigger(
        &mut self,
        config: &dyn ConfigCache,
        trigger: &TriggerInfo,
        ts: Timespec,
        value: TriggerValue,
    ) -> &Event {
        let idx = self.push_trigger_event(config, trigger.snapshot(), &trigger.tags, ts, value);
        &self.events[idx]
    }

    /// Stages an internal event. `value` is the trigger or item state.
    pub fn stage_internal(
        &mut self,
        object: EventObject,
        objectid: u64,
        ts: Timespec,
        value: i32,
        error: Option<&str>,
    ) -> &Event {
        self.events.push(Event {
            eventid: 0,
            objectid,
            clock: ts.sec,
            ns: ts.ns,
            value,
            severity: Severity::NotClassified,
            suppressed: false,
            flags: EventFlags::CREATE,
            name: error.unwrap_or_default().to_string(),
            tags: Vec::new(),
            payload: EventPayload::Internal {
                object,
                error: error.map(str::to_string),
            },
        });
        let idx = self.events.len() - 1;
        &self.events[idx]
    }

    pub(crate) fn push_trigger_event(
        &mut self,
        config: &dyn ConfigCache,
        mut snapshot: TriggerSnapshot,
        trigger_tags: &[Tag],
        ts: Timespec,
        value: TriggerValue,
    ) -> usize {
        let fids = functionids(&snapshot.expression);
        let hosts = config.hosts_by_functionids(&fids);
        let items = config.items_by_functionids(&fids);

        let (name, correlation_tag, tags) = {
            let ctx = MacroContext {
                trigger: &snapshot,
                host: hosts.first(),
                item: None,
            };
            let correlation_tag = expand_macros(&snapshot.correlation_tag, &ctx);
            let name = expand_macros(&snapshot.description, &ctx);

            let mut tags = Vec::new();
            for tag in trigger_tags {
                add_tag(
                    &mut tags,
                    &Tag::new(expand_macros(&tag.tag, &ctx), expand_macros(&tag.value, &ctx)),
                );
            }
            for item in &items {
                let host = hosts.iter().find(|h| h.hostid == item.hostid);
                let item_ctx = MacroContext {
                    trigger: &snapshot,
                    host,
                    item: Some(item),
                };
                for tag in &item.tags {
                    add_tag(
                        &mut tags,
                        &Tag::new(
                            expand_macros(&tag.tag, &item_ctx),
                            expand_macros(&tag.value, &item_ctx),
                        ),
                    );
                }
            }
            (name, correlation_tag, tags)
        };
        snapshot.correlation_tag = correlation_tag;

        let severity = match value {
            TriggerValue::Problem => snapshot.priority,
            TriggerValue::Ok => Severity::NotClassified,
        };

        self.events.push(Event {
            eventid: 0,
            objectid: snapshot.triggerid,
            clock: ts.sec,
            ns: ts.ns,
            value: value.as_i32(),
            severity,
            suppressed: false,
            flags: EventFlags::CREATE,
            name,
            tags,
            payload: EventPayload::Trigger(snapshot),
        });
        self.events.len() - 1
    }

    /// Stages an OK event closing problem `eventid` and records the
    /// recovery. Returns the index of the new event, or `None` when the
    /// problem already has a recovery in this cycle.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn close_trigger_event(
        &mut self,
        config: &dyn ConfigCache,
        eventid: u64,
        trigger: &TriggerSnapshot,
        ts: Timespec,
        userid: u64,
        correlationid: u64,
        c_eventid: u64,
    ) -> Option<usize> {
        if self.recoveries.contains_key(&eventid) {
            tracing::debug!(eventid, "Problem already has a recovery in this cycle");
            return None;
        }

        let snapshot = TriggerSnapshot {
            correlation_mode: CorrelationMode::None,
            correlation_tag: String::new(),
            value: TriggerValue::Problem,
            ..trigger.clone()
        };
        let r_event = self.push_trigger_event(config, snapshot, &[], ts, TriggerValue::Ok);
        self.recoveries.insert(
            eventid,
            EventRecovery {
                eventid,
                objectid: trigger.triggerid,
                r_event,
                correlationid,
                c_eventid,
                userid,
            },
        );
        Some(r_event)
    }

    /// Records that staged event `r_event` recovers problem `eventid`.
    pub(crate) fn recover_event(&mut self, eventid: u64, objectid: u64, r_event: usize) -> bool {
        if self.recoveries.contains_key(&eventid) {
            tracing::debug!(eventid, "Problem already has a recovery in this cycle");
            return false;
        }
        self.recoveries.insert(
            eventid,
            EventRecovery {
                eventid,
                objectid,
                r_event,
                correlationid: 0,
                c_eventid: 0,
                userid: 0,
            },
        );
        true
    }

    /// Queues a close intent. Problems already recovered in this cycle or
    /// already queued are left alone.
    pub(crate) fn queue_close(&mut self, intent: CloseIntent) -> bool {
        if self.recoveries.contains_key(&intent.eventid) || self.closing.contains_key(&intent.eventid) {
            return false;
        }
        self.closing.insert(intent.eventid, intent);
        true
    }

    pub(crate) fn take_close_intent(&mut self, eventid: u64) -> Option<CloseIntent> {
        self.closing.remove(&eventid)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub(crate) fn events_mut(&mut self) -> &mut [Event] {
        &mut self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn has_recovery(&self, eventid: u64) -> bool {
        self.recoveries.contains_key(&eventid)
    }

    /// Recoveries ordered by problem eventid.
    pub fn recoveries(&self) -> impl Iterator<Item = &EventRecovery> {
        self.recoveries.values()
    }

    pub fn is_queued(&self, eventid: u64) -> bool {
        self.closing.contains_key(&eventid)
    }

    pub fn closing_queue(&self) -> impl Iterator<Item = &CloseIntent> {
        self.closing.values()
    }

    /// Drops the recoveries decided so far and keeps the staged events.
    pub fn reset_recovery(&mut self) {
        self.recoveries.clear();
    }

    /// Ends a cycle: drops events and recoveries. Close intents whose
    /// triggers could not be locked stay queued.
    pub fn clear_events(&mut self) {
        self.events.clear();
        self.recoveries.clear();
    }

    /// Drops all state including the close queue.
    pub fn clear(&mut self) {
        self.events.clear();
        self.recoveries.clear();
        self.closing.clear();
    }
}
