use serde::{Deserialize, Serialize};
use std::ops::BitOr;

/// Maximum number of characters kept in a tag name.
pub const TAG_NAME_LEN: usize = 255;
/// Maximum number of characters kept in a tag value.
pub const TAG_VALUE_LEN: usize = 255;

/// Seconds plus nanoseconds, the resolution events are stored with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Timespec {
    pub sec: i64,
    pub ns: i32,
}

impl Timespec {
    pub fn new(sec: i64, ns: i32) -> Self {
        Self { sec, ns }
    }

    pub fn now() -> Self {
        let now = chrono::Utc::now();
        Self {
            sec: now.timestamp(),
            ns: now.timestamp_subsec_nanos() as i32,
        }
    }
}

macro_rules! int_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $value:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[repr(i32)]
        pub enum $name {
            $($variant = $value),+
        }

        impl $name {
            pub fn as_i32(self) -> i32 {
                self as i32
            }

            pub fn from_i32(value: i32) -> Option<Self> {
                match value {
                    $($value => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

int_enum!(
    /// Subsystem that produced an event.
    EventSource {
        Triggers = 0,
        Discovery = 1,
        AutoRegistration = 2,
        Internal = 3,
    }
);

int_enum!(
    /// Kind of object an event is about.
    EventObject {
        Trigger = 0,
        DiscoveredHost = 1,
        DiscoveredService = 2,
        ActiveAgent = 3,
        Item = 4,
        LldRule = 5,
    }
);

int_enum!(TriggerValue { Ok = 0, Problem = 1 });

int_enum!(TriggerState { Normal = 0, Unknown = 1 });

int_enum!(ItemState { Normal = 0, NotSupported = 1 });

int_enum!(
    /// How OK events of a trigger pick the problems they recover.
    CorrelationMode { None = 0, Tag = 1 }
);

int_enum!(TaskType {
    CloseProblem = 1,
    RemoteCommand = 2,
    RemoteCommandResult = 3,
    Acknowledge = 4,
    UpdateEventNames = 5,
    CheckNow = 6,
});

int_enum!(TaskStatus {
    New = 1,
    InProgress = 2,
    Done = 3,
    Expired = 4,
});

int_enum!(AlertStatus {
    NotSent = 0,
    Sent = 1,
    Failed = 2,
    New = 3,
});

/// Trigger priority.
///
/// ```
/// use vigil_common::types::Severity;
///
/// assert_eq!(Severity::from_i32(4), Some(Severity::High));
/// assert_eq!(Severity::High.to_string(), "High");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[repr(i32)]
pub enum Severity {
    #[default]
    NotClassified = 0,
    Information = 1,
    Warning = 2,
    Average = 3,
    High = 4,
    Disaster = 5,
}

impl Severity {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::NotClassified),
            1 => Some(Self::Information),
            2 => Some(Self::Warning),
            3 => Some(Self::Average),
            4 => Some(Self::High),
            5 => Some(Self::Disaster),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Severity::NotClassified => "Not classified",
            Severity::Information => "Information",
            Severity::Warning => "Warning",
            Severity::Average => "Average",
            Severity::High => "High",
            Severity::Disaster => "Disaster",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub tag: String,
    pub value: String,
}

impl Tag {
    pub fn new(tag: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            value: value.into(),
        }
    }
}

/// Processing flags of a staged event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventFlags(u8);

impl EventFlags {
    pub const UNSET: Self = Self(0x00);
    /// The event will be persisted.
    pub const CREATE: Self = Self(0x01);
    /// The event is persisted but never reaches actions.
    pub const NO_ACTION: Self = Self(0x02);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub fn is_unset(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for EventFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Trigger attributes captured when an event is generated.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerSnapshot {
    pub triggerid: u64,
    pub description: String,
    pub expression: String,
    pub recovery_expression: String,
    pub priority: Severity,
    pub trigger_type: i32,
    pub correlation_mode: CorrelationMode,
    pub correlation_tag: String,
    pub opdata: String,
    /// Trigger value at the time the event was generated.
    pub value: TriggerValue,
}

/// Source/object specific part of an event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    /// source = triggers, object = trigger
    Trigger(TriggerSnapshot),
    /// source = internal, object = trigger | item | lld rule
    Internal {
        object: EventObject,
        error: Option<String>,
    },
    /// discovery and autoregistration events
    Other {
        source: EventSource,
        object: EventObject,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// 0 until ids are reserved for the cycle.
    pub eventid: u64,
    pub objectid: u64,
    pub clock: i64,
    pub ns: i32,
    pub value: i32,
    pub severity: Severity,
    pub suppressed: bool,
    pub flags: EventFlags,
    pub name: String,
    pub tags: Vec<Tag>,
    pub payload: EventPayload,
}

impl Event {
    pub fn source(&self) -> EventSource {
        match &self.payload {
            EventPayload::Trigger(_) => EventSource::Triggers,
            EventPayload::Internal { .. } => EventSource::Internal,
            EventPayload::Other { source, .. } => *source,
        }
    }

    pub fn object(&self) -> EventObject {
        match &self.payload {
            EventPayload::Trigger(_) => EventObject::Trigger,
            EventPayload::Internal { object, .. } => *object,
            EventPayload::Other { object, .. } => *object,
        }
    }

    pub fn trigger(&self) -> Option<&TriggerSnapshot> {
        match &self.payload {
            EventPayload::Trigger(trigger) => Some(trigger),
            _ => None,
        }
    }

    pub fn ts(&self) -> Timespec {
        Timespec::new(self.clock, self.ns)
    }

    pub fn is_created(&self) -> bool {
        self.flags.contains(EventFlags::CREATE)
    }

    /// True for trigger events with value PROBLEM.
    pub fn is_trigger_problem(&self) -> bool {
        matches!(self.payload, EventPayload::Trigger(_)) && self.value == TriggerValue::Problem.as_i32()
    }

    /// True for events that open a problem when persisted.
    pub fn opens_problem(&self) -> bool {
        match &self.payload {
            EventPayload::Trigger(_) => self.value == TriggerValue::Problem.as_i32(),
            EventPayload::Internal { object, .. } => match object {
                EventObject::Trigger => self.value == TriggerState::Unknown.as_i32(),
                EventObject::Item | EventObject::LldRule => {
                    self.value == ItemState::NotSupported.as_i32()
                }
                _ => false,
            },
            EventPayload::Other { .. } => false,
        }
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.iter().any(|t| t.tag == name)
    }
}

/// Dirty flags of a [`TriggerDiff`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiffFlags(u32);

impl DiffFlags {
    pub const UNSET: Self = Self(0x0000);
    pub const UPDATE_VALUE: Self = Self(0x0001);
    pub const UPDATE_LASTCHANGE: Self = Self(0x0002);
    pub const UPDATE_STATE: Self = Self(0x0004);
    pub const UPDATE_ERROR: Self = Self(0x0008);
    pub const UPDATE_PROBLEM_COUNT: Self = Self(0x1000);
    pub const RECALCULATE_PROBLEM_COUNT: Self = Self(0x2000);

    /// Flags that require the trigger row to be written.
    pub const UPDATE_TRIGGER: Self =
        Self(Self::UPDATE_VALUE.0 | Self::UPDATE_LASTCHANGE.0 | Self::UPDATE_STATE.0 | Self::UPDATE_ERROR.0);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub fn is_unset(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for DiffFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Pending change of one trigger, accumulated over a processing cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerDiff {
    pub triggerid: u64,
    pub priority: Severity,
    pub flags: DiffFlags,
    pub value: TriggerValue,
    pub state: TriggerState,
    pub lastchange: i64,
    pub problem_count: u32,
    pub error: Option<String>,
}

impl TriggerDiff {
    pub fn new(triggerid: u64, priority: Severity, value: TriggerValue) -> Self {
        Self {
            triggerid,
            priority,
            flags: DiffFlags::UNSET,
            value,
            state: TriggerState::Normal,
            lastchange: 0,
            problem_count: 0,
            error: None,
        }
    }
}

/// Trigger diffs ordered by triggerid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriggerDiffs(Vec<TriggerDiff>);

impl TriggerDiffs {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn find(&self, triggerid: u64) -> Option<&TriggerDiff> {
        self.0
            .binary_search_by_key(&triggerid, |d| d.triggerid)
            .ok()
            .map(|i| &self.0[i])
    }

    pub fn find_mut(&mut self, triggerid: u64) -> Option<&mut TriggerDiff> {
        match self.0.binary_search_by_key(&triggerid, |d| d.triggerid) {
            Ok(i) => Some(&mut self.0[i]),
            Err(_) => None,
        }
    }

    /// Inserts keeping the order. An existing diff for the same trigger is
    /// left untouched and `false` is returned.
    pub fn insert(&mut self, diff: TriggerDiff) -> bool {
        match self.0.binary_search_by_key(&diff.triggerid, |d| d.triggerid) {
            Ok(_) => false,
            Err(pos) => {
                self.0.insert(pos, diff);
                true
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &TriggerDiff> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TriggerDiff> {
        self.0.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<TriggerDiff>> for TriggerDiffs {
    fn from(mut diffs: Vec<TriggerDiff>) -> Self {
        diffs.sort_by_key(|d| d.triggerid);
        diffs.dedup_by_key(|d| d.triggerid);
        Self(diffs)
    }
}
