//! Records of the shared configuration snapshot.

use crate::correlation::ConditionOperator;
use crate::types::{
    CorrelationMode, Severity, Tag, TriggerSnapshot, TriggerState, TriggerValue,
};

#[derive(Debug, Clone, PartialEq)]
pub struct TriggerInfo {
    pub triggerid: u64,
    pub description: String,
    pub expression: String,
    pub recovery_expression: String,
    pub priority: Severity,
    pub trigger_type: i32,
    pub value: TriggerValue,
    pub state: TriggerState,
    pub lastchange: i64,
    pub correlation_mode: CorrelationMode,
    pub correlation_tag: String,
    pub opdata: String,
    /// Configured tags, macros unexpanded.
    pub tags: Vec<Tag>,
}

impl TriggerInfo {
    pub fn new(triggerid: u64, description: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            triggerid,
            description: description.into(),
            expression: expression.into(),
            recovery_expression: String::new(),
            priority: Severity::NotClassified,
            trigger_type: 0,
            value: TriggerValue::Ok,
            state: TriggerState::Normal,
            lastchange: 0,
            correlation_mode: CorrelationMode::None,
            correlation_tag: String::new(),
            opdata: String::new(),
            tags: Vec::new(),
        }
    }

    pub fn snapshot(&self) -> TriggerSnapshot {
        TriggerSnapshot {
            triggerid: self.triggerid,
            description: self.description.clone(),
            expression: self.expression.clone(),
            recovery_expression: self.recovery_expression.clone(),
            priority: self.priority,
            trigger_type: self.trigger_type,
            correlation_mode: self.correlation_mode,
            correlation_tag: self.correlation_tag.clone(),
            opdata: self.opdata.clone(),
            value: self.value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyStatus {
    /// A master trigger is in PROBLEM state already.
    Fail,
    /// Outcome depends on the master triggers processed in this cycle.
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerDependency {
    pub triggerid: u64,
    pub status: DependencyStatus,
    pub masterids: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRef {
    pub functionid: u64,
    pub itemid: u64,
    pub triggerid: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemInfo {
    pub itemid: u64,
    pub hostid: u64,
    pub key: String,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub hostid: u64,
    pub host: String,
    pub name: String,
    /// 0 when the host is monitored by the server itself.
    pub proxy_hostid: u64,
    pub groupids: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostGroup {
    pub groupid: u64,
    /// Nesting is expressed by `/` separated names.
    pub name: String,
}

/// Item tag after macro expansion, ready to attach to an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemTag {
    pub itemid: u64,
    pub tag: Tag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaintenanceTagEval {
    #[default]
    AndOr,
    Or,
}

impl MaintenanceTagEval {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::AndOr),
            2 => Some(Self::Or),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceTag {
    pub tag: String,
    pub value: String,
    pub operator: ConditionOperator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Maintenance {
    pub maintenanceid: u64,
    pub name: String,
    pub active_since: i64,
    pub active_till: i64,
    pub hostids: Vec<u64>,
    pub groupids: Vec<u64>,
    pub tags_evaltype: MaintenanceTagEval,
    pub tags: Vec<MaintenanceTag>,
}

impl Maintenance {
    pub fn is_running(&self, now: i64) -> bool {
        self.active_since <= now && now < self.active_till
    }

    /// Whether the problem tags satisfy the maintenance tag filter.
    ///
    /// With and/or evaluation tags sharing a name are alternatives and
    /// different names must all match; with or evaluation any tag suffices.
    pub fn tags_match(&self, event_tags: &[Tag]) -> bool {
        if self.tags.is_empty() {
            return true;
        }

        let matches = |mt: &MaintenanceTag| {
            event_tags
                .iter()
                .any(|t| t.tag == mt.tag && mt.operator.matches(&t.value, &mt.value))
        };

        match self.tags_evaltype {
            MaintenanceTagEval::Or => self.tags.iter().any(matches),
            MaintenanceTagEval::AndOr => {
                let mut names: Vec<&str> = self.tags.iter().map(|t| t.tag.as_str()).collect();
                names.sort_unstable();
                names.dedup();
                names.into_iter().all(|name| {
                    self.tags
                        .iter()
                        .filter(|mt| mt.tag == name)
                        .any(matches)
                })
            }
        }
    }
}
