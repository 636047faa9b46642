//! Global correlation rule definitions.

use serde::{Deserialize, Serialize};

/// String comparison used by tag value conditions.
///
/// ```
/// use vigil_common::correlation::ConditionOperator;
///
/// assert!(ConditionOperator::Like.matches("db-prod-01", "prod"));
/// assert!(!ConditionOperator::Like.matches("db-Prod-01", "prod"));
/// assert!(ConditionOperator::NotEqual.matches("a", "b"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    #[default]
    Equal,
    NotEqual,
    Like,
    NotLike,
}

impl ConditionOperator {
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Equal => 0,
            Self::NotEqual => 1,
            Self::Like => 2,
            Self::NotLike => 3,
        }
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Equal),
            1 => Some(Self::NotEqual),
            2 => Some(Self::Like),
            3 => Some(Self::NotLike),
            _ => None,
        }
    }

    /// Applies the operator to `value` with `pattern` as right operand.
    /// Like means substring containment. Every operator compares case
    /// sensitively; old-event tag filters rendered to SQL follow the same
    /// rule.
    pub fn matches(self, value: &str, pattern: &str) -> bool {
        match self {
            Self::Equal => value == pattern,
            Self::NotEqual => value != pattern,
            Self::Like => value.contains(pattern),
            Self::NotLike => !value.contains(pattern),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConditionKind {
    OldEventTag {
        tag: String,
    },
    NewEventTag {
        tag: String,
    },
    NewEventHostGroup {
        groupid: u64,
        #[serde(default)]
        operator: ConditionOperator,
    },
    EventTagPair {
        oldtag: String,
        newtag: String,
    },
    OldEventTagValue {
        tag: String,
        value: String,
        #[serde(default)]
        operator: ConditionOperator,
    },
    NewEventTagValue {
        tag: String,
        value: String,
        #[serde(default)]
        operator: ConditionOperator,
    },
}

impl ConditionKind {
    /// Numeric type as stored in `corr_condition.type`.
    pub fn type_code(&self) -> i32 {
        match self {
            Self::OldEventTag { .. } => 0,
            Self::NewEventTag { .. } => 1,
            Self::NewEventHostGroup { .. } => 2,
            Self::EventTagPair { .. } => 3,
            Self::OldEventTagValue { .. } => 4,
            Self::NewEventTagValue { .. } => 5,
        }
    }

    /// Conditions that can only be decided against already open problems.
    pub fn depends_on_old_event(&self) -> bool {
        matches!(
            self,
            Self::OldEventTag { .. } | Self::OldEventTagValue { .. } | Self::EventTagPair { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub corr_conditionid: u64,
    #[serde(flatten)]
    pub kind: ConditionKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CloseOld,
    CloseNew,
}

impl Operation {
    pub fn as_i32(self) -> i32 {
        match self {
            Self::CloseOld => 0,
            Self::CloseNew => 1,
        }
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::CloseOld),
            1 => Some(Self::CloseNew),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalType {
    #[default]
    AndOr,
    And,
    Or,
    Custom,
}

impl EvalType {
    pub fn as_i32(self) -> i32 {
        match self {
            Self::AndOr => 0,
            Self::And => 1,
            Self::Or => 2,
            Self::Custom => 3,
        }
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::AndOr),
            1 => Some(Self::And),
            2 => Some(Self::Or),
            3 => Some(Self::Custom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correlation {
    pub correlationid: u64,
    pub name: String,
    #[serde(default)]
    pub evaltype: EvalType,
    /// Boolean formula over `{corr_conditionid}` placeholders.
    #[serde(default)]
    pub formula: String,
    pub conditions: Vec<Condition>,
    pub operations: Vec<Operation>,
}

impl Correlation {
    pub fn condition(&self, corr_conditionid: u64) -> Option<&Condition> {
        self.conditions
            .iter()
            .find(|c| c.corr_conditionid == corr_conditionid)
    }

    pub fn has_old_event_conditions(&self) -> bool {
        self.conditions.iter().any(|c| c.kind.depends_on_old_event())
    }

    pub fn closes_old_events(&self) -> bool {
        self.operations.contains(&Operation::CloseOld)
    }

    /// The formula to evaluate: the stored one for custom expressions,
    /// otherwise one generated from the condition list.
    pub fn effective_formula(&self) -> String {
        match self.evaltype {
            EvalType::Custom => self.formula.clone(),
            evaltype => build_formula(evaltype, &self.conditions),
        }
    }
}

/// Generates the formula of a non-custom evaluation type.
///
/// And/or groups conditions of the same type with `or` and joins the groups
/// with `and`.
///
/// ```
/// use vigil_common::correlation::{build_formula, Condition, ConditionKind, EvalType};
///
/// let conditions = vec![
///     Condition { corr_conditionid: 1, kind: ConditionKind::NewEventTag { tag: "a".into() } },
///     Condition { corr_conditionid: 2, kind: ConditionKind::OldEventTag { tag: "b".into() } },
///     Condition { corr_conditionid: 3, kind: ConditionKind::NewEventTag { tag: "c".into() } },
/// ];
/// assert_eq!(build_formula(EvalType::AndOr, &conditions), "({2}) and ({1} or {3})");
/// assert_eq!(build_formula(EvalType::Or, &conditions), "{1} or {2} or {3}");
/// ```
pub fn build_formula(evaltype: EvalType, conditions: &[Condition]) -> String {
    let mut sorted: Vec<&Condition> = conditions.iter().collect();
    sorted.sort_by_key(|c| (c.kind.type_code(), c.corr_conditionid));

    match evaltype {
        EvalType::And | EvalType::Or => {
            let op = if evaltype == EvalType::And { " and " } else { " or " };
            let mut ids: Vec<u64> = sorted.iter().map(|c| c.corr_conditionid).collect();
            ids.sort_unstable();
            ids.iter()
                .map(|id| format!("{{{id}}}"))
                .collect::<Vec<_>>()
                .join(op)
        }
        EvalType::AndOr | EvalType::Custom => {
            let mut groups: Vec<Vec<u64>> = Vec::new();
            let mut last_type = None;
            for condition in sorted {
                let code = condition.kind.type_code();
                if last_type != Some(code) {
                    groups.push(Vec::new());
                    last_type = Some(code);
                }
                if let Some(group) = groups.last_mut() {
                    group.push(condition.corr_conditionid);
                }
            }
            groups
                .iter()
                .map(|group| {
                    let inner = group
                        .iter()
                        .map(|id| format!("{{{id}}}"))
                        .collect::<Vec<_>>()
                        .join(" or ");
                    format!("({inner})")
                })
                .collect::<Vec<_>>()
                .join(" and ")
        }
    }
}

/// Correlation rules ordered by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrelationRules(Vec<Correlation>);

impl CorrelationRules {
    pub fn new(mut correlations: Vec<Correlation>) -> Self {
        correlations.sort_by_key(|c| c.correlationid);
        Self(correlations)
    }

    pub fn find(&self, correlationid: u64) -> Option<&Correlation> {
        self.0
            .binary_search_by_key(&correlationid, |c| c.correlationid)
            .ok()
            .map(|i| &self.0[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Correlation> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
