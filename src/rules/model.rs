//! Structured rule types: triggers, conditions, actions, rules, rule-sets.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Trigger
// ============================================================================

/// What causes a rule to be considered.
///
/// Each variant carries an opaque configuration map whose interpretation
/// belongs to the execution engine (e.g. `channel` for a message trigger,
/// `cron` for a schedule trigger).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "config", rename_all = "snake_case")]
pub enum Trigger {
    /// An inbound message (chat, email, ticket)
    Message(Map<String, Value>),
    /// A named domain event
    Event(Map<String, Value>),
    /// A time-based schedule
    Schedule(Map<String, Value>),
    /// A standing condition becoming true
    Condition(Map<String, Value>),
    /// Explicit human invocation
    Manual(Map<String, Value>),
}

impl Trigger {
    /// Stable lowercase tag for display and script rendering.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Trigger::Message(_) => "message",
            Trigger::Event(_) => "event",
            Trigger::Schedule(_) => "schedule",
            Trigger::Condition(_) => "condition",
            Trigger::Manual(_) => "manual",
        }
    }

    /// The trigger's opaque configuration map.
    #[must_use]
    pub fn config(&self) -> &Map<String, Value> {
        match self {
            Trigger::Message(c)
            | Trigger::Event(c)
            | Trigger::Schedule(c)
            | Trigger::Condition(c)
            | Trigger::Manual(c) => c,
        }
    }
}

// ============================================================================
// Condition
// ============================================================================

/// Comparison operators available in rule conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    GreaterThan,
    LessThan,
    /// Regular-expression match
    Matches,
    /// Field is present; the value operand is ignored
    Exists,
    /// Field is absent; the value operand is ignored
    NotExists,
}

impl ConditionOperator {
    /// Returns true for operators that do not consume a value operand.
    #[must_use]
    pub fn is_unary(&self) -> bool {
        matches!(self, ConditionOperator::Exists | ConditionOperator::NotExists)
    }
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConditionOperator::Equals => "equals",
            ConditionOperator::NotEquals => "not_equals",
            ConditionOperator::Contains => "contains",
            ConditionOperator::NotContains => "not_contains",
            ConditionOperator::GreaterThan => "greater_than",
            ConditionOperator::LessThan => "less_than",
            ConditionOperator::Matches => "matches",
            ConditionOperator::Exists => "exists",
            ConditionOperator::NotExists => "not_exists",
        };
        f.write_str(s)
    }
}

/// Namespace heads recognized in condition field paths.
///
/// Field references are dotted paths (`message.sender`); the head segment
/// must come from this closed set. Used for syntax classification by the
/// validator and the authoring surface.
pub const FIELD_NAMESPACES: &[&str] = &[
    "message", "event", "context", "cognate", "space", "action", "metrics",
];

/// A single field/operator/value predicate.
///
/// Conditions within a rule are implicitly AND-combined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Dotted field reference, e.g. `message.sender`
    pub field: String,
    /// Comparison operator
    pub operator: ConditionOperator,
    /// Right-hand operand; ignored by `exists`/`not_exists`
    #[serde(default)]
    pub value: Value,
}

impl Condition {
    #[must_use]
    pub fn new(field: impl Into<String>, operator: ConditionOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// The namespace head of the field path, if any.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.field.split('.').next().filter(|s| !s.is_empty())
    }
}

// ============================================================================
// Action
// ============================================================================

/// The closed set of action types the execution engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Respond,
    Escalate,
    Log,
    Notify,
    Execute,
    Wait,
    Branch,
    Tag,
    Assign,
    Webhook,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionType::Respond => "respond",
            ActionType::Escalate => "escalate",
            ActionType::Log => "log",
            ActionType::Notify => "notify",
            ActionType::Execute => "execute",
            ActionType::Wait => "wait",
            ActionType::Branch => "branch",
            ActionType::Tag => "tag",
            ActionType::Assign => "assign",
            ActionType::Webhook => "webhook",
        };
        f.write_str(s)
    }
}

/// A single action invocation within a rule body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    /// What to do
    pub action_type: ActionType,
    /// Optional human-facing label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Key → value configuration for the execution engine
    #[serde(default)]
    pub config: Map<String, Value>,
}

impl ActionSpec {
    #[must_use]
    pub fn new(action_type: ActionType) -> Self {
        Self {
            action_type,
            label: None,
            config: Map::new(),
        }
    }

    /// Builder-style config entry.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }
}

// ============================================================================
// Rule
// ============================================================================

/// A named, ordered unit of behavior within a rule-set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Stable identifier
    pub id: String,
    /// Display name; also labels the compiled block
    pub name: String,
    /// Disabled rules are retained in the model but excluded from
    /// compilation
    pub enabled: bool,
    /// Execution order; a total order within the rule-set
    pub order: u32,
    /// What causes the rule to be considered
    pub trigger: Trigger,
    /// AND-combined predicates; empty means unconditional
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Actions taken when all conditions hold
    pub then_actions: Vec<ActionSpec>,
    /// Actions taken when any condition fails; may be empty
    #[serde(default)]
    pub else_actions: Vec<ActionSpec>,
}

// ============================================================================
// RuleSet
// ============================================================================

/// Lifecycle status of a rule-set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSetStatus {
    Draft,
    Active,
    Archived,
}

impl fmt::Display for RuleSetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleSetStatus::Draft => f.write_str("draft"),
            RuleSetStatus::Active => f.write_str("active"),
            RuleSetStatus::Archived => f.write_str("archived"),
        }
    }
}

/// A named, versioned collection of behavior rules (SOP).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Stable identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Monotonically bumped by the authoring surface
    pub version: u32,
    /// Lifecycle status
    pub status: RuleSetStatus,
    /// Relative priority among rule-sets
    pub priority: u32,
    /// Free-form grouping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Free-form labels
    #[serde(default)]
    pub tags: Vec<String>,
    /// The rules, in authoring order (compilation sorts by `Rule::order`)
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl RuleSet {
    /// Enabled rules in ascending execution order. Ties keep declaration
    /// order (stable sort).
    #[must_use]
    pub fn enabled_rules(&self) -> Vec<&Rule> {
        let mut rules: Vec<&Rule> = self.rules.iter().filter(|r| r.enabled).collect();
        rules.sort_by_key(|r| r.order);
        rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule(id: &str, order: u32, enabled: bool) -> Rule {
        Rule {
            id: id.to_string(),
            name: format!("rule-{id}"),
            enabled,
            order,
            trigger: Trigger::Message(Map::new()),
            conditions: vec![],
            then_actions: vec![ActionSpec::new(ActionType::Log)],
            else_actions: vec![],
        }
    }

    #[test]
    fn enabled_rules_sorted_by_order() {
        let set = RuleSet {
            id: "rs".into(),
            name: "test".into(),
            version: 1,
            status: RuleSetStatus::Active,
            priority: 0,
            category: None,
            tags: vec![],
            rules: vec![rule("c", 3, true), rule("a", 1, true), rule("b", 2, false)],
        };
        let ordered: Vec<&str> = set.enabled_rules().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ordered, vec!["a", "c"]);
    }

    #[test]
    fn condition_namespace_extraction() {
        let c = Condition::new("message.sender", ConditionOperator::Equals, json!("x"));
        assert_eq!(c.namespace(), Some("message"));
        let bare = Condition::new("", ConditionOperator::Exists, Value::Null);
        assert_eq!(bare.namespace(), None);
    }

    #[test]
    fn trigger_kind_tags_are_stable() {
        assert_eq!(Trigger::Message(Map::new()).kind(), "message");
        assert_eq!(Trigger::Manual(Map::new()).kind(), "manual");
    }

    #[test]
    fn rule_serde_round_trip() {
        let r = rule("x", 1, true);
        let json = serde_json::to_string(&r).unwrap();
        let back: Rule = serde_json::from_str(&json).unwrap();
        assert_eq!(r, back);
    }
}
