//! Policy domain types: scopes, triggers, thresholds, approvers,
//! escalation levels, and the proposed-action evaluation inputs.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::rules::Condition;

// ============================================================================
// Risk
// ============================================================================

/// Risk indicator carried by policies and approval requests.
///
/// Ordering is the restrictiveness order: `Critical > High > Medium > Low`.
/// When multiple policies hit one action, the most restrictive risk wins.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => f.write_str("low"),
            RiskLevel::Medium => f.write_str("medium"),
            RiskLevel::High => f.write_str("high"),
            RiskLevel::Critical => f.write_str("critical"),
        }
    }
}

// ============================================================================
// Proposed Action & Context
// ============================================================================

/// A candidate action submitted by the agent runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedAction {
    /// Action type tag, e.g. `send_email`, `execute_payment`
    pub action_type: String,
    /// Human-readable description shown to approvers
    pub description: String,
    /// Space the action executes in
    pub space_id: Option<String>,
    /// Project the action belongs to
    pub project_id: Option<String>,
    /// The proposing agent
    pub cognate_id: String,
}

impl ProposedAction {
    #[must_use]
    pub fn new(action_type: impl Into<String>, cognate_id: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            description: String::new(),
            space_id: None,
            project_id: None,
            cognate_id: cognate_id.into(),
        }
    }
}

/// Evaluation context: named metrics and arbitrary facts about the action
/// and its environment, addressed by dotted paths (`message.sender`,
/// `metrics.monthly_ai_spend`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionContext(pub Map<String, Value>);

impl ActionContext {
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style entry at a top-level key.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    /// Resolve a dotted path into the context, descending through nested
    /// objects.
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.0.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// A named numeric metric, looked up at `metrics.<name>` and then at
    /// the bare name.
    #[must_use]
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.get_path(&format!("metrics.{name}"))
            .or_else(|| self.get_path(name))
            .and_then(Value::as_f64)
    }
}

// ============================================================================
// Scope
// ============================================================================

/// Where a policy applies. A policy applies to the union of its declared
/// scopes; an empty scope list never matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum PolicyScope {
    /// Every action, everywhere
    Global,
    Space(String),
    Project(String),
    Cognate(String),
    Automation(String),
    User(String),
    Integration(String),
}

impl PolicyScope {
    /// Does this scope cover the given action?
    ///
    /// Automation/user/integration scopes match against the context keys
    /// `automation_id` / `user_id` / `integration_id`.
    #[must_use]
    pub fn covers(&self, action: &ProposedAction, context: &ActionContext) -> bool {
        match self {
            PolicyScope::Global => true,
            PolicyScope::Space(id) => action.space_id.as_deref() == Some(id.as_str()),
            PolicyScope::Project(id) => action.project_id.as_deref() == Some(id.as_str()),
            PolicyScope::Cognate(id) => action.cognate_id == *id,
            PolicyScope::Automation(id) => context_id_matches(context, "automation_id", id),
            PolicyScope::User(id) => context_id_matches(context, "user_id", id),
            PolicyScope::Integration(id) => context_id_matches(context, "integration_id", id),
        }
    }
}

fn context_id_matches(context: &ActionContext, key: &str, id: &str) -> bool {
    context.get_path(key).and_then(Value::as_str) == Some(id)
}

// ============================================================================
// Thresholds
// ============================================================================

/// Comparison operators for numeric thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdOp {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Neq,
    /// Inclusive range; requires both bound values
    Between,
}

/// A numeric check against a named context metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    /// Metric name, resolved via [`ActionContext::metric`]
    pub metric: String,
    pub op: ThresholdOp,
    pub value: f64,
    /// Upper bound, used only by `between`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper: Option<f64>,
}

impl Threshold {
    #[must_use]
    pub fn new(metric: impl Into<String>, op: ThresholdOp, value: f64) -> Self {
        Self {
            metric: metric.into(),
            op,
            value,
            upper: None,
        }
    }
}

// ============================================================================
// Triggers
// ============================================================================

/// What makes a policy consider an action at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyTrigger {
    /// Match on the proposed action's type tag
    ActionType { types: Vec<String> },
    /// Predicate over the evaluation context
    Condition { condition: Condition },
    /// Numeric check against a named metric
    Threshold { threshold: Threshold },
    /// Match a domain event named at `event.name` in the context
    Event { name: String },
    /// Time-based; fired by an external scheduler, never matched during
    /// action evaluation
    Schedule { cron: String },
}

// ============================================================================
// Approvers & Escalation
// ============================================================================

/// Who can decide an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApproverKind {
    User,
    Role,
    Group,
    Cognate,
    System,
}

/// A single approver slot with optional fallback and timeout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approver {
    pub kind: ApproverKind,
    pub id: String,
    /// Takes over if `timeout_minutes` elapses unresolved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_minutes: Option<u32>,
}

impl Approver {
    #[must_use]
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            kind: ApproverKind::User,
            id: id.into(),
            fallback_id: None,
            timeout_minutes: None,
        }
    }

    /// Builder-style timeout.
    #[must_use]
    pub fn with_timeout(mut self, minutes: u32) -> Self {
        self.timeout_minutes = Some(minutes);
        self
    }

    /// Builder-style fallback approver id.
    #[must_use]
    pub fn with_fallback(mut self, id: impl Into<String>) -> Self {
        self.fallback_id = Some(id.into());
        self
    }
}

/// One step of time-based escalation for a pending request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationLevel {
    /// Minutes after request creation at which this level activates
    pub offset_minutes: u32,
    /// Approvers notified at this level
    pub approvers: Vec<Approver>,
    /// Notification text for this level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ============================================================================
// Policy
// ============================================================================

/// A governance unit: decides whether matching actions need approval, are
/// blocked, or pass with an audit rationale.
///
/// If `approval_required` is false the approver list is never consulted —
/// the policy either blocks (`blocking`) or silently passes while still
/// being recorded as the triggering rationale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    /// Union of scopes this policy applies to
    pub scopes: Vec<PolicyScope>,
    /// Any matching trigger makes the policy hit
    pub triggers: Vec<PolicyTrigger>,
    pub approval_required: bool,
    /// Only meaningful when `approval_required` is false
    #[serde(default)]
    pub blocking: bool,
    pub risk: RiskLevel,
    /// Consulted only when `approval_required` is true
    #[serde(default)]
    pub approvers: Vec<Approver>,
    /// Additional threshold checks OR-ed into trigger matching
    #[serde(default)]
    pub thresholds: Vec<Threshold>,
    /// Ordered escalation ladder for pending requests
    #[serde(default)]
    pub escalations: Vec<EscalationLevel>,
    /// AND-combined predicates that waive the approval requirement
    #[serde(default)]
    pub auto_approve: Vec<Condition>,
}

impl Policy {
    /// A minimal enabled, global, approval-requiring policy.
    #[must_use]
    pub fn requiring_approval(id: impl Into<String>, risk: RiskLevel) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            enabled: true,
            scopes: vec![PolicyScope::Global],
            triggers: Vec::new(),
            approval_required: true,
            blocking: false,
            risk,
            approvers: Vec::new(),
            thresholds: Vec::new(),
            escalations: Vec::new(),
            auto_approve: Vec::new(),
        }
    }
}

// ============================================================================
// Errors & Issues
// ============================================================================

/// Policy store and evaluation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// No policy with the given id.
    #[error("policy '{policy_id}' not found")]
    NotFound {
        /// The missing policy id
        policy_id: String,
    },

    /// Policy data is structurally unusable (configuration error class).
    #[error("policy '{policy_id}' is misconfigured: {details}")]
    Misconfigured {
        /// The offending policy id
        policy_id: String,
        /// What is wrong
        details: String,
    },
}

/// A non-fatal configuration problem found while evaluating.
///
/// The offending trigger is treated as non-matching; other policies
/// evaluate normally. Collected on the [`super::Evaluation`] and logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigIssue {
    pub policy_id: String,
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn risk_ordering_is_restrictiveness() {
        assert!(RiskLevel::Critical > RiskLevel::High);
        assert!(RiskLevel::High > RiskLevel::Medium);
        assert!(RiskLevel::Medium > RiskLevel::Low);
    }

    #[test]
    fn context_dotted_path_resolution() {
        let ctx = ActionContext::new()
            .with("message", json!({"sender": "vip@acme.com"}))
            .with("metrics", json!({"monthly_ai_spend": 8500}));
        assert_eq!(
            ctx.get_path("message.sender"),
            Some(&json!("vip@acme.com"))
        );
        assert_eq!(ctx.metric("monthly_ai_spend"), Some(8500.0));
        assert_eq!(ctx.get_path("message.subject"), None);
    }

    #[test]
    fn metric_falls_back_to_bare_key() {
        let ctx = ActionContext::new().with("actions_per_hour", json!(12));
        assert_eq!(ctx.metric("actions_per_hour"), Some(12.0));
    }

    #[test]
    fn scope_union_semantics() {
        let action = ProposedAction {
            action_type: "deploy".into(),
            description: String::new(),
            space_id: Some("space-1".into()),
            project_id: None,
            cognate_id: "cog-1".into(),
        };
        let ctx = ActionContext::new();

        assert!(PolicyScope::Global.covers(&action, &ctx));
        assert!(PolicyScope::Space("space-1".into()).covers(&action, &ctx));
        assert!(!PolicyScope::Space("space-2".into()).covers(&action, &ctx));
        assert!(PolicyScope::Cognate("cog-1".into()).covers(&action, &ctx));
        assert!(!PolicyScope::Project("p".into()).covers(&action, &ctx));
    }

    #[test]
    fn user_scope_reads_context() {
        let action = ProposedAction::new("deploy", "cog-1");
        let ctx = ActionContext::new().with("user_id", json!("u-7"));
        assert!(PolicyScope::User("u-7".into()).covers(&action, &ctx));
        assert!(!PolicyScope::User("u-8".into()).covers(&action, &ctx));
    }

    #[test]
    fn policy_serde_round_trip() {
        let policy = Policy {
            thresholds: vec![Threshold::new("monthly_ai_spend", ThresholdOp::Gte, 8000.0)],
            approvers: vec![Approver::user("alice").with_timeout(30).with_fallback("bob")],
            ..Policy::requiring_approval("budget-cap", RiskLevel::High)
        };
        let json = serde_json::to_string(&policy).unwrap();
        let back: Policy = serde_json::from_str(&json).unwrap();
        assert_eq!(policy, back);
    }
}
