//! Synchronous policy evaluation.
//!
//! `evaluate` is deterministic, CPU-bound, and free of suspension points:
//! concurrent evaluation of different actions is safe by construction.
//! Malformed policy data never aborts evaluation — the offending trigger
//! is treated as non-matching and the problem is reported on the result.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::rules::{Condition, ConditionOperator};

use super::store::PolicyStore;
use super::types::{
    ActionContext, ConfigIssue, Policy, PolicyTrigger, ProposedAction, RiskLevel, Threshold,
    ThresholdOp,
};

// ============================================================================
// Decision
// ============================================================================

/// The evaluator's routing decision for one proposed action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decision {
    /// Execute immediately; hit policies (if any) are rationale only
    Allow,
    /// Open an approval request before executing
    RequireApproval {
        /// The most restrictive policy that demanded approval
        policy_id: String,
        risk: RiskLevel,
    },
    /// Blocked outright
    Deny {
        policy_id: String,
        reason: String,
    },
}

/// One policy that matched the action, kept as audit rationale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyHit {
    pub policy_id: String,
    pub policy_name: String,
    /// Which trigger matched, for the audit trail
    pub matched: String,
    pub approval_required: bool,
    /// Approval requirement waived by the auto-approve predicate set
    pub auto_approved: bool,
    pub blocking: bool,
    pub risk: RiskLevel,
}

/// Full evaluation result: the decision plus everything the audit trail
/// and the authoring surface need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub decision: Decision,
    pub hits: Vec<PolicyHit>,
    /// Non-fatal configuration problems found along the way
    pub issues: Vec<ConfigIssue>,
}

// ============================================================================
// Evaluator
// ============================================================================

/// Routes proposed actions through the policy store.
#[derive(Debug)]
pub struct PolicyEvaluator {
    store: Arc<PolicyStore>,
}

impl PolicyEvaluator {
    #[must_use]
    pub fn new(store: Arc<PolicyStore>) -> Self {
        Self { store }
    }

    /// The backing store, shared with the gateway.
    #[must_use]
    pub fn store(&self) -> &Arc<PolicyStore> {
        &self.store
    }

    /// Evaluate one proposed action against every enabled policy.
    ///
    /// Routing: a blocking hit denies; otherwise any unwaived
    /// approval-requiring hit demands approval, the most restrictive risk
    /// winning; otherwise the action is allowed. Non-blocking,
    /// non-approval hits contribute rationale only.
    #[must_use]
    pub fn evaluate(&self, action: &ProposedAction, context: &ActionContext) -> Evaluation {
        let mut hits = Vec::new();
        let mut issues = Vec::new();

        for policy in self.store.enabled() {
            if !policy.scopes.iter().any(|s| s.covers(action, context)) {
                continue;
            }
            let Some(matched) = first_trigger_match(&policy, action, context, &mut issues) else {
                continue;
            };

            let auto_approved = policy.approval_required
                && !policy.auto_approve.is_empty()
                && policy
                    .auto_approve
                    .iter()
                    .all(|c| condition_matches(c, context));

            debug!(
                policy_id = %policy.id,
                matched = %matched,
                auto_approved,
                "policy hit"
            );

            hits.push(PolicyHit {
                policy_id: policy.id.clone(),
                policy_name: policy.name.clone(),
                matched,
                approval_required: policy.approval_required,
                auto_approved,
                blocking: policy.blocking,
                risk: policy.risk,
            });
        }

        for issue in &issues {
            warn!(policy_id = %issue.policy_id, detail = %issue.detail, "policy configuration issue");
        }

        let decision = route(&hits);
        Evaluation {
            decision,
            hits,
            issues,
        }
    }
}

/// Pick the decision from the collected hits. Deny outranks approval;
/// among approval demands the most restrictive risk wins.
fn route(hits: &[PolicyHit]) -> Decision {
    if let Some(block) = hits
        .iter()
        .filter(|h| !h.approval_required && h.blocking)
        .max_by_key(|h| h.risk)
    {
        return Decision::Deny {
            policy_id: block.policy_id.clone(),
            reason: format!("blocked by policy '{}'", block.policy_name),
        };
    }

    if let Some(demand) = hits
        .iter()
        .filter(|h| h.approval_required && !h.auto_approved)
        .max_by_key(|h| h.risk)
    {
        return Decision::RequireApproval {
            policy_id: demand.policy_id.clone(),
            risk: demand.risk,
        };
    }

    Decision::Allow
}

// ============================================================================
// Trigger Matching
// ============================================================================

/// First matching trigger's description, or `None` when the policy does
/// not hit. Policy-level thresholds are OR-ed in after the trigger list.
fn first_trigger_match(
    policy: &Policy,
    action: &ProposedAction,
    context: &ActionContext,
    issues: &mut Vec<ConfigIssue>,
) -> Option<String> {
    for trigger in &policy.triggers {
        match trigger {
            PolicyTrigger::ActionType { types } => {
                if types.iter().any(|t| t == &action.action_type) {
                    return Some(format!("action_type:{}", action.action_type));
                }
            }
            PolicyTrigger::Condition { condition } => {
                if condition_matches(condition, context) {
                    return Some(format!("condition:{}", condition.field));
                }
            }
            PolicyTrigger::Threshold { threshold } => {
                if threshold_matches(threshold, context, &policy.id, issues) {
                    return Some(format!("threshold:{}", threshold.metric));
                }
            }
            PolicyTrigger::Event { name } => {
                let fired = context
                    .get_path("event.name")
                    .and_then(Value::as_str)
                    .map(|n| n == name)
                    .unwrap_or(false);
                if fired {
                    return Some(format!("event:{name}"));
                }
            }
            // Schedule triggers fire from an external scheduler; a
            // proposed action never matches one.
            PolicyTrigger::Schedule { .. } => {}
        }
    }

    for threshold in &policy.thresholds {
        if threshold_matches(threshold, context, &policy.id, issues) {
            return Some(format!("threshold:{}", threshold.metric));
        }
    }

    None
}

/// Check one threshold against the context.
///
/// A `between` missing its upper bound is a configuration error: reported
/// on `issues` and treated as non-matching. A metric absent from the
/// context is simply non-matching.
fn threshold_matches(
    threshold: &Threshold,
    context: &ActionContext,
    policy_id: &str,
    issues: &mut Vec<ConfigIssue>,
) -> bool {
    let Some(observed) = context.metric(&threshold.metric) else {
        return false;
    };

    match threshold.op {
        ThresholdOp::Lt => observed < threshold.value,
        ThresholdOp::Lte => observed <= threshold.value,
        ThresholdOp::Gt => observed > threshold.value,
        ThresholdOp::Gte => observed >= threshold.value,
        ThresholdOp::Eq => observed == threshold.value,
        ThresholdOp::Neq => observed != threshold.value,
        ThresholdOp::Between => match threshold.upper {
            Some(upper) => observed >= threshold.value && observed <= upper,
            None => {
                issues.push(ConfigIssue {
                    policy_id: policy_id.to_string(),
                    detail: format!(
                        "threshold on '{}' uses 'between' without an upper bound",
                        threshold.metric
                    ),
                });
                false
            }
        },
    }
}

// ============================================================================
// Condition Matching
// ============================================================================

/// Evaluate one rule condition against the context.
///
/// Missing fields make every operator except `not_exists` fail; an
/// invalid `matches` pattern fails closed (the rule validator reports it
/// at authoring time).
pub(crate) fn condition_matches(condition: &Condition, context: &ActionContext) -> bool {
    let resolved = context.get_path(&condition.field);

    match condition.operator {
        ConditionOperator::Exists => resolved.is_some(),
        ConditionOperator::NotExists => resolved.is_none(),
        _ => {
            let Some(actual) = resolved else {
                return false;
            };
            match condition.operator {
                ConditionOperator::Equals => json_eq(actual, &condition.value),
                ConditionOperator::NotEquals => !json_eq(actual, &condition.value),
                ConditionOperator::Contains => json_contains(actual, &condition.value),
                ConditionOperator::NotContains => !json_contains(actual, &condition.value),
                ConditionOperator::GreaterThan => {
                    json_cmp(actual, &condition.value).map(|o| o.is_gt()).unwrap_or(false)
                }
                ConditionOperator::LessThan => {
                    json_cmp(actual, &condition.value).map(|o| o.is_lt()).unwrap_or(false)
                }
                ConditionOperator::Matches => {
                    match (actual.as_str(), condition.value.as_str()) {
                        (Some(haystack), Some(pattern)) => regex::Regex::new(pattern)
                            .map(|re| re.is_match(haystack))
                            .unwrap_or(false),
                        _ => false,
                    }
                }
                ConditionOperator::Exists | ConditionOperator::NotExists => unreachable!(),
            }
        }
    }
}

/// Equality with numeric coercion (8000 == 8000.0).
fn json_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Substring for strings, membership for arrays.
fn json_contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::String(s) => needle.as_str().map(|n| s.contains(n)).unwrap_or(false),
        Value::Array(items) => items.iter().any(|item| json_eq(item, needle)),
        _ => false,
    }
}

/// Ordering for numbers and strings; mixed types do not compare.
fn json_cmp(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y);
    }
    match (a.as_str(), b.as_str()) {
        (Some(x), Some(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
