//! Rule-set validation diagnostics.
//!
//! Validation is non-fatal: it returns the full list of issues found and
//! never refuses the document. Callers decide whether an invalid rule-set
//! may still be persisted as a draft.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::model::{ConditionOperator, RuleSet, FIELD_NAMESPACES};

// ============================================================================
// Issues
// ============================================================================

/// A single validation finding, addressed to the authoring surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Machine-stable code, e.g. `empty_name`
    pub code: String,
    /// Offending rule id, when the issue is rule-scoped
    pub rule_id: Option<String>,
    /// Human-readable message with field context
    pub message: String,
}

impl ValidationIssue {
    fn set_level(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            rule_id: None,
            message: message.into(),
        }
    }

    fn rule_level(code: &'static str, rule_id: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            rule_id: Some(rule_id.to_string()),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.rule_id {
            Some(rule_id) => write!(f, "[{}] rule '{}': {}", self.code, rule_id, self.message),
            None => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

// ============================================================================
// validate
// ============================================================================

/// Check a rule-set and return every issue found.
///
/// Checks: empty rule-set name, zero rules, rule missing a name, rule
/// with no then-actions, condition missing a field, duplicate execution
/// order, unknown field namespace, and an unparseable `matches` pattern.
/// An empty issue list means the rule-set is clean.
#[must_use]
pub fn validate(rule_set: &RuleSet) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if rule_set.name.trim().is_empty() {
        issues.push(ValidationIssue::set_level(
            "empty_name",
            "rule-set name must not be empty",
        ));
    }
    if rule_set.rules.is_empty() {
        issues.push(ValidationIssue::set_level(
            "no_rules",
            "rule-set contains no rules",
        ));
    }

    let mut seen_orders: HashSet<u32> = HashSet::new();
    for rule in &rule_set.rules {
        if rule.name.trim().is_empty() {
            issues.push(ValidationIssue::rule_level(
                "rule_missing_name",
                &rule.id,
                "rule name must not be empty",
            ));
        }
        if !seen_orders.insert(rule.order) {
            issues.push(ValidationIssue::rule_level(
                "duplicate_order",
                &rule.id,
                format!("execution order {} is already used", rule.order),
            ));
        }
        if rule.then_actions.is_empty() {
            issues.push(ValidationIssue::rule_level(
                "no_then_actions",
                &rule.id,
                "rule has no then-actions",
            ));
        }

        for (idx, condition) in rule.conditions.iter().enumerate() {
            if condition.field.trim().is_empty() {
                issues.push(ValidationIssue::rule_level(
                    "condition_missing_field",
                    &rule.id,
                    format!("condition #{idx} has no field reference"),
                ));
                continue;
            }
            match condition.namespace() {
                Some(ns) if FIELD_NAMESPACES.contains(&ns) => {}
                Some(ns) => issues.push(ValidationIssue::rule_level(
                    "unknown_namespace",
                    &rule.id,
                    format!("condition #{idx}: unknown field namespace '{ns}'"),
                )),
                None => {}
            }
            if condition.operator == ConditionOperator::Matches {
                if let Some(pattern) = condition.value.as_str() {
                    if regex::Regex::new(pattern).is_err() {
                        issues.push(ValidationIssue::rule_level(
                            "invalid_pattern",
                            &rule.id,
                            format!("condition #{idx}: invalid match pattern '{pattern}'"),
                        ));
                    }
                }
            }
        }
    }

    issues
}
