//! Rule-set → script compilation.
//!
//! Compilation is a pure transformation over already-validated structures:
//! it never fails, and invalid or missing fields degrade to empty clauses
//! rather than aborting the rule-set. Determinism is load-bearing — the
//! rendered output feeds both execution engines and the audit trail.

use serde_json::Value;

use super::model::{ActionSpec, Condition, ConditionOperator, RuleSet};
use super::script::{ActionCall, Script, ScriptBlock, WhenClause};

/// Priority distance between consecutive rule orders, leaving room for
/// later insertions without renumbering.
const PRIORITY_STRIDE: u32 = 10;

/// Compile a rule-set into its script form.
///
/// Enabled rules are emitted in ascending `order` (ties keep declaration
/// order); each block carries `priority = order * 10`. Disabled rules are
/// skipped entirely. A rule-set with zero enabled rules compiles to an
/// empty script that renders the "no enabled rules" placeholder — never an
/// error.
#[must_use]
pub fn compile(rule_set: &RuleSet) -> Script {
    let blocks = rule_set
        .enabled_rules()
        .into_iter()
        .map(|rule| ScriptBlock {
            rule_id: rule.id.clone(),
            name: rule.name.clone(),
            priority: rule.order.saturating_mul(PRIORITY_STRIDE),
            trigger: rule.trigger.kind().to_string(),
            when: rule.conditions.iter().filter_map(compile_condition).collect(),
            then_calls: rule.then_actions.iter().map(compile_action).collect(),
            else_calls: rule.else_actions.iter().map(compile_action).collect(),
        })
        .collect();

    Script {
        rule_set_id: rule_set.id.clone(),
        rule_set_name: rule_set.name.clone(),
        rule_set_version: rule_set.version,
        blocks,
    }
}

/// Compile one condition into a rendered clause.
///
/// A condition with an empty field reference degrades to nothing rather
/// than producing an unparseable clause.
fn compile_condition(condition: &Condition) -> Option<WhenClause> {
    if condition.field.trim().is_empty() {
        return None;
    }

    let (symbol, takes_operand) = operator_symbol(condition.operator);
    let operand = if takes_operand {
        Some(render_literal(&condition.value))
    } else {
        None
    };

    Some(WhenClause {
        field: condition.field.clone(),
        symbol: symbol.to_string(),
        operand,
    })
}

/// Textual operator symbols.
///
/// `contains`, `not_contains`, and `matches` intentionally share `~=`:
/// the compiled text is a display artifact and does not round-trip.
fn operator_symbol(op: ConditionOperator) -> (&'static str, bool) {
    match op {
        ConditionOperator::Equals => ("==", true),
        ConditionOperator::NotEquals => ("!=", true),
        ConditionOperator::GreaterThan => (">", true),
        ConditionOperator::LessThan => ("<", true),
        ConditionOperator::Contains | ConditionOperator::NotContains | ConditionOperator::Matches => {
            ("~=", true)
        }
        ConditionOperator::Exists => ("exists", false),
        ConditionOperator::NotExists => ("!exists", false),
    }
}

fn compile_action(action: &ActionSpec) -> ActionCall {
    // Sort by key so rendered output is independent of map insertion order.
    let mut args: Vec<(String, String)> = action
        .config
        .iter()
        .map(|(k, v)| (k.clone(), render_literal(v)))
        .collect();
    args.sort_by(|a, b| a.0.cmp(&b.0));

    ActionCall {
        name: action.action_type.to_string(),
        args,
    }
}

/// Render a JSON value as a script literal.
///
/// Values that parse as numbers are emitted unquoted (including numeric
/// strings); everything else becomes a quoted, escaped string.
fn render_literal(value: &Value) -> String {
    match value {
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::String(s) => {
            if s.parse::<f64>().is_ok() {
                s.clone()
            } else {
                quote(s)
            }
        }
        // Nested structures render through compact JSON, quoted.
        other => quote(&other.to_string()),
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}
