//! Compiled script representation and its text renderer.
//!
//! The compiler produces a [`Script`] — a structured intermediate form —
//! and the renderer turns it into display text. The renderer is pure: the
//! same script always renders to byte-identical text, independent of any
//! source formatting.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

/// Placeholder emitted when a rule-set compiles to zero blocks.
pub const EMPTY_SCRIPT_PLACEHOLDER: &str = "# no enabled rules";

// ============================================================================
// AST
// ============================================================================

/// One rendered condition clause.
///
/// `operand` is already a rendered literal (quoted or bare); unary
/// operators carry `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhenClause {
    pub field: String,
    /// Textual operator symbol (`==`, `!=`, `>`, `<`, `~=`, `exists`,
    /// `!exists`)
    pub symbol: String,
    pub operand: Option<String>,
}

/// One action invocation line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionCall {
    /// Action type tag, e.g. `respond`
    pub name: String,
    /// Rendered `key=value` arguments, sorted by key
    pub args: Vec<(String, String)>,
}

/// One compiled rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptBlock {
    pub rule_id: String,
    pub name: String,
    /// Derived as `order * 10`; higher numbers signal earlier evaluation
    /// intent to the execution engine
    pub priority: u32,
    /// Trigger kind tag (`message`, `event`, …)
    pub trigger: String,
    pub when: Vec<WhenClause>,
    pub then_calls: Vec<ActionCall>,
    pub else_calls: Vec<ActionCall>,
}

/// A compiled rule-set: the deterministic, priority-ordered script form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub rule_set_id: String,
    pub rule_set_name: String,
    pub rule_set_version: u32,
    /// Blocks in ascending rule order
    pub blocks: Vec<ScriptBlock>,
}

// ============================================================================
// Renderer
// ============================================================================

impl Script {
    /// Returns true when no enabled rules were compiled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Render the script to display text.
    ///
    /// Write-only: `contains`, `not_contains`, and `matches` all render as
    /// `~=`, so the text cannot be parsed back into structured conditions.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "# {} v{}",
            self.rule_set_name, self.rule_set_version
        );

        if self.blocks.is_empty() {
            out.push_str(EMPTY_SCRIPT_PLACEHOLDER);
            out.push('\n');
            return out;
        }

        for block in &self.blocks {
            out.push('\n');
            let _ = writeln!(out, "RULE \"{}\" PRIORITY {}", block.name, block.priority);
            let _ = writeln!(out, "  ON {}", block.trigger);

            if !block.when.is_empty() {
                let clauses: Vec<String> = block.when.iter().map(render_clause).collect();
                let _ = writeln!(out, "  WHEN {}", clauses.join(" AND "));
            }

            out.push_str("  THEN\n");
            for call in &block.then_calls {
                let _ = writeln!(out, "    {}", render_call(call));
            }

            if !block.else_calls.is_empty() {
                out.push_str("  ELSE\n");
                for call in &block.else_calls {
                    let _ = writeln!(out, "    {}", render_call(call));
                }
            }

            out.push_str("END\n");
        }

        out
    }
}

fn render_clause(clause: &WhenClause) -> String {
    match &clause.operand {
        Some(operand) => format!("{} {} {}", clause.field, clause.symbol, operand),
        None => format!("{} {}", clause.field, clause.symbol),
    }
}

fn render_call(call: &ActionCall) -> String {
    let args: Vec<String> = call
        .args
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    format!("{}({})", call.name, args.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block() -> ScriptBlock {
        ScriptBlock {
            rule_id: "r1".into(),
            name: "VIP fast-lane".into(),
            priority: 20,
            trigger: "message".into(),
            when: vec![WhenClause {
                field: "message.sender".into(),
                symbol: "==".into(),
                operand: Some("\"vip@acme.com\"".into()),
            }],
            then_calls: vec![ActionCall {
                name: "respond".into(),
                args: vec![("template".into(), "\"vip\"".into())],
            }],
            else_calls: vec![],
        }
    }

    #[test]
    fn renders_when_then_shape() {
        let script = Script {
            rule_set_id: "rs".into(),
            rule_set_name: "Support triage".into(),
            rule_set_version: 3,
            blocks: vec![sample_block()],
        };
        let text = script.render();
        assert!(text.contains("RULE \"VIP fast-lane\" PRIORITY 20"));
        assert!(text.contains("WHEN message.sender == \"vip@acme.com\""));
        assert!(text.contains("respond(template=\"vip\")"));
        assert!(!text.contains("ELSE"));
    }

    #[test]
    fn empty_script_renders_placeholder() {
        let script = Script {
            rule_set_id: "rs".into(),
            rule_set_name: "empty".into(),
            rule_set_version: 1,
            blocks: vec![],
        };
        assert!(script.render().contains(EMPTY_SCRIPT_PLACEHOLDER));
        assert!(script.is_empty());
    }

    #[test]
    fn unary_clause_renders_without_operand() {
        let clause = WhenClause {
            field: "message.attachment".into(),
            symbol: "exists".into(),
            operand: None,
        };
        assert_eq!(render_clause(&clause), "message.attachment exists");
    }
}
