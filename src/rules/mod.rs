//! Behavior rule model and the rule-set compiler.
//!
//! A rule-set (SOP) is an ordered collection of trigger/condition/action
//! rules authored by humans. This module provides:
//!
//! - `model` — the structured rule types the authoring surface edits.
//! - `validate` — non-fatal diagnostics over a rule-set.
//! - `script` — the compiled intermediate representation and its pure
//!   text renderer.
//! - `compiler` — deterministic rule-set → script compilation.
//!
//! Compiled text is a write-only display artifact: `contains`,
//! `not_contains`, and `matches` all render through one operator symbol,
//! so text cannot be parsed back into structured conditions. The
//! [`Script`] AST is the only faithful machine-readable form.

pub mod compiler;
pub mod model;
pub mod script;
pub mod validate;

pub use compiler::compile;
pub use model::{
    ActionSpec, ActionType, Condition, ConditionOperator, Rule, RuleSet, RuleSetStatus, Trigger,
};
pub use script::{Script, ScriptBlock};
pub use validate::{validate, ValidationIssue};
