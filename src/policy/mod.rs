//! Governance policies and the synchronous policy evaluator.
//!
//! A [`Policy`] declares when a proposed agent action needs human
//! approval, is blocked outright, or merely leaves an audit rationale.
//! The [`PolicyStore`] owns the versioned policy collection;
//! [`PolicyEvaluator`] routes each proposed action to
//! Allow / RequireApproval / Deny.

pub mod evaluator;
pub mod store;
pub mod types;

pub use evaluator::{Decision, Evaluation, PolicyEvaluator, PolicyHit};
pub use store::PolicyStore;
pub use types::{
    ActionContext, Approver, ApproverKind, ConfigIssue, EscalationLevel, Policy, PolicyError,
    PolicyScope, PolicyTrigger, ProposedAction, RiskLevel, Threshold, ThresholdOp,
};
