//! ActGate — policy-governed, auditable action gateway for autonomous agents.
//!
//! Agents ("Cognates") propose actions; ActGate decides whether an action
//! executes automatically, requires human approval, or is blocked, and
//! records every decision in an append-only, hash-chained audit ledger.
//!
//! The crate is organized around three subsystems plus a thin gateway that
//! wires them together:
//!
//! - [`rules`] — the behavior rule model and the deterministic rule-set
//!   compiler (AST → rendered script).
//! - [`policy`] — governance policies and the synchronous policy evaluator
//!   that routes proposed actions to Allow / RequireApproval / Deny.
//! - [`governance`] — the approval request lifecycle: open, approve,
//!   reject, modify, rerun, escalation, and expiry reconciliation.
//! - [`ledger`] — the tamper-evident audit trail, queryable along the
//!   who/what/when/where/why/how dimensions.
//! - [`gateway`] — the in-process entry point used by the agent runtime,
//!   the approver surface, and the audit surface.
//!
//! All state lives in explicit service objects ([`policy::PolicyStore`],
//! [`governance::ApprovalStore`], [`ledger::Ledger`]); there is no ambient
//! global state. Callers hold references or receive them via injection.

pub mod config;
pub mod error;
pub mod gateway;
pub mod governance;
pub mod ledger;
pub mod policy;
pub mod rules;

pub use config::GateConfig;
pub use error::GateError;
pub use gateway::{ActionGateway, ProposedAction, RunOutcome, RunStatus};
