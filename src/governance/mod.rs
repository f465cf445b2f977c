//! Approval request lifecycle management.
//!
//! Policy evaluation opens an [`ApprovalRequest`]; this module owns
//! everything that happens to it afterwards:
//!
//! - `request` — the request entity and its status state machine.
//! - `store` — concurrent request storage with per-entry optimistic
//!   transitions (exactly one of two racing approvals wins).
//! - `workflow` — the approve/reject/modify/rerun/batch operations and
//!   expiry reconciliation.
//! - `escalation` — the background sweeper that advances pending requests
//!   through their escalation ladders and notifies approvers.

pub mod escalation;
pub mod request;
pub mod store;
pub mod workflow;

pub use escalation::{EscalationNotifier, EscalationScheduler, LogNotifier, NotifyError};
pub use request::{
    ApprovalError, ApprovalRequest, ApprovalStatus, DecisionRecord, EffectiveOutcome, RequestId,
    RequestTransition,
};
pub use store::ApprovalStore;
pub use workflow::{ApprovalWorkflow, BatchOutcome};
