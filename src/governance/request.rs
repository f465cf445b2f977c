//! The approval request entity and its status state machine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::policy::{Approver, EscalationLevel, ProposedAction, RiskLevel};

// ============================================================================
// RequestId
// ============================================================================

/// Opaque approval request identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a fresh identifier.
    #[must_use]
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(format!("apr-{}", Uuid::new_v4()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ============================================================================
// Status
// ============================================================================

/// Approval request lifecycle status.
///
/// State machine transitions:
/// - Pending → Approved (approver accepted)
/// - Pending → Rejected (approver declined, or expiry reconciliation)
/// - Pending → Modified (approver accepted with changes; terminal with
///   mutated content, not re-enterable)
///
/// Every non-pending status is terminal and immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Modified,
}

impl ApprovalStatus {
    /// Terminal statuses never change again.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }

    /// Checks whether a transition from this status to another is legal.
    #[must_use]
    pub fn can_transition_to(&self, to: ApprovalStatus) -> bool {
        matches!(
            (self, to),
            (ApprovalStatus::Pending, ApprovalStatus::Approved)
                | (ApprovalStatus::Pending, ApprovalStatus::Rejected)
                | (ApprovalStatus::Pending, ApprovalStatus::Modified)
        )
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalStatus::Pending => f.write_str("pending"),
            ApprovalStatus::Approved => f.write_str("approved"),
            ApprovalStatus::Rejected => f.write_str("rejected"),
            ApprovalStatus::Modified => f.write_str("modified"),
        }
    }
}

/// What the execution collaborator should treat the request as, given
/// that a pending request past its expiry keeps `pending` status until an
/// explicit transition is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectiveOutcome {
    AwaitingDecision,
    Approved,
    Rejected,
    Modified,
    /// Still recorded as pending, but implicitly rejected for execution
    /// purposes — awaiting reconciliation
    ExpiredPending,
}

// ============================================================================
// Errors
// ============================================================================

/// Approval lifecycle errors. A failed transition leaves the request
/// unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApprovalError {
    /// No request with the given id.
    #[error("approval request '{request_id}' not found")]
    NotFound {
        /// The missing request id
        request_id: RequestId,
    },

    /// Illegal state transition (e.g. approving a rejected request).
    #[error("invalid transition for request '{request_id}': {from} -> {to}")]
    InvalidTransition {
        request_id: RequestId,
        from: ApprovalStatus,
        to: ApprovalStatus,
    },

    /// Another caller transitioned the request first; only the first
    /// transition wins.
    #[error("request '{request_id}' changed concurrently: expected {expected}, found {actual}")]
    ConcurrentModification {
        request_id: RequestId,
        expected: ApprovalStatus,
        actual: ApprovalStatus,
    },

    /// Rerun requested on a request that is not approved.
    #[error("request '{request_id}' cannot rerun from status {status}")]
    NotRerunnable {
        request_id: RequestId,
        status: ApprovalStatus,
    },

    /// Pending request cap reached.
    #[error("pending approval capacity exceeded")]
    CapacityExceeded,
}

// ============================================================================
// Records
// ============================================================================

/// One state transition, kept as the request's own audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestTransition {
    pub from: ApprovalStatus,
    pub to: ApprovalStatus,
    pub at: DateTime<Utc>,
    /// Who drove the transition, when a human or system actor is known
    pub by: Option<String>,
    pub reason: Option<String>,
}

/// The closing decision on a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub decided_by: String,
    pub decided_at: DateTime<Utc>,
    pub reason: Option<String>,
    /// Content patch applied by a `modify` decision; the execution
    /// collaborator reads the patched content from here
    pub patch: Option<Value>,
}

// ============================================================================
// ApprovalRequest
// ============================================================================

/// A pending-or-decided approval for one proposed action.
///
/// Created by policy evaluation, mutated only through the workflow's
/// operations, never deleted — superseded requests stay in the store and
/// the ledger holds the durable history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: RequestId,
    /// The action awaiting a decision
    pub action: ProposedAction,
    /// Policy that demanded approval
    pub policy_id: String,
    pub risk: RiskLevel,
    pub status: ApprovalStatus,
    pub created_at: DateTime<Utc>,
    /// From the lowest approver timeout; `None` means the request never
    /// expires
    pub expires_at: Option<DateTime<Utc>>,
    /// Approver ladder captured from the policy at creation time, so a
    /// later policy edit cannot change an in-flight request
    pub approvers: Vec<Approver>,
    /// Escalation ladder captured from the policy at creation time
    pub escalations: Vec<EscalationLevel>,
    /// Current escalation level; 0 is the initial approver set. Only ever
    /// increases.
    pub escalation_level: u32,
    pub rerun_count: u32,
    pub transitions: Vec<RequestTransition>,
    pub decision: Option<DecisionRecord>,
}

impl ApprovalRequest {
    /// Create a pending request for an action.
    #[must_use]
    pub fn new(
        action: ProposedAction,
        policy_id: impl Into<String>,
        risk: RiskLevel,
        approvers: Vec<Approver>,
        escalations: Vec<EscalationLevel>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: RequestId::new(),
            action,
            policy_id: policy_id.into(),
            risk,
            status: ApprovalStatus::Pending,
            created_at: Utc::now(),
            expires_at,
            approvers,
            escalations,
            escalation_level: 0,
            rerun_count: 0,
            transitions: Vec::new(),
            decision: None,
        }
    }

    /// True once the expiry timestamp has passed, regardless of status.
    #[must_use]
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|e| now > e).unwrap_or(false)
    }

    /// What execution should treat this request as right now.
    #[must_use]
    pub fn effective_outcome(&self, now: DateTime<Utc>) -> EffectiveOutcome {
        match self.status {
            ApprovalStatus::Approved => EffectiveOutcome::Approved,
            ApprovalStatus::Rejected => EffectiveOutcome::Rejected,
            ApprovalStatus::Modified => EffectiveOutcome::Modified,
            ApprovalStatus::Pending if self.is_past_expiry(now) => {
                EffectiveOutcome::ExpiredPending
            }
            ApprovalStatus::Pending => EffectiveOutcome::AwaitingDecision,
        }
    }

    /// Apply a status transition, recording it in the audit trail.
    ///
    /// Fails with [`ApprovalError::InvalidTransition`] and leaves the
    /// request untouched when the transition is illegal.
    pub fn transition(
        &mut self,
        to: ApprovalStatus,
        by: Option<String>,
        reason: Option<String>,
    ) -> Result<(), ApprovalError> {
        if !self.status.can_transition_to(to) {
            return Err(ApprovalError::InvalidTransition {
                request_id: self.id.clone(),
                from: self.status,
                to,
            });
        }
        self.transitions.push(RequestTransition {
            from: self.status,
            to,
            at: Utc::now(),
            by,
            reason,
        });
        self.status = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ProposedAction;
    use chrono::Duration as ChronoDuration;

    fn request(expires_in_secs: Option<i64>) -> ApprovalRequest {
        ApprovalRequest::new(
            ProposedAction::new("deploy", "cog-1"),
            "policy-1",
            RiskLevel::High,
            vec![],
            vec![],
            expires_in_secs.map(|s| Utc::now() + ChronoDuration::seconds(s)),
        )
    }

    #[test]
    fn pending_is_the_only_non_terminal_status() {
        assert!(!ApprovalStatus::Pending.is_terminal());
        assert!(ApprovalStatus::Approved.is_terminal());
        assert!(ApprovalStatus::Rejected.is_terminal());
        assert!(ApprovalStatus::Modified.is_terminal());
    }

    #[test]
    fn transition_records_audit_trail() {
        let mut req = request(None);
        req.transition(
            ApprovalStatus::Approved,
            Some("alice".into()),
            Some("looks safe".into()),
        )
        .unwrap();
        assert_eq!(req.status, ApprovalStatus::Approved);
        assert_eq!(req.transitions.len(), 1);
        assert_eq!(req.transitions[0].from, ApprovalStatus::Pending);
        assert_eq!(req.transitions[0].by.as_deref(), Some("alice"));
    }

    #[test]
    fn terminal_statuses_reject_further_transitions() {
        let mut req = request(None);
        req.transition(ApprovalStatus::Rejected, None, None).unwrap();
        let err = req
            .transition(ApprovalStatus::Approved, None, None)
            .unwrap_err();
        assert!(matches!(err, ApprovalError::InvalidTransition { .. }));
        assert_eq!(req.status, ApprovalStatus::Rejected);
        assert_eq!(req.transitions.len(), 1);
    }

    #[test]
    fn expired_pending_is_implicitly_rejected_but_stays_pending() {
        let req = request(Some(-10));
        assert_eq!(req.status, ApprovalStatus::Pending);
        assert_eq!(
            req.effective_outcome(Utc::now()),
            EffectiveOutcome::ExpiredPending
        );
    }

    #[test]
    fn no_expiry_means_never_past_expiry() {
        let req = request(None);
        assert!(!req.is_past_expiry(Utc::now() + ChronoDuration::days(365)));
        assert_eq!(
            req.effective_outcome(Utc::now()),
            EffectiveOutcome::AwaitingDecision
        );
    }
}
