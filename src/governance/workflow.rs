//! The approval workflow operations.
//!
//! [`ApprovalWorkflow`] is the service the human approver surface talks
//! to: open, approve, reject, modify, rerun, batch approval, and expiry
//! reconciliation. Each operation is a single atomic transition against
//! the store; a failed transition changes nothing and tells the caller
//! the current status.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::config::ApprovalConfig;
use crate::policy::{Policy, ProposedAction, RiskLevel};

use super::request::{
    ApprovalError, ApprovalRequest, ApprovalStatus, DecisionRecord, RequestId,
};
use super::store::ApprovalStore;

// ============================================================================
// Batch Outcome
// ============================================================================

/// Per-id result of a batch operation. Outcomes are independent: one
/// failure never rolls back the others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub request_id: RequestId,
    pub approved: bool,
    /// Populated when this id failed
    pub error: Option<String>,
}

// ============================================================================
// ApprovalWorkflow
// ============================================================================

/// Approval lifecycle service over a shared [`ApprovalStore`].
#[derive(Debug)]
pub struct ApprovalWorkflow {
    store: Arc<ApprovalStore>,
    config: ApprovalConfig,
}

impl ApprovalWorkflow {
    #[must_use]
    pub fn new(store: Arc<ApprovalStore>, config: ApprovalConfig) -> Self {
        Self { store, config }
    }

    /// The backing store, shared with the escalation scheduler.
    #[must_use]
    pub fn store(&self) -> &Arc<ApprovalStore> {
        &self.store
    }

    /// Open a pending request for an action under the given policy.
    ///
    /// The approver and escalation ladders are captured from the policy at
    /// this moment. Expiry is the lowest approver timeout, clamped to the
    /// configured bounds; approvers without timeouts leave the request
    /// without an expiry.
    pub fn open(
        &self,
        action: ProposedAction,
        policy: &Policy,
        risk: RiskLevel,
    ) -> Result<Arc<ApprovalRequest>, ApprovalError> {
        let mut request = ApprovalRequest::new(
            action,
            policy.id.clone(),
            risk,
            policy.approvers.clone(),
            policy.escalations.clone(),
            None,
        );
        request.expires_at = self.compute_expiry(policy, request.created_at);

        let request = self.store.insert(request)?;
        info!(
            request_id = %request.id,
            policy_id = %policy.id,
            risk = %risk,
            expires = ?request.expires_at,
            "approval request opened"
        );
        Ok(request)
    }

    fn compute_expiry(&self, policy: &Policy, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let shortest = policy
            .approvers
            .iter()
            .filter_map(|a| a.timeout_minutes)
            .min()?;
        let ttl = Duration::from_secs(u64::from(shortest) * 60)
            .clamp(self.config.min_ttl, self.config.max_ttl);
        Some(now + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero()))
    }

    /// Approve a pending request.
    pub fn approve(
        &self,
        id: &RequestId,
        by: impl Into<String>,
    ) -> Result<Arc<ApprovalRequest>, ApprovalError> {
        let by = by.into();
        let decision = DecisionRecord {
            decided_by: by.clone(),
            decided_at: Utc::now(),
            reason: None,
            patch: None,
        };
        let request = self.store.transition_if(
            id,
            ApprovalStatus::Pending,
            ApprovalStatus::Approved,
            Some(by),
            None,
            Some(decision),
        )?;
        info!(request_id = %id, "approval granted");
        Ok(request)
    }

    /// Reject a pending request, with an optional reason.
    pub fn reject(
        &self,
        id: &RequestId,
        by: impl Into<String>,
        reason: Option<String>,
    ) -> Result<Arc<ApprovalRequest>, ApprovalError> {
        let by = by.into();
        let decision = DecisionRecord {
            decided_by: by.clone(),
            decided_at: Utc::now(),
            reason: reason.clone(),
            patch: None,
        };
        let request = self.store.transition_if(
            id,
            ApprovalStatus::Pending,
            ApprovalStatus::Rejected,
            Some(by),
            reason,
            Some(decision),
        )?;
        info!(request_id = %id, "approval rejected");
        Ok(request)
    }

    /// Approve with changes: terminal with mutated content, not
    /// re-enterable. The patch is recorded on the decision for the
    /// execution collaborator.
    pub fn modify(
        &self,
        id: &RequestId,
        by: impl Into<String>,
        patch: Value,
    ) -> Result<Arc<ApprovalRequest>, ApprovalError> {
        let by = by.into();
        let decision = DecisionRecord {
            decided_by: by.clone(),
            decided_at: Utc::now(),
            reason: None,
            patch: Some(patch),
        };
        let request = self.store.transition_if(
            id,
            ApprovalStatus::Pending,
            ApprovalStatus::Modified,
            Some(by),
            Some("approved with modifications".to_string()),
            Some(decision),
        )?;
        info!(request_id = %id, "approval modified");
        Ok(request)
    }

    /// Signal the execution collaborator to retry an approved request.
    /// Increments the rerun counter; the approval status never changes.
    pub fn rerun(&self, id: &RequestId) -> Result<Arc<ApprovalRequest>, ApprovalError> {
        let request = self.store.record_rerun(id)?;
        info!(request_id = %id, rerun_count = request.rerun_count, "rerun requested");
        Ok(request)
    }

    /// Approve each id independently. A non-pending id reports its error
    /// and the rest proceed.
    pub fn batch_approve(&self, ids: &[RequestId], by: impl Into<String>) -> Vec<BatchOutcome> {
        let by = by.into();
        ids.iter()
            .map(|id| match self.approve(id, by.clone()) {
                Ok(_) => BatchOutcome {
                    request_id: id.clone(),
                    approved: true,
                    error: None,
                },
                Err(err) => BatchOutcome {
                    request_id: id.clone(),
                    approved: false,
                    error: Some(err.to_string()),
                },
            })
            .collect()
    }

    /// Mark pending requests past their expiry as rejected. Callable
    /// directly; also run by the escalation sweeper.
    pub fn reconcile_expired(&self) -> Vec<RequestId> {
        self.store.reconcile_expired(Utc::now())
    }

    /// Fetch a request.
    pub fn get(&self, id: &RequestId) -> Result<Arc<ApprovalRequest>, ApprovalError> {
        self.store.get(id)
    }
}
