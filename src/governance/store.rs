//! Concurrent approval request storage.
//!
//! Requests are held as `Arc<ApprovalRequest>` inside a DashMap;
//! mutations go through `Arc::make_mut` under the entry's shard lock, so
//! transitions on the same request id are serialized — given two racing
//! `approve` calls, exactly one wins and the other observes the already-
//! terminal status.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::warn;

use super::request::{ApprovalError, ApprovalRequest, ApprovalStatus, DecisionRecord, RequestId};

/// In-memory request store. Requests are never deleted; terminal entries
/// remain for inspection, with the ledger as the durable history.
#[derive(Debug, Default)]
pub struct ApprovalStore {
    requests: DashMap<RequestId, Arc<ApprovalRequest>>,
    pending_count: AtomicUsize,
    /// Pending request cap; 0 disables the check
    max_pending: usize,
}

impl ApprovalStore {
    #[must_use]
    pub fn new(max_pending: usize) -> Self {
        Self {
            requests: DashMap::new(),
            pending_count: AtomicUsize::new(0),
            max_pending,
        }
    }

    /// Number of pending (non-terminal) requests.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending_count.load(Ordering::Acquire)
    }

    /// Total number of requests, terminal included.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.requests.len()
    }

    /// Insert a freshly opened request.
    ///
    /// Reserves a pending slot atomically; fails with `CapacityExceeded`
    /// when the cap is reached.
    pub fn insert(&self, request: ApprovalRequest) -> Result<Arc<ApprovalRequest>, ApprovalError> {
        if self.max_pending > 0 {
            loop {
                let current = self.pending_count.load(Ordering::Acquire);
                if current >= self.max_pending {
                    return Err(ApprovalError::CapacityExceeded);
                }
                if self
                    .pending_count
                    .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    break;
                }
            }
        } else {
            self.pending_count.fetch_add(1, Ordering::AcqRel);
        }

        let request = Arc::new(request);
        self.requests.insert(request.id.clone(), request.clone());
        Ok(request)
    }

    /// Fetch a request by id.
    pub fn get(&self, id: &RequestId) -> Result<Arc<ApprovalRequest>, ApprovalError> {
        self.requests
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ApprovalError::NotFound {
                request_id: id.clone(),
            })
    }

    /// Transition a request only if it currently has the expected status.
    ///
    /// This is the single-winner guard: the check and the mutation happen
    /// under the entry's shard lock, so of two racing callers the second
    /// sees the first one's terminal status and gets
    /// [`ApprovalError::ConcurrentModification`].
    pub fn transition_if(
        &self,
        id: &RequestId,
        expected: ApprovalStatus,
        to: ApprovalStatus,
        by: Option<String>,
        reason: Option<String>,
        decision: Option<DecisionRecord>,
    ) -> Result<Arc<ApprovalRequest>, ApprovalError> {
        let mut entry = self.requests.get_mut(id).ok_or_else(|| ApprovalError::NotFound {
            request_id: id.clone(),
        })?;

        if entry.status != expected {
            return Err(ApprovalError::ConcurrentModification {
                request_id: id.clone(),
                expected,
                actual: entry.status,
            });
        }

        let was_terminal = entry.status.is_terminal();
        {
            let request = Arc::make_mut(entry.value_mut());
            request.transition(to, by, reason)?;
            if decision.is_some() {
                request.decision = decision;
            }
        }

        if !was_terminal && entry.status.is_terminal() {
            self.pending_count.fetch_sub(1, Ordering::AcqRel);
        }

        Ok(entry.value().clone())
    }

    /// Increment the rerun counter; legal only from `approved`.
    pub fn record_rerun(&self, id: &RequestId) -> Result<Arc<ApprovalRequest>, ApprovalError> {
        let mut entry = self.requests.get_mut(id).ok_or_else(|| ApprovalError::NotFound {
            request_id: id.clone(),
        })?;

        if entry.status != ApprovalStatus::Approved {
            return Err(ApprovalError::NotRerunnable {
                request_id: id.clone(),
                status: entry.status,
            });
        }

        Arc::make_mut(entry.value_mut()).rerun_count += 1;
        Ok(entry.value().clone())
    }

    /// Raise a pending request's escalation level. Monotonic: a level at
    /// or below the current one is a no-op, as is any terminal status.
    ///
    /// Returns the request when the level actually advanced.
    pub fn advance_escalation(
        &self,
        id: &RequestId,
        level: u32,
    ) -> Result<Option<Arc<ApprovalRequest>>, ApprovalError> {
        let mut entry = self.requests.get_mut(id).ok_or_else(|| ApprovalError::NotFound {
            request_id: id.clone(),
        })?;

        if entry.status != ApprovalStatus::Pending || level <= entry.escalation_level {
            return Ok(None);
        }

        Arc::make_mut(entry.value_mut()).escalation_level = level;
        Ok(Some(entry.value().clone()))
    }

    /// Snapshot of pending requests.
    #[must_use]
    pub fn pending(&self) -> Vec<Arc<ApprovalRequest>> {
        self.requests
            .iter()
            .filter(|entry| entry.status == ApprovalStatus::Pending)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Mark every pending request past its expiry as rejected.
    ///
    /// Returns the ids that were reconciled. Requests that race a
    /// concurrent terminal transition are skipped — the explicit decision
    /// wins.
    pub fn reconcile_expired(&self, now: DateTime<Utc>) -> Vec<RequestId> {
        let overdue: Vec<RequestId> = self
            .requests
            .iter()
            .filter(|entry| entry.status == ApprovalStatus::Pending && entry.is_past_expiry(now))
            .map(|entry| entry.id.clone())
            .collect();

        let mut reconciled = Vec::new();
        for id in overdue {
            match self.transition_if(
                &id,
                ApprovalStatus::Pending,
                ApprovalStatus::Rejected,
                Some("system".to_string()),
                Some("approval window expired".to_string()),
                None,
            ) {
                Ok(request) => {
                    warn!(request_id = %id, policy_id = %request.policy_id, "approval request expired");
                    reconciled.push(id);
                }
                // Lost the race to an explicit decision — nothing to do.
                Err(ApprovalError::ConcurrentModification { .. }) => {}
                Err(err) => {
                    warn!(request_id = %id, error = %err, "expiry reconciliation failed");
                }
            }
        }
        reconciled
    }
}
