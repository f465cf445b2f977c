//! Versioned, concurrent policy store.
//!
//! An explicit service object owning the policy collection — callers hold
//! an `Arc<PolicyStore>` and share it with the evaluator and the gateway.
//! Every insert/update/remove bumps the store version so cached derived
//! state (compiled rule scripts, evaluation snapshots) can detect
//! staleness.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use super::types::{Policy, PolicyError};

/// Concurrent policy collection with a monotonic version counter.
#[derive(Debug, Default)]
pub struct PolicyStore {
    policies: DashMap<String, Arc<Policy>>,
    version: AtomicU64,
}

impl PolicyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current store version; bumped on every mutation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Insert or replace a policy.
    pub fn upsert(&self, policy: Policy) -> Arc<Policy> {
        let policy = Arc::new(policy);
        self.policies.insert(policy.id.clone(), policy.clone());
        self.version.fetch_add(1, Ordering::AcqRel);
        policy
    }

    /// Fetch a policy by id.
    pub fn get(&self, policy_id: &str) -> Result<Arc<Policy>, PolicyError> {
        self.policies
            .get(policy_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| PolicyError::NotFound {
                policy_id: policy_id.to_string(),
            })
    }

    /// Remove a policy by id.
    pub fn remove(&self, policy_id: &str) -> Result<Arc<Policy>, PolicyError> {
        let removed = self
            .policies
            .remove(policy_id)
            .map(|(_, policy)| policy)
            .ok_or_else(|| PolicyError::NotFound {
                policy_id: policy_id.to_string(),
            })?;
        self.version.fetch_add(1, Ordering::AcqRel);
        Ok(removed)
    }

    /// Snapshot of all policies, enabled or not.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<Policy>> {
        let mut policies: Vec<Arc<Policy>> = self
            .policies
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        // Deterministic evaluation order regardless of map iteration.
        policies.sort_by(|a, b| a.id.cmp(&b.id));
        policies
    }

    /// Snapshot of enabled policies only, in id order.
    #[must_use]
    pub fn enabled(&self) -> Vec<Arc<Policy>> {
        self.all().into_iter().filter(|p| p.enabled).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::types::RiskLevel;

    #[test]
    fn upsert_and_get() {
        let store = PolicyStore::new();
        store.upsert(Policy::requiring_approval("p-1", RiskLevel::High));
        assert_eq!(store.get("p-1").unwrap().risk, RiskLevel::High);
        assert!(matches!(
            store.get("missing"),
            Err(PolicyError::NotFound { .. })
        ));
    }

    #[test]
    fn version_bumps_on_every_mutation() {
        let store = PolicyStore::new();
        let v0 = store.version();
        store.upsert(Policy::requiring_approval("p-1", RiskLevel::Low));
        let v1 = store.version();
        store.remove("p-1").unwrap();
        let v2 = store.version();
        assert!(v0 < v1 && v1 < v2);
    }

    #[test]
    fn enabled_filters_and_sorts() {
        let store = PolicyStore::new();
        let mut disabled = Policy::requiring_approval("b", RiskLevel::Low);
        disabled.enabled = false;
        store.upsert(disabled);
        store.upsert(Policy::requiring_approval("c", RiskLevel::Low));
        store.upsert(Policy::requiring_approval("a", RiskLevel::Low));

        let ids: Vec<String> = store.enabled().iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }
}
