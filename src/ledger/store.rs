//! The ledger service: strictly serialized append, snapshot reads,
//! verification, and annotation-only mutation.

use std::sync::{Arc, RwLock};

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info};

use crate::config::LedgerConfig;

use super::chain::{self, GENESIS_HASH, HASH_ALGORITHM};
use super::entry::{CryptoRecord, EntryDraft, EntryId, LedgerEntry, ReviewStatus, When};
use super::query::{LedgerPage, LedgerQuery};

// ============================================================================
// Errors
// ============================================================================

/// Ledger failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The hash chain does not verify. Fatal to trust in the affected
    /// range; surfaced to operators, never auto-repaired.
    #[error("ledger integrity failure at sequence {sequence}: {details}")]
    IntegrityFailure {
        /// First sequence number where verification failed
        sequence: u64,
        /// What failed
        details: String,
    },

    /// No entry with the given id.
    #[error("ledger entry '{entry_id}' not found")]
    NotFound {
        /// The missing entry id
        entry_id: EntryId,
    },

    /// Malformed query input. Queries fail closed rather than returning a
    /// partially filtered view.
    #[error("invalid ledger query: {details}")]
    InvalidQuery {
        /// What is malformed
        details: String,
    },
}

// ============================================================================
// Ledger
// ============================================================================

/// Append-only, hash-chained entry store.
///
/// `append` holds the sole write path — sequence numbers and the hash
/// chain require total ordering — while readers work off owned
/// `Arc<LedgerEntry>` snapshots and never block appends for long.
/// There is no update or delete primitive; flags and review status are
/// the only mutations, and they replace annotation fields outside the
/// hashed payload.
#[derive(Debug, Default)]
pub struct Ledger {
    entries: RwLock<Vec<Arc<LedgerEntry>>>,
    config: LedgerConfig,
}

impl Ledger {
    #[must_use]
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            config,
        }
    }

    /// Number of entries appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a new entry.
    ///
    /// Assigns the next sequence number, stamps the record time (the
    /// event time may be caller-supplied and disjoint from append order),
    /// computes the content hash, and links to the predecessor. Once
    /// accepted the entry is permanent.
    pub fn append(&self, draft: EntryDraft) -> Result<Arc<LedgerEntry>, LedgerError> {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let sequence = entries.len() as u64;
        let previous_hash = entries
            .last()
            .map(|prev| prev.crypto.content_hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());

        let now = Utc::now();
        let mut entry = LedgerEntry {
            sequence,
            id: EntryId::new(),
            who: draft.who,
            what: draft.what,
            when: When {
                event_at: draft.event_at.unwrap_or(now),
                recorded_at: now,
            },
            where_: draft.where_,
            why: draft.why,
            how: draft.how,
            tags: draft.tags,
            evidence: draft.evidence,
            crypto: CryptoRecord {
                content_hash: String::new(),
                previous_hash,
                algorithm: HASH_ALGORITHM.to_string(),
                hashed_at: chain::hash_timestamp(),
            },
            flagged: false,
            review_status: ReviewStatus::Unreviewed,
        };
        entry.crypto.content_hash = chain::content_hash(&entry)?;

        let entry = Arc::new(entry);
        entries.push(entry.clone());

        info!(
            sequence,
            entry_id = %entry.id,
            event_type = %entry.what.event_type,
            "ledger entry appended"
        );
        Ok(entry)
    }

    /// Owned snapshot of the full chain, in sequence order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<LedgerEntry>> {
        self.entries
            .read()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Fetch one entry by id.
    pub fn get(&self, id: &EntryId) -> Result<Arc<LedgerEntry>, LedgerError> {
        self.snapshot()
            .into_iter()
            .find(|entry| &entry.id == id)
            .ok_or_else(|| LedgerError::NotFound {
                entry_id: id.clone(),
            })
    }

    /// Verify the whole chain.
    ///
    /// Any mismatch indicates tampering or reordering; it is reported to
    /// the operator alerting path and returned, never silently repaired.
    pub fn verify_chain(&self) -> Result<(), LedgerError> {
        let result = chain::verify_entries(&self.snapshot());
        if let Err(ref err) = result {
            error!(error = %err, "ledger chain verification failed");
        }
        result
    }

    /// Run a filtered, sorted, paginated query over a snapshot.
    ///
    /// Never mutates stored entries; fails closed on malformed input.
    pub fn query(&self, query: &LedgerQuery) -> Result<LedgerPage, LedgerError> {
        query.apply(self.snapshot(), &self.config)
    }

    /// Mark an entry for operator attention.
    ///
    /// Annotation only: the hashed payload and the chain are unaffected.
    pub fn flag(&self, id: &EntryId) -> Result<Arc<LedgerEntry>, LedgerError> {
        self.annotate(id, |entry| entry.flagged = true)
    }

    /// Move an entry through the reviewer workflow.
    pub fn set_review_status(
        &self,
        id: &EntryId,
        status: ReviewStatus,
    ) -> Result<Arc<LedgerEntry>, LedgerError> {
        self.annotate(id, |entry| entry.review_status = status)
    }

    fn annotate(
        &self,
        id: &EntryId,
        mutate: impl FnOnce(&mut LedgerEntry),
    ) -> Result<Arc<LedgerEntry>, LedgerError> {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let slot = entries
            .iter_mut()
            .find(|entry| &entry.id == id)
            .ok_or_else(|| LedgerError::NotFound {
                entry_id: id.clone(),
            })?;
        mutate(Arc::make_mut(slot));
        Ok(slot.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::entry::{
        EventCategory, EventStatus, Severity, What, Who, Why,
    };
    use chrono::Duration as ChronoDuration;

    fn draft(event_type: &str) -> EntryDraft {
        EntryDraft::new(
            Who::system(),
            What {
                event_type: event_type.to_string(),
                category: EventCategory::Governance,
                severity: Severity::Info,
                status: EventStatus::Success,
                description: format!("{event_type} event"),
                result: None,
                duration_ms: None,
            },
            Why::new("policy", "test"),
        )
    }

    fn ledger() -> Ledger {
        Ledger::new(LedgerConfig::default())
    }

    #[test]
    fn append_assigns_sequential_numbers_and_links_hashes() {
        let ledger = ledger();
        let first = ledger.append(draft("approval_requested")).unwrap();
        let second = ledger.append(draft("approval_granted")).unwrap();

        assert_eq!(first.sequence, 0);
        assert_eq!(second.sequence, 1);
        assert_eq!(first.crypto.previous_hash, GENESIS_HASH);
        assert_eq!(second.crypto.previous_hash, first.crypto.content_hash);
    }

    #[test]
    fn chain_of_appends_always_verifies() {
        let ledger = ledger();
        for i in 0..10 {
            ledger.append(draft(&format!("event_{i}"))).unwrap();
        }
        assert!(ledger.verify_chain().is_ok());
    }

    #[test]
    fn mutated_payload_breaks_verification() {
        let ledger = ledger();
        ledger.append(draft("a")).unwrap();
        let victim = ledger.append(draft("b")).unwrap();
        ledger.append(draft("c")).unwrap();

        // Reach into storage and tamper with a persisted payload.
        {
            let mut entries = ledger.entries.write().unwrap();
            let slot = entries
                .iter_mut()
                .find(|e| e.id == victim.id)
                .expect("entry present");
            Arc::make_mut(slot).what.description = "rewritten history".to_string();
        }

        let err = ledger.verify_chain().unwrap_err();
        assert!(matches!(
            err,
            LedgerError::IntegrityFailure { sequence: 1, .. }
        ));
    }

    #[test]
    fn event_time_does_not_affect_sequence_order() {
        let ledger = ledger();
        let past = Utc::now() - ChronoDuration::days(3);
        let first = ledger.append(draft("recent")).unwrap();
        let second = ledger.append(draft("backfilled").happened_at(past)).unwrap();

        assert!(second.when.event_at < first.when.event_at);
        assert_eq!(second.sequence, first.sequence + 1);
        assert!(ledger.verify_chain().is_ok());
    }

    #[test]
    fn flag_and_review_do_not_break_the_chain() {
        let ledger = ledger();
        let entry = ledger.append(draft("approval_granted")).unwrap();
        ledger.append(draft("run_completed")).unwrap();

        let hash_before = entry.crypto.content_hash.clone();
        let flagged = ledger.flag(&entry.id).unwrap();
        ledger
            .set_review_status(&entry.id, ReviewStatus::InReview)
            .unwrap();

        assert!(flagged.flagged);
        assert_eq!(flagged.crypto.content_hash, hash_before);
        assert!(ledger.verify_chain().is_ok());
    }

    #[test]
    fn get_unknown_entry_fails() {
        let ledger = ledger();
        assert!(matches!(
            ledger.get(&EntryId::new()),
            Err(LedgerError::NotFound { .. })
        ));
    }
}
