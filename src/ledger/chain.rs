//! Content hashing and chain verification.
//!
//! Each entry's `content_hash` is SHA-256 over the canonical JSON of its
//! hashed payload — the sequence, id, six dimensions, tags, and evidence.
//! Annotations (`flagged`, `review_status`) and the crypto record itself
//! are excluded, so annotating an entry can never break the chain.
//! Canonical JSON sorts object keys, making the hash independent of map
//! insertion order.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::entry::{EntryId, Evidence, How, LedgerEntry, What, When, Where, Who, Why};
use super::store::LedgerError;

/// Previous-hash value for the first entry in a chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Algorithm tag stamped on every crypto record.
pub const HASH_ALGORITHM: &str = "sha-256";

/// Nesting cap for canonical serialization; prevents stack exhaustion
/// from hostile metadata payloads.
const MAX_CANONICAL_DEPTH: usize = 64;

// ============================================================================
// Hashed Payload
// ============================================================================

/// The exact field set covered by `content_hash`.
#[derive(Serialize)]
struct HashedPayload<'a> {
    sequence: u64,
    id: &'a EntryId,
    who: &'a Who,
    what: &'a What,
    when: &'a When,
    #[serde(rename = "where")]
    where_: &'a Where,
    why: &'a Why,
    how: &'a How,
    tags: &'a [String],
    evidence: &'a [Evidence],
}

/// Compute the content hash for an entry's payload fields.
///
/// Used by `append` when creating the entry and by verification when
/// recomputing the expected hash.
pub(super) fn content_hash(entry: &LedgerEntry) -> Result<String, LedgerError> {
    let payload = HashedPayload {
        sequence: entry.sequence,
        id: &entry.id,
        who: &entry.who,
        what: &entry.what,
        when: &entry.when,
        where_: &entry.where_,
        why: &entry.why,
        how: &entry.how,
        tags: &entry.tags,
        evidence: &entry.evidence,
    };
    let value = serde_json::to_value(&payload).map_err(|e| LedgerError::IntegrityFailure {
        sequence: entry.sequence,
        details: format!("payload serialization failed: {e}"),
    })?;
    let canonical = canonical_json(&value, 0).ok_or_else(|| LedgerError::IntegrityFailure {
        sequence: entry.sequence,
        details: format!("payload nesting exceeds {MAX_CANONICAL_DEPTH} levels"),
    })?;

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Canonical JSON: object keys sorted, no insignificant whitespace.
/// Returns `None` past the depth cap.
fn canonical_json(value: &serde_json::Value, depth: usize) -> Option<String> {
    if depth > MAX_CANONICAL_DEPTH {
        return None;
    }

    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut entries = Vec::with_capacity(keys.len());
            for key in keys {
                let rendered = canonical_json(&map[key], depth + 1)?;
                let key_str = serde_json::to_string(key).ok()?;
                entries.push(format!("{key_str}:{rendered}"));
            }
            Some(format!("{{{}}}", entries.join(",")))
        }
        serde_json::Value::Array(items) => {
            let mut rendered = Vec::with_capacity(items.len());
            for item in items {
                rendered.push(canonical_json(item, depth + 1)?);
            }
            Some(format!("[{}]", rendered.join(",")))
        }
        other => serde_json::to_string(other).ok(),
    }
}

// ============================================================================
// Verification
// ============================================================================

/// Verify an entry sequence: every content hash recomputes to its stored
/// value, and every `previous_hash` links to its predecessor (genesis for
/// the first entry).
///
/// The first mismatch is surfaced with its sequence number; a broken
/// chain is reported to operators, never repaired.
pub fn verify_entries(entries: &[impl AsRef<LedgerEntry>]) -> Result<(), LedgerError> {
    let mut previous: Option<&LedgerEntry> = None;

    for item in entries {
        let entry = item.as_ref();
        let expected = content_hash(entry)?;
        if expected != entry.crypto.content_hash {
            return Err(LedgerError::IntegrityFailure {
                sequence: entry.sequence,
                details: "content hash does not match payload".to_string(),
            });
        }

        let expected_previous = match previous {
            Some(prev) => {
                if entry.sequence != prev.sequence + 1 {
                    return Err(LedgerError::IntegrityFailure {
                        sequence: entry.sequence,
                        details: format!(
                            "sequence gap: {} follows {}",
                            entry.sequence, prev.sequence
                        ),
                    });
                }
                prev.crypto.content_hash.as_str()
            }
            None => GENESIS_HASH,
        };
        if entry.crypto.previous_hash != expected_previous {
            return Err(LedgerError::IntegrityFailure {
                sequence: entry.sequence,
                details: "previous hash does not match predecessor".to_string(),
            });
        }

        previous = Some(entry);
    }

    Ok(())
}

/// Timestamp helper so append and tests stamp `hashed_at` uniformly.
pub(super) fn hash_timestamp() -> DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_json_sorts_keys() {
        let value = json!({"zeta": 1, "alpha": {"nested_z": true, "nested_a": false}});
        let canonical = canonical_json(&value, 0).unwrap();
        assert_eq!(
            canonical,
            r#"{"alpha":{"nested_a":false,"nested_z":true},"zeta":1}"#
        );
    }

    #[test]
    fn canonical_json_rejects_excessive_depth() {
        let mut value = json!(1);
        for _ in 0..70 {
            value = json!([value]);
        }
        assert!(canonical_json(&value, 0).is_none());
    }

    #[test]
    fn genesis_hash_is_sha256_width() {
        assert_eq!(GENESIS_HASH.len(), 64);
        assert!(GENESIS_HASH.chars().all(|c| c == '0'));
    }
}
