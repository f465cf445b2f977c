//! Append-only, hash-chained audit ledger.
//!
//! Every governance-relevant event becomes a [`LedgerEntry`] structured
//! along the six W dimensions (who/what/when/where/why/how), chained to
//! its predecessor by content hash. Entries are created exactly once by
//! [`Ledger::append`] and never mutated or deleted; corrections are new
//! entries referencing the original, and the only permitted annotations
//! (flags, review status) live outside the hashed payload.

pub mod chain;
pub mod entry;
pub mod query;
pub mod store;

pub use chain::{verify_entries, GENESIS_HASH, HASH_ALGORITHM};
pub use entry::{
    ActorKind, CryptoRecord, EntryDraft, EntryId, EventCategory, EventStatus, Evidence, How,
    LedgerEntry, ReviewStatus, Severity, What, When, Where, Who, Why,
};
pub use query::{LedgerPage, LedgerQuery, SortDirection, SortField};
pub use store::{Ledger, LedgerError};
