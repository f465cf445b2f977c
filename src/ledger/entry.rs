//! Ledger entry types: the six W dimensions, crypto record, annotations.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// ============================================================================
// EntryId
// ============================================================================

/// Opaque ledger entry identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(String);

impl EntryId {
    #[must_use]
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(format!("led-{}", Uuid::new_v4()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Dimension: Who
// ============================================================================

/// Kind of actor behind an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    Cognate,
    Human,
    System,
    Integration,
}

impl fmt::Display for ActorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorKind::Cognate => f.write_str("cognate"),
            ActorKind::Human => f.write_str("human"),
            ActorKind::System => f.write_str("system"),
            ActorKind::Integration => f.write_str("integration"),
        }
    }
}

/// Who acted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Who {
    pub kind: ActorKind,
    pub id: String,
    /// Display name for audit surfaces
    pub name: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Who {
    #[must_use]
    pub fn cognate(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            kind: ActorKind::Cognate,
            name: id.clone(),
            id,
            metadata: Map::new(),
        }
    }

    #[must_use]
    pub fn human(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            kind: ActorKind::Human,
            name: id.clone(),
            id,
            metadata: Map::new(),
        }
    }

    #[must_use]
    pub fn system() -> Self {
        Self {
            kind: ActorKind::System,
            id: "actgate".to_string(),
            name: "actgate".to_string(),
            metadata: Map::new(),
        }
    }
}

// ============================================================================
// Dimension: What
// ============================================================================

/// Event grouping used for filtering and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Governance,
    Execution,
    Rules,
    Security,
    System,
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventCategory::Governance => f.write_str("governance"),
            EventCategory::Execution => f.write_str("execution"),
            EventCategory::Rules => f.write_str("rules"),
            EventCategory::Security => f.write_str("security"),
            EventCategory::System => f.write_str("system"),
        }
    }
}

/// Severity scale; ordering is the rank used for sorting
/// (debug < info < notice < warning < error < critical).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Debug,
    #[default]
    Info,
    Notice,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Debug => f.write_str("debug"),
            Severity::Info => f.write_str("info"),
            Severity::Notice => f.write_str("notice"),
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
            Severity::Critical => f.write_str("critical"),
        }
    }
}

/// Outcome status of the recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Success,
    Failure,
    Pending,
    Denied,
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct What {
    /// Event type tag, e.g. `approval_requested`
    pub event_type: String,
    pub category: EventCategory,
    pub severity: Severity,
    pub status: EventStatus,
    /// Human-readable description, searched by free-text queries
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

// ============================================================================
// Dimension: When
// ============================================================================

/// When it happened and when it was recorded.
///
/// `event_at` may be caller-supplied and disjoint from append order; the
/// sequence number, not the timestamp, is the chain's ordering authority.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct When {
    pub event_at: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
}

// ============================================================================
// Dimension: Where
// ============================================================================

/// Where it happened.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Where {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

// ============================================================================
// Dimension: Why
// ============================================================================

/// Why it happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Why {
    /// Trigger kind, e.g. `policy`, `rule`, `manual`
    pub trigger: String,
    pub reasoning: String,
    /// Reference to the driving artifact (policy id, rule id, request id)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Agent confidence score in `[0, 1]`, when one was reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl Why {
    #[must_use]
    pub fn new(trigger: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            trigger: trigger.into(),
            reasoning: reasoning.into(),
            reference: None,
            confidence: None,
        }
    }

    /// Builder-style artifact reference.
    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

// ============================================================================
// Dimension: How
// ============================================================================

/// How it was done.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct How {
    /// Approach summary, e.g. `policy_evaluation`
    pub approach: String,
    #[serde(default)]
    pub tools: Vec<String>,
    /// Model identifier when an LLM was involved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Ordered steps taken
    #[serde(default)]
    pub steps: Vec<String>,
    /// Resource usage (tokens, cost, api calls)
    #[serde(default)]
    pub resources: Map<String, Value>,
}

impl How {
    #[must_use]
    pub fn approach(approach: impl Into<String>) -> Self {
        Self {
            approach: approach.into(),
            ..Self::default()
        }
    }
}

// ============================================================================
// Evidence & Crypto
// ============================================================================

/// Attached supporting artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    /// Attachment kind, e.g. `log`, `diff`, `screenshot`
    pub kind: String,
    /// Locator for the artifact
    pub reference: String,
}

/// Tamper-evidence record. `previous_hash` of entry *n* equals the
/// `content_hash` of entry *n − 1*; the first entry chains to the genesis
/// constant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoRecord {
    pub content_hash: String,
    pub previous_hash: String,
    /// Algorithm tag, currently always `sha-256`
    pub algorithm: String,
    pub hashed_at: DateTime<Utc>,
}

/// Reviewer workflow marker; lives outside the hashed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    #[default]
    Unreviewed,
    InReview,
    Reviewed,
    Disputed,
}

// ============================================================================
// LedgerEntry
// ============================================================================

/// One immutable audit record.
///
/// The hashed payload covers sequence, id, and the six dimensions plus
/// tags and evidence. `flagged` and `review_status` are annotations
/// outside the payload: changing them never alters `content_hash`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Monotonic position in the chain; the ordering authority
    pub sequence: u64,
    pub id: EntryId,
    pub who: Who,
    pub what: What,
    pub when: When,
    #[serde(rename = "where")]
    pub where_: Where,
    pub why: Why,
    pub how: How,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    pub crypto: CryptoRecord,
    /// Annotation: marked for operator attention
    #[serde(default)]
    pub flagged: bool,
    /// Annotation: reviewer workflow state
    #[serde(default)]
    pub review_status: ReviewStatus,
}

// ============================================================================
// EntryDraft
// ============================================================================

/// Input to [`crate::ledger::Ledger::append`]: everything the caller
/// controls. Sequence, recorded time, and the crypto record are assigned
/// by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryDraft {
    pub who: Who,
    pub what: What,
    /// Event time; `None` stamps the append time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_at: Option<DateTime<Utc>>,
    #[serde(rename = "where", default)]
    pub where_: Where,
    pub why: Why,
    #[serde(default)]
    pub how: How,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
}

impl EntryDraft {
    /// A draft with the required dimensions; the rest default to empty.
    #[must_use]
    pub fn new(who: Who, what: What, why: Why) -> Self {
        Self {
            who,
            what,
            event_at: None,
            where_: Where::default(),
            why,
            how: How::default(),
            tags: Vec::new(),
            evidence: Vec::new(),
        }
    }

    /// Builder-style location.
    #[must_use]
    pub fn at(mut self, where_: Where) -> Self {
        self.where_ = where_;
        self
    }

    /// Builder-style event time override.
    #[must_use]
    pub fn happened_at(mut self, event_at: DateTime<Utc>) -> Self {
        self.event_at = Some(event_at);
        self
    }

    /// Builder-style tag.
    #[must_use]
    pub fn tagged(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}
