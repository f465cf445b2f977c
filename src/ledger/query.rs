//! Filtered, sorted, paginated ledger reads.
//!
//! Queries run against an owned snapshot and never touch stored entries.
//! Malformed input fails closed with [`LedgerError::InvalidQuery`] rather
//! than returning a partially filtered view.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::LedgerConfig;

use super::entry::{ActorKind, EventCategory, LedgerEntry, Severity};
use super::store::LedgerError;

// ============================================================================
// Query Model
// ============================================================================

/// Field to order results by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    /// Event time (`when.event_at`)
    EventTime,
    /// Chain position — the ordering authority
    #[default]
    Sequence,
    /// Severity rank (debug < … < critical)
    Severity,
    /// Category name, lexicographic
    Category,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Filter, sort, and pagination parameters.
///
/// `None` filter fields mean "no restriction"; an empty set restricts to
/// nothing (and therefore matches nothing).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerQuery {
    pub actor_kinds: Option<Vec<ActorKind>>,
    pub categories: Option<Vec<EventCategory>>,
    pub severities: Option<Vec<Severity>>,
    pub space_ids: Option<Vec<String>>,
    pub project_ids: Option<Vec<String>>,
    #[serde(default)]
    pub flagged_only: bool,
    /// Case-insensitive search over description, actor name, and tags
    pub text: Option<String>,
    /// Inclusive lower bound on event time
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on event time
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sort: SortField,
    #[serde(default)]
    pub direction: SortDirection,
    #[serde(default)]
    pub offset: usize,
    /// Page size; `None` uses the configured default
    pub limit: Option<usize>,
}

/// One page of the filtered + sorted view.
#[derive(Debug, Clone)]
pub struct LedgerPage {
    pub entries: Vec<Arc<LedgerEntry>>,
    /// Matching entries before pagination
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}

// ============================================================================
// Execution
// ============================================================================

impl LedgerQuery {
    /// Restrict to one actor kind.
    #[must_use]
    pub fn by_actor_kind(kind: ActorKind) -> Self {
        Self {
            actor_kinds: Some(vec![kind]),
            ..Self::default()
        }
    }

    /// Run the query over a snapshot.
    pub(super) fn apply(
        &self,
        snapshot: Vec<Arc<LedgerEntry>>,
        config: &LedgerConfig,
    ) -> Result<LedgerPage, LedgerError> {
        let limit = self.validate(config)?;

        let mut matched: Vec<Arc<LedgerEntry>> = snapshot
            .into_iter()
            .filter(|entry| self.matches(entry))
            .collect();

        let total = matched.len();
        self.sort_entries(&mut matched);

        let entries = matched
            .into_iter()
            .skip(self.offset)
            .take(limit)
            .collect();

        Ok(LedgerPage {
            entries,
            total,
            offset: self.offset,
            limit,
        })
    }

    /// Fail closed on malformed input; returns the effective page size.
    fn validate(&self, config: &LedgerConfig) -> Result<usize, LedgerError> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(LedgerError::InvalidQuery {
                    details: format!("date range is inverted: {from} > {to}"),
                });
            }
        }

        let limit = self.limit.unwrap_or(config.default_page_size);
        if limit == 0 {
            return Err(LedgerError::InvalidQuery {
                details: "page size must be at least 1".to_string(),
            });
        }
        if limit > config.max_page_size {
            return Err(LedgerError::InvalidQuery {
                details: format!(
                    "page size {limit} exceeds maximum {}",
                    config.max_page_size
                ),
            });
        }
        Ok(limit)
    }

    fn matches(&self, entry: &LedgerEntry) -> bool {
        if let Some(kinds) = &self.actor_kinds {
            if !kinds.contains(&entry.who.kind) {
                return false;
            }
        }
        if let Some(categories) = &self.categories {
            if !categories.contains(&entry.what.category) {
                return false;
            }
        }
        if let Some(severities) = &self.severities {
            if !severities.contains(&entry.what.severity) {
                return false;
            }
        }
        if let Some(space_ids) = &self.space_ids {
            match &entry.where_.space_id {
                Some(id) if space_ids.contains(id) => {}
                _ => return false,
            }
        }
        if let Some(project_ids) = &self.project_ids {
            match &entry.where_.project_id {
                Some(id) if project_ids.contains(id) => {}
                _ => return false,
            }
        }
        if self.flagged_only && !entry.flagged {
            return false;
        }
        if let Some(from) = self.from {
            if entry.when.event_at < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if entry.when.event_at > to {
                return false;
            }
        }
        if let Some(text) = &self.text {
            let needle = text.to_lowercase();
            let hit = entry.what.description.to_lowercase().contains(&needle)
                || entry.who.name.to_lowercase().contains(&needle)
                || entry
                    .tags
                    .iter()
                    .any(|tag| tag.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }

    fn sort_entries(&self, entries: &mut [Arc<LedgerEntry>]) {
        // Stable sort; equal keys keep sequence order.
        match self.sort {
            SortField::Sequence => entries.sort_by_key(|e| e.sequence),
            SortField::EventTime => entries.sort_by_key(|e| (e.when.event_at, e.sequence)),
            SortField::Severity => entries.sort_by_key(|e| (e.what.severity, e.sequence)),
            SortField::Category => {
                entries.sort_by(|a, b| {
                    a.what
                        .category
                        .to_string()
                        .cmp(&b.what.category.to_string())
                        .then(a.sequence.cmp(&b.sequence))
                });
            }
        }
        if self.direction == SortDirection::Descending {
            entries.reverse();
        }
    }
}
