//! Engine configuration.
//!
//! [`GateConfig`] groups the tunables for the approval workflow, the
//! escalation sweeper, and the ledger read path. Defaults are suitable for
//! an in-process deployment; `from_env()` overrides them from `ACTGATE_*`
//! environment variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ============================================================================
// Approval Workflow
// ============================================================================

/// Configuration for the approval request store and lifecycle.
///
/// A request's expiry comes from the lowest approver timeout declared on
/// the originating policy (no timeout → no expiry); the bounds here clamp
/// whatever was declared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalConfig {
    /// Upper bound on any computed expiry window
    pub max_ttl: Duration,
    /// Lower bound on any computed expiry window
    pub min_ttl: Duration,
    /// Maximum pending requests held at once
    pub max_pending: usize,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            max_ttl: Duration::from_secs(7 * 86_400), // 7 days
            min_ttl: Duration::from_secs(60),         // 1 minute
            max_pending: 10_000,
        }
    }
}

// ============================================================================
// Escalation Sweeper
// ============================================================================

/// Configuration for the background escalation/expiry sweeper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationConfig {
    /// How often the sweeper wakes to advance escalation levels and
    /// reconcile expired requests
    pub sweep_interval: Duration,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(30),
        }
    }
}

// ============================================================================
// Ledger
// ============================================================================

/// Configuration for ledger queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Page size used when a query does not specify one
    pub default_page_size: usize,
    /// Hard cap on a single query page
    pub max_page_size: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_page_size: 50,
            max_page_size: 500,
        }
    }
}

// ============================================================================
// GateConfig
// ============================================================================

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateConfig {
    /// Approval workflow tunables
    pub approval: ApprovalConfig,
    /// Escalation sweeper tunables
    pub escalation: EscalationConfig,
    /// Ledger query tunables
    pub ledger: LedgerConfig,
}

impl GateConfig {
    /// Load configuration from environment variables, falling back to the
    /// documented defaults for anything unset or unparseable.
    ///
    /// # Environment Variables
    ///
    /// - `ACTGATE_APPROVAL_MAX_TTL_SECS` — expiry window cap (default: 604800)
    /// - `ACTGATE_APPROVAL_MAX_PENDING` — pending request cap (default: 10000)
    /// - `ACTGATE_SWEEP_INTERVAL_SECS` — sweeper cadence (default: 30)
    /// - `ACTGATE_LEDGER_PAGE_SIZE` — default query page size (default: 50)
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(secs) = env_u64("ACTGATE_APPROVAL_MAX_TTL_SECS") {
            config.approval.max_ttl = Duration::from_secs(secs);
        }
        if let Some(n) = env_u64("ACTGATE_APPROVAL_MAX_PENDING") {
            config.approval.max_pending = n as usize;
        }
        if let Some(secs) = env_u64("ACTGATE_SWEEP_INTERVAL_SECS") {
            config.escalation.sweep_interval = Duration::from_secs(secs);
        }
        if let Some(n) = env_u64("ACTGATE_LEDGER_PAGE_SIZE") {
            config.ledger.default_page_size = n as usize;
        }

        config
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}
