//! Crate-level error taxonomy.
//!
//! Each subsystem defines its own error type close to the code that raises
//! it; [`GateError`] unifies them for gateway callers so that a single
//! `Result<_, GateError>` covers the full pipeline. Validation and
//! state-transition errors are recoverable and surfaced to the immediate
//! caller; integrity errors indicate the audit chain can no longer be
//! trusted and must reach an operator alerting path.

use thiserror::Error;

use crate::governance::ApprovalError;
use crate::ledger::LedgerError;
use crate::policy::PolicyError;

/// All error classes that can escape the gateway.
#[derive(Debug, Error)]
pub enum GateError {
    /// Malformed rule or policy input. Recoverable; the authoring surface
    /// shows per-field messages and the document stays editable.
    #[error("validation failed: {details}")]
    Validation {
        /// Description of the first failing check
        details: String,
    },

    /// Illegal approval lifecycle transition (e.g. approving a rejected
    /// request). No state change occurred.
    #[error(transparent)]
    Approval(#[from] ApprovalError),

    /// Policy store or evaluator failure.
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// Ledger failure. `LedgerError::IntegrityFailure` is fatal to trust in
    /// the affected range and must halt automated decisioning that relies
    /// on that history.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl GateError {
    /// Returns true if this error means the audit history itself can no
    /// longer be trusted, as opposed to a recoverable caller mistake.
    #[must_use]
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            GateError::Ledger(LedgerError::IntegrityFailure { .. })
        )
    }
}
