//! The action gateway: the in-process surface collaborators call.
//!
//! The agent runtime submits proposed actions and reports run outcomes;
//! the approver surface drives approval decisions; the rule authoring
//! surface validates and compiles rule-sets; the audit surface queries
//! the ledger. Every decision that flows through here lands in the
//! ledger — the gateway is the single place where evaluation, workflow,
//! and audit recording meet.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::GateConfig;
use crate::error::GateError;
use crate::governance::{
    ApprovalRequest, ApprovalStore, ApprovalWorkflow, BatchOutcome, EscalationNotifier,
    EscalationScheduler, RequestId,
};
use crate::ledger::{
    EntryDraft, EventCategory, EventStatus, Ledger, LedgerEntry, Severity, What, Where, Who, Why,
};
use crate::policy::{
    ActionContext, Decision, Evaluation, PolicyEvaluator, PolicyStore, RiskLevel,
};
use crate::rules::{self, RuleSet, Script, ValidationIssue};

pub use crate::policy::ProposedAction;

// ============================================================================
// Event Types
// ============================================================================

/// Ledger event type tags emitted by the gateway.
pub mod events {
    pub const ACTION_ALLOWED: &str = "action_allowed";
    pub const POLICY_DENIED: &str = "policy_denied";
    pub const APPROVAL_REQUESTED: &str = "approval_requested";
    pub const APPROVAL_GRANTED: &str = "approval_granted";
    pub const APPROVAL_REJECTED: &str = "approval_rejected";
    pub const APPROVAL_MODIFIED: &str = "approval_modified";
    pub const APPROVAL_EXPIRED: &str = "approval_expired";
    pub const RUN_COMPLETED: &str = "run_completed";
    pub const RUN_FAILED: &str = "run_failed";
    pub const RULES_COMPILED: &str = "rules_compiled";
}

// ============================================================================
// Run Outcomes
// ============================================================================

/// Terminal status of an executed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failed,
}

/// Execution report from the agent runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    /// The approval request the run satisfied, when there was one
    pub request_id: Option<RequestId>,
    pub action: ProposedAction,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What `submit` hands back to the agent runtime.
#[derive(Debug, Clone)]
pub struct Submission {
    pub decision: Decision,
    /// Present when the decision requires approval
    pub request: Option<Arc<ApprovalRequest>>,
    /// Full rationale for the audit and authoring surfaces
    pub evaluation: Evaluation,
}

// ============================================================================
// ActionGateway
// ============================================================================

/// Owns the policy evaluator, the approval workflow, and the ledger.
pub struct ActionGateway {
    evaluator: PolicyEvaluator,
    workflow: ApprovalWorkflow,
    ledger: Arc<Ledger>,
    config: GateConfig,
}

impl ActionGateway {
    /// Build a gateway around a shared policy store.
    #[must_use]
    pub fn new(policy_store: Arc<PolicyStore>, config: GateConfig) -> Self {
        let approval_store = Arc::new(ApprovalStore::new(config.approval.max_pending));
        let workflow = ApprovalWorkflow::new(approval_store, config.approval.clone());
        let ledger = Arc::new(Ledger::new(config.ledger.clone()));
        Self {
            evaluator: PolicyEvaluator::new(policy_store),
            workflow,
            ledger,
            config,
        }
    }

    /// The audit surface's read handle.
    #[must_use]
    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// The approval workflow, for surfaces that need direct access.
    #[must_use]
    pub fn workflow(&self) -> &ApprovalWorkflow {
        &self.workflow
    }

    /// Build the background escalation sweeper for this gateway's
    /// approval store. The caller spawns and owns the task.
    #[must_use]
    pub fn escalation_scheduler(
        &self,
        notifier: Arc<dyn EscalationNotifier>,
        shutdown: CancellationToken,
    ) -> EscalationScheduler {
        EscalationScheduler::new(
            self.workflow.store().clone(),
            notifier,
            self.config.escalation.clone(),
            shutdown,
        )
    }

    // ────────────────────────────────────────────────────────────────────
    // Agent runtime surface
    // ────────────────────────────────────────────────────────────────────

    /// Evaluate a proposed action, open an approval request if one is
    /// demanded, and record the decision.
    pub fn submit(
        &self,
        action: ProposedAction,
        context: &ActionContext,
    ) -> Result<Submission, GateError> {
        let evaluation = self.evaluator.evaluate(&action, context);

        match evaluation.decision.clone() {
            Decision::Allow => {
                let rationale = if evaluation.hits.is_empty() {
                    "no policy matched".to_string()
                } else {
                    format!(
                        "allowed; matched policies: {}",
                        policy_id_list(&evaluation)
                    )
                };
                self.ledger.append(
                    EntryDraft::new(
                        Who::cognate(action.cognate_id.clone()),
                        What {
                            event_type: events::ACTION_ALLOWED.to_string(),
                            category: EventCategory::Governance,
                            severity: Severity::Info,
                            status: EventStatus::Success,
                            description: format!("action '{}' allowed", action.action_type),
                            result: None,
                            duration_ms: None,
                        },
                        Why::new("policy", rationale),
                    )
                    .at(action_location(&action)),
                )?;
                Ok(Submission {
                    decision: evaluation.decision.clone(),
                    request: None,
                    evaluation,
                })
            }

            Decision::RequireApproval { policy_id, risk } => {
                let policy = self.evaluator.store().get(&policy_id)?;
                let request = self.workflow.open(action.clone(), &policy, risk)?;

                self.ledger.append(
                    EntryDraft::new(
                        Who::cognate(action.cognate_id.clone()),
                        What {
                            event_type: events::APPROVAL_REQUESTED.to_string(),
                            category: EventCategory::Governance,
                            severity: risk_severity(risk),
                            status: EventStatus::Pending,
                            description: format!(
                                "action '{}' awaiting approval",
                                action.action_type
                            ),
                            result: None,
                            duration_ms: None,
                        },
                        Why::new("policy", format!("policy '{policy_id}' requires approval"))
                            .with_reference(request.id.to_string()),
                    )
                    .at(action_location(&action)),
                )?;

                info!(request_id = %request.id, policy_id = %policy_id, "submission pending approval");
                Ok(Submission {
                    decision: evaluation.decision.clone(),
                    request: Some(request),
                    evaluation,
                })
            }

            Decision::Deny { policy_id, reason } => {
                self.ledger.append(
                    EntryDraft::new(
                        Who::cognate(action.cognate_id.clone()),
                        What {
                            event_type: events::POLICY_DENIED.to_string(),
                            category: EventCategory::Governance,
                            severity: Severity::Warning,
                            status: EventStatus::Denied,
                            description: format!("action '{}' denied: {reason}", action.action_type),
                            result: None,
                            duration_ms: None,
                        },
                        Why::new("policy", reason).with_reference(policy_id),
                    )
                    .at(action_location(&action)),
                )?;
                Ok(Submission {
                    decision: evaluation.decision.clone(),
                    request: None,
                    evaluation,
                })
            }
        }
    }

    /// Record an execution report from the agent runtime.
    pub fn report_outcome(&self, outcome: RunOutcome) -> Result<Arc<LedgerEntry>, GateError> {
        let (event_type, status, severity) = match outcome.status {
            RunStatus::Success => (events::RUN_COMPLETED, EventStatus::Success, Severity::Info),
            RunStatus::Failed => (events::RUN_FAILED, EventStatus::Failure, Severity::Error),
        };

        let description = match &outcome.error {
            Some(error) => format!("run of '{}' failed: {error}", outcome.action.action_type),
            None => format!("run of '{}' completed", outcome.action.action_type),
        };

        let mut why = Why::new("execution", "agent runtime reported an outcome");
        if let Some(request_id) = &outcome.request_id {
            why = why.with_reference(request_id.to_string());
        }

        let entry = self.ledger.append(
            EntryDraft::new(
                Who::cognate(outcome.action.cognate_id.clone()),
                What {
                    event_type: event_type.to_string(),
                    category: EventCategory::Execution,
                    severity,
                    status,
                    description,
                    result: outcome.result,
                    duration_ms: Some(outcome.duration_ms),
                },
                why,
            )
            .at(action_location(&outcome.action)),
        )?;
        Ok(entry)
    }

    // ────────────────────────────────────────────────────────────────────
    // Approver surface
    // ────────────────────────────────────────────────────────────────────

    /// Approve a pending request and record the grant.
    pub fn approve(
        &self,
        id: &RequestId,
        by: &str,
    ) -> Result<Arc<ApprovalRequest>, GateError> {
        let request = self.workflow.approve(id, by)?;
        self.record_decision(
            &request,
            by,
            events::APPROVAL_GRANTED,
            EventStatus::Success,
            format!("request {id} approved by {by}"),
        )?;
        Ok(request)
    }

    /// Reject a pending request and record the rejection.
    pub fn reject(
        &self,
        id: &RequestId,
        by: &str,
        reason: Option<String>,
    ) -> Result<Arc<ApprovalRequest>, GateError> {
        let request = self.workflow.reject(id, by, reason.clone())?;
        let detail = reason.unwrap_or_else(|| "no reason given".to_string());
        self.record_decision(
            &request,
            by,
            events::APPROVAL_REJECTED,
            EventStatus::Denied,
            format!("request {id} rejected by {by}: {detail}"),
        )?;
        Ok(request)
    }

    /// Approve with modifications and record the patched grant.
    pub fn modify(
        &self,
        id: &RequestId,
        by: &str,
        patch: Value,
    ) -> Result<Arc<ApprovalRequest>, GateError> {
        let request = self.workflow.modify(id, by, patch)?;
        self.record_decision(
            &request,
            by,
            events::APPROVAL_MODIFIED,
            EventStatus::Success,
            format!("request {id} approved with modifications by {by}"),
        )?;
        Ok(request)
    }

    /// Signal a rerun of an approved request.
    pub fn rerun(&self, id: &RequestId) -> Result<Arc<ApprovalRequest>, GateError> {
        Ok(self.workflow.rerun(id)?)
    }

    /// Approve a batch of requests; outcomes are independent per id.
    #[must_use]
    pub fn batch_approve(&self, ids: &[RequestId], by: &str) -> Vec<BatchOutcome> {
        let outcomes = self.workflow.batch_approve(ids, by);
        for outcome in &outcomes {
            if outcome.approved {
                if let Ok(request) = self.workflow.get(&outcome.request_id) {
                    // Best-effort audit record; the approval itself stands.
                    let _ = self.record_decision(
                        &request,
                        by,
                        events::APPROVAL_GRANTED,
                        EventStatus::Success,
                        format!("request {} approved by {by} (batch)", outcome.request_id),
                    );
                }
            }
        }
        outcomes
    }

    /// Reconcile expired pending requests and record each expiry.
    pub fn reconcile_expired(&self) -> Result<Vec<RequestId>, GateError> {
        let reconciled = self.workflow.reconcile_expired();
        for id in &reconciled {
            let request = self.workflow.get(id)?;
            self.record_decision(
                &request,
                "system",
                events::APPROVAL_EXPIRED,
                EventStatus::Denied,
                format!("request {id} expired unresolved"),
            )?;
        }
        Ok(reconciled)
    }

    fn record_decision(
        &self,
        request: &ApprovalRequest,
        by: &str,
        event_type: &str,
        status: EventStatus,
        description: String,
    ) -> Result<Arc<LedgerEntry>, GateError> {
        let who = if by == "system" {
            Who::system()
        } else {
            Who::human(by)
        };
        let entry = self.ledger.append(
            EntryDraft::new(
                who,
                What {
                    event_type: event_type.to_string(),
                    category: EventCategory::Governance,
                    severity: risk_severity(request.risk),
                    status,
                    description,
                    result: None,
                    duration_ms: None,
                },
                Why::new("approval", format!("policy '{}'", request.policy_id))
                    .with_reference(request.id.to_string()),
            )
            .at(action_location(&request.action)),
        )?;
        Ok(entry)
    }

    // ────────────────────────────────────────────────────────────────────
    // Rule authoring surface
    // ────────────────────────────────────────────────────────────────────

    /// Validate a rule-set; diagnostics only, nothing is recorded.
    #[must_use]
    pub fn validate_rules(&self, rule_set: &RuleSet) -> Vec<ValidationIssue> {
        rules::validate(rule_set)
    }

    /// Compile a rule-set and record the compilation.
    ///
    /// The script is a derived, cacheable artifact — the rule-set stays
    /// authoritative.
    pub fn compile_rules(&self, rule_set: &RuleSet) -> Result<Script, GateError> {
        let script = rules::compile(rule_set);
        self.ledger.append(EntryDraft::new(
            Who::system(),
            What {
                event_type: events::RULES_COMPILED.to_string(),
                category: EventCategory::Rules,
                severity: Severity::Info,
                status: EventStatus::Success,
                description: format!(
                    "rule-set '{}' v{} compiled to {} block(s)",
                    rule_set.name,
                    rule_set.version,
                    script.blocks.len()
                ),
                result: None,
                duration_ms: None,
            },
            Why::new("rules", "rule-set compiled").with_reference(rule_set.id.clone()),
        ))?;
        Ok(script)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn action_location(action: &ProposedAction) -> Where {
    Where {
        space_id: action.space_id.clone(),
        project_id: action.project_id.clone(),
        external_system: None,
        path: None,
    }
}

/// Ledger severity for a given risk indicator.
fn risk_severity(risk: RiskLevel) -> Severity {
    match risk {
        RiskLevel::Low => Severity::Info,
        RiskLevel::Medium => Severity::Notice,
        RiskLevel::High => Severity::Warning,
        RiskLevel::Critical => Severity::Critical,
    }
}

fn policy_id_list(evaluation: &Evaluation) -> String {
    evaluation
        .hits
        .iter()
        .map(|hit| hit.policy_id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
