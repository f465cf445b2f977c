//! End-to-end pipeline tests: submit → decide → execute → audit.

mod helpers;

use std::sync::Arc;

use serde_json::json;

use actgate::gateway::{events, RunOutcome, RunStatus};
use actgate::governance::{ApprovalStatus, EffectiveOutcome};
use actgate::ledger::{LedgerQuery, SortField};
use actgate::policy::{ActionContext, Decision, RiskLevel};
use actgate::GateError;

use helpers::fixtures::{
    action, approval_policy, context_with_metric, gateway, init_tracing, threshold_policy,
};

#[test]
fn full_approval_round_trip() {
    init_tracing();
    let gw = gateway(vec![approval_policy("deploy-gate", "deploy", RiskLevel::High)]);

    // Submit: policy demands approval.
    let submission = gw.submit(action("deploy"), &ActionContext::new()).unwrap();
    let request = submission.request.clone().expect("approval opened");
    assert!(matches!(
        submission.decision,
        Decision::RequireApproval { ref policy_id, .. } if policy_id == "deploy-gate"
    ));
    assert_eq!(request.status, ApprovalStatus::Pending);

    // Approve and execute.
    let approved = gw.approve(&request.id, "alice").unwrap();
    assert_eq!(approved.status, ApprovalStatus::Approved);

    gw.report_outcome(RunOutcome {
        request_id: Some(request.id.clone()),
        action: action("deploy"),
        status: RunStatus::Success,
        result: Some(json!({"release": "v1.2.3"})),
        duration_ms: 950,
        error: None,
    })
    .unwrap();

    // Ledger tells the whole story, in order, and verifies.
    let types: Vec<String> = gw
        .ledger()
        .snapshot()
        .iter()
        .map(|e| e.what.event_type.clone())
        .collect();
    assert_eq!(
        types,
        vec![
            events::APPROVAL_REQUESTED,
            events::APPROVAL_GRANTED,
            events::RUN_COMPLETED
        ]
    );
    gw.ledger().verify_chain().unwrap();
}

#[test]
fn rejected_request_cannot_be_approved() {
    let gw = gateway(vec![approval_policy("deploy-gate", "deploy", RiskLevel::High)]);
    let request = gw
        .submit(action("deploy"), &ActionContext::new())
        .unwrap()
        .request
        .unwrap();

    gw.reject(&request.id, "alice", Some("policy violation".into()))
        .unwrap();

    let err = gw.approve(&request.id, "bob").unwrap_err();
    assert!(matches!(err, GateError::Approval(_)));
    assert_eq!(
        gw.workflow().get(&request.id).unwrap().status,
        ApprovalStatus::Rejected
    );
}

#[test]
fn concurrent_approvals_have_exactly_one_winner() {
    let gw = gateway(vec![approval_policy("deploy-gate", "deploy", RiskLevel::High)]);
    let request = gw
        .submit(action("deploy"), &ActionContext::new())
        .unwrap()
        .request
        .unwrap();

    let mut handles = Vec::new();
    for approver in ["alice", "bob", "carol", "dave"] {
        let gw = Arc::clone(&gw);
        let id = request.id.clone();
        handles.push(std::thread::spawn(move || gw.approve(&id, approver)));
    }

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one approval must win");
    for loser in results.iter().filter(|r| r.is_err()) {
        assert!(matches!(loser, Err(GateError::Approval(_))));
    }
}

#[test]
fn threshold_boundary_matches_at_floor_not_below() {
    let gw = gateway(vec![threshold_policy(
        "budget-cap",
        "monthly_ai_spend",
        8000.0,
    )]);

    let gated = gw
        .submit(action("spend"), &context_with_metric("monthly_ai_spend", 8500.0))
        .unwrap();
    assert!(matches!(gated.decision, Decision::RequireApproval { .. }));

    let open = gw
        .submit(action("spend"), &context_with_metric("monthly_ai_spend", 7999.0))
        .unwrap();
    assert_eq!(open.decision, Decision::Allow);
}

#[test]
fn ledger_query_returns_call_order_under_sequence_sort() {
    let gw = gateway(vec![]);
    for name in ["first", "second", "third"] {
        gw.submit(action(name), &ActionContext::new()).unwrap();
    }

    let page = gw
        .ledger()
        .query(&LedgerQuery {
            sort: SortField::Sequence,
            ..LedgerQuery::default()
        })
        .unwrap();
    let sequences: Vec<u64> = page.entries.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![0, 1, 2]);
    assert!(page.entries[0].what.description.contains("first"));
    assert!(page.entries[2].what.description.contains("third"));
}

#[test]
fn modify_then_rerun_is_rejected() {
    let gw = gateway(vec![approval_policy("deploy-gate", "deploy", RiskLevel::Medium)]);
    let request = gw
        .submit(action("deploy"), &ActionContext::new())
        .unwrap()
        .request
        .unwrap();

    let modified = gw
        .modify(&request.id, "alice", json!({"target": "staging"}))
        .unwrap();
    assert_eq!(modified.status, ApprovalStatus::Modified);

    // Rerun is only legal from approved.
    assert!(gw.rerun(&request.id).is_err());
}

#[test]
fn rerun_increments_counter_and_keeps_status() {
    let gw = gateway(vec![approval_policy("deploy-gate", "deploy", RiskLevel::Medium)]);
    let request = gw
        .submit(action("deploy"), &ActionContext::new())
        .unwrap()
        .request
        .unwrap();
    gw.approve(&request.id, "alice").unwrap();

    let once = gw.rerun(&request.id).unwrap();
    let twice = gw.rerun(&request.id).unwrap();
    assert_eq!(once.rerun_count, 1);
    assert_eq!(twice.rerun_count, 2);
    assert_eq!(twice.status, ApprovalStatus::Approved);
}

#[test]
fn batch_approve_reports_independent_outcomes() {
    let gw = gateway(vec![approval_policy("deploy-gate", "deploy", RiskLevel::Low)]);
    let first = gw
        .submit(action("deploy"), &ActionContext::new())
        .unwrap()
        .request
        .unwrap();
    let second = gw
        .submit(action("deploy"), &ActionContext::new())
        .unwrap()
        .request
        .unwrap();
    gw.reject(&second.id, "alice", None).unwrap();

    let outcomes = gw.batch_approve(&[first.id.clone(), second.id.clone()], "carol");
    assert!(outcomes[0].approved);
    assert!(!outcomes[1].approved);
    assert_eq!(
        gw.workflow().get(&first.id).unwrap().status,
        ApprovalStatus::Approved
    );
}

#[test]
fn expired_request_is_implicitly_rejected_until_reconciled() {
    let gw = gateway(vec![{
        let mut p = approval_policy("deploy-gate", "deploy", RiskLevel::High);
        p.approvers = vec![actgate::policy::Approver::user("lead").with_timeout(1)];
        p
    }]);

    let request = gw
        .submit(action("deploy"), &ActionContext::new())
        .unwrap()
        .request
        .unwrap();

    // Not yet expired: still awaiting a decision.
    assert_eq!(
        request.effective_outcome(chrono::Utc::now()),
        EffectiveOutcome::AwaitingDecision
    );

    // Far past the expiry the record still says pending, but execution
    // must treat it as rejected.
    let later = chrono::Utc::now() + chrono::Duration::days(30);
    assert_eq!(request.effective_outcome(later), EffectiveOutcome::ExpiredPending);
    assert_eq!(request.status, ApprovalStatus::Pending);
}

#[test]
fn flagging_audit_entries_never_breaks_the_chain() {
    let gw = gateway(vec![]);
    for name in ["one", "two", "three"] {
        gw.submit(action(name), &ActionContext::new()).unwrap();
    }

    let target = gw.ledger().snapshot()[1].id.clone();
    gw.ledger().flag(&target).unwrap();
    gw.ledger().verify_chain().unwrap();

    let flagged = gw
        .ledger()
        .query(&LedgerQuery {
            flagged_only: true,
            ..LedgerQuery::default()
        })
        .unwrap();
    assert_eq!(flagged.total, 1);
}
