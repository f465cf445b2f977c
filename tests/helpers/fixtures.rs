//! Shared builders for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{json, Map};

use actgate::config::GateConfig;
use actgate::policy::{
    ActionContext, Approver, Policy, PolicyStore, PolicyTrigger, ProposedAction, RiskLevel,
    Threshold, ThresholdOp,
};
use actgate::rules::{ActionSpec, ActionType, Condition, ConditionOperator, Rule, RuleSet,
    RuleSetStatus, Trigger};
use actgate::ActionGateway;

/// Route test logs through tracing; safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Gateway with the given policies installed.
pub fn gateway(policies: Vec<Policy>) -> Arc<ActionGateway> {
    let store = Arc::new(PolicyStore::new());
    for policy in policies {
        store.upsert(policy);
    }
    Arc::new(ActionGateway::new(store, GateConfig::default()))
}

/// Approval-requiring policy matching one action type.
pub fn approval_policy(id: &str, action_type: &str, risk: RiskLevel) -> Policy {
    let mut policy = Policy::requiring_approval(id, risk);
    policy.triggers = vec![PolicyTrigger::ActionType {
        types: vec![action_type.to_string()],
    }];
    policy.approvers = vec![Approver::user("approver-1")];
    policy
}

/// Budget-cap style threshold policy.
pub fn threshold_policy(id: &str, metric: &str, floor: f64) -> Policy {
    let mut policy = Policy::requiring_approval(id, RiskLevel::High);
    policy.thresholds = vec![Threshold::new(metric, ThresholdOp::Gte, floor)];
    policy
}

pub fn action(action_type: &str) -> ProposedAction {
    let mut action = ProposedAction::new(action_type, "cog-test");
    action.description = format!("test {action_type}");
    action.space_id = Some("space-test".to_string());
    action
}

pub fn context_with_metric(name: &str, value: f64) -> ActionContext {
    ActionContext::new().with("metrics", json!({ name: value }))
}

/// The one-rule VIP triage rule-set.
pub fn vip_rule_set() -> RuleSet {
    RuleSet {
        id: "rs-vip".into(),
        name: "VIP triage".into(),
        version: 1,
        status: RuleSetStatus::Active,
        priority: 1,
        category: Some("support".into()),
        tags: vec!["vip".into()],
        rules: vec![Rule {
            id: "rule-vip".into(),
            name: "VIP fast-lane".into(),
            enabled: true,
            order: 1,
            trigger: Trigger::Message(Map::new()),
            conditions: vec![Condition::new(
                "message.sender",
                ConditionOperator::Equals,
                json!("vip@acme.com"),
            )],
            then_actions: vec![
                ActionSpec::new(ActionType::Respond).with("template", json!("vip"))
            ],
            else_actions: vec![],
        }],
    }
}
