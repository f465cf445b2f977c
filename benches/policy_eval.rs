//! Policy evaluation hot-path benchmark.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;

use actgate::policy::{
    ActionContext, Policy, PolicyEvaluator, PolicyStore, PolicyTrigger, ProposedAction, RiskLevel,
    Threshold, ThresholdOp,
};

fn seeded_evaluator(policy_count: usize) -> PolicyEvaluator {
    let store = Arc::new(PolicyStore::new());
    for i in 0..policy_count {
        let mut policy = Policy::requiring_approval(format!("policy-{i}"), RiskLevel::Medium);
        policy.triggers = vec![PolicyTrigger::ActionType {
            types: vec![format!("action_{i}")],
        }];
        policy.thresholds = vec![Threshold::new("actions_per_hour", ThresholdOp::Gte, 1000.0)];
        store.upsert(policy);
    }
    PolicyEvaluator::new(store)
}

fn bench_evaluate(c: &mut Criterion) {
    let evaluator = seeded_evaluator(50);
    let action = ProposedAction::new("action_25", "cog-bench");
    let context = ActionContext::new().with("metrics", json!({"actions_per_hour": 42}));

    c.bench_function("evaluate_50_policies", |b| {
        b.iter(|| {
            let evaluation = evaluator.evaluate(black_box(&action), black_box(&context));
            black_box(evaluation)
        })
    });

    let miss = ProposedAction::new("unmatched_action", "cog-bench");
    c.bench_function("evaluate_50_policies_no_hit", |b| {
        b.iter(|| {
            let evaluation = evaluator.evaluate(black_box(&miss), black_box(&context));
            black_box(evaluation)
        })
    });
}

criterion_group!(benches, bench_evaluate);
criterion_main!(benches);
