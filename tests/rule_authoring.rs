//! Rule authoring surface: validate + compile through the gateway.

mod helpers;

use actgate::gateway::events;
use actgate::rules::RuleSetStatus;

use helpers::fixtures::{gateway, vip_rule_set};

#[test]
fn vip_rule_set_compiles_to_expected_script() {
    let gw = gateway(vec![]);
    let script = gw.compile_rules(&vip_rule_set()).unwrap();
    let text = script.render();

    assert!(text.contains("RULE \"VIP fast-lane\" PRIORITY 10"));
    assert!(text.contains("ON message"));
    assert!(text.contains("WHEN message.sender == \"vip@acme.com\""));
    assert_eq!(text.matches("respond(").count(), 1);
}

#[test]
fn compilation_is_recorded_and_deterministic() {
    let gw = gateway(vec![]);
    let rule_set = vip_rule_set();

    let first = gw.compile_rules(&rule_set).unwrap();
    let second = gw.compile_rules(&rule_set).unwrap();
    assert_eq!(first.render(), second.render());

    let compile_events = gw
        .ledger()
        .snapshot()
        .iter()
        .filter(|e| e.what.event_type == events::RULES_COMPILED)
        .count();
    assert_eq!(compile_events, 2);
    gw.ledger().verify_chain().unwrap();
}

#[test]
fn invalid_draft_stays_editable() {
    let gw = gateway(vec![]);
    let mut rule_set = vip_rule_set();
    rule_set.status = RuleSetStatus::Draft;
    rule_set.name = String::new();
    rule_set.rules[0].conditions[0].field = String::new();

    let issues = gw.validate_rules(&rule_set);
    let codes: Vec<&str> = issues.iter().map(|i| i.code.as_str()).collect();
    assert!(codes.contains(&"empty_name"));
    assert!(codes.contains(&"condition_missing_field"));

    // Validation is advisory: the draft still compiles, degrading the
    // empty-field condition to no clause.
    let script = gw.compile_rules(&rule_set).unwrap();
    assert!(script.blocks[0].when.is_empty());
}
