//! Black-box AST-to-plan lowering scenarios (§4.3) exercised through the
//! public API.

use codegraph_engine::query::ast::Connective;
use codegraph_engine::query::parser::parse;
use codegraph_engine::query::plan::PlanStep;
use codegraph_engine::query::planner::{plan_query, validate_pattern_shape};

#[test]
fn scan_always_starts_the_plan() {
    let q = parse("MATCH (f:Function) RETURN f.name").unwrap();
    let plan = plan_query(&q).unwrap();
    assert!(matches!(plan.steps[0], PlanStep::ScanNodes { .. }));
}

#[test]
fn and_conditions_push_into_their_introducing_step() {
    let q = parse(
        "MATCH (a:Function)-[:CALLS]->(b:Function) WHERE a.name = 'x' AND b.name = 'y' RETURN a.name",
    )
    .unwrap();
    let plan = plan_query(&q).unwrap();
    assert!(!plan.steps.iter().any(|s| matches!(s, PlanStep::FilterWhere { .. })));
}

#[test]
fn or_conditions_always_land_in_a_trailing_filter_step() {
    let q = parse(
        "MATCH (a:Function)-[:CALLS]->(b:Function) WHERE a.name = 'x' OR b.name = 'y' RETURN a.name",
    )
    .unwrap();
    let plan = plan_query(&q).unwrap();
    let last = plan.steps.last().unwrap();
    assert!(matches!(last, PlanStep::FilterWhere { connective: Connective::Or, .. }));
}

#[test]
fn relationship_variable_condition_is_never_pushed() {
    // Edges carry no queryable properties in this model, so a condition on
    // a relationship variable always falls through to the final filter —
    // even though the outer connective is AND.
    let q = parse("MATCH (a)-[r:CALLS]->(b) WHERE a.name = 'x' RETURN a.name").unwrap();
    let plan = plan_query(&q).unwrap();
    let PlanStep::ScanNodes { pushed_conditions, .. } = &plan.steps[0] else {
        panic!("expected ScanNodes first")
    };
    assert_eq!(pushed_conditions.len(), 1);
}

#[test]
fn bound_variables_lists_every_introduced_variable_in_order() {
    let q = parse("MATCH (a:Function)-[r:CALLS]->(b:Function) RETURN a.name").unwrap();
    let plan = plan_query(&q).unwrap();
    assert_eq!(plan.bound_variables(), vec!["a".to_string(), "r".to_string(), "b".to_string()]);
}

#[test]
fn empty_pattern_fails_shape_validation() {
    assert!(validate_pattern_shape(&[]).is_err());
}

#[test]
fn pattern_without_a_starting_variable_is_a_plan_error() {
    let q = parse("MATCH () RETURN 1").unwrap_err();
    assert!(matches!(
        q,
        codegraph_engine::QueryError::Parse { .. } | codegraph_engine::QueryError::Lex { .. }
    ));
}
