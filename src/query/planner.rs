//! AST → [`Plan`] lowering (§4.3).
//!
//! A WHERE condition is pushed into the scan/expand step that introduces
//! its variable — but only when the clause's connective is `AND`. An `OR`
//! clause must be evaluated as a whole against a fully bound row, since
//! filtering on any single disjunct at scan time would silently drop rows
//! that only satisfy a *different* disjunct. Conditions that reference an
//! unbound variable (most commonly a relationship variable, since edges
//! carry no queryable properties in this model) also fall through to the
//! final `FilterWhere` step.

use std::collections::HashSet;

use super::ast::{Condition, Connective, PatternElement, Query};
use super::plan::{Plan, PlanStep};
use crate::error::QueryError;

pub fn plan_query(query: &Query) -> Result<Plan, QueryError> {
    let mut steps = Vec::new();
    let mut bound: HashSet<String> = HashSet::new();

    let conditions_by_var = query
        .where_clause
        .as_ref()
        .map(|w| (w.connective, w.conditions.clone()))
        .unwrap_or((Connective::And, Vec::new()));
    let (connective, all_conditions) = conditions_by_var;
    let can_push = matches!(connective, Connective::And);

    let mut remaining: Vec<Condition> = all_conditions;

    let first_node = query
        .pattern
        .first_node()
        .ok_or_else(|| QueryError::Plan("pattern has no starting node".to_string()))?;
    let first_var = first_node
        .variable
        .clone()
        .ok_or_else(|| QueryError::Plan("the first node pattern must bind a variable".to_string()))?;

    let pushed = if can_push {
        take_conditions_for(&mut remaining, &first_var)
    } else {
        Vec::new()
    };
    steps.push(PlanStep::ScanNodes {
        variable: first_var.clone(),
        label: first_node.label.clone(),
        pushed_conditions: pushed,
    });
    bound.insert(first_var.clone());

    let mut from_var = first_var;
    for (rel, node) in query.pattern.rel_node_pairs() {
        let to_var = node
            .variable
            .clone()
            .ok_or_else(|| QueryError::Plan("every node pattern must bind a variable".to_string()))?;

        let pushed = if can_push {
            take_conditions_for(&mut remaining, &to_var)
        } else {
            Vec::new()
        };

        steps.push(PlanStep::ExpandRelationship {
            from_variable: from_var,
            rel_variable: rel.variable.clone(),
            rel_types: rel.types.clone(),
            direction: rel.direction,
            min_hops: rel.hops.min,
            max_hops: rel.hops.max,
            to_variable: to_var.clone(),
            to_label: node.label.clone(),
            pushed_conditions: pushed,
        });
        bound.insert(to_var.clone());
        from_var = to_var;
    }

    if !remaining.is_empty() {
        steps.push(PlanStep::FilterWhere {
            connective,
            conditions: remaining,
        });
    }

    let return_spec = query.return_spec.clone().unwrap_or_default();

    Ok(Plan {
        steps,
        distinct: return_spec.distinct,
        return_items: return_spec.items,
        order_by: return_spec.order_by,
        limit: return_spec.limit,
    })
}

fn take_conditions_for(remaining: &mut Vec<Condition>, variable: &str) -> Vec<Condition> {
    let mut taken = Vec::new();
    remaining.retain(|c| {
        if c.variable == variable {
            taken.push(c.clone());
            false
        } else {
            true
        }
    });
    taken
}

/// Validate pattern elements alternate `Node, Rel, Node, ...` — defensive
/// check for ASTs constructed outside the parser (e.g. in tests).
pub fn validate_pattern_shape(elements: &[PatternElement]) -> Result<(), QueryError> {
    if elements.is_empty() {
        return Err(QueryError::Plan("empty pattern".to_string()));
    }
    for (i, el) in elements.iter().enumerate() {
        let expect_node = i % 2 == 0;
        let is_node = matches!(el, PatternElement::Node(_));
        if expect_node != is_node {
            return Err(QueryError::Plan(format!(
                "pattern element {i} is out of alternating Node/Rel order"
            )));
        }
    }
    if elements.len() % 2 == 0 {
        return Err(QueryError::Plan(
            "pattern must end on a node, not a relationship".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::parse;

    #[test]
    fn where_with_and_pushes_conditions_into_scan_and_expand() {
        let q = parse(
            "MATCH (a:Function)-[:CALLS]->(b:Function) WHERE a.name = 'foo' AND b.name = 'bar' RETURN a.name",
        )
        .unwrap();
        let plan = plan_query(&q).unwrap();

        let PlanStep::ScanNodes {
            pushed_conditions, ..
        } = &plan.steps[0]
        else {
            panic!("expected ScanNodes first")
        };
        assert_eq!(pushed_conditions.len(), 1);
        assert_eq!(pushed_conditions[0].variable, "a");

        let PlanStep::ExpandRelationship {
            pushed_conditions, ..
        } = &plan.steps[1]
        else {
            panic!("expected ExpandRelationship second")
        };
        assert_eq!(pushed_conditions.len(), 1);
        assert_eq!(pushed_conditions[0].variable, "b");

        assert!(!plan.steps.iter().any(|s| matches!(s, PlanStep::FilterWhere { .. })));
    }

    #[test]
    fn where_with_or_is_never_pushed() {
        let q = parse(
            "MATCH (a:Function)-[:CALLS]->(b:Function) WHERE a.name = 'foo' OR b.name = 'bar' RETURN a.name",
        )
        .unwrap();
        let plan = plan_query(&q).unwrap();

        let PlanStep::ScanNodes {
            pushed_conditions, ..
        } = &plan.steps[0]
        else {
            panic!()
        };
        assert!(pushed_conditions.is_empty());

        let PlanStep::ExpandRelationship {
            pushed_conditions, ..
        } = &plan.steps[1]
        else {
            panic!()
        };
        assert!(pushed_conditions.is_empty());

        let filter = plan.steps.last().unwrap();
        match filter {
            PlanStep::FilterWhere { conditions, connective } => {
                assert_eq!(conditions.len(), 2);
                assert_eq!(*connective, Connective::Or);
            }
            _ => panic!("expected a trailing FilterWhere step"),
        }
    }

    #[test]
    fn variable_length_hop_range_is_carried_onto_the_expand_step() {
        let q = parse("MATCH (a)-[:CALLS*1..3]->(b) RETURN a.name").unwrap();
        let plan = plan_query(&q).unwrap();
        let PlanStep::ExpandRelationship {
            min_hops, max_hops, ..
        } = &plan.steps[1]
        else {
            panic!()
        };
        assert_eq!((*min_hops, *max_hops), (1, 3));
    }

    #[test]
    fn pattern_shape_validation_rejects_empty_and_trailing_rel() {
        assert!(validate_pattern_shape(&[]).is_err());
    }
}
