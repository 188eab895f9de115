//! Logical query plan produced by the planner and consumed by the executor.
//!
//! Grounded on the split "early" (pushed into the scan) vs. "late"
//! (post-expansion, evaluated in-process) predicate handling described in
//! §4.3: a condition can be pushed to the step that introduces its
//! variable, never earlier.

use crate::types::Direction;

use super::ast::{Condition, Connective, OrderBy, ReturnItem};

/// One step of the plan, executed in order. `ScanNodes` always starts the
/// plan; `ExpandRelationship` steps follow in pattern order; `FilterWhere`
/// carries whatever WHERE conditions could not be pushed into a scan or
/// expand step.
#[derive(Debug, Clone)]
pub enum PlanStep {
    /// Scan nodes bound to `variable`, optionally restricted by label and
    /// by the early-pushed conditions already known when the variable is
    /// introduced (i.e. conditions entirely about this variable).
    ScanNodes {
        variable: String,
        label: Option<String>,
        pushed_conditions: Vec<Condition>,
    },
    /// Expand from `from_variable` along `rel_types` to `to_variable`,
    /// binding `rel_variable` if named. `min_hops`/`max_hops` (`max_hops ==
    /// 0` meaning unbounded) select between a fixed-length join-fusable
    /// expansion and a variable-length BFS (§4.3/§5).
    ExpandRelationship {
        from_variable: String,
        rel_variable: Option<String>,
        rel_types: Vec<String>,
        direction: Direction,
        min_hops: u32,
        max_hops: u32,
        to_variable: String,
        to_label: Option<String>,
        /// Conditions on `to_variable` that can be fused into this
        /// expansion's join/scan rather than filtered afterwards.
        pushed_conditions: Vec<Condition>,
    },
    /// Any WHERE conditions that could not be pushed into a scan or expand
    /// step — always true of every condition when the clause's connective
    /// is `OR`, and true of relationship-variable conditions even under
    /// `AND`, since edges carry no queryable properties in this model —
    /// are evaluated here, in-process, after all expansions have run.
    FilterWhere {
        connective: Connective,
        conditions: Vec<Condition>,
    },
}

/// The full logical plan: an ordered list of steps plus the RETURN clause
/// to project, sort, and limit by at the end.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
    pub distinct: bool,
    pub return_items: Vec<ReturnItem>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<u32>,
}

impl Plan {
    /// Every variable the pattern binds, in introduction order — used by
    /// the executor to size its binding rows and by the planner to decide
    /// whether a RETURN/ORDER BY/WHERE reference is actually in scope.
    pub fn bound_variables(&self) -> Vec<String> {
        let mut vars = Vec::new();
        for step in &self.steps {
            match step {
                PlanStep::ScanNodes { variable, .. } => vars.push(variable.clone()),
                PlanStep::ExpandRelationship {
                    rel_variable,
                    to_variable,
                    ..
                } => {
                    if let Some(r) = rel_variable {
                        vars.push(r.clone());
                    }
                    vars.push(to_variable.clone());
                }
                PlanStep::FilterWhere { .. } => {}
            }
        }
        vars
    }
}
