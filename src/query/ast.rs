//! Query AST produced by the parser (§3, §4.2).

use std::collections::HashMap;

use crate::types::Direction;

/// A single `(var:Label {k: "v"})` node pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct NodePattern {
    pub variable: Option<String>,
    pub label: Option<String>,
    pub properties: HashMap<String, String>,
}

/// Hop bounds for a relationship pattern. `(1, 1)` for a plain `-[:T]-`,
/// `(min, 0)` denotes an unbounded upper bound (bare `*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HopRange {
    pub min: u32,
    pub max: u32,
}

impl HopRange {
    pub const FIXED: HopRange = HopRange { min: 1, max: 1 };

    pub fn is_fixed_one(&self) -> bool {
        self.min == 1 && self.max == 1
    }

    pub fn is_unbounded(&self) -> bool {
        self.max == 0
    }
}

/// A single `-[var:T1|T2*min..max]->` relationship pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct RelPattern {
    pub variable: Option<String>,
    pub types: Vec<String>,
    pub direction: Direction,
    pub hops: HopRange,
}

/// One tagged element of a pattern: alternates Node, Rel, Node, Rel, Node...
#[derive(Debug, Clone, PartialEq)]
pub enum PatternElement {
    Node(NodePattern),
    Rel(RelPattern),
}

/// The full `MATCH` pattern: `2k+1` alternating elements for `k`
/// relationship/node pairs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pattern {
    pub elements: Vec<PatternElement>,
}

impl Pattern {
    pub fn first_node(&self) -> Option<&NodePattern> {
        self.elements.iter().find_map(|e| match e {
            PatternElement::Node(n) => Some(n),
            _ => None,
        })
    }

    /// Iterate `(rel, node)` pairs after the first node.
    pub fn rel_node_pairs(&self) -> Vec<(&RelPattern, &NodePattern)> {
        let mut pairs = Vec::new();
        let mut iter = self.elements.iter().skip(1);
        while let (Some(PatternElement::Rel(rel)), Some(PatternElement::Node(node))) =
            (iter.next(), iter.next())
        {
            pairs.push((rel, node));
        }
        pairs
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    RegexMatch,
    Gt,
    Lt,
    Gte,
    Lte,
    Contains,
    StartsWith,
}

/// A single `var.prop OP value` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub variable: String,
    pub property: String,
    pub op: CompareOp,
    pub value: ConditionValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConditionValue {
    String(String),
    Integer(i64),
    Decimal(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
}

/// The flattened WHERE clause: a single connective over all conditions.
/// §4.2/§9: this is a deliberate simplification that cannot represent
/// `(A AND B) OR C`; mixed AND/OR collapses to OR.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WhereClause {
    pub connective: Connective,
    pub conditions: Vec<Condition>,
}

impl Default for Connective {
    fn default() -> Self {
        Connective::And
    }
}

/// One item in the RETURN clause.
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnItem {
    /// `COUNT(var)`
    Count { variable: String, alias: Option<String> },
    /// `var` or `var.property`, with an optional `AS alias`.
    Var {
        variable: String,
        property: Option<String>,
        alias: Option<String>,
    },
}

impl ReturnItem {
    /// Column name per §4.4 projection rules: alias, else `var.property`,
    /// else `var`.
    pub fn column_name(&self) -> String {
        match self {
            ReturnItem::Count { alias, variable } => {
                alias.clone().unwrap_or_else(|| format!("COUNT({variable})"))
            }
            ReturnItem::Var {
                alias,
                variable,
                property,
            } => alias.clone().unwrap_or_else(|| match property {
                Some(p) => format!("{variable}.{p}"),
                None => variable.clone(),
            }),
        }
    }
}

/// A typed key ORDER BY resolves against — see §9's resolution of the
/// "ORDER BY on aggregate expression" open question: the planner hands the
/// executor a typed key instead of a reparsed string.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderKey {
    Alias(String),
    Count(String),
    Var(String, Option<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub key: OrderKey,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReturnSpec {
    pub distinct: bool,
    pub items: Vec<ReturnItem>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<u32>,
}

/// A fully parsed query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    pub pattern: Pattern,
    pub where_clause: Option<WhereClause>,
    pub return_spec: Option<ReturnSpec>,
}
