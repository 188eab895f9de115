//! Executes a parsed, planned query against a [`Store`] (§4.4, §5, §7).
//!
//! A query runs once per project known to the store — the graph has no
//! cross-project edges (§3) — and a project whose scan step fails is
//! logged and skipped rather than failing the whole query (§7). Each
//! project's rows are capped so a pathological fan-out pattern can't
//! exhaust memory: [`MAX_BINDINGS`] total intermediate rows across every
//! project, [`MAX_RESULT_ROWS`] in the final projected result.

use std::collections::HashMap;

use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value as Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{instrument, warn};

use super::ast::{CompareOp, Condition, Connective, Query, ReturnItem, ReturnSpec};
use super::parser::parse;
use super::plan::{Plan, PlanStep};
use super::planner::plan_query;
use super::value::{compare_ordering, literal_as_string, stringify};
use crate::error::QueryError;
use crate::store::pg::NodeRow;
use crate::store::Store;
use crate::types::{Direction, Edge, Label, Node};

/// Hard cap on intermediate rows carried between plan steps, summed across
/// every project sharded over in one query (§4.4/§7).
pub const MAX_BINDINGS: usize = 400;
/// Hard cap on rows in the final projected result.
pub const MAX_RESULT_ROWS: usize = 200;
/// Depth used for an unbounded (`*`) variable-length hop (§4.4/§5).
const UNBOUNDED_HOP_DEPTH: u32 = 10;

/// A value bound to a pattern variable while evaluating one project's rows.
///
/// `Count` never binds to a pattern variable — it rides along under
/// [`PUSHED_COUNT_KEY`] when a SQL aggregate push-down has already done the
/// counting, so [`project_with_count`] sums it instead of counting rows.
#[derive(Debug, Clone)]
enum Binding {
    Node(Node),
    Edge(Edge),
    Count(i64),
}

impl Binding {
    fn get_property(&self, key: &str) -> Option<Json> {
        match self {
            Binding::Node(n) => n.get_property(key),
            Binding::Edge(e) => e.get_property(key),
            Binding::Count(_) => None,
        }
    }

    fn full_projection(&self) -> serde_json::Map<String, Json> {
        match self {
            Binding::Node(n) => n.full_projection(),
            Binding::Edge(e) => e.full_projection(),
            Binding::Count(_) => serde_json::Map::new(),
        }
    }
}

/// Row key a SQL aggregate push-down stashes its already-computed per-group
/// count under (§4.4 "Executor – push-down").
const PUSHED_COUNT_KEY: &str = "__pushed_count__";

type Row = IndexMap<String, Binding>;

/// The result of a query: column names in RETURN order (or pattern
/// variable order, for a RETURN-less MATCH) and the projected rows.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Json>>,
}

/// Parse, plan, and run `query_text` against `store`.
#[instrument(skip(store, query_text))]
pub async fn execute(store: &dyn Store, query_text: &str) -> Result<QueryResult, QueryError> {
    let query = parse(query_text)?;
    let plan = plan_query(&query)?;

    let projects = store.list_projects().await.map_err(QueryError::Store)?;

    let mut rows: Vec<Row> = Vec::new();
    'projects: for project in &projects {
        match execute_plan_for_project(store, &query, &plan, project).await {
            Ok(project_rows) => {
                for row in project_rows {
                    rows.push(row);
                    if rows.len() >= MAX_BINDINGS {
                        warn!(cap = MAX_BINDINGS, "query hit the binding cap, truncating");
                        break 'projects;
                    }
                }
            }
            Err(e) => {
                warn!(project = %project, error = %e, "project scan failed, skipping");
            }
        }
    }

    project_result(&query, rows)
}

async fn execute_plan_for_project(
    store: &dyn Store,
    query: &Query,
    plan: &Plan,
    project: &str,
) -> Result<Vec<Row>, QueryError> {
    if let Some(pool) = store.sql_pool() {
        if let Some(rows) = try_sql_pushdown(pool, query, plan, project).await? {
            return Ok(rows);
        }
    }
    execute_generic(store, plan, project).await
}

// ---------------------------------------------------------------------
// Generic step-by-step execution path (always correct, used whenever the
// store has no SQL backing or the plan doesn't fit a fast path).
// ---------------------------------------------------------------------

async fn execute_generic(store: &dyn Store, plan: &Plan, project: &str) -> Result<Vec<Row>, QueryError> {
    let mut rows: Vec<Row> = vec![Row::new()];

    for step in &plan.steps {
        rows = match step {
            PlanStep::ScanNodes {
                variable,
                label,
                pushed_conditions,
            } => scan_nodes(store, project, variable, label, pushed_conditions).await?,

            PlanStep::ExpandRelationship {
                from_variable,
                rel_variable,
                rel_types,
                direction,
                min_hops,
                max_hops,
                to_variable,
                to_label,
                pushed_conditions,
            } => {
                expand(
                    store,
                    rows,
                    from_variable,
                    rel_variable.as_deref(),
                    rel_types,
                    *direction,
                    *min_hops,
                    *max_hops,
                    to_variable,
                    to_label.as_deref(),
                    pushed_conditions,
                )
                .await?
            }

            PlanStep::FilterWhere {
                connective,
                conditions,
            } => filter_rows(rows, *connective, conditions)?,
        };

        if rows.len() > MAX_BINDINGS {
            rows.truncate(MAX_BINDINGS);
        }
    }

    Ok(rows)
}

async fn scan_nodes(
    store: &dyn Store,
    project: &str,
    variable: &str,
    label: &Option<String>,
    pushed_conditions: &[Condition],
) -> Result<Vec<Row>, QueryError> {
    let Some(label) = label else {
        return Err(QueryError::Eval(format!(
            "variable '{variable}' has no label — a starting node pattern must name a label to scan"
        )));
    };

    let candidates = store
        .find_nodes_by_label(project, label)
        .await
        .map_err(QueryError::Store)?;

    let mut regex_cache = RegexCache::default();
    let mut rows = Vec::new();
    for node in candidates {
        let binding = Binding::Node(node);
        if conditions_hold(&binding, Connective::And, pushed_conditions, &mut regex_cache)? {
            let mut row = Row::new();
            row.insert(variable.to_string(), binding);
            rows.push(row);
        }
    }
    Ok(rows)
}

#[allow(clippy::too_many_arguments)]
async fn expand(
    store: &dyn Store,
    rows: Vec<Row>,
    from_variable: &str,
    rel_variable: Option<&str>,
    rel_types: &[String],
    direction: Direction,
    min_hops: u32,
    max_hops: u32,
    to_variable: &str,
    to_label: Option<&str>,
    pushed_conditions: &[Condition],
) -> Result<Vec<Row>, QueryError> {
    let is_fixed = min_hops == 1 && max_hops == 1;
    let mut regex_cache = RegexCache::default();
    let mut out = Vec::new();

    if is_fixed {
        let from_ids: Vec<i64> = rows
            .iter()
            .filter_map(|r| match r.get(from_variable) {
                Some(Binding::Node(n)) => Some(n.id),
                _ => None,
            })
            .collect();

        let edges_by_from = match direction {
            Direction::Outbound => store.find_edges_by_source_ids(&from_ids, rel_types).await,
            Direction::Inbound => store.find_edges_by_target_ids(&from_ids, rel_types).await,
            Direction::Any => {
                let mut out_map = store
                    .find_edges_by_source_ids(&from_ids, rel_types)
                    .await
                    .map_err(QueryError::Store)?;
                let in_map = store
                    .find_edges_by_target_ids(&from_ids, rel_types)
                    .await
                    .map_err(QueryError::Store)?;
                for (id, edges) in in_map {
                    out_map.entry(id).or_default().extend(edges);
                }
                Ok(out_map)
            }
        }
        .map_err(QueryError::Store)?;

        // Resolve each (from_node, edge) pair's neighbor id up front, using
        // the from_node's own id to disambiguate `Any` direction, then
        // batch-fetch every distinct neighbor in one call.
        let mut neighbor_id_set: std::collections::HashSet<i64> = std::collections::HashSet::new();
        for row in &rows {
            let Some(Binding::Node(from_node)) = row.get(from_variable) else {
                continue;
            };
            if let Some(edges) = edges_by_from.get(&from_node.id) {
                for edge in edges {
                    neighbor_id_set.insert(resolve_neighbor_id(edge, from_node.id, direction));
                }
            }
        }
        let neighbor_ids: Vec<i64> = neighbor_id_set.into_iter().collect();
        let neighbor_nodes = store
            .find_nodes_by_ids(&neighbor_ids)
            .await
            .map_err(QueryError::Store)?;

        for row in &rows {
            let Some(Binding::Node(from_node)) = row.get(from_variable) else {
                continue;
            };
            let Some(edges) = edges_by_from.get(&from_node.id) else {
                continue;
            };
            for edge in edges {
                let neighbor_id = resolve_neighbor_id(edge, from_node.id, direction);
                let Some(neighbor) = neighbor_nodes.get(&neighbor_id) else {
                    continue;
                };
                if let Some(label) = to_label {
                    if neighbor.label.as_str() != label {
                        continue;
                    }
                }
                let mut new_row = row.clone();
                if let Some(rv) = rel_variable {
                    new_row.insert(rv.to_string(), Binding::Edge(edge.clone()));
                }
                let neighbor_binding = Binding::Node(neighbor.clone());
                if conditions_hold(
                    &neighbor_binding,
                    Connective::And,
                    pushed_conditions,
                    &mut regex_cache,
                )? {
                    new_row.insert(to_variable.to_string(), neighbor_binding);
                    out.push(new_row);
                }
            }
        }
    } else {
        let depth = if max_hops == 0 { UNBOUNDED_HOP_DEPTH } else { max_hops };
        for row in &rows {
            let Some(Binding::Node(from_node)) = row.get(from_variable) else {
                continue;
            };
            let bfs = store
                .bfs(from_node.id, direction, rel_types, depth, MAX_BINDINGS)
                .await
                .map_err(QueryError::Store)?;
            for visited in bfs.visited {
                if visited.hop < min_hops {
                    continue;
                }
                if max_hops != 0 && visited.hop > max_hops {
                    continue;
                }
                if let Some(label) = to_label {
                    if visited.node.label.as_str() != label {
                        continue;
                    }
                }
                let binding = Binding::Node(visited.node);
                if conditions_hold(&binding, Connective::And, pushed_conditions, &mut regex_cache)? {
                    let mut new_row = row.clone();
                    new_row.insert(to_variable.to_string(), binding);
                    out.push(new_row);
                }
            }
        }
    }

    Ok(out)
}

/// The id of the end of `edge` that is *not* `from_id`. For `Any`
/// direction an edge can touch `from_id` on either end (we fetched it from
/// both a source-id and a target-id query), so the neighbor is whichever
/// end doesn't match.
fn resolve_neighbor_id(edge: &Edge, from_id: i64, direction: Direction) -> i64 {
    match direction {
        Direction::Outbound => edge.target_id,
        Direction::Inbound => edge.source_id,
        Direction::Any => {
            if edge.source_id == from_id {
                edge.target_id
            } else {
                edge.source_id
            }
        }
    }
}

fn filter_rows(rows: Vec<Row>, connective: Connective, conditions: &[Condition]) -> Result<Vec<Row>, QueryError> {
    let mut regex_cache = RegexCache::default();
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        if row_conditions_hold(&row, connective, conditions, &mut regex_cache)? {
            out.push(row);
        }
    }
    Ok(out)
}

fn row_conditions_hold(
    row: &Row,
    connective: Connective,
    conditions: &[Condition],
    cache: &mut RegexCache,
) -> Result<bool, QueryError> {
    if conditions.is_empty() {
        return Ok(true);
    }
    let mut results = Vec::with_capacity(conditions.len());
    for cond in conditions {
        let held = match row.get(&cond.variable) {
            Some(binding) => evaluate_condition(binding, cond, cache)?,
            // a condition on a variable not present in this row (e.g. a
            // relationship variable that wasn't bound for a variable-length
            // hop) can never be satisfied.
            None => false,
        };
        results.push(held);
    }
    Ok(match connective {
        Connective::And => results.into_iter().all(|b| b),
        Connective::Or => results.into_iter().any(|b| b),
    })
}

/// Evaluate `conditions` against a single not-yet-inserted binding
/// (used while a scan/expand step is still deciding whether to keep a
/// candidate row) — always with `AND` semantics, since only AND-clause
/// conditions are ever pushed into a step (§4.3).
fn conditions_hold(
    binding: &Binding,
    connective: Connective,
    conditions: &[Condition],
    cache: &mut RegexCache,
) -> Result<bool, QueryError> {
    if conditions.is_empty() {
        return Ok(true);
    }
    let mut results = Vec::with_capacity(conditions.len());
    for cond in conditions {
        results.push(evaluate_condition(binding, cond, cache)?);
    }
    Ok(match connective {
        Connective::And => results.into_iter().all(|b| b),
        Connective::Or => results.into_iter().any(|b| b),
    })
}

fn evaluate_condition(binding: &Binding, cond: &Condition, cache: &mut RegexCache) -> Result<bool, QueryError> {
    let Some(stored) = binding.get_property(&cond.property) else {
        return Ok(false);
    };

    Ok(match cond.op {
        CompareOp::Eq => stringify(&stored) == literal_as_string(&cond.value),
        CompareOp::Contains => stringify(&stored).contains(&literal_as_string(&cond.value)),
        CompareOp::StartsWith => stringify(&stored).starts_with(&literal_as_string(&cond.value)),
        CompareOp::RegexMatch => {
            let pattern = literal_as_string(&cond.value);
            let re = cache.get_or_compile(&pattern)?;
            re.is_match(&stringify(&stored))
        }
        CompareOp::Gt => matches!(compare_ordering(&stored, &cond.value), Some(std::cmp::Ordering::Greater)),
        CompareOp::Lt => matches!(compare_ordering(&stored, &cond.value), Some(std::cmp::Ordering::Less)),
        CompareOp::Gte => matches!(
            compare_ordering(&stored, &cond.value),
            Some(std::cmp::Ordering::Greater) | Some(std::cmp::Ordering::Equal)
        ),
        CompareOp::Lte => matches!(
            compare_ordering(&stored, &cond.value),
            Some(std::cmp::Ordering::Less) | Some(std::cmp::Ordering::Equal)
        ),
    })
}

/// Compiled regexes for `=~` live only for the duration of one `execute()`
/// call — never shared across queries or requests — so a slow or
/// adversarial pattern from one query can't poison a process-wide cache
/// (§4.4's "process-local, not shared" regex cache requirement).
#[derive(Default)]
struct RegexCache {
    compiled: HashMap<String, Regex>,
}

impl RegexCache {
    fn get_or_compile(&mut self, pattern: &str) -> Result<&Regex, QueryError> {
        if !self.compiled.contains_key(pattern) {
            let re = Regex::new(pattern)
                .map_err(|e| QueryError::Eval(format!("invalid regex '{pattern}': {e}")))?;
            self.compiled.insert(pattern.to_string(), re);
        }
        Ok(self.compiled.get(pattern).expect("just inserted"))
    }
}

// ---------------------------------------------------------------------
// SQL push-down fast paths, only attempted when the store is a SqlStore
// (§4.4). Falls back to `None` (the generic path) for any plan shape or
// condition this fast path doesn't know how to render as SQL.
// ---------------------------------------------------------------------

async fn try_sql_pushdown(pool: &PgPool, query: &Query, plan: &Plan, project: &str) -> Result<Option<Vec<Row>>, QueryError> {
    match plan.steps.as_slice() {
        [PlanStep::ScanNodes {
            variable,
            label,
            pushed_conditions,
        }] => pushdown_single_scan(pool, project, variable, label, pushed_conditions).await,

        [PlanStep::ScanNodes {
            variable: from_var,
            label: from_label,
            pushed_conditions: from_conditions,
        }, PlanStep::ExpandRelationship {
            from_variable,
            rel_variable,
            rel_types,
            direction,
            min_hops,
            max_hops,
            to_variable,
            to_label,
            pushed_conditions: to_conditions,
        }] if from_var == from_variable && *min_hops == 1 && *max_hops == 1 => {
            if *direction != Direction::Any {
                if let (Some(from_label), Some(to_label)) = (from_label, to_label) {
                    if all_pushable_as_sql(from_conditions) && all_pushable_as_sql(to_conditions) {
                        if let Some(group_column) = aggregate_group_shape(query, from_var, to_variable) {
                            let rows = pushdown_aggregate_join(
                                pool,
                                project,
                                from_var,
                                from_label,
                                from_conditions,
                                rel_types,
                                *direction,
                                to_label,
                                to_conditions,
                                group_column,
                            )
                            .await?;
                            return Ok(Some(rows));
                        }
                    }
                }
            }

            pushdown_fused_join(
                pool,
                project,
                from_var,
                from_label,
                from_conditions,
                rel_variable.as_deref(),
                rel_types,
                *direction,
                to_variable,
                to_label,
                to_conditions,
            )
            .await
        }

        _ => Ok(None),
    }
}

/// Node columns a SQL push-down is allowed to filter or group on — a closed
/// set; extending it requires schema work (§9 "SQL push-down surface").
const PUSHABLE_NODE_COLUMNS: [&str; 3] = ["name", "qualified_name", "file_path"];
/// Node columns an aggregation push-down is allowed to group by — the same
/// closed set plus `label`, per SPEC_FULL.md §4.4's `x ∈ {name,
/// qualified_name, label, file_path}`.
const PUSHABLE_GROUP_COLUMNS: [&str; 4] = ["name", "qualified_name", "label", "file_path"];

/// `=`, `CONTAINS`, and `STARTS WITH` are rendered as SQL (`=`/`LIKE`);
/// anything else (regex, ordering comparisons) falls back to the generic
/// path, which still runs correctly, just without the join-fusion speedup
/// (§9 "Do not attempt to push down operators outside {=, CONTAINS, STARTS
/// WITH}").
fn all_pushable_as_sql(conditions: &[Condition]) -> bool {
    conditions
        .iter()
        .all(|c| matches!(c.op, CompareOp::Eq | CompareOp::Contains | CompareOp::StartsWith))
}

/// Recognizes the one fusible-aggregation plan shape SPEC_FULL.md §4.4
/// describes: `MATCH (a:L)-[:T]->(b) RETURN a.x, COUNT(b)`. Returns the
/// grouping column `x` when the return spec is exactly that shape — a
/// single non-aggregate item on `from_variable` plus a single `COUNT` on
/// `to_variable`, no DISTINCT. Anything broader (more grouping columns, a
/// COUNT over the wrong variable, DISTINCT) falls back to the non-aggregate
/// fused join, aggregated in memory afterwards.
fn aggregate_group_shape<'q>(query: &'q Query, from_variable: &str, to_variable: &str) -> Option<&'q str> {
    let spec = query.return_spec.as_ref()?;
    if spec.distinct || spec.items.len() != 2 {
        return None;
    }

    let mut group_column = None;
    let mut has_count = false;
    for item in &spec.items {
        match item {
            ReturnItem::Var {
                variable,
                property: Some(p),
                ..
            } if variable == from_variable && PUSHABLE_GROUP_COLUMNS.contains(&p.as_str()) => {
                group_column = Some(p.as_str());
            }
            ReturnItem::Count { variable, .. } if variable == to_variable => has_count = true,
            _ => return None,
        }
    }

    if has_count {
        group_column
    } else {
        None
    }
}

fn push_condition_sql<'a>(builder: &mut QueryBuilder<'a, Postgres>, table_alias: &str, cond: &'a Condition) {
    let column = PUSHABLE_NODE_COLUMNS.contains(&cond.property.as_str()).then_some(cond.property.as_str());

    match column {
        Some(col) => match cond.op {
            CompareOp::Eq => {
                builder.push(format!(" AND {table_alias}.{col} = "));
                builder.push_bind(literal_as_string(&cond.value));
            }
            CompareOp::Contains => {
                builder.push(format!(" AND {table_alias}.{col} LIKE "));
                builder.push_bind(like_pattern(&literal_as_string(&cond.value), true, true));
            }
            CompareOp::StartsWith => {
                builder.push(format!(" AND {table_alias}.{col} LIKE "));
                builder.push_bind(like_pattern(&literal_as_string(&cond.value), false, true));
            }
            other => unreachable!("all_pushable_as_sql excludes {other:?} from reaching push_condition_sql"),
        },
        None => {
            builder.push(" AND ");
            builder.push(table_alias);
            builder.push(".properties ->> ");
            builder.push_bind(cond.property.clone());
            match cond.op {
                CompareOp::Eq => {
                    builder.push(" = ");
                    builder.push_bind(literal_as_string(&cond.value));
                }
                CompareOp::Contains => {
                    builder.push(" LIKE ");
                    builder.push_bind(like_pattern(&literal_as_string(&cond.value), true, true));
                }
                CompareOp::StartsWith => {
                    builder.push(" LIKE ");
                    builder.push_bind(like_pattern(&literal_as_string(&cond.value), false, true));
                }
                other => unreachable!("all_pushable_as_sql excludes {other:?} from reaching push_condition_sql"),
            }
        }
    }
}

/// Escape literal `%`/`_` in `value` and wrap it as a `LIKE` pattern —
/// both wildcards for CONTAINS, a trailing one only for STARTS WITH.
fn like_pattern(value: &str, leading_wildcard: bool, trailing_wildcard: bool) -> String {
    let escaped = value.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    let mut pattern = String::new();
    if leading_wildcard {
        pattern.push('%');
    }
    pattern.push_str(&escaped);
    if trailing_wildcard {
        pattern.push('%');
    }
    pattern
}

async fn pushdown_single_scan(
    pool: &PgPool,
    project: &str,
    variable: &str,
    label: &Option<String>,
    pushed_conditions: &[Condition],
) -> Result<Option<Vec<Row>>, QueryError> {
    let Some(label) = label else { return Ok(None) };
    if !all_pushable_as_sql(pushed_conditions) {
        return Ok(None);
    }

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT * FROM nodes WHERE project = ");
    builder.push_bind(project.to_string());
    builder.push(" AND label = ");
    builder.push_bind(label.clone());
    for cond in pushed_conditions {
        push_condition_sql(&mut builder, "nodes", cond);
    }
    builder.push(format!(" LIMIT {}", MAX_BINDINGS));

    let rows: Vec<NodeRow> = builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(|e| QueryError::Store(crate::error::StoreError(e.into())))?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let node: Node = row.into();
        let mut r = Row::new();
        r.insert(variable.to_string(), Binding::Node(node));
        out.push(r);
    }
    Ok(Some(out))
}

/// Fuses scan + expand + COUNT into exactly one `GROUP BY` SQL statement
/// (§4.4, §8 "Executor – push-down"). Each returned row carries the scan
/// variable's grouping column plus a [`PUSHED_COUNT_KEY`] binding so
/// [`project_with_count`] sums the already-computed per-group count instead
/// of counting rows — correct even when the same group appears again in
/// another project's result set.
#[allow(clippy::too_many_arguments)]
async fn pushdown_aggregate_join(
    pool: &PgPool,
    project: &str,
    from_variable: &str,
    from_label: &str,
    from_conditions: &[Condition],
    rel_types: &[String],
    direction: Direction,
    to_label: &str,
    to_conditions: &[Condition],
    group_column: &str,
) -> Result<Vec<Row>, QueryError> {
    let (from_join_col, to_join_col) = match direction {
        Direction::Outbound => ("source_id", "target_id"),
        Direction::Inbound => ("target_id", "source_id"),
        Direction::Any => unreachable!("Direction::Any never reaches an aggregate push-down"),
    };

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT f.{group_column} AS grp, COUNT(*) AS cnt FROM nodes f JOIN edges e ON e."));
    builder.push(from_join_col);
    builder.push(" = f.id JOIN nodes t ON t.id = e.");
    builder.push(to_join_col);
    builder.push(" WHERE f.project = ");
    builder.push_bind(project.to_string());
    builder.push(" AND f.label = ");
    builder.push_bind(from_label.to_string());
    builder.push(" AND t.label = ");
    builder.push_bind(to_label.to_string());
    if !rel_types.is_empty() {
        builder.push(" AND e.type = ANY(");
        builder.push_bind(rel_types.to_vec());
        builder.push(")");
    }
    for cond in from_conditions {
        push_condition_sql(&mut builder, "f", cond);
    }
    for cond in to_conditions {
        push_condition_sql(&mut builder, "t", cond);
    }
    builder.push(format!(" GROUP BY f.{group_column} LIMIT {}", MAX_BINDINGS));

    #[derive(sqlx::FromRow)]
    struct AggRow {
        grp: Option<String>,
        cnt: i64,
    }

    let rows: Vec<AggRow> = builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(|e| QueryError::Store(crate::error::StoreError(e.into())))?;

    let mut out = Vec::with_capacity(rows.len());
    for r in rows {
        let mut node = Node {
            id: 0,
            project: project.to_string(),
            label: Label::Other(String::new()),
            name: String::new(),
            qualified_name: String::new(),
            file_path: None,
            start_line: None,
            end_line: None,
            properties: serde_json::Map::new(),
        };
        match group_column {
            "name" => node.name = r.grp.unwrap_or_default(),
            "qualified_name" => node.qualified_name = r.grp.unwrap_or_default(),
            "label" => node.label = r.grp.unwrap_or_default().into(),
            "file_path" => node.file_path = r.grp,
            other => unreachable!("aggregate_group_shape only ever yields a PUSHABLE_GROUP_COLUMNS entry, not '{other}'"),
        }

        let mut row = Row::new();
        row.insert(from_variable.to_string(), Binding::Node(node));
        row.insert(PUSHED_COUNT_KEY.to_string(), Binding::Count(r.cnt));
        out.push(row);
    }
    Ok(out)
}

#[allow(clippy::too_many_arguments)]
async fn pushdown_fused_join(
    pool: &PgPool,
    project: &str,
    from_variable: &str,
    from_label: &Option<String>,
    from_conditions: &[Condition],
    rel_variable: Option<&str>,
    rel_types: &[String],
    direction: Direction,
    to_variable: &str,
    to_label: &Option<String>,
    to_conditions: &[Condition],
) -> Result<Option<Vec<Row>>, QueryError> {
    let (Some(from_label), Some(to_label)) = (from_label, to_label) else {
        return Ok(None);
    };
    if !all_pushable_as_sql(from_conditions) || !all_pushable_as_sql(to_conditions) {
        return Ok(None);
    }
    if direction == Direction::Any {
        // ambiguous which side of the edge is "from" in a single fused
        // query; let the generic path handle it.
        return Ok(None);
    }

    let (from_join_col, to_join_col) = match direction {
        Direction::Outbound => ("source_id", "target_id"),
        Direction::Inbound => ("target_id", "source_id"),
        Direction::Any => unreachable!(),
    };

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT f.id AS f_id, f.project AS f_project, f.label AS f_label, f.name AS f_name, \
         f.qualified_name AS f_qn, f.file_path AS f_file_path, f.start_line AS f_start_line, \
         f.end_line AS f_end_line, f.properties AS f_properties, \
         e.id AS e_id, e.project AS e_project, e.source_id AS e_source_id, e.target_id AS e_target_id, \
         e.type AS e_type, e.properties AS e_properties, \
         t.id AS t_id, t.project AS t_project, t.label AS t_label, t.name AS t_name, \
         t.qualified_name AS t_qn, t.file_path AS t_file_path, t.start_line AS t_start_line, \
         t.end_line AS t_end_line, t.properties AS t_properties \
         FROM nodes f \
         JOIN edges e ON e.",
    );
    builder.push(from_join_col);
    builder.push(" = f.id \
         JOIN nodes t ON t.id = e.");
    builder.push(to_join_col);
    builder.push(" WHERE f.project = ");
    builder.push_bind(project.to_string());
    builder.push(" AND f.label = ");
    builder.push_bind(from_label.clone());
    builder.push(" AND t.label = ");
    builder.push_bind(to_label.clone());
    if !rel_types.is_empty() {
        builder.push(" AND e.type = ANY(");
        builder.push_bind(rel_types.to_vec());
        builder.push(")");
    }
    for cond in from_conditions {
        push_condition_sql(&mut builder, "f", cond);
    }
    for cond in to_conditions {
        push_condition_sql(&mut builder, "t", cond);
    }
    builder.push(format!(" LIMIT {}", MAX_BINDINGS));

    #[derive(sqlx::FromRow)]
    struct JoinedRow {
        f_id: i64,
        f_project: String,
        f_label: String,
        f_name: String,
        f_qn: String,
        f_file_path: Option<String>,
        f_start_line: Option<i64>,
        f_end_line: Option<i64>,
        f_properties: String,
        e_id: i64,
        e_project: String,
        e_source_id: i64,
        e_target_id: i64,
        e_type: String,
        e_properties: String,
        t_id: i64,
        t_project: String,
        t_label: String,
        t_name: String,
        t_qn: String,
        t_file_path: Option<String>,
        t_start_line: Option<i64>,
        t_end_line: Option<i64>,
        t_properties: String,
    }

    let rows: Vec<JoinedRow> = builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(|e| QueryError::Store(crate::error::StoreError(e.into())))?;

    let mut out = Vec::with_capacity(rows.len());
    for r in rows {
        let from_node = Node {
            id: r.f_id,
            project: r.f_project,
            label: r.f_label.into(),
            name: r.f_name,
            qualified_name: r.f_qn,
            file_path: r.f_file_path,
            start_line: r.f_start_line,
            end_line: r.f_end_line,
            properties: crate::types::unmarshal_props(&r.f_properties),
        };
        let to_node = Node {
            id: r.t_id,
            project: r.t_project,
            label: r.t_label.into(),
            name: r.t_name,
            qualified_name: r.t_qn,
            file_path: r.t_file_path,
            start_line: r.t_start_line,
            end_line: r.t_end_line,
            properties: crate::types::unmarshal_props(&r.t_properties),
        };
        let edge = Edge {
            id: r.e_id,
            project: r.e_project,
            source_id: r.e_source_id,
            target_id: r.e_target_id,
            edge_type: r.e_type,
            properties: crate::types::unmarshal_props(&r.e_properties),
        };

        let mut row = Row::new();
        row.insert(from_variable.to_string(), Binding::Node(from_node));
        if let Some(rv) = rel_variable {
            row.insert(rv.to_string(), Binding::Edge(edge));
        }
        row.insert(to_variable.to_string(), Binding::Node(to_node));
        out.push(row);
    }
    Ok(Some(out))
}

// ---------------------------------------------------------------------
// Projection: RETURN (or its absence), DISTINCT, ORDER BY, LIMIT (§4.4).
// ---------------------------------------------------------------------

fn project_result(query: &Query, rows: Vec<Row>) -> Result<QueryResult, QueryError> {
    let Some(spec) = &query.return_spec else {
        return project_no_return(query, rows);
    };

    if spec.items.iter().any(|i| matches!(i, ReturnItem::Count { .. })) {
        project_with_count(spec, rows)
    } else {
        project_plain(spec, rows)
    }
}

/// A RETURN-less MATCH projects one column per `(node-variable ×
/// {name, qualified_name, label})` plus one per `(edge-variable × type)`,
/// with columns in lexicographic order (§4.4).
fn project_no_return(query: &Query, rows: Vec<Row>) -> Result<QueryResult, QueryError> {
    let mut node_vars = Vec::new();
    let mut edge_vars = Vec::new();
    if let Some(first) = query.pattern.first_node() {
        if let Some(v) = &first.variable {
            node_vars.push(v.clone());
        }
    }
    for (rel, node) in query.pattern.rel_node_pairs() {
        if let Some(v) = &rel.variable {
            edge_vars.push(v.clone());
        }
        if let Some(v) = &node.variable {
            node_vars.push(v.clone());
        }
    }

    const NODE_FIELDS: [&str; 3] = ["name", "qualified_name", "label"];
    let mut columns: Vec<String> = Vec::new();
    for v in &node_vars {
        for field in NODE_FIELDS {
            columns.push(format!("{v}.{field}"));
        }
    }
    for v in &edge_vars {
        columns.push(format!("{v}.type"));
    }
    columns.sort();

    let mut out_rows = Vec::with_capacity(rows.len().min(MAX_RESULT_ROWS));
    for row in rows.into_iter().take(MAX_RESULT_ROWS) {
        let mut values = Vec::with_capacity(columns.len());
        for col in &columns {
            let (var, field) = col.split_once('.').expect("column always has a var.field shape");
            let value = row.get(var).and_then(|b| b.get_property(field)).unwrap_or(Json::Null);
            values.push(value);
        }
        out_rows.push(values);
    }

    Ok(QueryResult {
        columns,
        rows: out_rows,
    })
}

fn return_item_value(item: &ReturnItem, row: &Row) -> Json {
    match item {
        ReturnItem::Var { variable, property, .. } => {
            let Some(binding) = row.get(variable) else {
                return Json::Null;
            };
            match property {
                Some(p) => binding.get_property(p).unwrap_or(Json::Null),
                None => Json::Object(binding.full_projection()),
            }
        }
        ReturnItem::Count { .. } => Json::Null,
    }
}

fn project_plain(spec: &ReturnSpec, rows: Vec<Row>) -> Result<QueryResult, QueryError> {
    let columns: Vec<String> = spec.items.iter().map(|i| i.column_name()).collect();

    let mut out_rows: Vec<Vec<Json>> = rows
        .iter()
        .map(|row| spec.items.iter().map(|item| return_item_value(item, row)).collect())
        .collect();

    if spec.distinct {
        dedup_rows(&mut out_rows);
    }

    sort_and_limit(&mut out_rows, spec)?;

    Ok(QueryResult {
        columns,
        rows: out_rows,
    })
}

/// `RETURN` with a `COUNT(var)` groups by every non-aggregate return item
/// and counts matching rows within each group — the implicit-grouping
/// semantics §4.4 describes for aggregate projections without an explicit
/// GROUP BY in the grammar.
fn project_with_count(spec: &ReturnSpec, rows: Vec<Row>) -> Result<QueryResult, QueryError> {
    let columns: Vec<String> = spec.items.iter().map(|i| i.column_name()).collect();

    let group_items: Vec<&ReturnItem> = spec
        .items
        .iter()
        .filter(|i| !matches!(i, ReturnItem::Count { .. }))
        .collect();

    let mut groups: IndexMap<Vec<String>, (Vec<Json>, i64)> = IndexMap::new();
    for row in &rows {
        let group_values: Vec<Json> = group_items.iter().map(|item| return_item_value(item, row)).collect();
        let group_key: Vec<String> = group_values.iter().map(|v| v.to_string()).collect();
        let entry = groups.entry(group_key).or_insert_with(|| (group_values, 0));
        let increment = match row.get(PUSHED_COUNT_KEY) {
            Some(Binding::Count(n)) => *n,
            _ => 1,
        };
        entry.1 += increment;
    }

    let mut out_rows: Vec<Vec<Json>> = Vec::with_capacity(groups.len());
    for (_, (group_values, count)) in groups {
        let mut values = Vec::with_capacity(columns.len());
        let mut group_iter = group_values.into_iter();
        for item in &spec.items {
            match item {
                ReturnItem::Count { .. } => values.push(Json::Number(count.into())),
                ReturnItem::Var { .. } => values.push(group_iter.next().unwrap_or(Json::Null)),
            }
        }
        out_rows.push(values);
    }

    if spec.distinct {
        dedup_rows(&mut out_rows);
    }

    sort_and_limit(&mut out_rows, spec)?;

    Ok(QueryResult {
        columns,
        rows: out_rows,
    })
}

fn dedup_rows(rows: &mut Vec<Vec<Json>>) {
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();
    rows.retain(|row| {
        let key = row.iter().map(|v| v.to_string()).collect::<Vec<_>>().join("\u{1}");
        seen.insert(key)
    });
}

/// Does `item` — a RETURN projection — supply the value an ORDER BY key
/// refers to? Matched structurally rather than by rendered column name so
/// an aliased `COUNT(...) AS n` still resolves correctly when the ORDER BY
/// parser only had the unaliased `OrderKey::Count` to go on (§9).
fn order_key_matches(key: &super::ast::OrderKey, item: &ReturnItem) -> bool {
    use super::ast::OrderKey;
    match (key, item) {
        (OrderKey::Count(v), ReturnItem::Count { variable, .. }) => v == variable,
        (OrderKey::Var(v, p), ReturnItem::Var { variable, property, .. }) => v == variable && p == property,
        (OrderKey::Alias(a), item) => &item.column_name() == a,
        _ => false,
    }
}

fn sort_and_limit(rows: &mut Vec<Vec<Json>>, spec: &ReturnSpec) -> Result<(), QueryError> {
    use super::ast::SortDirection;

    if let Some(order) = &spec.order_by {
        let idx = spec
            .items
            .iter()
            .position(|item| order_key_matches(&order.key, item))
            .ok_or_else(|| QueryError::Eval(format!("ORDER BY key {:?} does not match any RETURN item", order.key)))?;

        rows.sort_by(|a, b| {
            let ordering = compare_json(&a[idx], &b[idx]);
            match order.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });
    }

    if let Some(limit) = spec.limit {
        rows.truncate(limit as usize);
    }
    rows.truncate(MAX_RESULT_ROWS);
    Ok(())
}

fn compare_json(a: &Json, b: &Json) -> std::cmp::Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        _ => stringify(a).cmp(&stringify(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::types::{EdgeDraft, Label, NodeDraft};
    use serde_json::{json, Map};

    fn node(project: &str, label: Label, name: &str, qn: &str, props: Map<String, Json>) -> NodeDraft {
        NodeDraft {
            project: project.to_string(),
            label,
            name: name.to_string(),
            qualified_name: qn.to_string(),
            file_path: None,
            start_line: None,
            end_line: None,
            properties: props,
        }
    }

    async fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.upsert_project("demo", "/repo").await.unwrap();

        let a = store
            .upsert_node(&node("demo", Label::Function, "main", "demo.main", Map::new()))
            .await
            .unwrap();
        let b = store
            .upsert_node(&node("demo", Label::Function, "helper", "demo.helper", Map::new()))
            .await
            .unwrap();
        let c = store
            .upsert_node(&node("demo", Label::Function, "util", "demo.util", Map::new()))
            .await
            .unwrap();

        store
            .insert_edge(&EdgeDraft {
                project: "demo".into(),
                source_id: a,
                target_id: b,
                edge_type: "CALLS".into(),
                properties: Map::new(),
            })
            .await
            .unwrap();
        store
            .insert_edge(&EdgeDraft {
                project: "demo".into(),
                source_id: b,
                target_id: c,
                edge_type: "CALLS".into(),
                properties: Map::new(),
            })
            .await
            .unwrap();

        store
    }

    #[tokio::test]
    async fn scans_and_filters_by_property() {
        let store = seeded_store().await;
        let result = execute(&store, "MATCH (f:Function) WHERE f.name = 'main' RETURN f.name").await.unwrap();
        assert_eq!(result.columns, vec!["f.name"]);
        assert_eq!(result.rows, vec![vec![json!("main")]]);
    }

    #[tokio::test]
    async fn fixed_hop_expansion_joins_through_one_edge() {
        let store = seeded_store().await;
        let result = execute(&store, "MATCH (a:Function)-[:CALLS]->(b:Function) RETURN a.name, b.name").await.unwrap();
        assert_eq!(result.rows.len(), 2);
        assert!(result.rows.contains(&vec![json!("main"), json!("helper")]));
        assert!(result.rows.contains(&vec![json!("helper"), json!("util")]));
    }

    #[tokio::test]
    async fn variable_length_hop_reaches_transitive_neighbors() {
        let store = seeded_store().await;
        let result = execute(
            &store,
            "MATCH (a:Function)-[:CALLS*1..2]->(b:Function) WHERE a.name = 'main' RETURN b.name",
        )
        .await
        .unwrap();
        let names: std::collections::HashSet<String> =
            result.rows.iter().map(|r| r[0].as_str().unwrap().to_string()).collect();
        assert_eq!(names, std::collections::HashSet::from(["helper".to_string(), "util".to_string()]));
    }

    #[tokio::test]
    async fn match_without_return_projects_flat_node_fields_lexicographically() {
        let store = seeded_store().await;
        let result = execute(&store, "MATCH (f:Function) WHERE f.name = 'main'").await.unwrap();
        assert_eq!(result.columns, vec!["f.label", "f.name", "f.qualified_name"]);
        assert_eq!(result.rows, vec![vec![json!("Function"), json!("main"), json!("main")]]);
    }

    #[tokio::test]
    async fn count_groups_by_the_plain_return_items() {
        let store = seeded_store().await;
        let result = execute(
            &store,
            "MATCH (a:Function)-[:CALLS]->(b:Function) RETURN a.name, COUNT(b) AS n",
        )
        .await
        .unwrap();
        assert_eq!(result.columns, vec!["a.name", "n"]);
        assert!(result
            .rows
            .iter()
            .any(|r| r[0] == json!("main") && r[1] == json!(1)));
    }

    #[tokio::test]
    async fn order_by_and_limit_apply_after_projection() {
        let store = seeded_store().await;
        let result = execute(
            &store,
            "MATCH (f:Function) RETURN f.name ORDER BY f.name ASC LIMIT 2",
        )
        .await
        .unwrap();
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0], vec![json!("helper")]);
        assert_eq!(result.rows[1], vec![json!("main")]);
    }

    #[tokio::test]
    async fn where_or_clause_is_evaluated_as_a_whole_not_pushed() {
        let store = seeded_store().await;
        let result = execute(
            &store,
            "MATCH (f:Function) WHERE f.name = 'main' OR f.name = 'util' RETURN f.name ORDER BY f.name ASC",
        )
        .await
        .unwrap();
        let names: Vec<String> = result.rows.iter().map(|r| r[0].as_str().unwrap().to_string()).collect();
        assert_eq!(names, vec!["main".to_string(), "util".to_string()]);
    }
}
