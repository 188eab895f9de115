//! Go gin/chi source-based route extraction (§4.5), including
//! within-file prefix resolution: gin route groups resolved by
//! receiver-variable lookup (`v := r.Group("/prefix")`), and chi
//! `.Route("/prefix", func(r chi.Router) { ... })` blocks resolved by a
//! brace-depth stack. Cross-file gin group prefixes (the group assigned
//! in one function, applied to routes registered in another) are handled
//! by [`crate::linker::prefix_resolver`] instead.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::linker::model::RouteHandler;
use crate::types::Node;

static METHOD_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)(\w+)\.(get|post|put|delete|patch)\(\s*"([^"]+)"\s*,\s*([\w.]+)\)"#).unwrap());

static GROUP_ASSIGN: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(\w+)\s*:=\s*\w+\.Group\(\s*"([^"]+)"\s*\)"#).unwrap());

static CHI_ROUTE_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\w+\.Route\(\s*"([^"]+)"\s*,\s*func\([^)]*\)\s*\{"#).unwrap());

pub fn extract(node: &Node, source: &str) -> Vec<RouteHandler> {
    let mut groups: HashMap<String, String> = HashMap::new();
    for cap in GROUP_ASSIGN.captures_iter(source) {
        groups.insert(cap[1].to_string(), cap[2].to_string());
    }

    // Map each chi.Route(...) block's opening-brace byte offset to the
    // prefix it introduces.
    let mut route_open_braces: HashMap<usize, String> = HashMap::new();
    for cap in CHI_ROUTE_OPEN.captures_iter(source) {
        let whole = cap.get(0).unwrap();
        let brace_pos = whole.end() - 1; // the literal '{' the pattern ends on
        route_open_braces.insert(brace_pos, cap[1].to_string());
    }

    // Walk the source tracking brace depth, snapshotting the active
    // chi.Route prefix (if any) at every byte offset, so later lookups
    // can binary-search for "what prefix encloses byte N".
    let mut prefix_stack: Vec<(usize, String)> = Vec::new();
    let mut depth: usize = 0;
    let mut prefix_at: Vec<(usize, Option<String>)> = Vec::with_capacity(source.len());
    for (i, ch) in source.char_indices() {
        match ch {
            '{' => {
                depth += 1;
                if let Some(prefix) = route_open_braces.get(&i) {
                    prefix_stack.push((depth, prefix.clone()));
                }
            }
            '}' => {
                if matches!(prefix_stack.last(), Some((d, _)) if *d == depth) {
                    prefix_stack.pop();
                }
                depth = depth.saturating_sub(1);
            }
            _ => {}
        }
        prefix_at.push((i, prefix_stack.last().map(|(_, p)| p.clone())));
    }

    let active_prefix = |byte_pos: usize| -> Option<String> {
        let idx = prefix_at.partition_point(|(i, _)| *i <= byte_pos);
        if idx == 0 {
            None
        } else {
            prefix_at[idx - 1].1.clone()
        }
    };

    let mut routes = Vec::new();
    for cap in METHOD_CALL.captures_iter(source) {
        let receiver = &cap[1];
        let method = cap[2].to_uppercase();
        let mut path = cap[3].to_string();
        let byte_pos = cap.get(0).unwrap().start();

        if let Some(group_prefix) = groups.get(receiver) {
            if !path.starts_with(group_prefix.as_str()) {
                path = format!("{group_prefix}{path}");
            }
        } else if let Some(route_prefix) = active_prefix(byte_pos) {
            if !path.starts_with(route_prefix.as_str()) {
                path = format!("{route_prefix}{path}");
            }
        }

        routes.push(RouteHandler {
            method,
            path,
            protocol: None,
            handler_ref: Some(cap[4].to_string()),
            resolved_handler_qn: None,
            owner_node_id: node.id,
            owner_qn: node.qualified_name.clone(),
        });
    }
    routes
}
