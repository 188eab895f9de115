//! Kotlin Ktor source-based route extraction (§4.5).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::linker::model::RouteHandler;
use crate::types::Node;

static METHOD_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?i)(get|post|put|delete|patch)\(\s*"([^"]+)"\s*\)\s*\{"#).unwrap());

static WEBSOCKET_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r#"webSocket\(\s*"([^"]+)"\s*\)\s*\{"#).unwrap());

pub fn extract(node: &Node, source: &str) -> Vec<RouteHandler> {
    let mut routes: Vec<RouteHandler> = METHOD_BLOCK
        .captures_iter(source)
        .map(|cap| RouteHandler {
            method: cap[1].to_uppercase(),
            path: cap[2].to_string(),
            protocol: None,
            handler_ref: Some(node.name.clone()),
            resolved_handler_qn: None,
            owner_node_id: node.id,
            owner_qn: node.qualified_name.clone(),
        })
        .collect();

    routes.extend(WEBSOCKET_BLOCK.captures_iter(source).map(|cap| RouteHandler {
        method: "WS".to_string(),
        path: cap[1].to_string(),
        protocol: Some("ws".to_string()),
        handler_ref: Some(node.name.clone()),
        resolved_handler_qn: None,
        owner_node_id: node.id,
        owner_qn: node.qualified_name.clone(),
    }));

    routes
}
