//! Java Spring MVC annotation route extraction (§4.5).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::linker::model::RouteHandler;
use crate::types::Node;

static MAPPING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"@(Get|Post|Put|Delete|Patch|Request)Mapping\(\s*["']([^"']+)["']"#).unwrap());

static MESSAGE_MAPPING: Lazy<Regex> = Lazy::new(|| Regex::new(r#"@MessageMapping\(\s*["']([^"']+)["']"#).unwrap());

pub fn extract(node: &Node, source: &str) -> Vec<RouteHandler> {
    let mut routes: Vec<RouteHandler> = MAPPING
        .captures_iter(source)
        .map(|cap| {
            let method = match &cap[1] {
                "Request" => String::new(),
                other => other.to_uppercase(),
            };
            RouteHandler {
                method,
                path: cap[2].to_string(),
                protocol: None,
                handler_ref: Some(node.name.clone()),
                resolved_handler_qn: None,
                owner_node_id: node.id,
                owner_qn: node.qualified_name.clone(),
            }
        })
        .collect();

    routes.extend(MESSAGE_MAPPING.captures_iter(source).map(|cap| RouteHandler {
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
