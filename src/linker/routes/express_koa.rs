//! JS/TS Express/Koa source-based route extraction (§4.5). The receiver
//! is restricted to a closed allowlist to suppress false positives from
//! `req.get`, `res.get`, `map.get`, and similar unrelated `.get` calls;
//! requiring a second, bare-identifier argument after the path also
//! excludes single-argument `.get("key")` config-getter calls and captures
//! the handler identifier itself, rather than the registering node's name.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::linker::model::RouteHandler;
use crate::types::Node;

const ALLOWED_RECEIVERS: &[&str] = &["app", "router", "server", "api", "routes", "express", "route"];

static METHOD_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(\w+)\.(get|post|put|delete|patch)\(\s*["']([^"']+)["']\s*,\s*(\w+(?:\.\w+)*)\s*\)"#).unwrap()
});

pub fn extract(node: &Node, source: &str) -> Vec<RouteHandler> {
    METHOD_CALL
        .captures_iter(source)
        .filter(|cap| ALLOWED_RECEIVERS.contains(&&cap[1]))
        .map(|cap| RouteHandler {
            method: cap[2].to_uppercase(),
            path: cap[3].to_string(),
            protocol: None,
            handler_ref: Some(cap[4].to_string()),
            resolved_handler_qn: None,
            owner_node_id: node.id,
            owner_qn: node.qualified_name.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Label;
    use serde_json::Map;

    fn make_node() -> Node {
        Node {
            id: 1,
            project: "p".into(),
            label: Label::Module,
            name: "routes".into(),
            qualified_name: "api.routes".into(),
            file_path: Some("routes.js".into()),
            start_line: None,
            end_line: None,
            properties: Map::new(),
        }
    }

    #[test]
    fn allowlisted_receiver_is_extracted() {
        let routes = extract(&make_node(), r#"app.post("/api/orders", createOrder)"#);
        assert_eq!(routes[0].method, "POST");
        assert_eq!(routes[0].path, "/api/orders");
        assert_eq!(routes[0].handler_ref.as_deref(), Some("createOrder"));
    }

    #[test]
    fn dotted_handler_reference_is_captured_whole() {
        let routes = extract(&make_node(), r#"router.get("/api/orders", orders.list)"#);
        assert_eq!(routes[0].handler_ref.as_deref(), Some("orders.list"));
    }

    #[test]
    fn req_get_is_not_a_route() {
        let routes = extract(&make_node(), r#"const id = req.get("id")"#);
        assert!(routes.is_empty());
    }

    #[test]
    fn single_argument_get_is_a_config_getter_not_a_route() {
        let routes = extract(&make_node(), r#"const port = app.get("port")"#);
        assert!(routes.is_empty());
    }
}
