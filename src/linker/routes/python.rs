//! FastAPI/Flask-style decorator route extraction (§4.5).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::linker::model::RouteHandler;
use crate::types::Node;

static DECORATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"@\w+\.(get|post|put|delete|patch)\(\s*["']([^"']+)["']"#).unwrap());

static WEBSOCKET: Lazy<Regex> = Lazy::new(|| Regex::new(r#"@\w+\.websocket\(\s*["']([^"']+)["']"#).unwrap());

pub fn extract(node: &Node, source: &str) -> Vec<RouteHandler> {
    let mut routes: Vec<RouteHandler> = DECORATOR
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

    routes.extend(WEBSOCKET.captures_iter(source).map(|cap| RouteHandler {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Label;
    use serde_json::Map;

    fn make_node(name: &str) -> Node {
        Node {
            id: 1,
            project: "p".into(),
            label: Label::Function,
            name: name.into(),
            qualified_name: format!("pkg.{name}"),
            file_path: Some("pkg.py".into()),
            start_line: Some(1),
            end_line: Some(3),
            properties: Map::new(),
        }
    }

    #[test]
    fn decorator_route_is_extracted() {
        let node = make_node("create_order");
        let routes = extract(&node, "@app.post(\"/api/orders\")\ndef create_order():\n    pass\n");
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].method, "POST");
        assert_eq!(routes[0].path, "/api/orders");
        assert_eq!(routes[0].handler_ref.as_deref(), Some("create_order"));
    }

    #[test]
    fn websocket_decorator_sets_ws_protocol() {
        let node = make_node("stream");
        let routes = extract(&node, "@app.websocket(\"/ws/stream\")\nasync def stream():\n    pass\n");
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].method, "WS");
        assert_eq!(routes[0].protocol.as_deref(), Some("ws"));
    }

    #[test]
    fn unrelated_source_yields_no_routes() {
        let node = make_node("helper");
        assert!(extract(&node, "def helper():\n    return 1\n").is_empty());
    }
}
