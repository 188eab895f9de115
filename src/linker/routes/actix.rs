//! Rust Actix-web attribute route extraction (§4.5).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::linker::model::RouteHandler;
use crate::types::Node;

static ATTR: Lazy<Regex> = Lazy::new(|| Regex::new(r#"#\[(get|post|put|delete|patch)\(\s*"([^"]+)"\s*\)\]"#).unwrap());

pub fn extract(node: &Node, source: &str) -> Vec<RouteHandler> {
    ATTR.captures_iter(source)
        .map(|cap| RouteHandler {
            method: cap[1].to_uppercase(),
            path: cap[2].to_string(),
            protocol: None,
            handler_ref: Some(node.name.clone()),
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

    #[test]
    fn attribute_route_is_extracted() {
        let node = Node {
            id: 1,
            project: "p".into(),
            label: Label::Function,
            name: "create_order".into(),
            qualified_name: "handlers.create_order".into(),
            file_path: Some("handlers.rs".into()),
            start_line: Some(1),
            end_line: Some(5),
            properties: Map::new(),
        };
        let routes = extract(&node, "#[post(\"/api/orders\")]\nasync fn create_order() {}");
        assert_eq!(routes[0].method, "POST");
        assert_eq!(routes[0].path, "/api/orders");
    }
}
