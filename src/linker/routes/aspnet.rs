//! C# ASP.NET attribute route extraction (§4.5).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::linker::model::RouteHandler;
use crate::types::Node;

static HTTP_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\[Http(Get|Post|Put|Delete|Patch)\(\s*"([^"]+)"\s*\)\]"#).unwrap());

static ROUTE_ATTR: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\[Route\(\s*"([^"]+)"\s*\)\]"#).unwrap());

pub fn extract(node: &Node, source: &str) -> Vec<RouteHandler> {
    let mut routes: Vec<RouteHandler> = HTTP_ATTR
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

    routes.extend(ROUTE_ATTR.captures_iter(source).map(|cap| RouteHandler {
        method: String::new(),
        path: cap[1].to_string(),
        protocol: None,
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

    fn make_node() -> Node {
        Node {
            id: 1,
            project: "p".into(),
            label: Label::Method,
            name: "GetOrder".into(),
            qualified_name: "Api.OrdersController.GetOrder".into(),
            file_path: Some("OrdersController.cs".into()),
            start_line: Some(20),
            end_line: Some(24),
            properties: Map::new(),
        }
    }

    #[test]
    fn http_get_attribute_is_extracted() {
        let routes = extract(&make_node(), "[HttpGet(\"/api/orders/{id}\")]\npublic Order GetOrder() {}");
        assert_eq!(routes[0].method, "GET");
        assert_eq!(routes[0].path, "/api/orders/{id}");
    }

    #[test]
    fn bare_route_attribute_has_no_method() {
        let routes = extract(&make_node(), "[Route(\"/api/orders\")]\npublic Order GetOrder() {}");
        assert_eq!(routes[0].method, "");
    }
}
