//! PHP Laravel source-based route extraction (§4.5), matched both inside
//! function bodies and at module level (`routes/web.php`-style files with
//! no enclosing function).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::linker::model::RouteHandler;
use crate::types::Node;

static ROUTE_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"Route::(get|post|put|delete|patch)\(\s*["']([^"']+)["']\s*,\s*(?:\[([\w\\]+)::class\s*,\s*["'](\w+)["']\]|["']([\w\\]+)@(\w+)["'])"#,
    )
    .unwrap()
});

pub fn extract(node: &Node, source: &str) -> Vec<RouteHandler> {
    ROUTE_CALL
        .captures_iter(source)
        .map(|cap| {
            let (controller, handler_method) = if let Some(c) = cap.get(3) {
                (c.as_str(), cap.get(4).unwrap().as_str())
            } else {
                (cap.get(5).unwrap().as_str(), cap.get(6).unwrap().as_str())
            };
            RouteHandler {
                method: cap[1].to_uppercase(),
                path: cap[2].to_string(),
                protocol: None,
                // A dotted reference so the shared "last dot-separated
                // segment" resolution rule (§4.5) finds `handler_method`
                // by name regardless of PHP's `::`/`@` separators.
                handler_ref: Some(format!("{controller}.{handler_method}")),
                resolved_handler_qn: None,
                owner_node_id: node.id,
                owner_qn: node.qualified_name.clone(),
            }
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
            name: "web".into(),
            qualified_name: "routes.web".into(),
            file_path: Some("routes/web.php".into()),
            start_line: None,
            end_line: None,
            properties: Map::new(),
        }
    }

    #[test]
    fn controller_class_array_form_is_extracted() {
        let routes = extract(
            &make_node(),
            r#"Route::post('/api/orders', [OrderController::class, 'store']);"#,
        );
        assert_eq!(routes[0].method, "POST");
        assert_eq!(routes[0].path, "/api/orders");
        assert_eq!(routes[0].handler_ref.as_deref(), Some("OrderController.store"));
    }

    #[test]
    fn controller_at_method_form_is_extracted() {
        let routes = extract(&make_node(), r#"Route::get('/api/orders', 'OrderController@index');"#);
        assert_eq!(routes[0].method, "GET");
        assert_eq!(routes[0].handler_ref.as_deref(), Some("OrderController.index"));
    }
}
