//! Black-box call-site-to-route matching scenarios (§4.9).

use codegraph_engine::linker::matcher::match_links;
use codegraph_engine::linker::model::{HttpCallSite, HttpLink, RouteHandler};
use codegraph_engine::config::HttpLinkerConfig;
use codegraph_engine::Label;

fn call_site(qn: &str, path: &str, method: Option<&str>) -> HttpCallSite {
    HttpCallSite {
        caller_node_id: 1,
        caller_qn: qn.to_string(),
        caller_label: Label::Function,
        url_path: path.to_string(),
        method: method.map(str::to_string),
        is_async: false,
    }
}

fn route(owner_qn: &str, handler_qn: &str, path: &str, method: &str) -> RouteHandler {
    RouteHandler {
        method: method.to_string(),
        path: path.to_string(),
        protocol: None,
        handler_ref: Some("handler".to_string()),
        resolved_handler_qn: Some(handler_qn.to_string()),
        owner_node_id: 2,
        owner_qn: owner_qn.to_string(),
    }
}

#[test]
fn cross_service_exact_path_match_yields_high_confidence() {
    let sites = vec![call_site("payments.client.module.call", "/api/orders", Some("POST"))];
    let routes = vec![route("orders.handlers.module.owner", "orders.handlers.order.create", "/api/orders", "POST")];
    let links = match_links(&sites, &routes, &HttpLinkerConfig::default());
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].confidence_band, "high");
}

#[test]
fn unresolved_route_handler_never_produces_a_link() {
    let sites = vec![call_site("payments.client.module.call", "/api/orders", Some("POST"))];
    let mut unresolved = route("orders.handlers.module.owner", "unused", "/api/orders", "POST");
    unresolved.resolved_handler_qn = None;
    let links = match_links(&sites, &[unresolved], &HttpLinkerConfig::default());
    assert!(links.is_empty());
}

#[test]
fn method_mismatch_lowers_confidence_below_a_strict_threshold() {
    let sites = vec![call_site("payments.client.module.call", "/api/orders", Some("DELETE"))];
    let routes = vec![route("orders.handlers.module.owner", "orders.handlers.order.create", "/api/orders", "POST")];
    let mut config = HttpLinkerConfig::default();
    config.min_confidence = 0.85;
    let links = match_links(&sites, &routes, &config);
    assert!(links.is_empty());
}

#[test]
fn default_builtin_exclusions_suppress_health_check_links() {
    let sites = vec![call_site("payments.client.module.call", "/healthz", Some("GET"))];
    let routes = vec![route("orders.handlers.module.owner", "orders.handlers.health.check", "/healthz", "GET")];
    let links = match_links(&sites, &routes, &HttpLinkerConfig::default());
    assert!(links.is_empty());
}

#[test]
fn async_call_site_produces_an_async_flagged_link() {
    let mut site = call_site("payments.client.module.call", "/api/orders", None);
    site.is_async = true;
    let routes = vec![route("orders.handlers.module.owner", "orders.handlers.order.create", "/api/orders", "POST")];
    let links = match_links(&[site], &routes, &HttpLinkerConfig::default());
    assert_eq!(links.len(), 1);
    assert!(links[0].is_async);
}

#[test]
fn link_carries_through_the_matched_url_and_handler() {
    let sites = vec![call_site("payments.client.module.call", "/api/orders", Some("POST"))];
    let routes = vec![route("orders.handlers.module.owner", "orders.handlers.order.create", "/api/orders", "POST")];
    let links: Vec<HttpLink> = match_links(&sites, &routes, &HttpLinkerConfig::default());
    assert_eq!(links[0].handler_qn, "orders.handlers.order.create");
    assert_eq!(links[0].url_path, "/api/orders");
}
