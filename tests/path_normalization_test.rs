//! Black-box path-harvesting and normalisation scenarios (§4.8, §4.9),
//! exercised together as a call site's raw literal would actually flow
//! through the pipeline: extracted from source text, then normalised for
//! matching.

use codegraph_engine::linker::matcher::normalize_path;
use codegraph_engine::linker::path_extractor::extract_paths;

#[test]
fn a_harvested_path_with_a_trailing_slash_normalizes_to_match_its_bare_route() {
    let harvested = extract_paths(r#"axios.get("https://internal.svc/api/orders/")"#);
    assert_eq!(harvested, vec!["/api/orders/".to_string()]);
    assert_eq!(normalize_path(&harvested[0]), normalize_path("/api/orders"));
}

#[test]
fn harvested_numeric_id_segment_normalizes_the_same_as_a_route_param_placeholder() {
    let harvested = extract_paths(r#"fetch("/api/orders/482")"#);
    assert_eq!(normalize_path(&harvested[0]), normalize_path("/api/orders/:id"));
    assert_eq!(normalize_path(&harvested[0]), normalize_path("/api/orders/{id}"));
}

#[test]
fn harvested_uuid_segment_normalizes_to_a_wildcard() {
    let harvested = extract_paths(r#"requests.get("/api/orders/550e8400-e29b-41d4-a716-446655440000")"#);
    assert_eq!(normalize_path(&harvested[0]), "/api/orders/*");
}

#[test]
fn mixed_case_path_literals_from_different_call_sites_normalize_identically() {
    let a = extract_paths(r#"fetch("/API/Orders")"#);
    let b = extract_paths(r#"fetch("/api/orders")"#);
    assert_eq!(normalize_path(&a[0]), normalize_path(&b[0]));
}

#[test]
fn a_short_numeric_looking_segment_that_is_not_purely_digits_is_left_alone() {
    assert_eq!(normalize_path("/api/v2/orders"), "/api/v2/orders");
}

#[test]
fn paths_nested_two_levels_deep_inside_a_json_payload_still_normalize() {
    let text = r#"{"routes": [{"path": "/API/Orders/42"}, {"path": "/api/orders/:id"}]}"#;
    let harvested = extract_paths(text);
    assert_eq!(harvested.len(), 2);
    assert_eq!(normalize_path(&harvested[0]), normalize_path(&harvested[1]));
}
