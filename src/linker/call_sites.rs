//! Outbound HTTP/async call-site extraction (§4.7): harvest request
//! expressions from a Function/Method's declared source, or URL literals
//! from a Module's `constants` property list.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::model::HttpCallSite;
use super::path_extractor::extract_paths;
use crate::types::{Label, Node};

const HTTP_CLIENT_KEYWORDS: &[&str] = &[
    "requests.post",
    "requests.get",
    "requests.put",
    "requests.delete",
    "requests.patch",
    "http.NewRequest",
    "fetch(",
    "axios.",
    "HttpClient",
    "RestTemplate",
    "reqwest::",
    "curl_exec",
    "OkHttpClient",
    "WebClient",
];

const ASYNC_DISPATCH_KEYWORDS: &[&str] =
    &["CreateTask", "topic.Publish", "sqs.send_message", "sns.publish", "basic_publish", "producer.send"];

static DUNDER_METHOD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^__\w+__$").unwrap());

static REQUESTS_METHOD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)requests\.(get|post|put|delete|patch)\(").unwrap());
static METHOD_KV: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"method\s*:\s*["'](GET|POST|PUT|DELETE|PATCH)["']|HttpMethod\.(GET|POST|PUT|DELETE|PATCH)"#).unwrap()
});
static QUOTED_METHOD: Lazy<Regex> = Lazy::new(|| Regex::new(r#"["'](GET|POST|PUT|DELETE|PATCH)["']"#).unwrap());
static HTTP_DOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"http\.").unwrap());
static DOT_METHOD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.(get|post|put|delete|patch)\(").unwrap());
static CURL_METHOD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"CURLOPT_CUSTOMREQUEST\s*,\s*["'](GET|POST|PUT|DELETE|PATCH)["']"#).unwrap());

/// Proximity window (bytes) within which a quoted method literal is
/// considered "near" an `http.` token (§4.7).
const METHOD_PROXIMITY: usize = 40;

/// Extract outbound call sites from `node`. `source` is the node's
/// declared-line source text for Function/Method nodes; `None` (or
/// ignored) for Module nodes, which instead contribute call sites from
/// their `constants` property.
pub fn extract_call_sites(node: &Node, source: Option<&str>) -> Vec<HttpCallSite> {
    match node.label {
        Label::Module => extract_from_module_constants(node),
        _ => extract_from_function_source(node, source),
    }
}

fn extract_from_module_constants(node: &Node) -> Vec<HttpCallSite> {
    let Some(Value::Array(constants)) = node.properties.get("constants") else {
        return Vec::new();
    };

    let mut sites = Vec::new();
    for constant in constants {
        let Some(text) = constant.as_str() else { continue };
        for path in extract_paths(text) {
            sites.push(HttpCallSite {
                caller_node_id: node.id,
                caller_qn: node.qualified_name.clone(),
                caller_label: node.label.clone(),
                url_path: path,
                method: None,
                is_async: false,
            });
        }
    }
    sites
}

fn extract_from_function_source(node: &Node, source: Option<&str>) -> Vec<HttpCallSite> {
    if DUNDER_METHOD.is_match(&node.name) {
        return Vec::new();
    }
    let Some(source) = source else { return Vec::new() };

    let has_http_client = HTTP_CLIENT_KEYWORDS.iter().any(|kw| source.contains(kw));
    let has_async_dispatch = ASYNC_DISPATCH_KEYWORDS.iter().any(|kw| source.contains(kw));
    if !has_http_client && !has_async_dispatch {
        return Vec::new();
    }
    // Sync wins ties: only treat the site as async when no sync client
    // keyword also matched (§4.7).
    let is_async = has_async_dispatch && !has_http_client;
    let method = detect_method(source);

    extract_paths(source)
        .into_iter()
        .map(|path| HttpCallSite {
            caller_node_id: node.id,
            caller_qn: node.qualified_name.clone(),
            caller_label: node.label.clone(),
            url_path: path,
            method: method.clone(),
            is_async,
        })
        .collect()
}

/// Best-effort method detection from nearby tokens (§4.7), tried in order
/// of specificity: `requests.POST(`, a `method`/`HttpMethod` key-value, a
/// quoted method literal textually near an `http.` token, a generic
/// `.post(`-style call, and finally libcurl's `CURLOPT_CUSTOMREQUEST`.
fn detect_method(source: &str) -> Option<String> {
    if let Some(cap) = REQUESTS_METHOD.captures(source) {
        return Some(cap[1].to_uppercase());
    }
    if let Some(cap) = METHOD_KV.captures(source) {
        return cap.get(1).or_else(|| cap.get(2)).map(|m| m.as_str().to_uppercase());
    }
    for m in QUOTED_METHOD.captures_iter(source) {
        let whole = m.get(0).unwrap();
        let near = HTTP_DOT.find_iter(source).any(|h| {
            let dist = if h.start() >= whole.end() {
                h.start() - whole.end()
            } else {
                whole.start().saturating_sub(h.end())
            };
            dist < METHOD_PROXIMITY
        });
        if near {
            return Some(m[1].to_uppercase());
        }
    }
    if let Some(cap) = DOT_METHOD.captures(source) {
        return Some(cap[1].to_uppercase());
    }
    if let Some(cap) = CURL_METHOD.captures(source) {
        return Some(cap[1].to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn make_function(name: &str) -> Node {
        Node {
            id: 1,
            project: "p".into(),
            label: Label::Function,
            name: name.into(),
            qualified_name: format!("svc.{name}"),
            file_path: Some("svc.py".into()),
            start_line: Some(1),
            end_line: Some(5),
            properties: Map::new(),
        }
    }

    #[test]
    fn http_client_keyword_with_path_is_a_sync_call_site() {
        let node = make_function("place_order");
        let sites = extract_call_sites(&node, Some(r#"requests.post("/api/orders", json=payload)"#));
        assert_eq!(sites.len(), 1);
        assert!(!sites[0].is_async);
        assert_eq!(sites[0].url_path, "/api/orders");
        assert_eq!(sites[0].method.as_deref(), Some("POST"));
    }

    #[test]
    fn async_dispatch_keyword_alone_marks_site_async() {
        let node = make_function("publish");
        let sites = extract_call_sites(&node, Some(r#"sqs.send_message(QueueUrl="/api/orders-queue")"#));
        assert_eq!(sites.len(), 1);
        assert!(sites[0].is_async);
    }

    #[test]
    fn sync_keyword_wins_over_async_keyword() {
        let node = make_function("both");
        let sites = extract_call_sites(
            &node,
            Some(r#"requests.post("/api/orders"); sqs.send_message(QueueUrl="/ignored")"#),
        );
        assert!(sites.iter().all(|s| !s.is_async));
    }

    #[test]
    fn no_client_keyword_yields_no_call_sites() {
        let node = make_function("helper");
        assert!(extract_call_sites(&node, Some(r#"return "/api/orders""#)).is_empty());
    }

    #[test]
    fn dunder_method_is_skipped() {
        let node = make_function("__init__");
        assert!(extract_call_sites(&node, Some(r#"requests.post("/api/orders")"#)).is_empty());
    }

    #[test]
    fn module_constants_are_harvested() {
        let mut node = make_function("config");
        node.label = Label::Module;
        node.properties.insert(
            "constants".to_string(),
            json!(["https://api.example.com/api/orders", "not a url"]),
        );
        let sites = extract_call_sites(&node, None);
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].url_path, "/api/orders");
    }
}
