//! URL and JSON path harvesting from free-form source text (§4.8).

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

/// External domains excluded from full-URL extraction — third-party
/// endpoints are never call sites into a project we're linking.
const EXTERNAL_DOMAINS: &[&str] = &[
    "googleapis.com",
    "github.com",
    "aws.amazon.com",
    "amazonaws.com",
    "microsoft.com",
    "cloudflare.com",
    "npmjs.com",
    "docker.com",
    "w3.org",
];

static FULL_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r#"https?://([^/\s"'<>]+)((?:/[^\s"'<>]*)?)"#).unwrap());

static QUOTED_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r#"["'](/[^"'\s]{2,})["']"#).unwrap());

/// Harvest URL/path literals from `text`: full URLs (with a hard-coded
/// external-domain exclusion list), quoted path literals, and paths
/// embedded inside balanced JSON blocks found in the text — recursing
/// into every string value of any JSON successfully parsed out. Results
/// are deduplicated within this single call.
pub fn extract_paths(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    collect_paths(text, &mut seen, &mut out);
    out
}

fn collect_paths(text: &str, seen: &mut HashSet<String>, out: &mut Vec<String>) {
    for cap in FULL_URL.captures_iter(text) {
        let host = &cap[1];
        if is_external_domain(host) {
            continue;
        }
        let raw_path = cap.get(2).map(|m| m.as_str()).unwrap_or("");
        let path = if raw_path.is_empty() { "/".to_string() } else { raw_path.to_string() };
        push_unique(path, seen, out);
    }

    for cap in QUOTED_PATH.captures_iter(text) {
        push_unique(cap[1].to_string(), seen, out);
    }

    for block in find_balanced_json_blocks(text) {
        if let Ok(value) = serde_json::from_str::<Value>(&block) {
            walk_json_strings(&value, &mut |s| collect_paths(s, seen, out));
        }
    }
}

fn push_unique(path: String, seen: &mut HashSet<String>, out: &mut Vec<String>) {
    if seen.insert(path.clone()) {
        out.push(path);
    }
}

fn is_external_domain(host: &str) -> bool {
    let host = host.to_lowercase();
    EXTERNAL_DOMAINS
        .iter()
        .any(|d| host == *d || host.ends_with(&format!(".{d}")))
}

fn walk_json_strings(value: &Value, f: &mut impl FnMut(&str)) {
    match value {
        Value::String(s) => f(s),
        Value::Array(items) => {
            for item in items {
                walk_json_strings(item, f);
            }
        }
        Value::Object(map) => {
            for v in map.values() {
                walk_json_strings(v, f);
            }
        }
        _ => {}
    }
}

/// Locate top-level balanced `{…}`/`[…]` blocks with string-aware brace
/// counting (backslash-escaped quotes inside strings don't close the
/// string early, and braces inside strings don't count towards depth).
fn find_balanced_json_blocks(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut blocks = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' || bytes[i] == b'[' {
            if let Some(end) = find_matching_close(bytes, i) {
                blocks.push(text[i..=end].to_string());
                i = end + 1;
                continue;
            }
        }
        i += 1;
    }
    blocks
}

fn find_matching_close(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    let mut i = start;
    while i < bytes.len() {
        let c = bytes[i];
        if in_string {
            if escaped {
                escaped = false;
            } else if c == b'\\' {
                escaped = true;
            } else if c == b'"' {
                in_string = false;
            }
        } else {
            match c {
                b'"' => in_string = true,
                b'{' | b'[' => depth += 1,
                b'}' | b']' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_url_yields_path_only() {
        let paths = extract_paths(r#"const res = await fetch("https://internal.svc/api/orders");"#);
        assert_eq!(paths, vec!["/api/orders".to_string()]);
    }

    #[test]
    fn external_domain_is_excluded() {
        let paths = extract_paths(r#"fetch("https://storage.googleapis.com/bucket/file")"#);
        assert!(paths.is_empty());
    }

    #[test]
    fn quoted_path_literal_is_harvested() {
        let paths = extract_paths(r#"requests.post("/api/orders", data=payload)"#);
        assert_eq!(paths, vec!["/api/orders".to_string()]);
    }

    #[test]
    fn embedded_json_string_values_are_harvested() {
        let text = r#"let body = {"endpoint": "/api/orders", "nested": {"other": "/api/ship"}};"#;
        let paths = extract_paths(text);
        assert!(paths.contains(&"/api/orders".to_string()));
        assert!(paths.contains(&"/api/ship".to_string()));
    }

    #[test]
    fn duplicates_within_one_extraction_are_collapsed() {
        let text = r#""/api/orders" "/api/orders""#;
        assert_eq!(extract_paths(text), vec!["/api/orders".to_string()]);
    }

    #[test]
    fn escaped_quote_inside_json_string_does_not_break_brace_matching() {
        let text = r#"{"note": "a \"quoted\" value", "path": "/api/orders"}"#;
        let paths = extract_paths(text);
        assert!(paths.contains(&"/api/orders".to_string()));
    }
}
