//! Call-site-to-route matching and confidence scoring (§4.9).
//!
//! O(routes × call sites) per project; fine at the scale this crate
//! targets (§9 notes pre-bucketing by normalised-path first segment as a
//! future optimisation if fan-out becomes a problem).

use std::collections::HashSet;

use crate::config::HttpLinkerConfig;
use crate::types::Label;

use super::model::{HttpCallSite, HttpLink, RouteHandler};

/// `true` when `a` and `b` belong to the same service: stripping the
/// last two dot-separated segments from each QN yields an identical
/// prefix. QNs with two or fewer segments never match (§4.9 step 1).
pub fn same_service(a: &str, b: &str) -> bool {
    fn prefix(qn: &str) -> Option<String> {
        let segments: Vec<&str> = qn.split('.').collect();
        if segments.len() <= 2 {
            None
        } else {
            Some(segments[..segments.len() - 2].join("."))
        }
    }
    matches!((prefix(a), prefix(b)), (Some(pa), Some(pb)) if pa == pb)
}

/// Lowercase, strip a trailing slash, and replace parameter/UUID/numeric
/// segments with `*` (§4.9 "Path normalisation").
pub fn normalize_path(path: &str) -> String {
    let lower = path.to_lowercase();
    let trimmed = lower.strip_suffix('/').unwrap_or(&lower);
    trimmed.split('/').map(normalize_segment).collect::<Vec<_>>().join("/")
}

fn normalize_segment(segment: &str) -> &str {
    if is_param_segment(segment) || is_numeric(segment) || is_uuid(segment) {
        "*"
    } else {
        segment
    }
}

fn is_param_segment(segment: &str) -> bool {
    (segment.starts_with(':') && segment.len() > 1)
        || (segment.starts_with('{') && segment.ends_with('}') && segment.len() > 2)
}

fn is_numeric(segment: &str) -> bool {
    !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit())
}

fn is_uuid(segment: &str) -> bool {
    let parts: Vec<&str> = segment.split('-').collect();
    parts.len() == 5
        && [8usize, 4, 4, 4, 12]
            .iter()
            .zip(&parts)
            .all(|(len, p)| p.len() == *len && p.chars().all(|c| c.is_ascii_hexdigit()))
}

/// §4.9 "pathMatchScore": 0 when the two paths cannot be reconciled at
/// all, otherwise a score favouring an exact normalised match over a
/// suffix match over a wildcard-tolerant segment-by-segment match,
/// weighted by segment overlap (Jaccard) and path depth.
pub fn path_match_score(call_path: &str, route_path: &str) -> f64 {
    let call_norm = normalize_path(call_path);
    let route_norm = normalize_path(route_path);

    let match_base = if call_norm == route_norm {
        0.95
    } else if !route_norm.is_empty() && call_norm.ends_with(&route_norm) {
        0.75
    } else {
        let call_segments: Vec<&str> = call_norm.split('/').filter(|s| !s.is_empty()).collect();
        let route_segments: Vec<&str> = route_norm.split('/').filter(|s| !s.is_empty()).collect();
        if call_segments.len() != route_segments.len() {
            return 0.0;
        }
        let all_match = call_segments
            .iter()
            .zip(&route_segments)
            .all(|(a, b)| a == b || *a == "*" || *b == "*");
        if !all_match {
            return 0.0;
        }
        0.55
    };

    let call_segments: Vec<&str> = call_norm.split('/').filter(|s| !s.is_empty()).collect();
    let route_segments: Vec<&str> = route_norm.split('/').filter(|s| !s.is_empty()).collect();

    let non_wildcard = |segs: &[&str]| -> HashSet<&str> { segs.iter().copied().filter(|s| *s != "*").collect() };
    let a = non_wildcard(&call_segments);
    let b = non_wildcard(&route_segments);
    let intersection = a.intersection(&b).count();
    let union = a.union(&b).count();
    let jaccard = if union == 0 { 1.0 } else { intersection as f64 / union as f64 };

    let depth_factor = (call_segments.len().max(route_segments.len()) as f64 / 3.0).min(1.0);

    (match_base * (0.5 * jaccard + 0.5 * depth_factor)).min(1.0)
}

/// +0.10 when both methods are known and equal, -0.15 when both are
/// known and differ, 0 when either is unknown (§4.9 "methodBonus").
pub fn method_bonus(call_method: Option<&str>, route_method: Option<&str>) -> f64 {
    match (call_method, route_method) {
        (Some(c), Some(r)) if !r.is_empty() => {
            if c.eq_ignore_ascii_case(r) {
                0.10
            } else {
                -0.15
            }
        }
        _ => 0.0,
    }
}

/// 1.0 for a Function/Method call site, 0.85 for a Module-constant call
/// site — a URL found in a function body is more trustworthy evidence
/// than one found in a config constant (§4.9 "sourceWeight").
pub fn source_weight(label: &Label) -> f64 {
    match label {
        Label::Module => 0.85,
        _ => 1.0,
    }
}

pub fn confidence_band(score: f64) -> &'static str {
    if score >= 0.70 {
        "high"
    } else if score >= 0.45 {
        "medium"
    } else if score >= 0.25 {
        "speculative"
    } else {
        ""
    }
}

fn exclude_key(path: &str) -> String {
    let lower = path.to_lowercase();
    lower.strip_suffix('/').unwrap_or(&lower).to_string()
}

/// Match every call site against every resolved route, scoring and
/// filtering per the §4.9 algorithm. Routes whose handler never resolved
/// are skipped entirely — there is nothing to link to.
pub fn match_links(call_sites: &[HttpCallSite], routes: &[RouteHandler], config: &HttpLinkerConfig) -> Vec<HttpLink> {
    let exclude_paths = config.merged_exclude_paths();
    let mut links = Vec::new();

    for site in call_sites {
        for route in routes {
            let Some(handler_qn) = &route.resolved_handler_qn else { continue };

            if same_service(&site.caller_qn, handler_qn) {
                continue;
            }
            if exclude_paths.contains(&exclude_key(&route.path)) {
                continue;
            }

            let path_score = path_match_score(&site.url_path, &route.path);
            if path_score <= 0.0 {
                continue;
            }

            let route_method = if route.method.is_empty() { None } else { Some(route.method.as_str()) };
            let score = (path_score * source_weight(&site.caller_label)
                + method_bonus(site.method.as_deref(), route_method))
            .min(1.0);

            if score < config.min_confidence {
                continue;
            }

            links.push(HttpLink {
                caller_node_id: site.caller_node_id,
                handler_qn: handler_qn.clone(),
                url_path: site.url_path.clone(),
                method: site.method.clone().or_else(|| route_method.map(str::to_string)),
                confidence: score,
                confidence_band: confidence_band(score),
                is_async: site.is_async,
            });
        }
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_service_requires_matching_directory_prefix() {
        assert!(same_service("a.b.c.m.f", "a.b.c.m.g"));
        assert!(!same_service("a.b.c.m.f", "a.b.x.m.g"));
        assert!(!same_service("a.b", "a.b"));
    }

    #[test]
    fn path_normalisation_matches_the_documented_examples() {
        assert_eq!(normalize_path("/API/Orders/"), "/api/orders");
        assert_eq!(normalize_path("/api/orders/:id"), "/api/orders/*");
        assert_eq!(normalize_path("/api/orders/{id}"), "/api/orders/*");
        assert_eq!(normalize_path("/api/orders/123"), "/api/orders/*");
    }

    #[test]
    fn scoring_is_monotonic_exact_over_suffix_over_wildcard() {
        let exact = path_match_score("/api/orders", "/api/orders");
        let suffix = path_match_score("/v1/api/orders", "/api/orders");
        // Neither equal-after-normalisation nor a suffix match: the third
        // segment only reconciles because one side normalises to `*`.
        let wildcard = path_match_score("/api/orders/123", "/api/orders/active");
        assert!(exact > suffix);
        assert!(suffix > wildcard);
    }

    #[test]
    fn mismatched_segment_count_scores_zero() {
        assert_eq!(path_match_score("/api/orders/extra/segment", "/api/orders"), 0.0);
    }

    #[test]
    fn method_bonus_rewards_match_and_penalises_mismatch() {
        assert_eq!(method_bonus(Some("POST"), Some("POST")), 0.10);
        assert_eq!(method_bonus(Some("POST"), Some("GET")), -0.15);
        assert_eq!(method_bonus(None, Some("GET")), 0.0);
    }

    #[test]
    fn confidence_bands_match_their_thresholds() {
        assert_eq!(confidence_band(0.9), "high");
        assert_eq!(confidence_band(0.5), "medium");
        assert_eq!(confidence_band(0.3), "speculative");
        assert_eq!(confidence_band(0.1), "");
    }

    fn call_site(qn: &str, path: &str) -> HttpCallSite {
        HttpCallSite {
            caller_node_id: 1,
            caller_qn: qn.to_string(),
            caller_label: Label::Module,
            url_path: path.to_string(),
            method: Some("POST".to_string()),
            is_async: false,
        }
    }

    fn route(owner_qn: &str, handler_qn: &str, path: &str) -> RouteHandler {
        RouteHandler {
            method: "POST".to_string(),
            path: path.to_string(),
            protocol: None,
            handler_ref: Some("handler".to_string()),
            resolved_handler_qn: Some(handler_qn.to_string()),
            owner_node_id: 2,
            owner_qn: owner_qn.to_string(),
        }
    }

    #[test]
    fn same_service_pairs_are_suppressed_regardless_of_path_match() {
        let sites = vec![call_site("svc.orders.module.URL", "/api/orders")];
        let routes = vec![route("svc.orders.handlers.handle", "svc.orders.handlers.handle", "/api/orders")];
        let config = HttpLinkerConfig::default();
        assert!(match_links(&sites, &routes, &config).is_empty());
    }

    #[test]
    fn cross_service_match_emits_a_link_above_the_confidence_floor() {
        let sites = vec![call_site("svc.payments.config.module.URL", "/api/orders")];
        let routes = vec![route(
            "svc.orders.handlers.order.handle",
            "svc.orders.handlers.order.handle",
            "/api/orders",
        )];
        let config = HttpLinkerConfig::default();
        let links = match_links(&sites, &routes, &config);
        assert_eq!(links.len(), 1);
        assert!(links[0].confidence >= config.min_confidence);
    }

    #[test]
    fn excluded_path_never_links() {
        let sites = vec![call_site("svc.payments.config.module.URL", "/healthz")];
        let routes = vec![route("svc.orders.handlers.health.check", "svc.orders.handlers.health.check", "/healthz")];
        let config = HttpLinkerConfig::default();
        assert!(match_links(&sites, &routes, &config).is_empty());
    }
}
