//! Shared types produced and consumed by the HTTP/async link inference
//! pipeline (§4.5–§4.9): a discovered route registration, an outbound
//! call site, and a scored match between the two.

use crate::types::Label;

/// A route registration discovered by a framework-specific extractor
/// (§4.5), before handler-reference resolution and cross-file prefix
/// propagation (§4.6) have run.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteHandler {
    /// HTTP method, upper-cased (`"GET"`, …), `"WS"` for a websocket
    /// route, or empty for a method-agnostic registration (Spring's
    /// `@RequestMapping`, ASP.NET's bare `[Route]`).
    pub method: String,
    pub path: String,
    /// `Some("ws")` / `Some("sse")` when the extractor (or, failing
    /// that, a best-effort scan of the owning node's source) detected
    /// the protocol; `None` for an ordinary HTTP route.
    pub protocol: Option<String>,
    /// The raw identifier captured as this route's handler, before
    /// resolution — typically the owning node's own name, but a
    /// separately-named identifier for registrations that reference a
    /// handler elsewhere (Laravel's `Controller@method`, Go's
    /// `pkg.Handler`).
    pub handler_ref: Option<String>,
    /// Qualified name of the node `handler_ref` resolved to, once
    /// resolution has run (§4.5 "Handler-reference resolution").
    pub resolved_handler_qn: Option<String>,
    /// The node the route text was extracted from.
    pub owner_node_id: i64,
    pub owner_qn: String,
}

/// An outbound HTTP/async call site harvested from a node's declared
/// source (§4.7) or from a Module's `constants` property list.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpCallSite {
    pub caller_node_id: i64,
    pub caller_qn: String,
    pub caller_label: Label,
    pub url_path: String,
    pub method: Option<String>,
    pub is_async: bool,
}

/// A scored match between a call site and a route's resolved handler,
/// ready to become an HTTP_CALLS/ASYNC_CALLS edge (§4.9).
#[derive(Debug, Clone, PartialEq)]
pub struct HttpLink {
    pub caller_node_id: i64,
    pub handler_qn: String,
    pub url_path: String,
    pub method: Option<String>,
    pub confidence: f64,
    pub confidence_band: &'static str,
    pub is_async: bool,
}
