//! HTTP/async link inference (§4.5–§4.9): discover route registrations and
//! outbound call sites from every project's own source, match them, and
//! materialize Route nodes, HANDLES edges, and HTTP_CALLS/ASYNC_CALLS
//! edges back into the store.
//!
//! Per-node and per-file failures (an unreadable source range, a route
//! whose handler reference never resolves, a stale upsert id) are
//! non-fatal — logged and skipped, so one bad file never aborts a whole
//! run (§7). Only a missing project or a store error outside those
//! per-item boundaries surfaces as a [`LinkerError`].

pub mod call_sites;
pub mod matcher;
pub mod model;
pub mod path_extractor;
pub mod prefix_resolver;
pub mod routes;

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, instrument, warn};

use crate::config::HttpLinkerConfig;
use crate::error::LinkerError;
use crate::store::Store;
use crate::types::{EdgeDraft, Label, Node, NodeDraft};

use model::{HttpCallSite, HttpLink, RouteHandler};

const WS_PATTERNS: &[&str] = &["websocket.Upgrade", "ws.on(\"connection", "ws.OnConnection", "UpgradeToWebSocket"];
const SSE_PATTERNS: &[&str] = &["text/event-stream", "EventSourceResponse", "SseEmitter"];

/// Run one full link-inference pass over `project`: extract routes and
/// call sites from every Function/Method/Module node, resolve cross-file
/// prefixes, match, and upsert the resulting Route nodes and edges.
/// Returns the number of Route nodes successfully emitted.
#[instrument(skip(store, config))]
pub async fn run_link_inference(store: &dyn Store, project: &str, config: &HttpLinkerConfig) -> Result<usize, LinkerError> {
    let project_info = store
        .get_project(project)
        .await?
        .ok_or_else(|| LinkerError::Config(format!("unknown project '{project}'")))?;

    let mut nodes = Vec::new();
    for label in [Label::Function, Label::Method, Label::Module] {
        nodes.extend(store.find_nodes_by_label(project, label.as_str()).await?);
    }
    let nodes_by_id: HashMap<i64, Node> = nodes.iter().map(|n| (n.id, n.clone())).collect();

    let mut all_routes: Vec<RouteHandler> = Vec::new();
    let mut call_sites: Vec<HttpCallSite> = Vec::new();

    for node in &nodes {
        let source = read_node_source(node, &project_info.root);

        if matches!(node.label, Label::Function | Label::Method | Label::Module) {
            if let Some(src) = &source {
                let mut extracted = routes::extract_all(node, src);
                for route in extracted.iter_mut() {
                    if route.protocol.is_none() {
                        route.protocol = detect_protocol(src);
                    }
                }
                all_routes.extend(extracted);
            }
        }

        call_sites.extend(call_sites::extract_call_sites(node, source.as_deref()));
    }

    resolve_handler_refs(store, project, &mut all_routes).await?;
    prefix_resolver::resolve_prefixes(store, project, &mut all_routes, &nodes_by_id, &project_info.root).await?;

    let links = matcher::match_links(&call_sites, &all_routes, config);

    let mut emitted = 0;
    for route in &all_routes {
        let Some(handler_qn) = route.resolved_handler_qn.clone() else {
            debug!(project, path = %route.path, "route handler never resolved, skipping");
            continue;
        };
        match emit_route(store, project, route, &handler_qn).await {
            Ok(()) => emitted += 1,
            Err(e) => warn!(project, path = %route.path, error = %e, "failed to emit route/HANDLES edge"),
        }
    }

    for link in &links {
        if let Err(e) = emit_link(store, project, link, &nodes_by_id).await {
            warn!(project, url_path = %link.url_path, error = %e, "failed to emit HTTP call edge");
        }
    }

    Ok(emitted)
}

/// Resolve each route's `handler_ref` (the last dot-separated segment of
/// whatever identifier the extractor captured) to a concrete node's
/// qualified name by name lookup (§4.5 "Handler-reference resolution").
async fn resolve_handler_refs(store: &dyn Store, project: &str, routes: &mut [RouteHandler]) -> Result<(), LinkerError> {
    for route in routes.iter_mut() {
        let Some(handler_ref) = &route.handler_ref else { continue };
        let name = handler_ref.rsplit('.').next().unwrap_or(handler_ref.as_str());
        let matches = store.find_nodes_by_name(project, name).await?;
        if let Some(first) = matches.into_iter().next() {
            route.resolved_handler_qn = Some(first.qualified_name);
        }
    }
    Ok(())
}

fn detect_protocol(source: &str) -> Option<String> {
    if WS_PATTERNS.iter().any(|p| source.contains(p)) {
        Some("ws".to_string())
    } else if SSE_PATTERNS.iter().any(|p| source.contains(p)) {
        Some("sse".to_string())
    } else {
        None
    }
}

fn slugify(path: &str) -> String {
    let slug: String = path
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    slug.trim_matches('-').to_string()
}

/// Upsert the Route node for `route` and a HANDLES edge from its resolved
/// handler, marking the handler `is_entry_point=true` (§4.9 "Route-node
/// and HANDLES edge emission").
async fn emit_route(store: &dyn Store, project: &str, route: &RouteHandler, handler_qn: &str) -> Result<(), LinkerError> {
    let handler = store
        .find_node_by_qn(project, handler_qn)
        .await?
        .ok_or_else(|| LinkerError::Config(format!("resolved handler '{handler_qn}' not found")))?;

    let slug = slugify(&route.path);
    let method_slug = if route.method.is_empty() { "any".to_string() } else { route.method.to_lowercase() };
    let route_qn = format!("{handler_qn}.route.{method_slug}.{slug}");

    let mut properties = serde_json::Map::new();
    properties.insert("method".to_string(), serde_json::Value::String(route.method.clone()));
    properties.insert("path".to_string(), serde_json::Value::String(route.path.clone()));
    properties.insert("handler".to_string(), serde_json::Value::String(handler_qn.to_string()));
    if let Some(protocol) = &route.protocol {
        properties.insert("protocol".to_string(), serde_json::Value::String(protocol.clone()));
    }

    let route_draft = NodeDraft {
        project: project.to_string(),
        label: Label::Route,
        name: format!("{} {}", route.method, route.path).trim().to_string(),
        qualified_name: route_qn,
        file_path: handler.file_path.clone(),
        start_line: handler.start_line,
        end_line: handler.end_line,
        properties,
    };
    let route_id = store.upsert_node(&route_draft).await?;

    store
        .insert_edge(&EdgeDraft {
            project: project.to_string(),
            source_id: handler.id,
            target_id: route_id,
            edge_type: "HANDLES".to_string(),
            properties: serde_json::Map::new(),
        })
        .await?;

    let mut handler_properties = handler.properties.clone();
    handler_properties.insert("is_entry_point".to_string(), serde_json::Value::Bool(true));
    store
        .upsert_node(&NodeDraft {
            project: project.to_string(),
            label: handler.label.clone(),
            name: handler.name.clone(),
            qualified_name: handler.qualified_name.clone(),
            file_path: handler.file_path.clone(),
            start_line: handler.start_line,
            end_line: handler.end_line,
            properties: handler_properties,
        })
        .await?;

    Ok(())
}

/// Insert the HTTP_CALLS/ASYNC_CALLS edge for a matched link.
async fn emit_link(store: &dyn Store, project: &str, link: &HttpLink, nodes_by_id: &HashMap<i64, Node>) -> Result<(), LinkerError> {
    if !nodes_by_id.contains_key(&link.caller_node_id) {
        return Ok(());
    }
    let Some(handler) = store.find_node_by_qn(project, &link.handler_qn).await? else {
        return Ok(());
    };

    let mut properties = serde_json::Map::new();
    properties.insert("url_path".to_string(), serde_json::Value::String(link.url_path.clone()));
    properties.insert(
        "confidence".to_string(),
        serde_json::Number::from_f64(link.confidence)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
    );
    properties.insert("confidence_band".to_string(), serde_json::Value::String(link.confidence_band.to_string()));
    if let Some(method) = &link.method {
        properties.insert("method".to_string(), serde_json::Value::String(method.clone()));
    }

    let edge_type = if link.is_async { "ASYNC_CALLS" } else { "HTTP_CALLS" };

    store
        .insert_edge(&EdgeDraft {
            project: project.to_string(),
            source_id: link.caller_node_id,
            target_id: handler.id,
            edge_type: edge_type.to_string(),
            properties,
        })
        .await?;

    Ok(())
}

/// Read a node's declared source: the whole file for a Module node, or
/// just the `[start_line, end_line]` (1-indexed, inclusive) range for a
/// Function/Method. A missing file or out-of-range line numbers yield
/// `None` rather than an error — per §7 this is non-fatal, the affected
/// node simply contributes no routes or call sites.
pub(crate) fn read_node_source(node: &Node, project_root: &str) -> Option<String> {
    let file_path = node.file_path.as_ref()?;
    let full_path = Path::new(project_root).join(file_path);
    let contents = match std::fs::read_to_string(&full_path) {
        Ok(c) => c,
        Err(e) => {
            debug!(path = %full_path.display(), error = %e, "could not read node source");
            return None;
        }
    };

    if matches!(node.label, Label::Module) {
        return Some(contents);
    }

    let total_lines = contents.lines().count();
    let start = node.start_line? as usize;
    let end = (node.end_line? as usize).min(total_lines);
    if start == 0 || start > end {
        return None;
    }
    Some(contents.lines().collect::<Vec<_>>()[start - 1..end].join("\n"))
}
