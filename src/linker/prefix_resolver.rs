//! Cross-file route-prefix propagation (§4.6): a gin route group
//! registered in one function and applied to routes declared in a
//! different function reached via a CALLS edge; FastAPI's
//! `include_router`; Express's `app.use`. All three are idempotent —
//! a route already starting with the prefix being applied is untouched.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use super::model::RouteHandler;
use super::read_node_source;
use crate::error::StoreError;
use crate::store::Store;
use crate::types::Node;

static GIN_GROUP_DIRECT: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(\w+)\(\s*[^)]*\.Group\(\s*"([^"]+)"\s*\)"#).unwrap());
static GIN_GROUP_VAR: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(\w+)\s*:=\s*\w+\.Group\(\s*"([^"]+)"\s*\)"#).unwrap());
static GIN_CALL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w+)\(\s*(\w+)\s*\)").unwrap());

static INCLUDE_ROUTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\w+\.include_router\(\s*(\w+)\s*,\s*prefix\s*=\s*["']([^"']+)["']"#).unwrap());
static PY_IMPORT: Lazy<Regex> = Lazy::new(|| Regex::new(r"from\s+([\w.]+)\s+import\s+(\w+)").unwrap());

static APP_USE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"app\.use\(\s*["']([^"']+)["']\s*,\s*(\w+)\s*\)"#).unwrap());
static JS_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?:require\(\s*["']([^"']+)["']\s*\)|from\s+["']([^"']+)["'])"#).unwrap());

/// Apply every cross-file prefix-propagation rule to `routes` in place.
pub async fn resolve_prefixes(
    store: &dyn Store,
    project: &str,
    routes: &mut [RouteHandler],
    nodes_by_id: &HashMap<i64, Node>,
    project_root: &str,
) -> Result<(), StoreError> {
    resolve_gin_groups(store, project, routes, nodes_by_id, project_root).await?;
    resolve_fastapi_include_router(routes, nodes_by_id, project_root);
    resolve_express_app_use(routes, nodes_by_id, project_root);
    Ok(())
}

fn prepend_if_missing(path: &mut String, prefix: &str) {
    if !prefix.is_empty() && !path.starts_with(prefix) {
        *path = format!("{prefix}{path}");
    }
}

/// Examine every function that registered at least one route's
/// CALLS-inbound edges; if the caller's source shows it invoking the
/// owner directly inside a `.Group("/prefix")` call, or assigning the
/// group to a variable later passed to the owner, prepend that prefix to
/// every route the owner registered.
async fn resolve_gin_groups(
    store: &dyn Store,
    project: &str,
    routes: &mut [RouteHandler],
    nodes_by_id: &HashMap<i64, Node>,
    project_root: &str,
) -> Result<(), StoreError> {
    let owner_ids: Vec<i64> = {
        let mut ids: Vec<i64> = routes.iter().map(|r| r.owner_node_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    };

    let mut prefix_by_owner: HashMap<i64, String> = HashMap::new();
    for owner_id in owner_ids {
        let Some(owner) = nodes_by_id.get(&owner_id) else { continue };
        let callers = store.find_edges_by_target_and_type(owner_id, "CALLS").await?;
        for edge in callers {
            let Some(caller) = nodes_by_id.get(&edge.source_id) else { continue };
            let Some(caller_source) = read_node_source(caller, project_root) else { continue };

            if let Some(cap) = GIN_GROUP_DIRECT
                .captures_iter(&caller_source)
                .find(|cap| cap[1] == owner.name)
            {
                prefix_by_owner.insert(owner_id, cap[2].to_string());
                continue;
            }

            let mut var_prefixes: HashMap<String, String> = HashMap::new();
            for cap in GIN_GROUP_VAR.captures_iter(&caller_source) {
                var_prefixes.insert(cap[1].to_string(), cap[2].to_string());
            }
            if let Some(cap) = GIN_CALL
                .captures_iter(&caller_source)
                .find(|cap| cap[1] == owner.name && var_prefixes.contains_key(&cap[2]))
            {
                prefix_by_owner.insert(owner_id, var_prefixes[&cap[2]].clone());
            }
        }
    }

    for route in routes.iter_mut() {
        if let Some(prefix) = prefix_by_owner.get(&route.owner_node_id) {
            prepend_if_missing(&mut route.path, prefix);
        }
    }
    Ok(())
}

/// Scan every Python module's source for `app.include_router(var,
/// prefix="/prefix")` plus the `from mod import var` that names the
/// mounted router, and prepend the prefix to every route whose owning
/// qualified name falls under that module path.
fn resolve_fastapi_include_router(routes: &mut [RouteHandler], nodes_by_id: &HashMap<i64, Node>, project_root: &str) {
    let mut module_prefixes: Vec<(String, String)> = Vec::new(); // (module path fragment, prefix)

    for node in nodes_by_id.values() {
        let Some(source) = read_node_source(node, project_root) else { continue };
        let mut imports: HashMap<String, String> = HashMap::new();
        for cap in PY_IMPORT.captures_iter(&source) {
            imports.insert(cap[2].to_string(), cap[1].to_string());
        }
        for cap in INCLUDE_ROUTER.captures_iter(&source) {
            let var = &cap[1];
            let prefix = cap[2].to_string();
            if let Some(module_path) = imports.get(var) {
                module_prefixes.push((module_path.clone(), prefix));
            }
        }
    }

    for route in routes.iter_mut() {
        for (module_path, prefix) in &module_prefixes {
            if route.owner_qn.contains(module_path.as_str()) {
                prepend_if_missing(&mut route.path, prefix);
            }
        }
    }
}

/// Analogous to FastAPI's `include_router` for Express: `app.use("/prefix",
/// router)` joined with `require`/`import` maps of module file fragments.
fn resolve_express_app_use(routes: &mut [RouteHandler], nodes_by_id: &HashMap<i64, Node>, project_root: &str) {
    let mut module_prefixes: Vec<(String, String)> = Vec::new();

    for node in nodes_by_id.values() {
        let Some(source) = read_node_source(node, project_root) else { continue };
        let mut imports: HashMap<String, String> = HashMap::new();
        for line in source.lines() {
            if let Some(cap) = JS_IMPORT.captures(line) {
                let module_fragment = cap.get(1).or_else(|| cap.get(2)).map(|m| m.as_str().to_string());
                let Some(module_fragment) = module_fragment else { continue };
                if let Some(var) = line.split('=').next().and_then(|lhs| lhs.split_whitespace().last()) {
                    imports.insert(var.to_string(), module_fragment);
                }
            }
        }
        for cap in APP_USE.captures_iter(&source) {
            let prefix = cap[1].to_string();
            let var = &cap[2];
            if let Some(module_fragment) = imports.get(var) {
                module_prefixes.push((module_fragment.clone(), prefix));
            }
        }
    }

    for route in routes.iter_mut() {
        for (module_fragment, prefix) in &module_prefixes {
            if route.owner_qn.contains(module_fragment.trim_start_matches("./")) {
                prepend_if_missing(&mut route.path, prefix);
            }
        }
    }
}
