//! Per-framework route-registration extractors (§4.5). Each submodule
//! recognizes one framework's decorator/attribute/call idiom and returns
//! zero or more [`RouteHandler`] records; `extract_all` runs every
//! extractor unconditionally and merges the results, since the patterns
//! are specific enough that running all of them against a node written in
//! a different language costs a handful of wasted regex passes, not false
//! matches.

pub mod actix;
pub mod aspnet;
pub mod express_koa;
pub mod gin_chi;
pub mod ktor;
pub mod laravel;
pub mod python;
pub mod spring;

use super::model::RouteHandler;
use crate::types::Node;

pub fn extract_all(node: &Node, source: &str) -> Vec<RouteHandler> {
    let mut routes = Vec::new();
    routes.extend(python::extract(node, source));
    routes.extend(spring::extract(node, source));
    routes.extend(actix::extract(node, source));
    routes.extend(aspnet::extract(node, source));
    routes.extend(gin_chi::extract(node, source));
    routes.extend(express_koa::extract(node, source));
    routes.extend(laravel::extract(node, source));
    routes.extend(ktor::extract(node, source));
    routes
}
