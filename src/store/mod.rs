//! The store interface the query engine and link inferencer are built
//! against (§6). The store's *implementation* is, per §1, an external
//! collaborator — but a stable implementation is what lets this crate be
//! runnable and testable, so it ships two: [`pg::PgStore`] for production
//! and [`memory::MemoryStore`] for this crate's own tests.

pub mod memory;
pub mod pg;

use crate::error::StoreError;
use crate::types::{BfsResult, Direction, Edge, EdgeDraft, Node, NodeDraft, Project};
use async_trait::async_trait;
use std::collections::HashMap;

/// Operations the query engine and link inferencer consume from the
/// persisted graph store. Every method may fail with an opaque
/// [`StoreError`] — callers decide, per §7, whether a given failure is
/// fatal to the current project or to the whole query.
#[async_trait]
pub trait Store: Send + Sync {
    async fn list_projects(&self) -> Result<Vec<String>, StoreError>;
    async fn get_project(&self, name: &str) -> Result<Option<Project>, StoreError>;
    async fn upsert_project(&self, name: &str, root: &str) -> Result<(), StoreError>;

    /// Insert or update a node identified by `(project, qualified_name)`.
    /// Returns the id of the row now present, whether newly inserted or
    /// pre-existing — see DESIGN.md's resolution of the HANDLES-edge
    /// stale-id open question (§9).
    async fn upsert_node(&self, node: &NodeDraft) -> Result<i64, StoreError>;
    async fn insert_edge(&self, edge: &EdgeDraft) -> Result<i64, StoreError>;

    async fn find_node_by_id(&self, id: i64) -> Result<Option<Node>, StoreError>;
    async fn find_node_by_qn(&self, project: &str, qn: &str) -> Result<Option<Node>, StoreError>;
    async fn find_nodes_by_name(&self, project: &str, name: &str) -> Result<Vec<Node>, StoreError>;
    async fn find_nodes_by_label(&self, project: &str, label: &str) -> Result<Vec<Node>, StoreError>;
    async fn find_nodes_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, Node>, StoreError>;

    async fn find_edges_by_source_ids(
        &self,
        ids: &[i64],
        types: &[String],
    ) -> Result<HashMap<i64, Vec<Edge>>, StoreError>;
    async fn find_edges_by_target_ids(
        &self,
        ids: &[i64],
        types: &[String],
    ) -> Result<HashMap<i64, Vec<Edge>>, StoreError>;
    async fn find_edges_by_source_and_type(&self, id: i64, ty: &str) -> Result<Vec<Edge>, StoreError>;
    async fn find_edges_by_target_and_type(&self, id: i64, ty: &str) -> Result<Vec<Edge>, StoreError>;

    /// Breadth-first traversal from `start`, used to evaluate
    /// variable-length relationship patterns (§4.4).
    async fn bfs(
        &self,
        start: i64,
        direction: Direction,
        edge_types: &[String],
        max_depth: u32,
        node_cap: usize,
    ) -> Result<BfsResult, StoreError>;

    /// `Some` when this store can also be driven directly with SQL,
    /// letting the executor's aggregation/join push-down fast paths
    /// (§4.4) run against it. `MemoryStore` has no SQL backing and keeps
    /// the default `None`, which routes every query through the general
    /// step-by-step path instead.
    fn sql_pool(&self) -> Option<&sqlx::PgPool> {
        None
    }
}

/// Escape hatch for the SQL-backed executor fast paths (join fusion,
/// aggregation push-down, §4.4). Only [`pg::PgStore`] implements this;
/// [`memory::MemoryStore`] has no SQL backing, so the executor's SQL fast
/// paths are skipped in favor of the general step-by-step path whenever
/// the store does not implement it.
pub trait SqlStore: Store {
    fn raw_pool(&self) -> &sqlx::PgPool;
}
