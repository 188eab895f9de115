//! PostgreSQL-backed [`Store`] implementation, grounded on the
//! `sqlx::PgPool` + `sqlx::FromRow` + `#[instrument]` conventions of
//! `kotadb`'s `supabase_repository` module.
//!
//! The schema this implementation expects is the one named in §6:
//! `nodes(id, project, label, name, qualified_name, file_path, start_line,
//! end_line, properties)` and `edges(id, project, source_id, target_id,
//! type, properties)`, with `properties` stored as `jsonb`.

use super::{SqlStore, Store};
use crate::error::StoreError;
use crate::types::{unmarshal_props, BfsResult, Direction, Edge, EdgeDraft, Node, NodeDraft, Project, Visited};
use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::instrument;

/// Mirrors the `nodes` table layout; reused by the executor's SQL
/// push-down path so it can decode rows from hand-built queries without
/// duplicating the schema mapping.
#[derive(sqlx::FromRow)]
pub(crate) struct NodeRow {
    pub id: i64,
    pub project: String,
    pub label: String,
    pub name: String,
    pub qualified_name: String,
    pub file_path: Option<String>,
    pub start_line: Option<i64>,
    pub end_line: Option<i64>,
    pub properties: String,
}

impl From<NodeRow> for Node {
    fn from(row: NodeRow) -> Self {
        Node {
            id: row.id,
            project: row.project,
            label: row.label.into(),
            name: row.name,
            qualified_name: row.qualified_name,
            file_path: row.file_path,
            start_line: row.start_line,
            end_line: row.end_line,
            properties: unmarshal_props(&row.properties),
        }
    }
}

/// Mirrors the `edges` table layout; see [`NodeRow`].
#[derive(sqlx::FromRow)]
pub(crate) struct EdgeRow {
    pub id: i64,
    pub project: String,
    pub source_id: i64,
    pub target_id: i64,
    #[sqlx(rename = "type")]
    pub edge_type: String,
    pub properties: String,
}

impl From<EdgeRow> for Edge {
    fn from(row: EdgeRow) -> Self {
        Edge {
            id: row.id,
            project: row.project,
            source_id: row.source_id,
            target_id: row.target_id,
            edge_type: row.edge_type,
            properties: unmarshal_props(&row.properties),
        }
    }
}

/// Production [`Store`] implementation backed by a connection-pooled
/// Postgres database.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> PgPool {
        self.pool.clone()
    }
}

fn to_store_err(e: impl Into<anyhow::Error>) -> StoreError {
    StoreError(e.into())
}

#[async_trait]
impl Store for PgStore {
    #[instrument(skip(self))]
    async fn list_projects(&self) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT name FROM projects ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .context("list_projects")
            .map_err(to_store_err)?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    #[instrument(skip(self))]
    async fn get_project(&self, name: &str) -> Result<Option<Project>, StoreError> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT name, root FROM projects WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .context("get_project")
                .map_err(to_store_err)?;
        Ok(row.map(|(name, root)| Project { name, root }))
    }

    #[instrument(skip(self))]
    async fn upsert_project(&self, name: &str, root: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO projects (name, root)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET root = EXCLUDED.root
            "#,
        )
        .bind(name)
        .bind(root)
        .execute(&self.pool)
        .await
        .context("upsert_project")
        .map_err(to_store_err)?;
        Ok(())
    }

    #[instrument(skip(self, node))]
    async fn upsert_node(&self, node: &NodeDraft) -> Result<i64, StoreError> {
        let properties = serde_json::to_string(&node.properties).unwrap_or_else(|_| "{}".to_string());
        // RETURNING id on the ON CONFLICT branch is what makes this
        // idempotent without the stale-id failure mode §9 flags: the
        // caller always gets back the id of the row now present.
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO nodes (project, label, name, qualified_name, file_path, start_line, end_line, properties)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (project, qualified_name) DO UPDATE
                SET label = EXCLUDED.label,
                    name = EXCLUDED.name,
                    file_path = EXCLUDED.file_path,
                    start_line = EXCLUDED.start_line,
                    end_line = EXCLUDED.end_line,
                    properties = EXCLUDED.properties
            RETURNING id
            "#,
        )
        .bind(&node.project)
        .bind(node.label.as_str())
        .bind(&node.name)
        .bind(&node.qualified_name)
        .bind(&node.file_path)
        .bind(node.start_line)
        .bind(node.end_line)
        .bind(properties)
        .fetch_one(&self.pool)
        .await
        .context("upsert_node")
        .map_err(to_store_err)?;
        Ok(row.0)
    }

    #[instrument(skip(self, edge))]
    async fn insert_edge(&self, edge: &EdgeDraft) -> Result<i64, StoreError> {
        let properties = serde_json::to_string(&edge.properties).unwrap_or_else(|_| "{}".to_string());
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO edges (project, source_id, target_id, type, properties)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&edge.project)
        .bind(edge.source_id)
        .bind(edge.target_id)
        .bind(&edge.edge_type)
        .bind(properties)
        .fetch_one(&self.pool)
        .await
        .context("insert_edge")
        .map_err(to_store_err)?;
        Ok(row.0)
    }

    #[instrument(skip(self))]
    async fn find_node_by_id(&self, id: i64) -> Result<Option<Node>, StoreError> {
        let row: Option<NodeRow> = sqlx::query_as("SELECT * FROM nodes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("find_node_by_id")
            .map_err(to_store_err)?;
        Ok(row.map(Node::from))
    }

    #[instrument(skip(self))]
    async fn find_node_by_qn(&self, project: &str, qn: &str) -> Result<Option<Node>, StoreError> {
        let row: Option<NodeRow> =
            sqlx::query_as("SELECT * FROM nodes WHERE project = $1 AND qualified_name = $2")
                .bind(project)
                .bind(qn)
                .fetch_optional(&self.pool)
                .await
                .context("find_node_by_qn")
                .map_err(to_store_err)?;
        Ok(row.map(Node::from))
    }

    #[instrument(skip(self))]
    async fn find_nodes_by_name(&self, project: &str, name: &str) -> Result<Vec<Node>, StoreError> {
        let rows: Vec<NodeRow> = sqlx::query_as("SELECT * FROM nodes WHERE project = $1 AND name = $2")
            .bind(project)
            .bind(name)
            .fetch_all(&self.pool)
            .await
            .context("find_nodes_by_name")
            .map_err(to_store_err)?;
        Ok(rows.into_iter().map(Node::from).collect())
    }

    #[instrument(skip(self))]
    async fn find_nodes_by_label(&self, project: &str, label: &str) -> Result<Vec<Node>, StoreError> {
        let rows: Vec<NodeRow> = sqlx::query_as("SELECT * FROM nodes WHERE project = $1 AND label = $2")
            .bind(project)
            .bind(label)
            .fetch_all(&self.pool)
            .await
            .context("find_nodes_by_label")
            .map_err(to_store_err)?;
        Ok(rows.into_iter().map(Node::from).collect())
    }

    #[instrument(skip(self, ids))]
    async fn find_nodes_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, Node>, StoreError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<NodeRow> = sqlx::query_as("SELECT * FROM nodes WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .context("find_nodes_by_ids")
            .map_err(to_store_err)?;
        Ok(rows.into_iter().map(|r| (r.id, Node::from(r))).collect())
    }

    #[instrument(skip(self, ids, types))]
    async fn find_edges_by_source_ids(
        &self,
        ids: &[i64],
        types: &[String],
    ) -> Result<HashMap<i64, Vec<Edge>>, StoreError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<EdgeRow> = if types.is_empty() {
            sqlx::query_as("SELECT * FROM edges WHERE source_id = ANY($1)")
                .bind(ids)
                .fetch_all(&self.pool)
                .await
        } else {
            sqlx::query_as("SELECT * FROM edges WHERE source_id = ANY($1) AND type = ANY($2)")
                .bind(ids)
                .bind(types)
                .fetch_all(&self.pool)
                .await
        }
        .context("find_edges_by_source_ids")
        .map_err(to_store_err)?;

        let mut out: HashMap<i64, Vec<Edge>> = HashMap::new();
        for row in rows {
            let edge: Edge = row.into();
            out.entry(edge.source_id).or_default().push(edge);
        }
        Ok(out)
    }

    #[instrument(skip(self, ids, types))]
    async fn find_edges_by_target_ids(
        &self,
        ids: &[i64],
        types: &[String],
    ) -> Result<HashMap<i64, Vec<Edge>>, StoreError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<EdgeRow> = if types.is_empty() {
            sqlx::query_as("SELECT * FROM edges WHERE target_id = ANY($1)")
                .bind(ids)
                .fetch_all(&self.pool)
                .await
        } else {
            sqlx::query_as("SELECT * FROM edges WHERE target_id = ANY($1) AND type = ANY($2)")
                .bind(ids)
                .bind(types)
                .fetch_all(&self.pool)
                .await
        }
        .context("find_edges_by_target_ids")
        .map_err(to_store_err)?;

        let mut out: HashMap<i64, Vec<Edge>> = HashMap::new();
        for row in rows {
            let edge: Edge = row.into();
            out.entry(edge.target_id).or_default().push(edge);
        }
        Ok(out)
    }

    #[instrument(skip(self))]
    async fn find_edges_by_source_and_type(&self, id: i64, ty: &str) -> Result<Vec<Edge>, StoreError> {
        let rows: Vec<EdgeRow> = sqlx::query_as("SELECT * FROM edges WHERE source_id = $1 AND type = $2")
            .bind(id)
            .bind(ty)
            .fetch_all(&self.pool)
            .await
            .context("find_edges_by_source_and_type")
            .map_err(to_store_err)?;
        Ok(rows.into_iter().map(Edge::from).collect())
    }

    #[instrument(skip(self))]
    async fn find_edges_by_target_and_type(&self, id: i64, ty: &str) -> Result<Vec<Edge>, StoreError> {
        let rows: Vec<EdgeRow> = sqlx::query_as("SELECT * FROM edges WHERE target_id = $1 AND type = $2")
            .bind(id)
            .bind(ty)
            .fetch_all(&self.pool)
            .await
            .context("find_edges_by_target_and_type")
            .map_err(to_store_err)?;
        Ok(rows.into_iter().map(Edge::from).collect())
    }

    /// BFS is implemented client-side, batching one edge fetch per hop
    /// rather than issuing one query per node: the frontier for hop `h+1`
    /// is computed from a single `find_edges_by_*` batch over the entire
    /// hop-`h` frontier.
    #[instrument(skip(self))]
    async fn bfs(
        &self,
        start: i64,
        direction: Direction,
        edge_types: &[String],
        max_depth: u32,
        node_cap: usize,
    ) -> Result<BfsResult, StoreError> {
        let mut visited_ids: HashSet<i64> = HashSet::from([start]);
        let mut frontier: VecDeque<i64> = VecDeque::from([start]);
        let mut result: Vec<Visited> = Vec::new();
        let mut hop = 0u32;

        while hop < max_depth && !frontier.is_empty() && result.len() < node_cap {
            let current: Vec<i64> = frontier.drain(..).collect();
            let neighbor_ids = self.neighbor_ids(&current, direction, edge_types).await?;
            let fresh: Vec<i64> = neighbor_ids
                .into_iter()
                .filter(|id| visited_ids.insert(*id))
                .collect();
            if fresh.is_empty() {
                break;
            }
            let nodes = self.find_nodes_by_ids(&fresh).await?;
            hop += 1;
            for id in &fresh {
                if let Some(node) = nodes.get(id) {
                    result.push(Visited {
                        node: node.clone(),
                        hop,
                    });
                    if result.len() >= node_cap {
                        break;
                    }
                }
                frontier.push_back(*id);
            }
        }

        Ok(BfsResult { visited: result })
    }

    fn sql_pool(&self) -> Option<&PgPool> {
        Some(&self.pool)
    }
}

impl PgStore {
    async fn neighbor_ids(
        &self,
        ids: &[i64],
        direction: Direction,
        edge_types: &[String],
    ) -> Result<Vec<i64>, StoreError> {
        let mut out = Vec::new();
        match direction {
            Direction::Outbound => {
                for edges in self.find_edges_by_source_ids(ids, edge_types).await?.into_values() {
                    out.extend(edges.into_iter().map(|e| e.target_id));
                }
            }
            Direction::Inbound => {
                for edges in self.find_edges_by_target_ids(ids, edge_types).await?.into_values() {
                    out.extend(edges.into_iter().map(|e| e.source_id));
                }
            }
            Direction::Any => {
                for edges in self.find_edges_by_source_ids(ids, edge_types).await?.into_values() {
                    out.extend(edges.into_iter().map(|e| e.target_id));
                }
                for edges in self.find_edges_by_target_ids(ids, edge_types).await?.into_values() {
                    out.extend(edges.into_iter().map(|e| e.source_id));
                }
            }
        }
        Ok(out)
    }
}

impl SqlStore for PgStore {
    fn raw_pool(&self) -> &PgPool {
        &self.pool
    }
}
