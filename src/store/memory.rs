//! In-process [`Store`] implementation used exclusively by this crate's
//! own tests (§10.1, §10.5). No SQL backing, so the executor always takes
//! its general step-by-step execution path against a `MemoryStore` rather
//! than the join-fusion/aggregation-push-down fast paths, which require
//! [`super::SqlStore`].

use super::Store;
use crate::error::StoreError;
use crate::types::{BfsResult, Direction, Edge, EdgeDraft, Node, NodeDraft, Project, Visited};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Default)]
struct Inner {
    projects: HashMap<String, Project>,
    nodes: HashMap<i64, Node>,
    // (project, qualified_name) -> id, enforcing the uniqueness invariant (§3)
    node_ids_by_qn: HashMap<(String, String), i64>,
    edges: HashMap<i64, Edge>,
}

/// Thread-safe in-memory graph store, keyed by auto-incrementing ids.
pub struct MemoryStore {
    inner: RwLock<Inner>,
    next_node_id: AtomicI64,
    next_edge_id: AtomicI64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            next_node_id: AtomicI64::new(1),
            next_edge_id: AtomicI64::new(1),
        }
    }

    /// Synchronous convenience constructor for a node, bypassing the
    /// `(project, qualified_name)` upsert-merge semantics — useful for
    /// building test fixtures where qualified names are already unique.
    pub fn insert_node_sync(&self, draft: NodeDraft) -> i64 {
        let id = self.next_node_id.fetch_add(1, Ordering::SeqCst);
        let node = Node {
            id,
            project: draft.project.clone(),
            label: draft.label,
            name: draft.name,
            qualified_name: draft.qualified_name.clone(),
            file_path: draft.file_path,
            start_line: draft.start_line,
            end_line: draft.end_line,
            properties: draft.properties,
        };
        let mut inner = self.inner.write();
        inner
            .node_ids_by_qn
            .insert((draft.project, draft.qualified_name), id);
        inner.nodes.insert(id, node);
        id
    }

    /// Synchronous convenience constructor for an edge.
    pub fn insert_edge_sync(&self, draft: EdgeDraft) -> i64 {
        let id = self.next_edge_id.fetch_add(1, Ordering::SeqCst);
        let edge = Edge {
            id,
            project: draft.project,
            source_id: draft.source_id,
            target_id: draft.target_id,
            edge_type: draft.edge_type,
            properties: draft.properties,
        };
        self.inner.write().edges.insert(id, edge);
        id
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_projects(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.inner.read().projects.keys().cloned().collect())
    }

    async fn get_project(&self, name: &str) -> Result<Option<Project>, StoreError> {
        Ok(self.inner.read().projects.get(name).cloned())
    }

    async fn upsert_project(&self, name: &str, root: &str) -> Result<(), StoreError> {
        self.inner.write().projects.insert(
            name.to_string(),
            Project {
                name: name.to_string(),
                root: root.to_string(),
            },
        );
        Ok(())
    }

    async fn upsert_node(&self, draft: &NodeDraft) -> Result<i64, StoreError> {
        let key = (draft.project.clone(), draft.qualified_name.clone());
        let mut inner = self.inner.write();
        if let Some(&existing_id) = inner.node_ids_by_qn.get(&key) {
            let node = inner.nodes.get_mut(&existing_id).expect("dangling qn index");
            node.label = draft.label.clone();
            node.name = draft.name.clone();
            node.file_path = draft.file_path.clone();
            node.start_line = draft.start_line;
            node.end_line = draft.end_line;
            node.properties = draft.properties.clone();
            return Ok(existing_id);
        }
        let id = self.next_node_id.fetch_add(1, Ordering::SeqCst);
        inner.nodes.insert(
            id,
            Node {
                id,
                project: draft.project.clone(),
                label: draft.label.clone(),
                name: draft.name.clone(),
                qualified_name: draft.qualified_name.clone(),
                file_path: draft.file_path.clone(),
                start_line: draft.start_line,
                end_line: draft.end_line,
                properties: draft.properties.clone(),
            },
        );
        inner.node_ids_by_qn.insert(key, id);
        Ok(id)
    }

    async fn insert_edge(&self, draft: &EdgeDraft) -> Result<i64, StoreError> {
        let id = self.next_edge_id.fetch_add(1, Ordering::SeqCst);
        self.inner.write().edges.insert(
            id,
            Edge {
                id,
                project: draft.project.clone(),
                source_id: draft.source_id,
                target_id: draft.target_id,
                edge_type: draft.edge_type.clone(),
                properties: draft.properties.clone(),
            },
        );
        Ok(id)
    }

    async fn find_node_by_id(&self, id: i64) -> Result<Option<Node>, StoreError> {
        Ok(self.inner.read().nodes.get(&id).cloned())
    }

    async fn find_node_by_qn(&self, project: &str, qn: &str) -> Result<Option<Node>, StoreError> {
        let inner = self.inner.read();
        let id = inner
            .node_ids_by_qn
            .get(&(project.to_string(), qn.to_string()));
        Ok(id.and_then(|id| inner.nodes.get(id)).cloned())
    }

    async fn find_nodes_by_name(&self, project: &str, name: &str) -> Result<Vec<Node>, StoreError> {
        Ok(self
            .inner
            .read()
            .nodes
            .values()
            .filter(|n| n.project == project && n.name == name)
            .cloned()
            .collect())
    }

    async fn find_nodes_by_label(&self, project: &str, label: &str) -> Result<Vec<Node>, StoreError> {
        Ok(self
            .inner
            .read()
            .nodes
            .values()
            .filter(|n| n.project == project && n.label.as_str() == label)
            .cloned()
            .collect())
    }

    async fn find_nodes_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, Node>, StoreError> {
        let inner = self.inner.read();
        Ok(ids
            .iter()
            .filter_map(|id| inner.nodes.get(id).map(|n| (*id, n.clone())))
            .collect())
    }

    async fn find_edges_by_source_ids(
        &self,
        ids: &[i64],
        types: &[String],
    ) -> Result<HashMap<i64, Vec<Edge>>, StoreError> {
        let id_set: HashSet<i64> = ids.iter().copied().collect();
        let mut out: HashMap<i64, Vec<Edge>> = HashMap::new();
        for edge in self.inner.read().edges.values() {
            if id_set.contains(&edge.source_id) && (types.is_empty() || types.contains(&edge.edge_type)) {
                out.entry(edge.source_id).or_default().push(edge.clone());
            }
        }
        Ok(out)
    }

    async fn find_edges_by_target_ids(
        &self,
        ids: &[i64],
        types: &[String],
    ) -> Result<HashMap<i64, Vec<Edge>>, StoreError> {
        let id_set: HashSet<i64> = ids.iter().copied().collect();
        let mut out: HashMap<i64, Vec<Edge>> = HashMap::new();
        for edge in self.inner.read().edges.values() {
            if id_set.contains(&edge.target_id) && (types.is_empty() || types.contains(&edge.edge_type)) {
                out.entry(edge.target_id).or_default().push(edge.clone());
            }
        }
        Ok(out)
    }

    async fn find_edges_by_source_and_type(&self, id: i64, ty: &str) -> Result<Vec<Edge>, StoreError> {
        Ok(self
            .inner
            .read()
            .edges
            .values()
            .filter(|e| e.source_id == id && e.edge_type == ty)
            .cloned()
            .collect())
    }

    async fn find_edges_by_target_and_type(&self, id: i64, ty: &str) -> Result<Vec<Edge>, StoreError> {
        Ok(self
            .inner
            .read()
            .edges
            .values()
            .filter(|e| e.target_id == id && e.edge_type == ty)
            .cloned()
            .collect())
    }

    async fn bfs(
        &self,
        start: i64,
        direction: Direction,
        edge_types: &[String],
        max_depth: u32,
        node_cap: usize,
    ) -> Result<BfsResult, StoreError> {
        let inner = self.inner.read();
        let mut visited_hop: HashMap<i64, u32> = HashMap::new();
        let mut queue: VecDeque<(i64, u32)> = VecDeque::new();
        queue.push_back((start, 0));
        visited_hop.insert(start, 0);

        let mut result = Vec::new();

        while let Some((current, hop)) = queue.pop_front() {
            if hop >= max_depth {
                continue;
            }
            if result.len() >= node_cap {
                break;
            }

            let neighbors = neighbors_of(&inner.edges, current, direction, edge_types);
            for next in neighbors {
                if visited_hop.contains_key(&next) {
                    continue;
                }
                visited_hop.insert(next, hop + 1);
                if let Some(node) = inner.nodes.get(&next) {
                    result.push(Visited {
                        node: node.clone(),
                        hop: hop + 1,
                    });
                }
                if result.len() >= node_cap {
                    break;
                }
                queue.push_back((next, hop + 1));
            }
        }

        Ok(BfsResult { visited: result })
    }
}

fn neighbors_of(
    edges: &HashMap<i64, Edge>,
    node_id: i64,
    direction: Direction,
    edge_types: &[String],
) -> Vec<i64> {
    let type_ok = |ty: &str| edge_types.is_empty() || edge_types.iter().any(|t| t == ty);
    let mut out = Vec::new();
    for edge in edges.values() {
        if !type_ok(&edge.edge_type) {
            continue;
        }
        match direction {
            Direction::Outbound if edge.source_id == node_id => out.push(edge.target_id),
            Direction::Inbound if edge.target_id == node_id => out.push(edge.source_id),
            Direction::Any => {
                if edge.source_id == node_id {
                    out.push(edge.target_id);
                } else if edge.target_id == node_id {
                    out.push(edge.source_id);
                }
            }
            _ => {}
        }
    }
    out
}
