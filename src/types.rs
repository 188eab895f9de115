//! Persistent entity types shared by the query engine and the link
//! inferencer: [`Node`], [`Edge`], and the small enums that describe their
//! shape on the wire. Grounded on `kotadb::contracts`'s `Document`/`Query`
//! style of plain validated structs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Node label. The store treats labels as open strings; this enum covers
/// the well-known ones the engine reasons about and falls back to
/// `Other` for anything else so ingestion can introduce new labels
/// without a crate release.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Label {
    Function,
    Method,
    Module,
    Route,
    #[serde(untagged)]
    Other(String),
}

impl Label {
    pub fn as_str(&self) -> &str {
        match self {
            Label::Function => "Function",
            Label::Method => "Method",
            Label::Module => "Module",
            Label::Route => "Route",
            Label::Other(s) => s,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Label {
    fn from(s: &str) -> Self {
        match s {
            "Function" => Label::Function,
            "Method" => Label::Method,
            "Module" => Label::Module,
            "Route" => Label::Route,
            other => Label::Other(other.to_string()),
        }
    }
}

impl From<String> for Label {
    fn from(s: String) -> Self {
        Label::from(s.as_str())
    }
}

/// A node in the persisted property graph.
///
/// Invariant: `(project, qualified_name)` uniquely identifies a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: i64,
    pub project: String,
    pub label: Label,
    pub name: String,
    pub qualified_name: String,
    pub file_path: Option<String>,
    pub start_line: Option<i64>,
    pub end_line: Option<i64>,
    pub properties: Map<String, Value>,
}

impl Node {
    /// Read a built-in column or fall back to the properties bag, matching
    /// the executor's filter/projection resolution order (§4.4).
    pub fn get_property(&self, key: &str) -> Option<Value> {
        match key {
            "name" => Some(Value::String(self.name.clone())),
            "qualified_name" => Some(Value::String(self.qualified_name.clone())),
            "label" => Some(Value::String(self.label.to_string())),
            "file_path" => self.file_path.clone().map(Value::String),
            "start_line" => self.start_line.map(|v| Value::Number(v.into())),
            "end_line" => self.end_line.map(|v| Value::Number(v.into())),
            other => self.properties.get(other).cloned(),
        }
    }

    /// The full projection map used when a node variable is returned bare.
    pub fn full_projection(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("name".to_string(), Value::String(self.name.clone()));
        map.insert(
            "qualified_name".to_string(),
            Value::String(self.qualified_name.clone()),
        );
        map.insert("label".to_string(), Value::String(self.label.to_string()));
        map.insert(
            "file_path".to_string(),
            self.file_path.clone().map(Value::String).unwrap_or(Value::Null),
        );
        map.insert(
            "start_line".to_string(),
            self.start_line.map(|v| Value::Number(v.into())).unwrap_or(Value::Null),
        );
        map.insert(
            "end_line".to_string(),
            self.end_line.map(|v| Value::Number(v.into())).unwrap_or(Value::Null),
        );
        map
    }
}

/// Draft of a node prior to assignment of a store-owned id, used for
/// upserts from ingestion and from the link inferencer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDraft {
    pub project: String,
    pub label: Label,
    pub name: String,
    pub qualified_name: String,
    pub file_path: Option<String>,
    pub start_line: Option<i64>,
    pub end_line: Option<i64>,
    pub properties: Map<String, Value>,
}

/// An edge between two nodes in the same project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: i64,
    pub project: String,
    pub source_id: i64,
    pub target_id: i64,
    #[serde(rename = "type")]
    pub edge_type: String,
    pub properties: Map<String, Value>,
}

impl Edge {
    pub fn get_property(&self, key: &str) -> Option<Value> {
        match key {
            "type" => Some(Value::String(self.edge_type.clone())),
            "source_id" => Some(Value::Number(self.source_id.into())),
            "target_id" => Some(Value::Number(self.target_id.into())),
            other => self.properties.get(other).cloned(),
        }
    }

    pub fn full_projection(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("type".to_string(), Value::String(self.edge_type.clone()));
        map.insert("source_id".to_string(), Value::Number(self.source_id.into()));
        map.insert("target_id".to_string(), Value::Number(self.target_id.into()));
        map
    }
}

/// Draft of an edge prior to insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeDraft {
    pub project: String,
    pub source_id: i64,
    pub target_id: i64,
    pub edge_type: String,
    pub properties: Map<String, Value>,
}

/// A project known to the store: a name and a filesystem root used by the
/// link inferencer to resolve source files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub root: String,
}

/// Traversal direction for relationship patterns and BFS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Outbound,
    Inbound,
    Any,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Outbound => "outbound",
            Direction::Inbound => "inbound",
            Direction::Any => "any",
        }
    }
}

/// One visited node during a [`crate::store::Store::bfs`] traversal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visited {
    pub node: Node,
    pub hop: u32,
}

/// Result of a BFS traversal: all nodes reached within the depth/node cap,
/// tagged with their hop distance from the start node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BfsResult {
    pub visited: Vec<Visited>,
}

/// Decode a JSON-encoded properties bag, matching the store's
/// `UnmarshalProps` contract (§6). Malformed JSON yields an empty map
/// rather than propagating an error: a corrupt properties column should
/// not make an otherwise-valid node unreadable.
pub fn unmarshal_props(raw: &str) -> Map<String, Value> {
    serde_json::from_str(raw).unwrap_or_default()
}
