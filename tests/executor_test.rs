//! Black-box executor scenarios (§4.4, §5, §7) against [`MemoryStore`].

use codegraph_engine::query::execute;
use codegraph_engine::store::memory::MemoryStore;
use codegraph_engine::{EdgeDraft, Label, NodeDraft, Store};
use serde_json::{json, Map};

async fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.upsert_project("demo", "/repo").await.unwrap();

    let mut props = Map::new();
    props.insert("is_entry_point".to_string(), json!(true));

    let main = store
        .upsert_node(&NodeDraft {
            project: "demo".into(),
            label: Label::Function,
            name: "main".into(),
            qualified_name: "demo.main".into(),
            file_path: Some("main.rs".into()),
            start_line: Some(1),
            end_line: Some(10),
            properties: props,
        })
        .await
        .unwrap();
    let handler = store
        .upsert_node(&NodeDraft {
            project: "demo".into(),
            label: Label::Function,
            name: "create_order".into(),
            qualified_name: "demo.orders.create_order".into(),
            file_path: Some("orders.rs".into()),
            start_line: Some(20),
            end_line: Some(30),
            properties: Map::new(),
        })
        .await
        .unwrap();

    store
        .insert_edge(&EdgeDraft {
            project: "demo".into(),
            source_id: main,
            target_id: handler,
            edge_type: "CALLS".into(),
            properties: Map::new(),
        })
        .await
        .unwrap();

    store
}

#[tokio::test]
async fn where_equality_filters_by_string_property() {
    let store = seeded_store().await;
    let result = execute(&store, "MATCH (f:Function) WHERE f.name = 'main' RETURN f.name").await.unwrap();
    assert_eq!(result.rows, vec![vec![json!("main")]]);
}

#[tokio::test]
async fn fixed_hop_expansion_returns_both_endpoints() {
    let store = seeded_store().await;
    let result = execute(&store, "MATCH (a:Function)-[:CALLS]->(b:Function) RETURN a.name, b.name")
        .await
        .unwrap();
    assert_eq!(result.rows, vec![vec![json!("main"), json!("create_order")]]);
}

#[tokio::test]
async fn count_aggregates_over_matched_rows() {
    let store = seeded_store().await;
    let result = execute(&store, "MATCH (a:Function)-[:CALLS]->(b:Function) RETURN COUNT(b) AS total")
        .await
        .unwrap();
    assert_eq!(result.rows, vec![vec![json!(1)]]);
}

#[tokio::test]
async fn unknown_label_yields_zero_rows_not_an_error() {
    let store = seeded_store().await;
    let result = execute(&store, "MATCH (f:NoSuchLabel) RETURN f.name").await.unwrap();
    assert!(result.rows.is_empty());
}

#[tokio::test]
async fn a_project_with_no_matching_nodes_does_not_abort_other_projects() {
    let store = seeded_store().await;
    store.upsert_project("empty", "/other").await.unwrap();
    let result = execute(&store, "MATCH (f:Function) RETURN f.name").await.unwrap();
    assert_eq!(result.rows.len(), 1);
}

#[tokio::test]
async fn direction_any_matches_edges_traversed_in_either_direction() {
    let store = seeded_store().await;
    let result = execute(
        &store,
        "MATCH (a:Function)-[:CALLS]-(b:Function) WHERE a.name = 'create_order' RETURN b.name",
    )
    .await
    .unwrap();
    assert_eq!(result.rows, vec![vec![json!("main")]]);
}
