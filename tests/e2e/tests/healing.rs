//! Scenario 4 (spec.md §8): a stray `Vision` row inserted outside the
//! canonical path gets merged into the singleton on the next `open`.

mod common;

use chrono::Utc;
use polaris_core::model::ViewType;
use polaris_core::GraphStore;
use polaris_core::MemoryService;
use polaris_core::{Config, PerceptionLayer, VectorStore};

#[tokio::test]
async fn stray_vision_row_is_merged_into_the_canonical_singleton_on_open() {
    let dir = tempfile::tempdir().expect("temp dir");
    let db_path = dir.path().join("brain.db");

    {
        let graph = GraphStore::open(&db_path).expect("open graph store");
        let vectors = VectorStore::open(dir.path().join("chroma"), 16).expect("open vector store");
        let config = Config::default();
        let perception = PerceptionLayer::new(&config);
        let memory = MemoryService::new(&graph, &vectors, &perception, &config);
        memory
            .bootstrap_user_vision("u1", "Alex", "Build EOS", "original vision content", &[])
            .expect("bootstrap");
    }

    // Bypass the canonical path entirely: a raw connection inserting a
    // second Vision row under a non-canonical id, with edges pointing at it.
    {
        let conn = rusqlite::Connection::open(&db_path).expect("raw connection");
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO nodes (id, user_id, type, name, content, created_at) VALUES (?1, ?2, 'Vision', ?3, ?4, ?5)",
            rusqlite::params!["old_vision_x", "u1", "Stray Vision", "extra stray content", now],
        )
        .expect("insert stray vision");
        conn.execute(
            "INSERT INTO nodes (id, user_id, type, name, content, created_at) VALUES (?1, ?2, 'Concept', ?3, '', ?4)",
            rusqlite::params!["mentioner", "u1", "Mentioner", now],
        )
        .expect("insert referencing node");
        conn.execute(
            "INSERT INTO edges (source, target, relation, user_id, created_at) VALUES (?1, 'old_vision_x', 'MENTIONS', 'u1', ?2)",
            rusqlite::params!["mentioner", now],
        )
        .expect("insert inbound edge");
        conn.execute(
            "INSERT INTO edges (source, target, relation, user_id, created_at) VALUES ('old_vision_x', ?1, 'RELATES_TO', 'u1', ?2)",
            rusqlite::params!["mentioner", now],
        )
        .expect("insert outbound edge");
    }

    let graph = GraphStore::open(&db_path).expect("reopen graph store runs self-heal");
    let data = graph.get_graph_data("u1", ViewType::Global).expect("read global view");

    assert!(!data.nodes.iter().any(|n| n.id == "old_vision_x"), "stray vision id no longer exists");
    let canonical = data.nodes.iter().find(|n| n.id == "vision_u1").expect("canonical vision present");
    assert!(canonical.content.contains("original vision content"));
    assert!(canonical.content.contains("extra stray content"));

    assert!(data.links.iter().any(|e| e.source == "mentioner" && e.target == "vision_u1" && e.relation == "MENTIONS"));
    assert!(data.links.iter().any(|e| e.source == "vision_u1" && e.target == "mentioner" && e.relation == "RELATES_TO"));
}
