//! Scenario 3 (spec.md §8): an uploaded file lands in staging first, then
//! `CommitStaging` promotes it into the canonical graph.

mod common;

use std::sync::atomic::AtomicBool;

use common::TestEngine;
use polaris_core::model::ViewType;

const EXTRACTION_RESPONSE: &str = r#"{
    "nodes": [
        {"id": "g1", "type": "Goal", "name": "G1", "content": "Ship the quarterly plan"},
        {"id": "p1", "type": "Project", "name": "P1", "content": "Rebuild the onboarding flow"},
        {"id": "t1", "type": "Task", "name": "T1", "content": "Write the onboarding copy"}
    ],
    "edges": [
        {"source": "G1", "target": "P1", "relation": "ACHIEVED_BY"},
        {"source": "P1", "target": "T1", "relation": "CONSISTS_OF"}
    ]
}"#;

const CONSOLIDATION_RESPONSE: &str = r#"{
    "mapping": {"G1": "G1", "P1": "P1", "T1": "T1"},
    "standard_nodes": [
        {"name": "G1", "type": "Goal", "content": "Ship the quarterly plan"},
        {"name": "P1", "type": "Project", "content": "Rebuild the onboarding flow"},
        {"name": "T1", "type": "Task", "content": "Write the onboarding copy"}
    ]
}"#;

#[tokio::test]
async fn uploaded_file_stages_then_commits_into_the_canonical_graph() {
    let engine = TestEngine::with_scripted_llm(vec![EXTRACTION_RESPONSE, CONSOLIDATION_RESPONSE]).await;
    let orchestrator = engine.orchestrator();

    let body = "Goal G1 is achieved by Project P1, which consists of Task T1 this quarter.";
    let cancel = AtomicBool::new(false);
    orchestrator
        .ingest_file("u1", "plan.txt", "txt", body.as_bytes(), &cancel, |_, _| {})
        .await
        .expect("ingest succeeds");

    let staged = engine.graph.get_staging("u1").expect("read staging");
    assert_eq!(staged.nodes.len(), 3, "three nodes staged before commit");
    assert_eq!(staged.links.len(), 2, "two edges staged before commit");
    assert!(staged.nodes.iter().all(|n| n.source_file.as_deref() == Some("plan.txt")));

    let before_commit = engine.graph.get_graph_data("u1", ViewType::Global).expect("read global view");
    assert!(before_commit.nodes.is_empty(), "nothing promoted to the canonical graph yet");

    let committed = engine.graph.commit_staging("u1", None).expect("commit staging");
    assert_eq!(committed, 3);

    let after_commit = engine.graph.get_graph_data("u1", ViewType::Global).expect("read global view");
    assert_eq!(after_commit.nodes.len(), 3);
    assert_eq!(after_commit.links.len(), 2);

    let staged_after = engine.graph.get_staging("u1").expect("read staging");
    assert!(staged_after.nodes.is_empty());
    assert!(staged_after.links.is_empty());
}
