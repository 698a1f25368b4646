//! Scenario 2 (spec.md §8): the same chat turn processed twice converges on
//! one `Project` node and exactly one concept vector, while still logging
//! two chat document vectors.

mod common;

use common::TestEngine;
use polaris_core::model::ViewType;
use polaris_core::NodeType;

const EXTRACTION_RESPONSE: &str = r#"{
    "entities": [
        {"name": "Endgame OS 重构", "type": "Project", "content": "重构进行中"}
    ],
    "relations": []
}"#;

#[tokio::test]
async fn repeated_chat_turn_converges_on_one_project_node() {
    let mut engine = TestEngine::with_scripted_llm(vec![EXTRACTION_RESPONSE, EXTRACTION_RESPONSE]).await;
    engine.config.core_keywords = vec!["endgame".to_string()];

    let memory = engine.memory_service();
    let turn = "我在推进 Endgame OS 重构项目，这非常重要";

    memory.process_chat_interaction("u1", "c1", turn, "收到，继续推进").await.expect("first turn");
    memory.process_chat_interaction("u1", "c1", turn, "收到，继续推进").await.expect("second turn");

    let data = engine.graph.get_graph_data("u1", ViewType::Global).expect("read global view");
    let projects: Vec<_> = data.nodes.iter().filter(|n| n.node_type == NodeType::Project).collect();
    assert_eq!(projects.len(), 1, "exactly one Project node after two identical turns");
    assert_eq!(projects[0].name, "Endgame OS 重构");

    let stats = engine.vectors.get_stats();
    assert_eq!(stats.documents, 2, "one chat vector per turn");
    assert_eq!(stats.concepts, 1, "concept vector upserts by id, not duplicated");
}
