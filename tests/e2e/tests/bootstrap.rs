//! Scenario 1 (spec.md §8): a new user logs in with a vision and gets a
//! Self node, a Vision node, an `OWNS` edge, and one `Goal` per milestone.

mod common;

use common::TestEngine;
use polaris_core::{NodeType, Relation};

#[tokio::test]
async fn new_user_bootstrap_creates_self_vision_and_goals() {
    let engine = TestEngine::new().await;
    let memory = engine.memory_service();

    let milestones = vec!["MVP".to_string()];
    let vision = memory
        .bootstrap_user_vision("u1", "Alex", "Build EOS", "Ship the operating system for my life", &milestones)
        .expect("bootstrap succeeds");
    assert_eq!(vision.id, "vision_u1");
    assert_eq!(vision.node_type, NodeType::Vision);

    let data = engine
        .graph
        .get_graph_data("u1", polaris_core::model::ViewType::Global)
        .expect("read global view");

    let self_node = data.nodes.iter().find(|n| n.id == "u1").expect("self node present");
    assert_eq!(self_node.node_type, NodeType::SelfNode);

    assert!(data.nodes.iter().any(|n| n.id == "vision_u1"));
    let goal = data
        .nodes
        .iter()
        .find(|n| n.node_type == NodeType::Goal && n.name == "MVP")
        .expect("goal node present");

    assert!(data
        .links
        .iter()
        .any(|e| e.source == "u1" && e.target == "vision_u1" && e.relation == Relation::Owns.as_str()));
    assert!(data
        .links
        .iter()
        .any(|e| e.source == "vision_u1" && e.target == goal.id && e.relation == Relation::HasGoal.as_str()));
}
