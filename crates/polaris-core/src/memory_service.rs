//! Memory Service — the cognitive center (spec.md §4.5): per-turn chat
//! extraction and policy, applied directly to the canonical graph. The same
//! extraction the Ingestion Orchestrator runs in bulk, in miniature, with no
//! staging step.

use chrono::Utc;
use serde_json::json;

use crate::attention;
use crate::config::Config;
use crate::error::IngestResult;
use crate::graph::GraphStore;
use crate::model::{self_node_id, stable_id, vision_node_id, Edge, Node, NodeStatus, NodeType};
use crate::perception::PerceptionLayer;
use crate::vector::VectorStore;

pub struct MemoryService<'a> {
    graph: &'a GraphStore,
    vectors: &'a VectorStore,
    perception: &'a PerceptionLayer,
    config: &'a Config,
}

impl<'a> MemoryService<'a> {
    pub fn new(
        graph: &'a GraphStore,
        vectors: &'a VectorStore,
        perception: &'a PerceptionLayer,
        config: &'a Config,
    ) -> Self {
        Self { graph, vectors, perception, config }
    }

    /// `ProcessChatInteraction` (spec.md §4.5). Returns early, writing
    /// nothing, if neither half of the turn passes the attention filter.
    pub async fn process_chat_interaction(
        &self,
        user_id: &str,
        conversation_id: &str,
        user_msg: &str,
        ai_msg: &str,
    ) -> IngestResult<()> {
        if !attention::passes(user_msg, &self.config.core_keywords)
            && !attention::passes(ai_msg, &self.config.core_keywords)
        {
            return Ok(());
        }

        let combined = format!("{user_msg}\n{ai_msg}");
        let now = Utc::now();

        let embeddings = self.perception.embed_batch(vec![combined.clone()]).await;
        if let Some(embedding) = embeddings.into_iter().next() {
            let id = stable_id(&format!("{conversation_id}#{}", now.timestamp_nanos_opt().unwrap_or_default()));
            let metadata = json!({
                "type": "chat",
                "user_id": user_id,
                "conversation_id": conversation_id,
                "timestamp": now.to_rfc3339(),
            });
            self.vectors.add_documents(&[combined.clone()], &[metadata], &[id], &[embedding])?;
        }

        let extraction = self.perception.extract_structured_memory(&combined, user_id, None).await;

        let nodes: Vec<Node> = extraction
            .entities
            .iter()
            .map(|entity| entity_to_node(user_id, entity))
            .collect();
        let confirmed_names: Vec<(String, String)> = nodes
            .iter()
            .filter(|n| n.status == NodeStatus::Confirmed)
            .map(|n| (n.id.clone(), n.name.clone()))
            .collect();

        self.graph.batch_upsert_entities("nodes", user_id, nodes)?;

        if !confirmed_names.is_empty() {
            let texts: Vec<String> = confirmed_names.iter().map(|(_, name)| name.clone()).collect();
            let concept_embeddings = self.perception.embed_batch(texts).await;
            for ((id, name), embedding) in confirmed_names.iter().zip(concept_embeddings) {
                if let Err(e) = self.vectors.add_concept(id, name, embedding) {
                    tracing::warn!(error = %e, id, "skipping concept vector");
                }
            }
        }

        for relation in &extraction.relations {
            let source = resolve_entity_id(user_id, &relation.source);
            let target = resolve_entity_id(user_id, &relation.target);
            let edge = Edge::new(user_id, source, target, relation.relation.clone());
            if let Err(e) = self.graph.upsert_edge("nodes", "edges", edge) {
                tracing::warn!(error = %e, "skipping invalid extracted relation");
            }
        }

        Ok(())
    }

    /// Explicit Self-node sync, called on login and on vision updates — the
    /// only path that originates a `Self`/`Vision` node from scratch. Extracted
    /// mentions of the user's own name fold into this same canonical node via
    /// `upsert_node`'s id canonicalization rather than creating a new one.
    pub fn sync_user_to_self_node(&self, user_id: &str, name: &str, content: &str) -> IngestResult<Node> {
        let mut node = Node::new(user_id, NodeType::SelfNode, name);
        node.id = self_node_id(user_id);
        node.content = content.to_string();
        Ok(self.graph.upsert_node("nodes", node)?)
    }

    /// Bootstraps a new user: Self node, Vision node, the `OWNS` edge between
    /// them, and one `Goal` node per milestone wired via `HAS_GOAL`. Called
    /// on first login and on subsequent vision edits (spec.md §8 scenario 1).
    pub fn bootstrap_user_vision(
        &self,
        user_id: &str,
        self_name: &str,
        vision_title: &str,
        vision_description: &str,
        milestones: &[String],
    ) -> IngestResult<Node> {
        self.sync_user_to_self_node(user_id, self_name, "")?;

        let mut vision = Node::new(user_id, NodeType::Vision, vision_title);
        vision.id = vision_node_id(user_id);
        vision.content = vision_description.to_string();
        let vision = self.graph.upsert_node("nodes", vision)?;

        let owns = Edge::new(user_id, self_node_id(user_id), &vision.id, "OWNS");
        self.graph.upsert_edge("nodes", "edges", owns)?;

        for milestone in milestones {
            let goal = Node::new(user_id, NodeType::Goal, milestone);
            let goal = self.graph.upsert_node("nodes", goal)?;
            let has_goal = Edge::new(user_id, &vision.id, &goal.id, "HAS_GOAL");
            self.graph.upsert_edge("nodes", "edges", has_goal)?;
        }

        Ok(vision)
    }
}

fn entity_to_node(user_id: &str, entity: &crate::perception::ExtractedEntity) -> Node {
    let node_type = NodeType::parse_name(&entity.entity_type);
    let mut node = Node::new(user_id, node_type, &entity.name);
    node.content = entity.content.clone();
    node.status = status_policy(node_type, entity.status.as_deref());
    if let Some(energy) = entity.energy_impact {
        node.energy_impact = energy;
    }
    if let Some(alignment) = entity.alignment_score {
        node.alignment_score = alignment;
    }
    if let Some(dossier) = &entity.dossier {
        node.attributes = json!({ "dossier": dossier });
    }
    node
}

/// `Task`/`Person` default to `pending` absent an explicit status; every
/// other type, or any explicit status, is `confirmed` (spec.md §4.5).
fn status_policy(node_type: NodeType, explicit: Option<&str>) -> NodeStatus {
    match explicit {
        Some(s) => NodeStatus::parse_name(s),
        None if matches!(node_type, NodeType::Task | NodeType::Person) => NodeStatus::Pending,
        None => NodeStatus::Confirmed,
    }
}

fn resolve_entity_id(user_id: &str, name: &str) -> String {
    if name == user_id {
        self_node_id(user_id)
    } else {
        stable_id(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_policy_defaults_task_and_person_to_pending() {
        assert_eq!(status_policy(NodeType::Task, None), NodeStatus::Pending);
        assert_eq!(status_policy(NodeType::Person, None), NodeStatus::Pending);
        assert_eq!(status_policy(NodeType::Goal, None), NodeStatus::Confirmed);
    }

    #[test]
    fn status_policy_honors_explicit_status_regardless_of_type() {
        assert_eq!(status_policy(NodeType::Task, Some("confirmed")), NodeStatus::Confirmed);
    }

    #[test]
    fn resolve_entity_id_maps_self_mentions_to_canonical_id() {
        assert_eq!(resolve_entity_id("u1", "u1"), "u1");
        assert_eq!(resolve_entity_id("u1", "Some Project"), stable_id("Some Project"));
    }

    #[tokio::test]
    async fn sync_user_to_self_node_writes_canonical_singleton() {
        let graph = GraphStore::open_in_memory().unwrap();
        let vectors = VectorStore::open(tempfile::tempdir().unwrap().path(), 8).unwrap();
        let config = Config::default();
        let perception = PerceptionLayer::new(&config);
        let service = MemoryService::new(&graph, &vectors, &perception, &config);

        let node = service.sync_user_to_self_node("u1", "Alex", "bio").unwrap();
        assert_eq!(node.id, "u1");
        assert_eq!(node.node_type, NodeType::SelfNode);
    }

    #[tokio::test]
    async fn bootstrap_user_vision_creates_self_vision_and_goals() {
        let graph = GraphStore::open_in_memory().unwrap();
        let vectors = VectorStore::open(tempfile::tempdir().unwrap().path(), 8).unwrap();
        let config = Config::default();
        let perception = PerceptionLayer::new(&config);
        let service = MemoryService::new(&graph, &vectors, &perception, &config);

        let milestones = vec!["MVP".to_string()];
        let vision = service
            .bootstrap_user_vision("u1", "Alex", "Build EOS", "...", &milestones)
            .unwrap();
        assert_eq!(vision.id, "vision_u1");

        let data = graph.get_graph_data("u1", crate::model::ViewType::Global).unwrap();
        assert!(data.nodes.iter().any(|n| n.id == "u1" && n.node_type == NodeType::SelfNode));
        assert!(data.nodes.iter().any(|n| n.id == "vision_u1"));
        assert!(data.nodes.iter().any(|n| n.node_type == NodeType::Goal && n.name == "MVP"));
        assert!(data.links.iter().any(|e| e.source == "u1" && e.target == "vision_u1" && e.relation == "OWNS"));
        assert!(data.links.iter().any(|e| e.source == "vision_u1" && e.relation == "HAS_GOAL"));
    }

    #[tokio::test]
    async fn process_chat_interaction_is_a_noop_below_attention_threshold() {
        let graph = GraphStore::open_in_memory().unwrap();
        let vectors = VectorStore::open(tempfile::tempdir().unwrap().path(), 8).unwrap();
        let config = Config::default();
        let perception = PerceptionLayer::new(&config);
        let service = MemoryService::new(&graph, &vectors, &perception, &config);

        service.process_chat_interaction("u1", "c1", "ok", "thanks").await.unwrap();
        assert_eq!(vectors.get_stats().documents, 0);
    }
}
