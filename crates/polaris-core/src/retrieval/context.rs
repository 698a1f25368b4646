//! Assembles the five ordered context sections (spec.md §4.7).

use serde_json::Value;

use crate::config::Config;
use crate::evolution::EvolutionService;
use crate::graph::GraphStore;
use crate::model::NodeType;
use crate::perception::PerceptionLayer;
use crate::vector::VectorStore;

const VECTOR_RECALL_TOP_K: usize = 10;
const MAX_PROJECTS: usize = 15;
const MAX_TASKS: usize = 20;
const MAX_GOALS: usize = 5;
const CONCEPT_SIMILARITY_THRESHOLD: f32 = 0.3;

pub struct ContextAssembler<'a> {
    graph: &'a GraphStore,
    vectors: &'a VectorStore,
    perception: &'a PerceptionLayer,
    evolution: &'a EvolutionService,
    config: &'a Config,
}

impl<'a> ContextAssembler<'a> {
    pub fn new(
        graph: &'a GraphStore,
        vectors: &'a VectorStore,
        perception: &'a PerceptionLayer,
        evolution: &'a EvolutionService,
        config: &'a Config,
    ) -> Self {
        Self { graph, vectors, perception, evolution, config }
    }

    /// Composes the plain-text context blob for one agent turn. Every
    /// section is best-effort: a failing graph/vector read is logged and
    /// that section is simply omitted rather than aborting the whole call.
    pub async fn assemble(&self, user_id: &str, user_message: &str, _conversation_id: &str) -> String {
        let mut sections = Vec::new();

        sections.push(format!("Current system time: {}", chrono::Utc::now().to_rfc3339()));

        if let Some(vector_recall) = self.vector_recall(user_id, user_message).await {
            sections.push(vector_recall);
        }
        sections.push(self.structured_or_concept_recall(user_id, user_message).await);

        let guidance = self.evolution.get_guidance(user_message).await;
        if !guidance.is_empty() {
            let lines: Vec<String> = guidance.iter().map(|s| format!("Strategy: {s}")).collect();
            sections.push(format!("Relevant past strategies:\n{}", lines.join("\n")));
        }

        sections.push(self.alignment_note(user_id, user_message).await);

        sections.join("\n\n")
    }

    async fn vector_recall(&self, user_id: &str, user_message: &str) -> Option<String> {
        let embeddings = self.perception.embed_batch(vec![user_message.to_string()]).await;
        let embedding = embeddings.into_iter().next()?;

        let mut hits = self.vectors.search_documents(&embedding, Some(user_id), VECTOR_RECALL_TOP_K);
        hits.sort_by(|a, b| timestamp_of(b).cmp(&timestamp_of(a)));
        if hits.is_empty() {
            return None;
        }

        let lines: Vec<String> = hits
            .iter()
            .map(|hit| {
                let date = timestamp_of(hit).unwrap_or_default();
                format!("[{date}] {}", hit.content)
            })
            .collect();
        Some(format!("Relevant memories:\n{}", lines.join("\n")))
    }

    async fn structured_or_concept_recall(&self, user_id: &str, user_message: &str) -> String {
        let lower = user_message.to_lowercase();
        let is_structured_query =
            self.config.graph_search_keywords.iter().any(|kw| lower.contains(&kw.to_lowercase()));

        if is_structured_query {
            let projects = self.graph.get_nodes_by_type(user_id, NodeType::Project).unwrap_or_default();
            let tasks = self.graph.get_nodes_by_type(user_id, NodeType::Task).unwrap_or_default();
            let goals = self.graph.get_nodes_by_type(user_id, NodeType::Goal).unwrap_or_default();

            let mut lines = Vec::new();
            for node in goals.iter().take(MAX_GOALS) {
                lines.push(render_with_dossier(node));
            }
            for node in projects.iter().take(MAX_PROJECTS) {
                lines.push(render_with_dossier(node));
            }
            for node in tasks.iter().take(MAX_TASKS) {
                lines.push(render_with_dossier(node));
            }
            if lines.is_empty() {
                return "Structured recall: nothing on record yet.".to_string();
            }
            format!("Structured recall:\n{}", lines.join("\n"))
        } else {
            let embeddings = self.perception.embed_batch(vec![user_message.to_string()]).await;
            match embeddings.into_iter().next() {
                Some(embedding) => match self.vectors.find_similar_concept(&embedding, CONCEPT_SIMILARITY_THRESHOLD) {
                    Some((id, score)) => format!("Nearest concept: {id} (similarity {score:.2})"),
                    None => "No closely related concept found.".to_string(),
                },
                None => "No closely related concept found.".to_string(),
            }
        }
    }

    async fn alignment_note(&self, user_id: &str, user_message: &str) -> String {
        let vision_text = self
            .graph
            .get_nodes_by_type(user_id, NodeType::Vision)
            .ok()
            .and_then(|nodes| nodes.into_iter().next())
            .map(|node| node.content)
            .unwrap_or_default();

        let result = self.perception.assess_alignment(user_message, &vision_text).await;
        format!("Alignment: score {:.2}, reason: {}", result.score, result.reason)
    }
}

fn render_with_dossier(node: &crate::model::Node) -> String {
    let dossier = node.attributes.get("dossier").cloned().unwrap_or(Value::Null);
    if dossier.is_null() {
        format!("[{}] {}: {}", node.node_type, node.name, node.content)
    } else {
        format!("[{}] {}: {} (dossier: {dossier})", node.node_type, node.name, node.content)
    }
}

fn timestamp_of(hit: &crate::vector::DocumentHit) -> Option<String> {
    hit.metadata.get("timestamp").and_then(Value::as_str).map(str::to_string)
}
