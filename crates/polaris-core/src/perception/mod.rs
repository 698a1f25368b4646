//! Perception Layer — the only component that talks to an embedding model
//! or a remote LLM (spec.md §4.3). Every operation degrades gracefully:
//! embedding failures yield zero-vectors, extraction failures yield empty
//! results, alignment/arbitration failures yield a neutral default.

mod embedder;
mod llm;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Config;

pub use llm::LlmClient;

const ARBITRATION_TIMEOUT_S: u64 = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default)]
    pub content: String,
    pub status: Option<String>,
    pub energy_impact: Option<i32>,
    pub alignment_score: Option<f64>,
    pub dossier: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedRelation {
    pub source: String,
    pub relation: String,
    pub target: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default)]
    pub entities: Vec<ExtractedEntity>,
    #[serde(default)]
    pub relations: Vec<ExtractedRelation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LargeModelNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub name: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LargeModelEdge {
    pub source: String,
    pub target: String,
    pub relation: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LargeModelExtraction {
    #[serde(default)]
    pub nodes: Vec<LargeModelNode>,
    #[serde(default)]
    pub edges: Vec<LargeModelEdge>,
}

/// `Score ∈ [0,1], Reason` from comparing a message to the user's Vision
/// text (spec.md §4.7, Retrieval "Alignment note").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentResult {
    pub score: f64,
    pub reason: String,
}

impl Default for AlignmentResult {
    fn default() -> Self {
        Self { score: 0.5, reason: "unknown".to_string() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArbitrationResult {
    pub should_merge: bool,
    pub master_name: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardNode {
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub content: String,
}

/// `{mapping, standard_nodes[]}` — the reduce-phase output (spec.md §4.4/§6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsolidationResult {
    #[serde(default)]
    pub mapping: std::collections::HashMap<String, String>,
    #[serde(default)]
    pub standard_nodes: Vec<StandardNode>,
}

/// Query embeddings are re-requested constantly by retrieval (same few
/// strategic phrases, over and over); this bounds how many we keep around.
const QUERY_CACHE_CAPACITY: usize = 256;

pub struct PerceptionLayer {
    extraction_client: LlmClient,
    arbitration_client: LlmClient,
    vector_dimension: usize,
    query_cache: std::sync::Mutex<lru::LruCache<String, Vec<f32>>>,
}

impl PerceptionLayer {
    pub fn new(config: &Config) -> Self {
        Self {
            extraction_client: LlmClient::new(
                &config.llm_extraction_model_id,
                Duration::from_secs(config.llm_extraction_timeout_s),
            ),
            arbitration_client: LlmClient::new(
                &config.llm_extraction_model_id,
                Duration::from_secs(ARBITRATION_TIMEOUT_S),
            ),
            vector_dimension: config.vector_dimension,
            query_cache: std::sync::Mutex::new(lru::LruCache::new(
                std::num::NonZeroUsize::new(QUERY_CACHE_CAPACITY).unwrap(),
            )),
        }
    }

    /// Lazy-loads the local embedder on first use; zero-vectors on failure.
    /// Single-text calls (the common retrieval "embed this query" shape) are
    /// served from an LRU cache first.
    pub async fn embed_batch(&self, texts: Vec<String>) -> Vec<Vec<f32>> {
        if let [single] = texts.as_slice() {
            if let Some(cached) = self.query_cache.lock().unwrap_or_else(|e| e.into_inner()).get(single) {
                return vec![cached.clone()];
            }
        }

        let dimension = self.vector_dimension;
        let texts_for_worker = texts.clone();
        let result = tokio::task::spawn_blocking(move || embedder::embed_batch(&texts_for_worker, dimension))
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "embedding worker task panicked");
                Vec::new()
            });

        if let ([single], [embedding]) = (texts.as_slice(), result.as_slice()) {
            self.query_cache
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .put(single.clone(), embedding.clone());
        }

        result
    }

    /// Per-turn structured extraction (spec.md §4.3/§4.5). The subjectivity
    /// rule is enforced server-side, not trusted from the LLM: any entity
    /// whose `name` equals `user_id` is coerced to `type=Self` regardless of
    /// what the model returned.
    pub async fn extract_structured_memory(
        &self,
        text: &str,
        user_id: &str,
        strategic_context: Option<&str>,
    ) -> ExtractionResult {
        if text.trim().is_empty() {
            return ExtractionResult::default();
        }
        let system = extraction_system_prompt(user_id, strategic_context);
        match self.extraction_client.complete(&system, text).await {
            Ok(raw) => {
                let mut parsed = parse_json_relaxed::<ExtractionResult>(&raw).unwrap_or_default();
                for entity in &mut parsed.entities {
                    if entity.name == user_id {
                        entity.entity_type = "Self".to_string();
                    }
                }
                parsed
            }
            Err(e) => {
                tracing::warn!(error = %e, "structured extraction failed, returning empty result");
                ExtractionResult::default()
            }
        }
    }

    /// Bulk file-ingestion extraction, directed at the same model but with a
    /// prompt shaped for caller-scoped ids (spec.md §4.4).
    pub async fn extract_structured_memory_large_model(
        &self,
        text: &str,
        vision_context: Option<&str>,
    ) -> LargeModelExtraction {
        if text.trim().is_empty() {
            return LargeModelExtraction::default();
        }
        let system = large_model_system_prompt(vision_context);
        match self.extraction_client.complete(&system, text).await {
            Ok(raw) => parse_json_relaxed(&raw).unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "large-model extraction failed, returning empty result");
                LargeModelExtraction::default()
            }
        }
    }

    /// Consolidation helper: should two candidate names be merged?
    pub async fn arbitrate_merge(&self, names: &[String]) -> ArbitrationResult {
        if names.len() < 2 {
            return ArbitrationResult {
                should_merge: false,
                master_name: None,
                reason: "fewer than two candidates".into(),
            };
        }
        let system = "You decide whether a list of entity names refer to the same real-world \
            entity. Respond with strict JSON: {\"should_merge\": bool, \"master_name\": string or null, \"reason\": string}.";
        let user = names.join(", ");
        match self.arbitration_client.complete(system, &user).await {
            Ok(raw) => parse_json_relaxed(&raw).unwrap_or_else(|| ArbitrationResult {
                should_merge: false,
                master_name: None,
                reason: "unparseable arbitration response".into(),
            }),
            Err(e) => {
                tracing::warn!(error = %e, "arbitration call failed");
                ArbitrationResult {
                    should_merge: false,
                    master_name: None,
                    reason: "upstream failure".into(),
                }
            }
        }
    }

    /// Reduce-phase consolidation: given the deduplicated pool of chunk
    /// extractions, ask the model once for a canonical-name mapping and a
    /// standard node list (spec.md §4.4 step 4). On failure, callers fall
    /// back to naive name-based dedup (see `ingestion::consolidator`).
    pub async fn consolidate(&self, pool_summary: &str) -> Option<ConsolidationResult> {
        if pool_summary.trim().is_empty() {
            return Some(ConsolidationResult::default());
        }
        let system = "You consolidate a pool of extracted entity names into canonical \
            standard entities. Respond with strict JSON: {\"mapping\": {original_name: \
            standard_name}, \"standard_nodes\": [{\"name\", \"type\", \"content\"}]}.";
        match self.extraction_client.complete(system, pool_summary).await {
            Ok(raw) => parse_json_relaxed(&raw),
            Err(e) => {
                tracing::warn!(error = %e, "consolidation call failed");
                None
            }
        }
    }

    /// Free-form completion for callers that parse their own plain-text
    /// response shape (e.g. the Evolution Service's `PASS`/`TRIGGER` lines)
    /// rather than strict JSON. Empty string on any upstream failure.
    pub async fn complete_raw(&self, system: &str, user: &str) -> String {
        match self.extraction_client.complete(system, user).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "raw completion failed");
                String::new()
            }
        }
    }

    /// Compares `message` against the user's Vision text and scores how
    /// well it aligns. Defaults to `0.5`/`"unknown"` on any upstream failure
    /// (spec.md §4.7).
    pub async fn assess_alignment(&self, message: &str, vision_text: &str) -> AlignmentResult {
        if vision_text.trim().is_empty() {
            return AlignmentResult::default();
        }
        let system = "Score how well the user's message aligns with their stated long-term \
            vision. Respond with strict JSON: {\"score\": number in [0,1], \"reason\": string}.";
        let user = format!("Vision:\n{vision_text}\n\nMessage:\n{message}");
        match self.arbitration_client.complete(system, &user).await {
            Ok(raw) => parse_json_relaxed(&raw).unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "alignment scoring failed");
                AlignmentResult::default()
            }
        }
    }

    pub async fn summarize_text(&self, text: &str, prompt: Option<&str>) -> String {
        let system = prompt.unwrap_or("Summarize the following text in two sentences.");
        match self.arbitration_client.complete(system, text).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(error = %e, "summarization failed");
                String::new()
            }
        }
    }

    /// Cosine similarity in `[-1, 1]`, same function the Vector Store uses.
    pub fn compute_similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        crate::vector::cosine_similarity(a, b)
    }
}

fn extraction_system_prompt(user_id: &str, strategic_context: Option<&str>) -> String {
    let mut prompt = format!(
        "You extract structured memory from a conversation turn for a personal knowledge \
        graph. The five-tier strategic taxonomy is: Self, Vision, Goal, Project, Task, plus \
        supporting types Action, Insight, Person, Organization, Concept, Event, Tool.\n\n\
        Subjectivity rule: any first-person mention (\"I\", \"me\", \"we\") refers to the \
        entity named exactly \"{user_id}\" with type=\"Self\". Never emit an entity named \
        \"User\" or \"Me\".\n\n\
        Respond with strict JSON: {{\"entities\": [{{\"name\", \"type\", \"content\", \
        \"status\"?, \"energy_impact\"?, \"alignment_score\"?, \"dossier\"?}}], \
        \"relations\": [{{\"source\", \"relation\", \"target\"}}]}}."
    );
    if let Some(ctx) = strategic_context {
        prompt.push_str("\n\nCurrent strategic context:\n");
        prompt.push_str(ctx);
    }
    prompt
}

fn large_model_system_prompt(vision_context: Option<&str>) -> String {
    let mut prompt = String::from(
        "You extract nodes and edges from a document chunk for bulk ingestion into a \
        personal knowledge graph. Respond with strict JSON: \
        {\"nodes\": [{\"id\", \"type\", \"name\", \"content\"}], \
        \"edges\": [{\"source\", \"target\", \"relation\"}]}. \
        Ids are scoped to this response only; the caller re-derives stable ids.",
    );
    if let Some(vision) = vision_context {
        prompt.push_str("\n\nThe user's vision, for relevance weighting:\n");
        prompt.push_str(vision);
    }
    prompt
}

/// Parses `raw` as JSON, tolerating a leading/trailing markdown code fence
/// (a common LLM quirk) before giving up.
fn parse_json_relaxed<T: serde::de::DeserializeOwned>(raw: &str) -> Option<T> {
    if let Ok(value) = serde_json::from_str(raw) {
        return Some(value);
    }
    let trimmed = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    serde_json::from_str(trimmed).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_json_relaxed_strips_code_fence() {
        let raw = "```json\n{\"entities\": [], \"relations\": []}\n```";
        let parsed: ExtractionResult = parse_json_relaxed(raw).unwrap();
        assert!(parsed.entities.is_empty());
    }

    #[test]
    fn compute_similarity_matches_vector_cosine() {
        let layer = PerceptionLayer::new(&Config::default());
        assert!((layer.compute_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn repeated_single_query_embedding_is_served_from_cache() {
        let layer = PerceptionLayer::new(&Config::default());
        let first = layer.embed_batch(vec!["what should I focus on".to_string()]).await;
        let second = layer.embed_batch(vec!["what should I focus on".to_string()]).await;
        assert_eq!(first, second);
        assert_eq!(layer.query_cache.lock().unwrap().len(), 1);
    }
}
