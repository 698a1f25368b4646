//! Evolution Service — turns interactions and daily logs into reusable
//! strategies (spec.md §4.6). Unlike the other components, the nightly
//! cycle runs as a background `tokio` task, so this service owns `Arc`
//! handles to its dependencies rather than borrowing them.

mod micro;
mod nightly;

use std::sync::Arc;

use crate::config::Config;
use crate::graph::GraphStore;
use crate::perception::PerceptionLayer;
use crate::vector::VectorStore;

pub use nightly::spawn_nightly_scheduler;

pub struct EvolutionService {
    graph: Arc<GraphStore>,
    vectors: Arc<VectorStore>,
    perception: Arc<PerceptionLayer>,
    config: Config,
}

impl EvolutionService {
    pub fn new(
        graph: Arc<GraphStore>,
        vectors: Arc<VectorStore>,
        perception: Arc<PerceptionLayer>,
        config: Config,
    ) -> Self {
        Self { graph, vectors, perception, config }
    }

    /// `GetGuidance(query)` — up to 3 nearest experience strategies, the
    /// text consumed by the agent's prompt assembler (spec.md §4.6).
    pub async fn get_guidance(&self, query: &str) -> Vec<String> {
        let embeddings = self.perception.embed_batch(vec![query.to_string()]).await;
        let Some(embedding) = embeddings.into_iter().next() else {
            return Vec::new();
        };
        self.vectors.search_experiences(&embedding, 3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_guidance_returns_empty_with_no_experiences() {
        let config = Config::default();
        let graph = Arc::new(GraphStore::open_in_memory().unwrap());
        let vectors = Arc::new(VectorStore::open(tempfile::tempdir().unwrap().path(), config.vector_dimension).unwrap());
        let perception = Arc::new(PerceptionLayer::new(&config));
        let service = EvolutionService::new(graph, vectors, perception, config);

        assert!(service.get_guidance("how do I stay focused?").await.is_empty());
    }
}
