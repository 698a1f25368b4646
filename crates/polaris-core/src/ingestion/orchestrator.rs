//! File-level ingestion algorithm (spec.md §4.4): parse → chunk → map
//! (extraction) → reduce (consolidation) → embed → load. Writes only to the
//! staging mirror and the documents vector collection; the canonical graph
//! is never touched here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde_json::json;

use crate::attention;
use crate::config::Config;
use crate::error::{IngestError, IngestResult};
use crate::graph::GraphStore;
use crate::model::NodeType;
use crate::perception::PerceptionLayer;
use crate::vector::VectorStore;

use super::{chunker, consolidator, parser};

/// Chunks handed to the remote extractor in batches of this size, with a
/// one-second pause between batches (spec.md §4.4 step 3, rate-limit courtesy).
const EXTRACTION_BATCH_SIZE: usize = 10;
const EXTRACTION_BATCH_PAUSE: Duration = Duration::from_secs(1);
const MIN_CHUNK_LEN: usize = 20;

pub struct IngestionOrchestrator<'a> {
    pub graph: &'a GraphStore,
    pub vectors: &'a VectorStore,
    pub perception: &'a PerceptionLayer,
    pub config: &'a Config,
}

impl<'a> IngestionOrchestrator<'a> {
    pub fn new(
        graph: &'a GraphStore,
        vectors: &'a VectorStore,
        perception: &'a PerceptionLayer,
        config: &'a Config,
    ) -> Self {
        Self { graph, vectors, perception, config }
    }

    /// Ingests one uploaded file. `cancel` is checked between chunks so a
    /// caller can abort a long-running ingest cooperatively; `progress` is
    /// invoked with `(percent, message)` at each milestone (spec.md §4.4).
    pub async fn ingest_file(
        &self,
        user_id: &str,
        source_file: &str,
        extension: &str,
        raw: &[u8],
        cancel: &AtomicBool,
        mut progress: impl FnMut(u8, &str),
    ) -> IngestResult<()> {
        progress(0, "parsing");
        let documents = parser::parse(extension, raw)?;

        progress(10, "chunking");
        let chunk_size = self.config.chunk_size;
        let chunk_overlap = self.config.chunk_overlap;
        let chunks: Vec<String> = documents
            .iter()
            .flat_map(|doc| chunker::chunk_text(doc, chunk_size, chunk_overlap))
            .collect();
        if chunks.is_empty() {
            progress(100, "nothing to ingest");
            return Ok(());
        }

        let vision_context = self.graph.get_strategic_context(user_id).ok();
        let (raw_nodes, raw_edges) =
            self.map_extract(&chunks, vision_context.as_deref(), cancel, &mut progress).await?;

        progress(60, "consolidating");
        let batch = consolidator::consolidate(self.perception, user_id, raw_nodes, raw_edges).await;

        progress(70, "embedding");
        let chunk_embeddings = self.perception.embed_batch(chunks.clone()).await;

        let standard_texts: Vec<(String, String)> = batch
            .nodes
            .iter()
            .filter(|n| matches!(n.node_type, NodeType::Goal | NodeType::Project))
            .map(|n| (n.id.clone(), format!("{}\n{}", n.name, n.content)))
            .collect();
        let standard_embeddings = self
            .perception
            .embed_batch(standard_texts.iter().map(|(_, text)| text.clone()).collect())
            .await;

        progress(85, "loading");
        self.load_document_vectors(user_id, source_file, &chunks, &chunk_embeddings)?;
        self.load_standard_vectors(user_id, &standard_texts, &standard_embeddings)?;

        self.graph.add_to_staging(user_id, batch.nodes, batch.edges, source_file)?;

        progress(100, "staged");
        Ok(())
    }

    /// Map phase: chunk-level extraction, skipping chunks the attention
    /// filter rejects, in rate-limited batches (spec.md §4.4 step 3).
    async fn map_extract(
        &self,
        chunks: &[String],
        vision_context: Option<&str>,
        cancel: &AtomicBool,
        progress: &mut impl FnMut(u8, &str),
    ) -> IngestResult<(Vec<crate::perception::LargeModelNode>, Vec<crate::perception::LargeModelEdge>)> {
        let mut raw_nodes = Vec::new();
        let mut raw_edges = Vec::new();

        let batches: Vec<&[String]> = chunks.chunks(EXTRACTION_BATCH_SIZE).collect();
        let total_batches = batches.len().max(1);

        for (batch_idx, batch) in batches.into_iter().enumerate() {
            if batch_idx > 0 {
                tokio::time::sleep(EXTRACTION_BATCH_PAUSE).await;
            }
            for chunk in batch {
                if cancel.load(Ordering::Relaxed) {
                    return Err(IngestError::Cancelled);
                }
                if chunk.chars().count() < MIN_CHUNK_LEN {
                    continue;
                }
                if !attention::passes(chunk, &self.config.core_keywords) {
                    continue;
                }
                let extraction = self
                    .perception
                    .extract_structured_memory_large_model(chunk, vision_context)
                    .await;
                raw_nodes.extend(extraction.nodes);
                raw_edges.extend(extraction.edges);
            }
            let pct = 10 + ((batch_idx + 1) * 40 / total_batches) as u8;
            progress(pct.min(50), "extracting");
        }

        Ok((raw_nodes, raw_edges))
    }

    fn load_document_vectors(
        &self,
        user_id: &str,
        source_file: &str,
        chunks: &[String],
        embeddings: &[Vec<f32>],
    ) -> IngestResult<()> {
        if chunks.is_empty() || embeddings.is_empty() {
            return Ok(());
        }
        let now = Utc::now();
        let ids: Vec<String> = (0..chunks.len())
            .map(|i| crate::model::stable_id(&format!("{source_file}#{i}")))
            .collect();
        let metadatas: Vec<serde_json::Value> = (0..chunks.len())
            .map(|_| {
                json!({
                    "type": "file",
                    "user_id": user_id,
                    "source_file": source_file,
                    "timestamp": now.to_rfc3339(),
                })
            })
            .collect();
        self.vectors.add_documents(chunks, &metadatas, &ids, embeddings)?;
        Ok(())
    }

    fn load_standard_vectors(
        &self,
        user_id: &str,
        standard_texts: &[(String, String)],
        embeddings: &[Vec<f32>],
    ) -> IngestResult<()> {
        if standard_texts.is_empty() || embeddings.is_empty() {
            return Ok(());
        }
        let now = Utc::now();
        let docs: Vec<String> = standard_texts.iter().map(|(_, text)| text.clone()).collect();
        let ids: Vec<String> = standard_texts.iter().map(|(id, _)| id.clone()).collect();
        let metadatas: Vec<serde_json::Value> = standard_texts
            .iter()
            .map(|(id, _)| json!({ "type": "standard_node", "user_id": user_id, "node_id": id, "timestamp": now.to_rfc3339() }))
            .collect();
        self.vectors.add_documents(&docs, &metadatas, &ids, embeddings)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_file_short_circuits_before_any_extraction() {
        let config = Config::default();
        let graph = GraphStore::open_in_memory().unwrap();
        let vectors = VectorStore::open(tempfile::tempdir().unwrap().path(), config.vector_dimension).unwrap();
        let perception = PerceptionLayer::new(&config);
        let orchestrator = IngestionOrchestrator::new(&graph, &vectors, &perception, &config);

        let cancel = AtomicBool::new(false);
        let mut milestones = Vec::new();
        orchestrator
            .ingest_file("u1", "empty.txt", "txt", b"", &cancel, |p, m| milestones.push((p, m.to_string())))
            .await
            .unwrap();

        assert_eq!(milestones.last().unwrap().0, 100);
        assert_eq!(vectors.get_stats().documents, 0);
    }

    #[tokio::test]
    async fn cancellation_before_extraction_stops_the_pipeline() {
        let config = Config::default();
        let graph = GraphStore::open_in_memory().unwrap();
        let vectors = VectorStore::open(tempfile::tempdir().unwrap().path(), config.vector_dimension).unwrap();
        let perception = PerceptionLayer::new(&config);
        let orchestrator = IngestionOrchestrator::new(&graph, &vectors, &perception, &config);

        let cancel = AtomicBool::new(true);
        let text = "I have a goal to launch this project because it matters a lot to me.";
        let result = orchestrator
            .ingest_file("u1", "notes.txt", "txt", text.as_bytes(), &cancel, |_, _| {})
            .await;

        assert!(matches!(result, Err(IngestError::Cancelled)));
    }
}
