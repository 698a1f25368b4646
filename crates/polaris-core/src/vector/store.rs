//! Vector Store — three cosine-similarity collections over caller-provided
//! embeddings (spec.md §4.2).
//!
//! Named after the teacher's chroma layout: `endgame_memory` (documents),
//! `endgame_concepts`, `endgame_experiences`, all under `chroma/`. The store
//! never embeds on its own behalf; callers (Perception Layer, Memory
//! Service, Ingestion Orchestrator) always supply vectors.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::VectorResult;

use super::collection::Collection;

const DOCUMENTS_FILE: &str = "endgame_memory.json";
const CONCEPTS_FILE: &str = "endgame_concepts.json";
const EXPERIENCES_FILE: &str = "endgame_experiences.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorStats {
    pub documents: usize,
    pub concepts: usize,
    pub experiences: usize,
    pub dimension: Option<usize>,
}

/// A matched document, carrying the fields `SearchDocuments` returns
/// (spec.md §4.2: `{content, metadata}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentHit {
    pub content: String,
    pub metadata: Value,
    pub score: f32,
}

pub struct VectorStore {
    base_path: PathBuf,
    documents: Mutex<Collection>,
    concepts: Mutex<Collection>,
    experiences: Mutex<Collection>,
}

impl VectorStore {
    /// Open (or create) the three collections under `base_path`, then
    /// enforce dimension consistency: if the documents collection already
    /// holds a record whose dimension differs from `target_dimension`,
    /// destroy and recreate all three (spec.md §4.2, the only automatic
    /// destructive action in the core).
    pub fn open(base_path: impl AsRef<Path>, target_dimension: usize) -> VectorResult<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;

        let mut documents = Collection::open(base_path.join(DOCUMENTS_FILE))?;
        let mut concepts = Collection::open(base_path.join(CONCEPTS_FILE))?;
        let mut experiences = Collection::open(base_path.join(EXPERIENCES_FILE))?;

        if let Some(current) = documents.dimension() {
            if current != target_dimension {
                tracing::warn!(
                    current,
                    target_dimension,
                    "vector store dimension mismatch, resetting all collections"
                );
                documents.reset()?;
                concepts.reset()?;
                experiences.reset()?;
            }
        }

        Ok(Self {
            base_path,
            documents: Mutex::new(documents),
            concepts: Mutex::new(concepts),
            experiences: Mutex::new(experiences),
        })
    }

    /// `AddDocuments` — all four lists must share a length (spec.md §4.2).
    pub fn add_documents(
        &self,
        docs: &[String],
        metadatas: &[Value],
        ids: &[String],
        embeddings: &[Vec<f32>],
    ) -> VectorResult<()> {
        if docs.len() != metadatas.len() || docs.len() != ids.len() || docs.len() != embeddings.len() {
            return Err(crate::error::VectorError::LengthMismatch);
        }
        let mut documents = self.lock(&self.documents);
        for (((id, doc), metadata), embedding) in ids.iter().zip(docs).zip(metadatas).zip(embeddings) {
            if let Err(e) = documents.upsert(id, doc, metadata.clone(), embedding.clone()) {
                tracing::warn!(error = %e, id, "skipping document vector in batch");
            }
        }
        Ok(())
    }

    pub fn add_concept(&self, id: &str, name: &str, embedding: Vec<f32>) -> VectorResult<()> {
        self.lock(&self.concepts)
            .upsert(id, name, json!({ "name": name }), embedding)
    }

    pub fn add_experience_vector(&self, id: &str, text: &str, embedding: Vec<f32>) -> VectorResult<()> {
        self.lock(&self.experiences).upsert(id, text, json!({}), embedding)
    }

    /// `n` nearest document hits, optionally scoped to `user_id`.
    pub fn search_documents(&self, embedding: &[f32], user_id: Option<&str>, n: usize) -> Vec<DocumentHit> {
        let documents = self.lock(&self.documents);
        let filter = move |metadata: &Value| match user_id {
            Some(uid) => metadata.get("user_id").and_then(Value::as_str) == Some(uid),
            None => true,
        };
        documents
            .query(embedding, n, filter)
            .into_iter()
            .map(|(record, score)| DocumentHit {
                content: record.document,
                metadata: record.metadata,
                score,
            })
            .collect()
    }

    /// `n` nearest experience texts (spec.md §4.2: "texts only").
    pub fn search_experiences(&self, embedding: &[f32], n: usize) -> Vec<String> {
        self.lock(&self.experiences)
            .query(embedding, n, |_| true)
            .into_iter()
            .map(|(record, _)| record.document)
            .collect()
    }

    /// Top hit if cosine similarity ≥ `threshold`, else `None`.
    pub fn find_similar_concept(&self, embedding: &[f32], threshold: f32) -> Option<(String, f32)> {
        self.lock(&self.concepts)
            .find_best(embedding, threshold)
            .map(|(record, score)| (record.id, score))
    }

    pub fn get_stats(&self) -> VectorStats {
        let documents = self.lock(&self.documents);
        VectorStats {
            documents: documents.len(),
            concepts: self.lock(&self.concepts).len(),
            experiences: self.lock(&self.experiences).len(),
            dimension: documents.dimension(),
        }
    }

    /// Destroys and recreates all three collections.
    pub fn clear_all(&self) -> VectorResult<()> {
        self.lock(&self.documents).reset()?;
        self.lock(&self.concepts).reset()?;
        self.lock(&self.experiences).reset()?;
        Ok(())
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn lock<'a>(&'a self, collection: &'a Mutex<Collection>) -> std::sync::MutexGuard<'a, Collection> {
        collection.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_mismatch_resets_all_three_collections() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = VectorStore::open(dir.path(), 2).unwrap();
            store
                .add_documents(
                    &["doc".to_string()],
                    &[json!({"user_id": "u1"})],
                    &["d1".to_string()],
                    &[vec![1.0, 0.0]],
                )
                .unwrap();
            store.add_concept("c1", "concept", vec![1.0, 0.0]).unwrap();
        }

        let reopened = VectorStore::open(dir.path(), 3).unwrap();
        let stats = reopened.get_stats();
        assert_eq!(stats.documents, 0);
        assert_eq!(stats.concepts, 0);
        assert_eq!(stats.dimension, None);

        let results = reopened.search_documents(&[1.0, 0.0, 0.0], None, 10);
        assert!(results.is_empty());
    }

    #[test]
    fn search_documents_scopes_by_user() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open(dir.path(), 2).unwrap();
        store
            .add_documents(
                &["mine".to_string(), "theirs".to_string()],
                &[json!({"user_id": "u1"}), json!({"user_id": "u2"})],
                &["d1".to_string(), "d2".to_string()],
                &[vec![1.0, 0.0], vec![1.0, 0.0]],
            )
            .unwrap();

        let results = store.search_documents(&[1.0, 0.0], Some("u1"), 10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "mine");
    }

    #[test]
    fn find_similar_concept_respects_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open(dir.path(), 2).unwrap();
        store.add_concept("c1", "exact", vec![1.0, 0.0]).unwrap();

        assert!(store.find_similar_concept(&[0.0, 1.0], 0.9).is_none());
        assert!(store.find_similar_concept(&[1.0, 0.0], 0.99).is_some());
    }
}
