//! A single named collection: brute-force cosine similarity over
//! caller-provided embeddings, persisted as one JSON sidecar file.
//!
//! The teacher's `search::vector::VectorIndex` wraps USearch's HNSW index;
//! this crate's target scale (one process per user, thousands of records,
//! not millions) doesn't need approximate search, so we keep the teacher's
//! key-mapping/persistence shape but replace the HNSW core with a flat scan.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{VectorError, VectorResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub document: String,
    pub metadata: Value,
    pub embedding: Vec<f32>,
}

/// On-disk shape of a collection's sidecar file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CollectionFile {
    dimension: Option<usize>,
    records: Vec<Record>,
}

/// One cosine-similarity collection, held entirely in memory and flushed to
/// `<path>.json` after every mutation.
pub struct Collection {
    path: PathBuf,
    dimension: Option<usize>,
    records: Vec<Record>,
}

impl Collection {
    pub fn open(path: impl AsRef<Path>) -> VectorResult<Self> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            let file: CollectionFile = serde_json::from_str(&raw)?;
            Ok(Self {
                path,
                dimension: file.dimension,
                records: file.records,
            })
        } else {
            Ok(Self {
                path,
                dimension: None,
                records: Vec::new(),
            })
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Delete every record and forget the fixed dimension. Used by the store's
    /// dimension-mismatch reset (spec.md §4.2).
    pub fn reset(&mut self) -> VectorResult<()> {
        self.records.clear();
        self.dimension = None;
        self.flush()
    }

    /// Insert or overwrite by id. Rejects an embedding whose length doesn't
    /// match the dimension fixed by the first write to this collection.
    pub fn upsert(&mut self, id: &str, document: &str, metadata: Value, embedding: Vec<f32>) -> VectorResult<()> {
        let expected = *self.dimension.get_or_insert(embedding.len());
        if embedding.len() != expected {
            return Err(VectorError::DimensionMismatch {
                expected,
                got: embedding.len(),
            });
        }
        let record = Record {
            id: id.to_string(),
            document: document.to_string(),
            metadata,
            embedding,
        };
        match self.records.iter_mut().find(|r| r.id == id) {
            Some(slot) => *slot = record,
            None => self.records.push(record),
        }
        self.flush()
    }

    /// Nearest `n` records by cosine similarity, optionally filtered by a
    /// predicate over each record's metadata (used for `user_id` scoping).
    pub fn query(&self, embedding: &[f32], n: usize, filter: impl Fn(&Value) -> bool) -> Vec<(Record, f32)> {
        let mut scored: Vec<(Record, f32)> = self
            .records
            .iter()
            .filter(|r| filter(&r.metadata))
            .map(|r| (r.clone(), cosine_similarity(embedding, &r.embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(n);
        scored
    }

    /// The single best match at or above `threshold`, or none.
    pub fn find_best(&self, embedding: &[f32], threshold: f32) -> Option<(Record, f32)> {
        self.records
            .iter()
            .map(|r| (r.clone(), cosine_similarity(embedding, &r.embedding)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .filter(|(_, score)| *score >= threshold)
    }

    fn flush(&self) -> VectorResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = CollectionFile {
            dimension: self.dimension,
            records: self.records.clone(),
        };
        std::fs::write(&self.path, serde_json::to_string(&file)?)?;
        Ok(())
    }
}

/// Cosine similarity in `[-1, 1]`; zero vectors compare as `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = (norm_a * norm_b).sqrt();
    if denom > 0.0 {
        dot / denom
    } else {
        0.0
    }
}
