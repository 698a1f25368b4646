//! Process configuration.
//!
//! Read once at startup from environment variables, following the same
//! "env var with a documented default" convention the teacher uses for
//! `FASTEMBED_CACHE_PATH` / `VESTIGE_ENCRYPTION_KEY`.

use std::path::PathBuf;

/// Recognized environment options (spec.md §6).
#[derive(Debug, Clone)]
pub struct Config {
    /// Filesystem root for all stores (`brain.db`, `chroma/`, `uploads/`).
    pub data_root: PathBuf,
    /// Path or handle for the local embedder.
    pub embedding_model_id: String,
    /// Target vector dimension; a mismatch on open triggers collection reset.
    pub vector_dimension: usize,
    /// Model id used for structured extraction.
    pub llm_extraction_model_id: String,
    /// Timeout for a single extraction call.
    pub llm_extraction_timeout_s: u64,
    /// Attention-filter keyword list.
    pub core_keywords: Vec<String>,
    /// Keywords that trigger structured (graph) recall over concept recall.
    pub graph_search_keywords: Vec<String>,
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Chunk overlap in characters.
    pub chunk_overlap: usize,
    /// Hour (0-23, local to the process) the nightly reflect/strategize cycle runs.
    pub nightly_cycle_hour: u32,
    /// Batch size for chunk-level extraction.
    pub concurrent_extractors: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("./data"),
            embedding_model_id: "nomic-embed-text-v1.5".to_string(),
            vector_dimension: 1024,
            llm_extraction_model_id: "openai/gpt-4o-mini".to_string(),
            llm_extraction_timeout_s: 30,
            core_keywords: DEFAULT_CORE_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            graph_search_keywords: DEFAULT_GRAPH_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            chunk_size: 4000,
            chunk_overlap: 400,
            nightly_cycle_hour: 3,
            concurrent_extractors: 10,
        }
    }
}

const DEFAULT_CORE_KEYWORDS: &[&str] = &[
    "goal", "vision", "project", "task", "plan", "strategy", "mission", "priority", "deadline",
    "milestone", "objective",
];

const DEFAULT_GRAPH_KEYWORDS: &[&str] = &["project", "task", "goal", "plan", "vision"];

impl Config {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_root: std::env::var("POLARIS_DATA_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_root),
            embedding_model_id: std::env::var("POLARIS_EMBEDDING_MODEL_ID")
                .unwrap_or(defaults.embedding_model_id),
            vector_dimension: std::env::var("POLARIS_VECTOR_DIMENSION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.vector_dimension),
            llm_extraction_model_id: std::env::var("POLARIS_LLM_EXTRACTION_MODEL_ID")
                .unwrap_or(defaults.llm_extraction_model_id),
            llm_extraction_timeout_s: std::env::var("POLARIS_LLM_EXTRACTION_TIMEOUT_S")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.llm_extraction_timeout_s),
            core_keywords: defaults.core_keywords,
            graph_search_keywords: defaults.graph_search_keywords,
            chunk_size: std::env::var("POLARIS_CHUNK_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.chunk_size),
            chunk_overlap: std::env::var("POLARIS_CHUNK_OVERLAP")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.chunk_overlap),
            nightly_cycle_hour: std::env::var("POLARIS_NIGHTLY_CYCLE_HOUR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.nightly_cycle_hour),
            concurrent_extractors: std::env::var("POLARIS_CONCURRENT_EXTRACTORS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.concurrent_extractors),
        }
    }

    pub fn graph_db_path(&self) -> PathBuf {
        self.data_root.join("brain.db")
    }

    pub fn vector_store_path(&self) -> PathBuf {
        self.data_root.join("chroma")
    }

    pub fn uploads_path(&self) -> PathBuf {
        self.data_root.join("uploads")
    }
}
