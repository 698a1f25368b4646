//! # Polaris Core
//!
//! Memory Pipeline and Dual-Store Graph Engine for a personal strategic
//! knowledge base: a relational graph (Self → Vision → Goal → Project →
//! Task, plus People and Concepts) paired with a vector index, fed by an
//! LLM-driven ingestion pipeline and kept alive by a self-evolution loop.
//!
//! ## Components
//!
//! - [`graph`] — durable, user-partitioned node/edge storage, the staging
//!   mirror, experiences, view projections, and self-healing.
//! - [`vector`] — three cosine-similarity collections (documents, concepts,
//!   experiences) over caller-provided embeddings.
//! - [`perception`] — the only component that talks to an embedding model or
//!   a remote LLM: embedding, structured extraction, arbitration, alignment.
//! - [`ingestion`] — turns an uploaded file into staged nodes/edges plus
//!   document vectors (chunk → extract → consolidate → embed → stage).
//! - [`memory_service`] — the same extraction applied per chat turn,
//!   directly to the canonical graph, with the status policy enforced.
//! - [`evolution`] — per-turn and nightly reflection, distilled into
//!   reusable Experience strategies.
//! - [`retrieval`] — composes the five-section plain-text context blob the
//!   external agent consumes per turn.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use polaris_core::config::Config;
//! use polaris_core::graph::GraphStore;
//! use polaris_core::vector::VectorStore;
//!
//! let config = Config::from_env();
//! let graph = GraphStore::open(config.data_root.join("brain.db"))?;
//! let vectors = VectorStore::open(config.data_root.join("chroma"), config.vector_dimension)?;
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

pub mod attention;
pub mod config;
pub mod error;
pub mod evolution;
pub mod graph;
pub mod ingestion;
pub mod memory_service;
pub mod model;
pub mod perception;
pub mod retrieval;
pub mod vector;

pub use config::Config;
pub use error::{GraphError, IngestError, PerceptionError, VectorError};
pub use evolution::EvolutionService;
pub use graph::GraphStore;
pub use ingestion::IngestionOrchestrator;
pub use memory_service::MemoryService;
pub use model::{Edge, Node, NodeStatus, NodeType, Relation};
pub use perception::PerceptionLayer;
pub use retrieval::ContextAssembler;
pub use vector::VectorStore;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
