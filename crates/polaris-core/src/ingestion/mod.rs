//! Ingestion Orchestrator — turns an uploaded file into staged graph
//! entities plus document vectors (spec.md §4.4).

mod chunker;
mod consolidator;
mod orchestrator;
mod parser;

pub use orchestrator::IngestionOrchestrator;
