//! Shared end-to-end test scaffolding: an isolated graph/vector/perception
//! stack per test, optionally wired to a scripted LLM stub.

#![allow(dead_code)]

pub mod mock_llm;

use std::sync::Arc;

use polaris_core::{Config, EvolutionService, GraphStore, IngestionOrchestrator, MemoryService, PerceptionLayer, VectorStore};
use tempfile::TempDir;

use mock_llm::MockLlm;

/// A fully isolated engine instance, owning its own temp directories so
/// nothing leaks between tests run in the same process.
pub struct TestEngine {
    pub graph: GraphStore,
    pub vectors: VectorStore,
    pub perception: PerceptionLayer,
    pub config: Config,
    _vector_dir: TempDir,
    _llm: Option<MockLlm>,
}

impl TestEngine {
    /// Plain engine with no LLM behind it — extraction/completion calls
    /// degrade to their documented empty-result fallback. Fine for
    /// scenarios that only exercise the Graph/Vector store contracts.
    pub async fn new() -> Self {
        Self::build(None).await
    }

    /// Engine wired to a mock LLM that answers with `responses` in order,
    /// cycling once exhausted. Use for scenarios that depend on structured
    /// extraction or micro-evolution output.
    pub async fn with_scripted_llm(responses: Vec<&str>) -> Self {
        Self::build(Some(responses)).await
    }

    async fn build(responses: Option<Vec<&str>>) -> Self {
        let vector_dir = TempDir::new().expect("vector store temp dir");
        let mut config = Config::default();
        config.vector_dimension = 16;

        let llm = match responses {
            Some(responses) => {
                let mock = MockLlm::start(responses).await;
                // SAFETY-equivalent note: these tests never run concurrently
                // within one process (one scenario per binary), so mutating
                // process env here does not race with another test's LLM.
                std::env::set_var("POLARIS_LLM_API_BASE", &mock.base_url);
                Some(mock)
            }
            None => {
                std::env::remove_var("POLARIS_LLM_API_BASE");
                None
            }
        };

        let graph = GraphStore::open_in_memory().expect("open in-memory graph store");
        let vectors = VectorStore::open(vector_dir.path(), config.vector_dimension).expect("open vector store");
        let perception = PerceptionLayer::new(&config);

        Self {
            graph,
            vectors,
            perception,
            config,
            _vector_dir: vector_dir,
            _llm: llm,
        }
    }

    pub fn memory_service(&self) -> MemoryService<'_> {
        MemoryService::new(&self.graph, &self.vectors, &self.perception, &self.config)
    }

    pub fn orchestrator(&self) -> IngestionOrchestrator<'_> {
        IngestionOrchestrator::new(&self.graph, &self.vectors, &self.perception, &self.config)
    }
}

/// Evolution Service needs `Arc`-owned stores of its own (it can outlive a
/// borrow, for the background scheduler); build a dedicated set for the
/// scenarios that exercise it rather than threading `Arc` through
/// `TestEngine` for every other scenario that doesn't need it.
pub struct EvolutionTestEngine {
    pub service: EvolutionService,
    pub graph: Arc<GraphStore>,
    pub vectors: Arc<VectorStore>,
    _vector_dir: TempDir,
    _llm: Option<MockLlm>,
}

impl EvolutionTestEngine {
    pub async fn with_scripted_llm(responses: Vec<&str>) -> Self {
        let vector_dir = TempDir::new().expect("vector store temp dir");
        let mut config = Config::default();
        config.vector_dimension = 16;

        let mock = MockLlm::start(responses).await;
        std::env::set_var("POLARIS_LLM_API_BASE", &mock.base_url);

        let graph = Arc::new(GraphStore::open_in_memory().expect("open in-memory graph store"));
        let vectors = Arc::new(VectorStore::open(vector_dir.path(), config.vector_dimension).expect("open vector store"));
        let perception = Arc::new(PerceptionLayer::new(&config));
        let service = EvolutionService::new(graph.clone(), vectors.clone(), perception, config);

        Self {
            service,
            graph,
            vectors,
            _vector_dir: vector_dir,
            _llm: Some(mock),
        }
    }
}
