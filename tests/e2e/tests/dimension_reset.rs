//! Scenario 5 (spec.md §8): re-opening a vector store under a different
//! target dimension resets the three collections instead of erroring.

mod common;

use polaris_core::VectorStore;

#[tokio::test]
async fn reopening_under_a_new_dimension_resets_collections_without_erroring() {
    let dir = tempfile::tempdir().expect("temp dir");

    {
        let store = VectorStore::open(dir.path(), 1024).expect("open at 1024");
        store
            .add_documents(
                &["a memory".to_string()],
                &[serde_json::json!({"user_id": "u1"})],
                &["doc1".to_string()],
                &[vec![0.1_f32; 1024]],
            )
            .expect("seed a document");
        assert_eq!(store.get_stats().documents, 1);
    }

    let store = VectorStore::open(dir.path(), 512).expect("reopen at 512");
    assert_eq!(store.get_stats().documents, 0, "collections reset on dimension mismatch");

    let hits = store.search_documents(&vec![0.0_f32; 512], Some("u1"), 5);
    assert!(hits.is_empty(), "search on a freshly reset store returns empty, not an error");
}
