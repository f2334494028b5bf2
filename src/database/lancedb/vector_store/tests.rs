use super::*;
use crate::test_support::{KeywordEmbedder, keyword_vector};
use tempfile::TempDir;

fn chunk(ordinal: usize, text: &str) -> Chunk {
    let mut metadata = BTreeMap::new();
    metadata.insert("source".to_string(), "meal_plan.txt".to_string());
    metadata.insert("page".to_string(), "1".to_string());
    Chunk {
        text: text.to_string(),
        ordinal,
        overlap: 0,
        metadata,
    }
}

fn meal_chunks() -> Vec<Chunk> {
    vec![
        chunk(0, "Breakfast is oatmeal with berries."),
        chunk(1, "Lunch is a large salad with protein."),
        chunk(2, "Dinner is grilled fish and vegetables."),
        chunk(3, "Drink water throughout the day."),
    ]
}

fn create_test_store() -> (VectorStore, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = VectorStore::new(temp_dir.path().join("index"));
    (store, temp_dir)
}

#[tokio::test]
async fn search_before_rebuild_is_not_ready() {
    let (store, _temp_dir) = create_test_store();

    assert!(!store.is_ready());
    let result = store.search(&keyword_vector("breakfast"), 2, 0.0).await;
    assert!(matches!(result, Err(RagError::IndexNotReady)));
}

#[tokio::test]
async fn rebuild_persists_all_chunks() {
    let (mut store, _temp_dir) = create_test_store();
    let embedder = KeywordEmbedder::default();

    let handle = store
        .rebuild(&meal_chunks(), &embedder)
        .await
        .expect("rebuild should succeed");

    assert_eq!(handle.num_chunks, 4);
    assert_eq!(handle.dimension, keyword_vector("").len());
    assert_eq!(handle.epoch, 1);
    assert!(store.is_ready());
    assert!(store.location().is_dir());
    assert_eq!(store.count().await.expect("count should succeed"), 4);
}

#[tokio::test]
async fn search_returns_best_match_first() {
    let (mut store, _temp_dir) = create_test_store();
    store
        .rebuild(&meal_chunks(), &KeywordEmbedder::default())
        .await
        .expect("rebuild should succeed");

    let results = store
        .search(&keyword_vector("fish for dinner"), 4, -1.0)
        .await
        .expect("search should succeed");

    assert_eq!(results.len(), 4);
    assert_eq!(results[0].chunk.ordinal, 2);
    assert!(results[0].chunk.text.contains("grilled fish"));
    assert_eq!(
        results[0].chunk.metadata.get("source").map(String::as_str),
        Some("meal_plan.txt")
    );
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[tokio::test]
async fn search_respects_k_and_threshold() {
    let (mut store, _temp_dir) = create_test_store();
    store
        .rebuild(&meal_chunks(), &KeywordEmbedder::default())
        .await
        .expect("rebuild should succeed");

    let query = keyword_vector("oatmeal breakfast");

    let top_one = store.search(&query, 1, -1.0).await.expect("search should succeed");
    assert_eq!(top_one.len(), 1);
    assert_eq!(top_one[0].chunk.ordinal, 0);

    let strict = store.search(&query, 4, 0.9).await.expect("search should succeed");
    assert_eq!(strict.len(), 1);
    assert!(strict.iter().all(|r| r.score >= 0.9));

    let nothing = store
        .search(&keyword_vector("engine piston"), 4, 0.5)
        .await
        .expect("search should succeed");
    assert!(nothing.is_empty());
}

#[tokio::test]
async fn rebuild_discards_previous_chunks() {
    let (mut store, _temp_dir) = create_test_store();
    let embedder = KeywordEmbedder::default();

    store
        .rebuild(&meal_chunks(), &embedder)
        .await
        .expect("first rebuild should succeed");

    let engine_chunks = vec![
        chunk(0, "Check the engine oil and the piston rings."),
        chunk(1, "Brake pads wear faster in city driving."),
    ];
    let handle = store
        .rebuild(&engine_chunks, &embedder)
        .await
        .expect("second rebuild should succeed");

    assert_eq!(handle.epoch, 2);
    assert_eq!(store.count().await.expect("count should succeed"), 2);

    let results = store
        .search(&keyword_vector("breakfast oatmeal"), 10, -1.0)
        .await
        .expect("search should succeed");
    assert!(results.iter().all(|r| !r.chunk.text.contains("oatmeal")));
}

#[tokio::test]
async fn embedding_failure_leaves_store_empty() {
    let (mut store, _temp_dir) = create_test_store();
    store
        .rebuild(&meal_chunks(), &KeywordEmbedder::default())
        .await
        .expect("rebuild should succeed");

    let result = store.rebuild(&meal_chunks(), &KeywordEmbedder::failing()).await;

    assert!(matches!(result, Err(RagError::EmbeddingBackend(_))));
    assert!(!store.is_ready());
    assert!(!store.location().exists());
}

#[tokio::test]
async fn unwritable_location_fails_with_index_write() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let blocker = temp_dir.path().join("not-a-directory");
    std::fs::write(&blocker, "plain file").expect("should write file");

    let mut store = VectorStore::new(blocker.join("index"));
    let result = store
        .rebuild(&meal_chunks(), &KeywordEmbedder::default())
        .await;

    assert!(matches!(result, Err(RagError::IndexWrite(_))));
    assert!(!store.is_ready());
}

#[tokio::test]
async fn mismatched_query_dimension_is_rejected() {
    let (mut store, _temp_dir) = create_test_store();
    store
        .rebuild(&meal_chunks(), &KeywordEmbedder::default())
        .await
        .expect("rebuild should succeed");

    let result = store.search(&[0.1, 0.2], 2, 0.0).await;
    assert!(matches!(result, Err(RagError::EmbeddingBackend(_))));
}

#[test]
fn inconsistent_vectors_are_rejected() {
    assert!(validate_vectors(&[vec![0.1, 0.2], vec![0.3]], 2).is_err());
    assert!(validate_vectors(&[vec![0.1]], 2).is_err());
    assert!(validate_vectors(&[Vec::new()], 1).is_err());
    assert_eq!(validate_vectors(&[vec![0.1, 0.2], vec![0.3, 0.4]], 2).ok(), Some(2));
}
