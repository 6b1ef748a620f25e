//! End-to-end pipeline tests against an in-memory vector store
//!
//! These drive the real client (walker, chunker, fingerprint gating,
//! embedding gateway, analysis, orchestration) with a deterministic embedder
//! and a store that lives in a HashMap, so every incremental-indexing claim
//! is checked without external services.

use async_trait::async_trait;
use codebase_scout::analysis::AnalysisGateway;
use codebase_scout::client::ScoutClient;
use codebase_scout::config::{Config, DistanceMetric};
use codebase_scout::embedding::{EmbeddingGateway, EmbeddingProvider};
use codebase_scout::error::{EmbeddingError, ScoutError, StoreError};
use codebase_scout::fingerprint::StoredIdentity;
use codebase_scout::types::{CodebaseRequest, IndexRequest, QueryRequest, RunState};
use codebase_scout::vector_db::{
    CollectionStats, IndexedPoint, PointFilter, PointPayload, ScoredChunk, VectorStore,
    normalized_score,
};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const DIMENSION: usize = 8;

/// Vector store backed by a HashMap, mirroring the adapter contract
#[derive(Default)]
struct InMemoryStore {
    points: Mutex<HashMap<String, IndexedPoint>>,
    fail_upserts: AtomicBool,
}

fn filter_matches(filter: &PointFilter, payload: &PointPayload) -> bool {
    filter.root_id.as_ref().is_none_or(|r| *r == payload.root_id)
        && filter
            .file_path
            .as_ref()
            .is_none_or(|f| *f == payload.file_path)
        && filter
            .language
            .as_ref()
            .is_none_or(|l| payload.language.as_deref() == Some(l.as_str()))
        && filter
            .min_chunk_index
            .is_none_or(|min| payload.chunk_index >= min)
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn ensure_collection(&self) -> Result<(), ScoutError> {
        Ok(())
    }

    async fn upsert(&self, points: Vec<IndexedPoint>) -> Result<(), ScoutError> {
        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()).into());
        }
        let mut stored = self.points.lock().unwrap();
        for point in points {
            stored.insert(point.id.clone(), point);
        }
        Ok(())
    }

    async fn retrieve_identities(
        &self,
        ids: Vec<String>,
    ) -> Result<HashMap<String, StoredIdentity>, ScoutError> {
        let stored = self.points.lock().unwrap();
        Ok(ids
            .into_iter()
            .filter_map(|id| {
                stored.get(&id).map(|point| {
                    (
                        id,
                        StoredIdentity {
                            content_hash: point.payload.content_hash.clone(),
                            schema_version: point.payload.schema_version,
                        },
                    )
                })
            })
            .collect())
    }

    async fn search(
        &self,
        vector: Vec<f32>,
        limit: usize,
        filter: &PointFilter,
    ) -> Result<Vec<ScoredChunk>, ScoutError> {
        let stored = self.points.lock().unwrap();
        let mut hits: Vec<ScoredChunk> = stored
            .values()
            .filter(|p| filter_matches(filter, &p.payload))
            .map(|p| {
                let raw: f32 = p.vector.iter().zip(&vector).map(|(a, b)| a * b).sum();
                ScoredChunk {
                    id: p.id.clone(),
                    score: normalized_score(DistanceMetric::Cosine, raw),
                    payload: p.payload.clone(),
                }
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete_matching(&self, filter: &PointFilter) -> Result<usize, ScoutError> {
        let mut stored = self.points.lock().unwrap();
        let before = stored.len();
        stored.retain(|_, p| !filter_matches(filter, &p.payload));
        Ok(before - stored.len())
    }

    async fn stats(&self, filter: &PointFilter) -> Result<CollectionStats, ScoutError> {
        let stored = self.points.lock().unwrap();
        let mut files = HashSet::new();
        let mut chunks = 0;
        for point in stored.values() {
            if filter_matches(filter, &point.payload) {
                chunks += 1;
                files.insert(point.payload.file_path.clone());
            }
        }
        Ok(CollectionStats {
            indexed_files: files.len(),
            indexed_chunks: chunks,
        })
    }
}

/// Deterministic unit-vector embedder; identical text embeds identically
struct HashEmbedder {
    texts_embedded: AtomicUsize,
}

impl HashEmbedder {
    fn new() -> Self {
        Self {
            texts_embedded: AtomicUsize::new(0),
        }
    }

    fn vector_for(text: &str) -> Vec<f32> {
        let mut state = 0x9E37_79B9u32;
        for byte in text.bytes() {
            state = state.wrapping_mul(31).wrapping_add(byte as u32);
        }
        let mut vector = Vec::with_capacity(DIMENSION);
        for _ in 0..DIMENSION {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            vector.push((state as f32 / u32::MAX as f32) - 0.5);
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.texts_embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vector_for(t)).collect())
    }

    fn name(&self) -> &str {
        "hash-embedder"
    }
}

struct Harness {
    client: ScoutClient,
    store: Arc<InMemoryStore>,
    embedder: Arc<HashEmbedder>,
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::default());
    let embedder = Arc::new(HashEmbedder::new());

    let mut config = Config::default();
    config.vector_store.dimension = DIMENSION;
    config.indexing.chunk_size = 10;
    config.indexing.overlap = 2;

    let embedding = EmbeddingGateway::with_provider(
        embedder.clone(),
        DIMENSION,
        2,
        Duration::from_millis(1),
    );
    let client = ScoutClient::with_components(
        store.clone(),
        embedding,
        Arc::new(AnalysisGateway::heuristic()),
        config,
    );

    Harness {
        client,
        store,
        embedder,
    }
}

fn write_lines(path: &Path, count: usize, tag: &str) {
    let content: String = (1..=count)
        .map(|i| format!("fn {}_{}() {{}}\n", tag, i))
        .collect();
    fs::write(path, content).unwrap();
}

#[tokio::test]
async fn test_reindexing_unchanged_codebase_embeds_nothing() {
    let h = harness();
    let dir = tempfile::tempdir().unwrap();
    write_lines(&dir.path().join("a.rs"), 15, "alpha");
    write_lines(&dir.path().join("b.rs"), 5, "beta");

    let first = h
        .client
        .index_codebase(IndexRequest::new(dir.path().to_str().unwrap()))
        .await
        .unwrap();
    assert_eq!(first.state, RunState::Completed);
    // a.rs: 15 lines at chunk 10 / overlap 2 -> 2 chunks; b.rs -> 1 chunk
    assert_eq!(first.chunks_embedded, 3);
    assert_eq!(first.files_scanned, 2);
    assert!(first.errors.is_empty());

    let embedded_after_first = h.embedder.texts_embedded.load(Ordering::SeqCst);
    assert_eq!(embedded_after_first, 3);

    let second = h
        .client
        .index_codebase(IndexRequest::new(dir.path().to_str().unwrap()))
        .await
        .unwrap();
    assert_eq!(second.state, RunState::Completed);
    assert_eq!(second.chunks_embedded, 0);
    assert_eq!(second.chunks_skipped, 3);
    // The provider was never called again
    assert_eq!(
        h.embedder.texts_embedded.load(Ordering::SeqCst),
        embedded_after_first
    );
}

#[tokio::test]
async fn test_modified_file_reembeds_only_its_chunks() {
    let h = harness();
    let dir = tempfile::tempdir().unwrap();
    write_lines(&dir.path().join("stable.rs"), 5, "stable");
    write_lines(&dir.path().join("edited.rs"), 5, "edited");

    let request = IndexRequest::new(dir.path().to_str().unwrap());
    h.client.index_codebase(request.clone()).await.unwrap();

    write_lines(&dir.path().join("edited.rs"), 5, "edited_v2");

    let report = h.client.index_codebase(request).await.unwrap();
    assert_eq!(report.chunks_embedded, 1);
    assert_eq!(report.chunks_skipped, 1);
    assert_eq!(report.chunks_pruned, 0);
}

#[tokio::test]
async fn test_shrunk_file_prunes_stale_trailing_chunks() {
    let h = harness();
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("big.rs");
    // 30 lines at chunk 10 / overlap 2 -> starts at 1, 9, 17, 25 -> 4 chunks
    write_lines(&file, 30, "big");

    let request = IndexRequest::new(dir.path().to_str().unwrap());
    let first = h.client.index_codebase(request.clone()).await.unwrap();
    assert_eq!(first.chunks_embedded, 4);

    write_lines(&file, 5, "small");
    let second = h.client.index_codebase(request).await.unwrap();
    assert_eq!(second.chunks_embedded, 1);
    assert_eq!(second.chunks_pruned, 3);

    let stats = h
        .client
        .get_codebase_stats(CodebaseRequest {
            path: dir.path().to_str().unwrap().to_string(),
        })
        .await
        .unwrap();
    assert_eq!(stats.indexed_files, 1);
    assert_eq!(stats.indexed_chunks, 1);
}

#[tokio::test]
async fn test_shrunk_to_unchanged_prefix_still_prunes_stale_chunks() {
    let h = harness();
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("big.rs");
    // 26 lines at chunk 10 / overlap 2 -> starts at 1, 9, 17, 25 -> 4 chunks
    write_lines(&file, 26, "big");

    let request = IndexRequest::new(dir.path().to_str().unwrap());
    let first = h.client.index_codebase(request.clone()).await.unwrap();
    assert_eq!(first.chunks_embedded, 4);

    // Truncating to exactly the first chunk's lines leaves that chunk's
    // fingerprint identical, so nothing re-embeds - the trailing points
    // must still be pruned
    write_lines(&file, 10, "big");
    let second = h.client.index_codebase(request).await.unwrap();
    assert_eq!(second.chunks_embedded, 0);
    assert_eq!(second.chunks_skipped, 1);
    assert_eq!(second.chunks_pruned, 3);

    let stats = h
        .client
        .get_codebase_stats(CodebaseRequest {
            path: dir.path().to_str().unwrap().to_string(),
        })
        .await
        .unwrap();
    assert_eq!(stats.indexed_files, 1);
    assert_eq!(stats.indexed_chunks, 1);
}

#[tokio::test]
async fn test_query_finds_exact_chunk_with_top_score() {
    let h = harness();
    let dir = tempfile::tempdir().unwrap();
    write_lines(&dir.path().join("a.rs"), 5, "alpha");
    write_lines(&dir.path().join("b.rs"), 5, "beta");

    h.client
        .index_codebase(IndexRequest::new(dir.path().to_str().unwrap()))
        .await
        .unwrap();

    // Query with the exact text of a.rs's single chunk; identical text embeds
    // identically, so it must rank first with the maximum normalized score
    let chunk_text = (1..=5)
        .map(|i| format!("fn alpha_{}() {{}}", i))
        .collect::<Vec<_>>()
        .join("\n");
    let response = h
        .client
        .query_codebase(QueryRequest::new(chunk_text))
        .await
        .unwrap();

    assert!(!response.results.is_empty());
    assert_eq!(response.results[0].file_path, "a.rs");
    assert!((response.results[0].score - 1.0).abs() < 1e-5);
    for window in response.results.windows(2) {
        assert!(window[0].score >= window[1].score);
    }
    for result in &response.results {
        assert!((0.0..=1.0).contains(&result.score));
        // Heuristic analysis was attached at index time
        let analysis = result.analysis.as_ref().unwrap();
        assert!(analysis.complexity_score >= 1);
    }
}

#[tokio::test]
async fn test_query_language_filter() {
    let h = harness();
    let dir = tempfile::tempdir().unwrap();
    write_lines(&dir.path().join("code.rs"), 5, "rusty");
    fs::write(dir.path().join("notes.md"), "# some notes\n").unwrap();

    h.client
        .index_codebase(IndexRequest::new(dir.path().to_str().unwrap()))
        .await
        .unwrap();

    let mut request = QueryRequest::new("rusty functions");
    request.language = Some("rust".to_string());
    let response = h.client.query_codebase(request).await.unwrap();

    assert!(!response.results.is_empty());
    for result in &response.results {
        assert_eq!(result.language.as_deref(), Some("rust"));
    }
}

#[tokio::test]
async fn test_explain_attaches_rationale() {
    let h = harness();
    let dir = tempfile::tempdir().unwrap();
    write_lines(&dir.path().join("a.rs"), 5, "alpha");

    h.client
        .index_codebase(IndexRequest::new(dir.path().to_str().unwrap()))
        .await
        .unwrap();

    let mut request = QueryRequest::new("alpha");
    request.explain = true;
    let response = h.client.query_codebase(request).await.unwrap();
    assert!(!response.results.is_empty());
    assert!(response.results[0].rationale.is_some());

    // Without explain the field stays empty
    let response = h
        .client
        .query_codebase(QueryRequest::new("alpha"))
        .await
        .unwrap();
    assert!(response.results[0].rationale.is_none());
}

#[tokio::test]
async fn test_delete_codebase_and_analyzed_flag() {
    let h = harness();
    let dir = tempfile::tempdir().unwrap();
    write_lines(&dir.path().join("a.rs"), 5, "alpha");
    let path = dir.path().to_str().unwrap().to_string();

    let analyzed = h
        .client
        .is_codebase_analyzed(CodebaseRequest { path: path.clone() })
        .await
        .unwrap();
    assert!(!analyzed.analyzed);

    h.client
        .index_codebase(IndexRequest::new(&path))
        .await
        .unwrap();
    let analyzed = h
        .client
        .is_codebase_analyzed(CodebaseRequest { path: path.clone() })
        .await
        .unwrap();
    assert!(analyzed.analyzed);

    let deleted = h
        .client
        .delete_codebase(CodebaseRequest { path: path.clone() })
        .await
        .unwrap();
    assert!(deleted.deleted);
    assert_eq!(deleted.points_removed, 1);

    let stats = h
        .client
        .get_codebase_stats(CodebaseRequest { path: path.clone() })
        .await
        .unwrap();
    assert_eq!(stats.indexed_chunks, 0);

    // Deleting again is a no-op, not an error
    let deleted = h
        .client
        .delete_codebase(CodebaseRequest { path })
        .await
        .unwrap();
    assert!(!deleted.deleted);
    assert_eq!(deleted.points_removed, 0);
}

#[tokio::test]
async fn test_repeated_query_returns_identical_results() {
    let h = harness();
    let dir = tempfile::tempdir().unwrap();
    write_lines(&dir.path().join("a.rs"), 15, "alpha");
    write_lines(&dir.path().join("b.rs"), 5, "beta");

    h.client
        .index_codebase(IndexRequest::new(dir.path().to_str().unwrap()))
        .await
        .unwrap();

    let request = QueryRequest::new("alpha functions");
    let first = h.client.query_codebase(request.clone()).await.unwrap();
    let second = h.client.query_codebase(request).await.unwrap();

    assert!(!first.results.is_empty());
    assert_eq!(first.results.len(), second.results.len());
    for (a, b) in first.results.iter().zip(&second.results) {
        assert_eq!(a.file_path, b.file_path);
        assert_eq!(a.chunk_index, b.chunk_index);
        assert_eq!(a.score.to_bits(), b.score.to_bits());
    }
}

#[tokio::test]
async fn test_dimension_mismatch_counts_error_and_stores_nothing() {
    let store = Arc::new(InMemoryStore::default());
    let mut config = Config::default();
    config.vector_store.dimension = DIMENSION;
    config.indexing.chunk_size = 10;
    config.indexing.overlap = 2;

    // The gateway is declared narrower than what the provider emits, so
    // every batch fails its dimension check
    let embedding = EmbeddingGateway::with_provider(
        Arc::new(HashEmbedder::new()),
        DIMENSION / 2,
        2,
        Duration::from_millis(1),
    );
    let client = ScoutClient::with_components(
        store.clone(),
        embedding,
        Arc::new(AnalysisGateway::heuristic()),
        config,
    );

    let dir = tempfile::tempdir().unwrap();
    write_lines(&dir.path().join("a.rs"), 5, "alpha");

    let report = client
        .index_codebase(IndexRequest::new(dir.path().to_str().unwrap()))
        .await
        .unwrap();
    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.chunks_embedded, 0);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("embedding failed"));

    let stats = client
        .get_codebase_stats(CodebaseRequest {
            path: dir.path().to_str().unwrap().to_string(),
        })
        .await
        .unwrap();
    assert_eq!(stats.indexed_chunks, 0);
}

#[tokio::test]
async fn test_delete_codebase_after_directory_removed() {
    let h = harness();
    let dir = tempfile::tempdir().unwrap();
    write_lines(&dir.path().join("a.rs"), 5, "alpha");
    // The canonical spelling stays valid as a lexical path after removal
    let path = fs::canonicalize(dir.path())
        .unwrap()
        .to_string_lossy()
        .to_string();

    h.client
        .index_codebase(IndexRequest::new(&path))
        .await
        .unwrap();
    dir.close().unwrap();

    let stats = h
        .client
        .get_codebase_stats(CodebaseRequest { path: path.clone() })
        .await
        .unwrap();
    assert_eq!(stats.indexed_chunks, 1);

    let deleted = h
        .client
        .delete_codebase(CodebaseRequest { path })
        .await
        .unwrap();
    assert!(deleted.deleted);
    assert_eq!(deleted.points_removed, 1);
}

#[tokio::test]
async fn test_storage_failure_ends_run_as_failed() {
    let h = harness();
    let dir = tempfile::tempdir().unwrap();
    write_lines(&dir.path().join("a.rs"), 5, "alpha");
    h.store.fail_upserts.store(true, Ordering::SeqCst);

    let report = h
        .client
        .index_codebase(IndexRequest::new(dir.path().to_str().unwrap()))
        .await
        .unwrap();

    assert_eq!(report.state, RunState::Failed);
    let failure = report.failure.unwrap();
    assert_eq!(failure.kind, "storage_unavailable");
    assert_eq!(report.chunks_embedded, 0);
    // The walk still happened; counts up to the failure are reported
    assert_eq!(report.files_scanned, 1);
}

#[tokio::test]
async fn test_cancelled_token_ends_run_as_cancelled() {
    let h = harness();
    let dir = tempfile::tempdir().unwrap();
    write_lines(&dir.path().join("a.rs"), 5, "alpha");

    let token = CancellationToken::new();
    token.cancel();

    let report = h
        .client
        .index_codebase_with_cancellation(
            IndexRequest::new(dir.path().to_str().unwrap()),
            token,
        )
        .await
        .unwrap();

    assert_eq!(report.state, RunState::Cancelled);
    assert_eq!(report.chunks_embedded, 0);
    assert_eq!(report.failure.unwrap().kind, "cancelled");
}

#[tokio::test]
async fn test_missing_root_is_an_error_not_a_report() {
    let h = harness();
    let err = h
        .client
        .index_codebase(IndexRequest::new("/no/such/directory"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "indexing_error");
}

#[tokio::test]
async fn test_request_overrides_change_chunk_geometry() {
    let h = harness();
    let dir = tempfile::tempdir().unwrap();
    write_lines(&dir.path().join("a.rs"), 30, "alpha");

    let mut request = IndexRequest::new(dir.path().to_str().unwrap());
    request.chunk_size = Some(30);
    request.overlap = Some(0);
    let report = h.client.index_codebase(request).await.unwrap();
    assert_eq!(report.chunks_embedded, 1);
}
