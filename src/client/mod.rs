//! Core library client
//!
//! `ScoutClient` owns the component stack (vector store, embedding gateway,
//! analysis gateway, configuration) and exposes the five operations the MCP
//! server wraps. It is usable directly as a library; the server adds nothing
//! but transport.

mod indexing;

use crate::analysis::AnalysisGateway;
use crate::config::Config;
use crate::embedding::EmbeddingGateway;
use crate::error::ScoutError;
use crate::paths::resolve_root;
use crate::types::{
    AnalyzedResponse, CodebaseRequest, DeleteResponse, QueryRequest, QueryResponse, QueryTiming,
    SearchResult, StatsResponse,
};
use crate::vector_db::{PointFilter, QdrantStore, ScoredChunk, VectorStore};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Main client for indexing codebases and querying them
#[derive(Clone)]
pub struct ScoutClient {
    pub(crate) store: Arc<dyn VectorStore>,
    pub(crate) embedding: EmbeddingGateway,
    pub(crate) analysis: Arc<AnalysisGateway>,
    pub(crate) config: Arc<Config>,
    /// Roots with an indexing run in progress in this process
    pub(crate) active_roots: Arc<Mutex<HashSet<String>>>,
}

impl ScoutClient {
    /// Create a client from default configuration and environment overrides.
    pub async fn new() -> Result<Self, ScoutError> {
        Self::with_config(Config::new()?).await
    }

    /// Create a client from an explicit configuration.
    pub async fn with_config(config: Config) -> Result<Self, ScoutError> {
        let store = Arc::new(QdrantStore::connect(&config.vector_store)?);
        let embedding =
            EmbeddingGateway::from_config(&config.embedding, config.vector_store.dimension)?;
        let analysis = Arc::new(AnalysisGateway::from_config(&config.analysis));
        Ok(Self::with_components(store, embedding, analysis, config))
    }

    /// Assemble a client from pre-built components.
    ///
    /// This is how tests drive the pipeline against an in-memory store and a
    /// deterministic embedder.
    pub fn with_components(
        store: Arc<dyn VectorStore>,
        embedding: EmbeddingGateway,
        analysis: Arc<AnalysisGateway>,
        config: Config,
    ) -> Self {
        Self {
            store,
            embedding,
            analysis,
            config: Arc::new(config),
            active_roots: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Search indexed chunks by semantic similarity.
    ///
    /// Results come back in a deterministic order: descending score, with ties
    /// broken by ascending file path, then ascending start line.
    pub async fn query_codebase(&self, request: QueryRequest) -> Result<QueryResponse, ScoutError> {
        request.validate()?;
        let started = Instant::now();

        let mut filter = PointFilter::default();
        if let Some(path) = &request.path {
            filter.root_id = Some(resolve_root(path)?);
        }
        if let Some(language) = &request.language {
            filter.language = Some(language.to_lowercase());
        }

        let embed_started = Instant::now();
        let query_vector = self.embedding.embed_one(&request.query).await?;
        let embed_ms = embed_started.elapsed().as_millis() as u64;

        let search_started = Instant::now();
        let mut hits = self
            .store
            .search(query_vector, request.limit, &filter)
            .await?;
        let search_ms = search_started.elapsed().as_millis() as u64;

        sort_hits(&mut hits);
        hits.truncate(request.limit);

        let explain = request.explain && self.analysis.is_enabled();
        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let rationale = if explain {
                self.analysis
                    .rationale(&request.query, &hit.payload.content)
                    .await
            } else {
                None
            };
            results.push(SearchResult {
                file_path: hit.payload.file_path,
                score: hit.score,
                start_line: hit.payload.start_line,
                end_line: hit.payload.end_line,
                chunk_index: hit.payload.chunk_index,
                language: hit.payload.language,
                content: hit.payload.content,
                analysis: hit.payload.analysis,
                rationale,
            });
        }

        Ok(QueryResponse {
            results,
            timing: QueryTiming {
                embed_ms,
                search_ms,
                total_ms: started.elapsed().as_millis() as u64,
            },
        })
    }

    /// Whether the codebase at `path` has any indexed chunks.
    pub async fn is_codebase_analyzed(
        &self,
        request: CodebaseRequest,
    ) -> Result<AnalyzedResponse, ScoutError> {
        request.validate()?;
        let root_id = resolve_root(&request.path)?;
        let stats = self.store.stats(&PointFilter::for_root(root_id)).await?;
        Ok(AnalyzedResponse {
            analyzed: stats.indexed_chunks > 0,
        })
    }

    /// Count indexed files and chunks for the codebase at `path`.
    pub async fn get_codebase_stats(
        &self,
        request: CodebaseRequest,
    ) -> Result<StatsResponse, ScoutError> {
        request.validate()?;
        let root_id = resolve_root(&request.path)?;
        let stats = self.store.stats(&PointFilter::for_root(root_id)).await?;
        Ok(StatsResponse {
            indexed_files: stats.indexed_files,
            indexed_chunks: stats.indexed_chunks,
        })
    }

    /// Remove every stored chunk for the codebase at `path`.
    ///
    /// Works after the directory itself is gone: the root falls back to its
    /// lexical absolute form, so an indexed codebase can always be cleaned up.
    pub async fn delete_codebase(
        &self,
        request: CodebaseRequest,
    ) -> Result<DeleteResponse, ScoutError> {
        request.validate()?;
        let root_id = resolve_root(&request.path)?;
        let points_removed = self
            .store
            .delete_matching(&PointFilter::for_root(&root_id))
            .await?;
        tracing::info!("Deleted {} points for root {}", points_removed, root_id);
        Ok(DeleteResponse {
            deleted: points_removed > 0,
            points_removed,
        })
    }
}

/// Deterministic result order: score descending, then path, then start line.
fn sort_hits(hits: &mut [ScoredChunk]) {
    hits.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.payload.file_path.cmp(&b.payload.file_path))
            .then_with(|| a.payload.start_line.cmp(&b.payload.start_line))
    });
}
