//! Vector store abstraction
//!
//! The trait keeps orchestration code independent of the concrete backend:
//! the Qdrant adapter is the production implementation, and tests drive the
//! pipeline against an in-memory store. All payload fields live in a flat
//! typed struct so both sides agree on what a stored point looks like.

pub mod qdrant;
pub use qdrant::QdrantStore;

use crate::analysis::ChunkAnalysis;
use crate::config::DistanceMetric;
use crate::error::ScoutError;
use crate::fingerprint::StoredIdentity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Payload stored alongside every vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointPayload {
    /// Normalized root the chunk was indexed under
    pub root_id: String,

    /// Path relative to the root, with forward slashes
    pub file_path: String,

    /// Language tag detected from the extension
    pub language: Option<String>,

    /// Zero-based position of the chunk within its file
    pub chunk_index: usize,

    /// First line of the chunk (1-indexed, inclusive)
    pub start_line: usize,

    /// Last line of the chunk (1-indexed, inclusive)
    pub end_line: usize,

    /// The chunk text itself
    pub content: String,

    /// Hex sha256 of the chunk text, used for change detection
    pub content_hash: String,

    /// Payload layout version the point was written with
    pub schema_version: u64,

    /// Unix timestamp of the write
    pub indexed_at: i64,

    /// Structural analysis, present when analysis was enabled at index time
    pub analysis: Option<ChunkAnalysis>,
}

/// A point ready to be written to the store
#[derive(Debug, Clone)]
pub struct IndexedPoint {
    /// Deterministic UUID for the chunk slot
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

/// A search hit with its normalized similarity score
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub id: String,
    /// Normalized to [0, 1], higher is more similar
    pub score: f32,
    pub payload: PointPayload,
}

/// Metadata conditions applied to search, delete, and stats operations.
///
/// All present fields must match (conjunction).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointFilter {
    pub root_id: Option<String>,
    pub file_path: Option<String>,
    pub language: Option<String>,
    /// Matches points whose chunk_index is >= this value; used to prune
    /// trailing chunks after a file shrinks
    pub min_chunk_index: Option<usize>,
}

impl PointFilter {
    /// Filter scoped to one indexed root.
    pub fn for_root(root_id: impl Into<String>) -> Self {
        Self {
            root_id: Some(root_id.into()),
            ..Self::default()
        }
    }

    pub fn with_file_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_min_chunk_index(mut self, index: usize) -> Self {
        self.min_chunk_index = Some(index);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.root_id.is_none()
            && self.file_path.is_none()
            && self.language.is_none()
            && self.min_chunk_index.is_none()
    }
}

/// Aggregate counts for the points matching a filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionStats {
    /// Distinct file paths
    pub indexed_files: usize,
    /// Total points
    pub indexed_chunks: usize,
}

/// Operations the orchestrators need from a vector store backend
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection if absent, or verify that an existing collection
    /// matches the configured dimension and distance metric.
    async fn ensure_collection(&self) -> Result<(), ScoutError>;

    /// Write points, overwriting any existing point with the same id.
    async fn upsert(&self, points: Vec<IndexedPoint>) -> Result<(), ScoutError>;

    /// Fetch the identity fields of stored points by id.
    ///
    /// Ids with no stored point are simply absent from the result; that is the
    /// signal that the slot has never been written.
    async fn retrieve_identities(
        &self,
        ids: Vec<String>,
    ) -> Result<HashMap<String, StoredIdentity>, ScoutError>;

    /// Similarity search restricted to points matching the filter.
    ///
    /// Scores are normalized to [0, 1] before they are returned.
    async fn search(
        &self,
        vector: Vec<f32>,
        limit: usize,
        filter: &PointFilter,
    ) -> Result<Vec<ScoredChunk>, ScoutError>;

    /// Delete all points matching the filter and return how many were removed.
    async fn delete_matching(&self, filter: &PointFilter) -> Result<usize, ScoutError>;

    /// Count files and chunks among the points matching the filter.
    async fn stats(&self, filter: &PointFilter) -> Result<CollectionStats, ScoutError>;
}

/// Map a backend's raw similarity score into [0, 1].
///
/// Cosine and dot scores land in [-1, 1] for unit vectors and shift to
/// (s + 1) / 2; euclidean distances decay through 1 / (1 + d). Either way the
/// result is clamped so callers can rely on the range.
pub fn normalized_score(metric: DistanceMetric, raw: f32) -> f32 {
    let score = match metric {
        DistanceMetric::Cosine | DistanceMetric::Dot => (raw + 1.0) / 2.0,
        DistanceMetric::Euclid => 1.0 / (1.0 + raw.max(0.0)),
    };
    score.clamp(0.0, 1.0)
}
