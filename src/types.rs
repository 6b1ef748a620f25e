//! Request and response types for the tool surface
//!
//! These types form the stable contract of the MCP tools; every field carries
//! a doc comment because schemars turns them into the tool schemas clients see.

use crate::analysis::ChunkAnalysis;
use crate::error::{ConfigError, ScoutError};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Request to index a codebase
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IndexRequest {
    /// Path to the codebase directory to index
    pub path: String,
    /// Glob patterns to include (empty means every text file)
    #[serde(default)]
    pub include_patterns: Vec<String>,
    /// Glob patterns to exclude, merged with the configured defaults
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    /// Chunk size in lines, overriding the configured default
    #[serde(default)]
    pub chunk_size: Option<usize>,
    /// Overlap between consecutive chunks in lines
    #[serde(default)]
    pub overlap: Option<usize>,
    /// Maximum file size in bytes to index
    #[serde(default)]
    pub max_file_size: Option<usize>,
    /// Maximum directory depth to scan
    #[serde(default)]
    pub max_depth: Option<usize>,
}

impl IndexRequest {
    /// New request with defaults for everything but the path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            chunk_size: None,
            overlap: None,
            max_file_size: None,
            max_depth: None,
        }
    }

    /// Check request-level values; the effective chunk geometry is validated
    /// again after merging with configuration.
    pub fn validate(&self) -> Result<(), ScoutError> {
        if self.path.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "path".to_string(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }
        if let Some(0) = self.chunk_size {
            return Err(ConfigError::InvalidValue {
                key: "chunk_size".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if let (Some(chunk_size), Some(overlap)) = (self.chunk_size, self.overlap)
            && overlap >= chunk_size
        {
            return Err(ConfigError::InvalidValue {
                key: "overlap".to_string(),
                reason: format!("must be smaller than chunk_size ({} >= {})", overlap, chunk_size),
            }
            .into());
        }
        Ok(())
    }
}

/// Terminal state of an indexing run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// The run visited every eligible file; per-chunk errors may still be
    /// present in the counts
    Completed,
    /// The run stopped early; counts reflect work done before the failure
    Failed,
    /// The run was cancelled cooperatively; counts reflect work already stored
    Cancelled,
}

/// The failure that ended a run early
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RunFailure {
    /// Machine-readable error kind
    pub kind: String,
    /// Human-readable description
    pub message: String,
}

/// Report produced by an indexing run
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IndexReport {
    /// Normalized root that was indexed
    pub root: String,
    /// How the run ended
    pub state: RunState,
    /// Files read and chunked
    pub files_scanned: usize,
    /// Files skipped (excluded, oversized, binary, or unreadable)
    pub files_skipped: usize,
    /// Chunks embedded and stored
    pub chunks_embedded: usize,
    /// Chunks left untouched because their content was unchanged
    pub chunks_skipped: usize,
    /// Stale trailing chunks removed after files shrank
    pub chunks_pruned: usize,
    /// Non-fatal per-file and per-chunk error messages
    #[serde(default)]
    pub errors: Vec<String>,
    /// Present when the run ended as failed or cancelled
    #[serde(default)]
    pub failure: Option<RunFailure>,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

/// Request to query an indexed codebase
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueryRequest {
    /// Natural-language or code search query
    pub query: String,
    /// Number of results to return
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Restrict results to the codebase indexed from this path
    #[serde(default)]
    pub path: Option<String>,
    /// Restrict results to one language tag (e.g. "rust")
    #[serde(default)]
    pub language: Option<String>,
    /// Attach a short rationale to each result explaining the match
    #[serde(default)]
    pub explain: bool,
}

fn default_limit() -> usize {
    10
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: default_limit(),
            path: None,
            language: None,
            explain: false,
        }
    }

    pub fn validate(&self) -> Result<(), ScoutError> {
        if self.query.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "query".to_string(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }
        if self.limit == 0 {
            return Err(ConfigError::InvalidValue {
                key: "limit".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// A single search result
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchResult {
    /// File path relative to the indexed root
    pub file_path: String,
    /// Normalized similarity score in [0, 1], higher is more similar
    pub score: f32,
    /// Starting line number (1-indexed, inclusive)
    pub start_line: usize,
    /// Ending line number (1-indexed, inclusive)
    pub end_line: usize,
    /// Position of the chunk within its file
    pub chunk_index: usize,
    /// Language tag, when one was detected
    pub language: Option<String>,
    /// The chunk text
    pub content: String,
    /// Structural analysis stored at index time, when enabled
    #[serde(default)]
    pub analysis: Option<ChunkAnalysis>,
    /// Why this chunk matches the query; present only when requested
    #[serde(default)]
    pub rationale: Option<String>,
}

/// Timing breakdown for one query
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema)]
pub struct QueryTiming {
    /// Time spent embedding the query text
    pub embed_ms: u64,
    /// Time spent in the vector store search
    pub search_ms: u64,
    /// End-to-end time including sorting and rationale generation
    pub total_ms: u64,
}

/// Response from a query
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueryResponse {
    /// Results ordered by descending score, ties broken by path then line
    pub results: Vec<SearchResult>,
    pub timing: QueryTiming,
}

/// Request naming an indexed codebase by its filesystem path
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CodebaseRequest {
    /// Path to the codebase directory
    pub path: String,
}

impl CodebaseRequest {
    pub fn validate(&self) -> Result<(), ScoutError> {
        if self.path.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "path".to_string(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Whether a codebase has any indexed chunks
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalyzedResponse {
    pub analyzed: bool,
}

/// Aggregate counts for one indexed codebase
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StatsResponse {
    /// Distinct files with at least one stored chunk
    pub indexed_files: usize,
    /// Total stored chunks
    pub indexed_chunks: usize,
}

/// Outcome of deleting a codebase from the index
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeleteResponse {
    /// True when at least one point was removed
    pub deleted: bool,
    /// How many points were removed
    pub points_removed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_request_defaults() {
        let request: IndexRequest = serde_json::from_str(r#"{"path": "/repo"}"#).unwrap();
        assert_eq!(request.path, "/repo");
        assert!(request.include_patterns.is_empty());
        assert!(request.chunk_size.is_none());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_index_request_rejects_empty_path() {
        let request = IndexRequest::new("   ");
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_index_request_rejects_overlap_at_chunk_size() {
        let mut request = IndexRequest::new("/repo");
        request.chunk_size = Some(50);
        request.overlap = Some(50);
        assert!(request.validate().is_err());

        request.overlap = Some(49);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_query_request_defaults() {
        let request: QueryRequest = serde_json::from_str(r#"{"query": "parser"}"#).unwrap();
        assert_eq!(request.limit, 10);
        assert!(!request.explain);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_query_request_rejects_blank_query_and_zero_limit() {
        assert!(QueryRequest::new("  ").validate().is_err());

        let mut request = QueryRequest::new("parser");
        request.limit = 0;
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_run_state_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&RunState::Completed).unwrap(),
            r#""completed""#
        );
        assert_eq!(
            serde_json::to_string(&RunState::Cancelled).unwrap(),
            r#""cancelled""#
        );
    }

    #[test]
    fn test_report_roundtrip() {
        let report = IndexReport {
            root: "/repo".to_string(),
            state: RunState::Failed,
            files_scanned: 3,
            files_skipped: 1,
            chunks_embedded: 12,
            chunks_skipped: 4,
            chunks_pruned: 0,
            errors: vec!["src/gen.rs: content unreadable".to_string()],
            failure: Some(RunFailure {
                kind: "storage_unavailable".to_string(),
                message: "connection refused".to_string(),
            }),
            duration_ms: 91,
        };
        let json = serde_json::to_string(&report).unwrap();
        let back: IndexReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.state, RunState::Failed);
        assert_eq!(back.failure.unwrap().kind, "storage_unavailable");
    }
}
