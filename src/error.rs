/// Centralized error types for codebase-scout using thiserror
///
/// Chunk- and file-level failures are absorbed into run statistics by the
/// indexing orchestrator; everything that reaches a caller does so as one of
/// these variants with a machine-readable kind.
use thiserror::Error;

/// Main error type for the indexing and retrieval pipeline
#[derive(Error, Debug)]
pub enum ScoutError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Vector store error: {0}")]
    Store(#[from] StoreError),

    #[error("Indexing error: {0}")]
    Indexing(#[from] IndexingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors related to configuration loading and validation
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

/// Errors related to embedding generation
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("No embedding provider is usable: {0}")]
    Unavailable(String),

    #[error("Failed to initialize embedding model: {0}")]
    InitializationFailed(String),

    #[error("Embedding request failed: {0}")]
    RequestFailed(String),

    #[error("Transient embedding failure: {0}")]
    Transient(String),

    #[error("Embedding request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Errors related to chunk analysis
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("No analysis provider is reachable: {0}")]
    Unavailable(String),

    #[error("Analysis request failed: {0}")]
    RequestFailed(String),

    #[error("Analysis response could not be parsed: {0}")]
    MalformedResponse(String),

    #[error("Analysis request timed out after {0} seconds")]
    Timeout(u64),
}

/// Errors related to the vector store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Vector store is unreachable: {0}")]
    Unavailable(String),

    #[error(
        "Collection '{collection}' schema mismatch: expected {expected_dimension}/{expected_distance}, found {actual_dimension}/{actual_distance}"
    )]
    SchemaMismatch {
        collection: String,
        expected_dimension: u64,
        actual_dimension: u64,
        expected_distance: String,
        actual_distance: String,
    },

    #[error("Failed to create collection '{collection}': {reason}")]
    CollectionCreationFailed { collection: String, reason: String },

    #[error("Failed to upsert points: {0}")]
    UpsertFailed(String),

    #[error("Failed to retrieve points: {0}")]
    RetrieveFailed(String),

    #[error("Failed to search points: {0}")]
    SearchFailed(String),

    #[error("Failed to delete points: {0}")]
    DeleteFailed(String),

    #[error("Failed to aggregate statistics: {0}")]
    StatsFailed(String),
}

/// Errors related to walking and reading a codebase
#[derive(Error, Debug)]
pub enum IndexingError {
    #[error("Root directory not found: {0}")]
    RootNotFound(String),

    #[error("Root path is not a directory: {0}")]
    NotADirectory(String),

    #[error("Failed to walk directory: {0}")]
    WalkFailed(String),

    #[error("File content is unreadable (binary or not UTF-8): {0}")]
    ContentUnreadable(String),

    #[error("Indexing run already in progress for root: {0}")]
    RunInProgress(String),

    #[error("Indexing was cancelled")]
    Cancelled,
}

// Conversion from anyhow::Error, used at the MCP boundary
impl From<anyhow::Error> for ScoutError {
    fn from(err: anyhow::Error) -> Self {
        ScoutError::Other(format!("{:#}", err))
    }
}

impl ScoutError {
    /// Create a new error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        ScoutError::Other(msg.into())
    }

    /// Machine-readable error kind for structured operation results
    pub fn kind(&self) -> &'static str {
        match self {
            ScoutError::Config(_) => "configuration_error",
            ScoutError::Embedding(EmbeddingError::DimensionMismatch { .. }) => {
                "embedding_dimension_mismatch"
            }
            ScoutError::Embedding(EmbeddingError::Unavailable(_)) => "embedding_unavailable",
            ScoutError::Embedding(_) => "embedding_error",
            ScoutError::Analysis(AnalysisError::Unavailable(_)) => "analysis_unavailable",
            ScoutError::Analysis(_) => "analysis_error",
            ScoutError::Store(StoreError::SchemaMismatch { .. }) => "collection_schema_mismatch",
            ScoutError::Store(StoreError::Unavailable(_)) => "storage_unavailable",
            ScoutError::Store(_) => "storage_error",
            ScoutError::Indexing(IndexingError::ContentUnreadable(_)) => "content_unreadable",
            ScoutError::Indexing(IndexingError::Cancelled) => "cancelled",
            ScoutError::Indexing(_) => "indexing_error",
            ScoutError::Io(_) => "io_error",
            ScoutError::Other(_) => "internal_error",
        }
    }

    /// Check if this error is retryable (transient network/timeout failures)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScoutError::Embedding(EmbeddingError::Transient(_))
                | ScoutError::Embedding(EmbeddingError::Timeout(_))
                | ScoutError::Store(StoreError::Unavailable(_))
                | ScoutError::Io(_)
        )
    }
}

impl EmbeddingError {
    /// Transient failures are retried with a fixed delay; everything else
    /// surfaces immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EmbeddingError::Transient(_) | EmbeddingError::Timeout(_)
        )
    }
}
