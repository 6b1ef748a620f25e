/// Configuration system for codebase-scout
///
/// Supports loading from multiple sources with priority:
/// Environment variables > Config file > Defaults
use crate::error::{ConfigError, ScoutError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Distance metric used when creating and searching the collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Dot,
    Euclid,
}

impl DistanceMetric {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "cosine" => Some(DistanceMetric::Cosine),
            "dot" => Some(DistanceMetric::Dot),
            "euclid" | "euclidean" => Some(DistanceMetric::Euclid),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::Dot => "dot",
            DistanceMetric::Euclid => "euclid",
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Vector store configuration
    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// LLM analysis configuration
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Indexing configuration
    #[serde(default)]
    pub indexing: IndexingConfig,
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    /// Qdrant server URL
    #[serde(default = "default_store_url")]
    pub url: String,

    /// Collection name for vector storage
    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    /// Declared vector dimensionality of the collection
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Distance metric for the collection
    #[serde(default)]
    pub distance: DistanceMetric,
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Prefer the local fastembed model when it can be initialized
    #[serde(default = "default_true")]
    pub local_enabled: bool,

    /// Local embedding model name
    #[serde(default = "default_local_model")]
    pub local_model: String,

    /// Base URL of the remote OpenAI-compatible provider
    #[serde(default = "default_remote_url")]
    pub remote_url: String,

    /// API key for the remote provider; remote embedding is disabled without it
    #[serde(default)]
    pub remote_api_key: Option<String>,

    /// Remote embedding model name
    #[serde(default = "default_remote_model")]
    pub remote_model: String,

    /// Batch size for embedding generation
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Timeout in seconds for a single provider call
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,

    /// Retry attempts for transient failures
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Fixed delay between retries in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Derived at load time from `remote_api_key`; never read from file
    #[serde(skip)]
    pub remote_enabled: bool,
}

/// LLM analysis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Attach structural analysis to indexed chunks
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Force the deterministic heuristic analyzer even when an LLM is configured
    #[serde(default)]
    pub force_mock: bool,

    /// Base URL of the OpenAI-compatible chat completions endpoint
    #[serde(default = "default_remote_url")]
    pub llm_url: String,

    /// API key for the LLM endpoint; heuristic mode is used without it
    #[serde(default)]
    pub llm_api_key: Option<String>,

    /// Model name for analysis requests
    #[serde(default = "default_llm_model")]
    pub llm_model: String,

    /// Timeout in seconds for a single analysis call
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

/// Indexing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Chunk size in lines
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in lines
    #[serde(default = "default_overlap")]
    pub overlap: usize,

    /// Maximum file size to index (in bytes)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,

    /// Maximum directory depth to scan
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Default include glob patterns (empty means everything)
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// Default exclude glob patterns
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    /// Maximum concurrent in-flight provider calls per run
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

// Default value functions
fn default_store_url() -> String {
    "http://localhost:6334".to_string()
}

fn default_collection_name() -> String {
    "code_chunks".to_string()
}

fn default_dimension() -> usize {
    384
}

fn default_true() -> bool {
    true
}

fn default_local_model() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_remote_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_remote_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_batch_size() -> usize {
    32
}

fn default_request_timeout() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_chunk_size() -> usize {
    100
}

fn default_overlap() -> usize {
    20
}

fn default_max_file_size() -> usize {
    1_048_576 // 1 MiB
}

fn default_max_depth() -> usize {
    10
}

fn default_exclude_patterns() -> Vec<String> {
    vec![
        "**/.git/**".to_string(),
        "**/node_modules/**".to_string(),
        "**/target/**".to_string(),
        "**/dist/**".to_string(),
        "**/build/**".to_string(),
        "**/vendor/**".to_string(),
        "**/.venv/**".to_string(),
    ]
}

fn default_max_in_flight() -> usize {
    4
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            collection_name: default_collection_name(),
            dimension: default_dimension(),
            distance: DistanceMetric::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            local_enabled: true,
            local_model: default_local_model(),
            remote_url: default_remote_url(),
            remote_api_key: None,
            remote_model: default_remote_model(),
            batch_size: default_batch_size(),
            timeout_secs: default_request_timeout(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            remote_enabled: false,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            force_mock: false,
            llm_url: default_remote_url(),
            llm_api_key: None,
            llm_model: default_llm_model(),
            timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
            max_file_size: default_max_file_size(),
            max_depth: default_max_depth(),
            include_patterns: Vec::new(),
            exclude_patterns: default_exclude_patterns(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self, ScoutError> {
        if !path.exists() {
            return Err(ConfigError::LoadFailed(format!(
                "config file not found: {}",
                path.display()
            ))
            .into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("failed to read config file: {}", e)))?;

        let mut config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("invalid TOML: {}", e)))?;

        config.finalize();
        config.validate()?;
        Ok(config)
    }

    /// Create a new Config with defaults and environment overrides applied
    pub fn new() -> Result<Self, ScoutError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.finalize();
        config.validate()?;
        Ok(config)
    }

    /// Load from an optional config file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ScoutError> {
        let mut config = match path {
            Some(p) => {
                tracing::info!("Loading config from: {}", p.display());
                Self::from_file(p)?
            }
            None => {
                tracing::info!("No config file given, using defaults");
                Self::default()
            }
        };
        config.apply_env_overrides();
        config.finalize();
        config.validate()?;
        Ok(config)
    }

    /// Compute derived fields once at load time
    fn finalize(&mut self) {
        self.embedding.remote_enabled = self
            .embedding
            .remote_api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty());
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("SCOUT_STORE_URL") {
            self.vector_store.url = url;
        }

        if let Ok(name) = std::env::var("SCOUT_COLLECTION") {
            self.vector_store.collection_name = name;
        }

        if let Ok(dim) = std::env::var("SCOUT_DIMENSION")
            && let Ok(dim) = dim.parse()
        {
            self.vector_store.dimension = dim;
        }

        if let Ok(metric) = std::env::var("SCOUT_DISTANCE")
            && let Some(metric) = DistanceMetric::parse(&metric)
        {
            self.vector_store.distance = metric;
        }

        if let Ok(enabled) = std::env::var("SCOUT_LOCAL_EMBEDDING")
            && let Ok(enabled) = enabled.parse()
        {
            self.embedding.local_enabled = enabled;
        }

        if let Ok(key) = std::env::var("SCOUT_REMOTE_API_KEY") {
            self.embedding.remote_api_key = Some(key);
        }

        if let Ok(url) = std::env::var("SCOUT_REMOTE_URL") {
            self.embedding.remote_url = url;
        }

        if let Ok(key) = std::env::var("SCOUT_LLM_API_KEY") {
            self.analysis.llm_api_key = Some(key);
        }

        if let Ok(mock) = std::env::var("SCOUT_ANALYSIS_MOCK")
            && let Ok(mock) = mock.parse()
        {
            self.analysis.force_mock = mock;
        }

        if let Ok(size) = std::env::var("SCOUT_CHUNK_SIZE")
            && let Ok(size) = size.parse()
        {
            self.indexing.chunk_size = size;
        }

        if let Ok(overlap) = std::env::var("SCOUT_OVERLAP")
            && let Ok(overlap) = overlap.parse()
        {
            self.indexing.overlap = overlap;
        }

        if let Ok(size) = std::env::var("SCOUT_MAX_FILE_SIZE")
            && let Ok(size) = size.parse()
        {
            self.indexing.max_file_size = size;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ScoutError> {
        if self.vector_store.dimension == 0 {
            return Err(ConfigError::InvalidValue {
                key: "vector_store.dimension".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.indexing.chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "indexing.chunk_size".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        // The chunker requires a positive step between consecutive chunks
        if self.indexing.overlap >= self.indexing.chunk_size {
            return Err(ConfigError::InvalidValue {
                key: "indexing.overlap".to_string(),
                reason: format!(
                    "must be smaller than chunk_size ({} >= {})",
                    self.indexing.overlap, self.indexing.chunk_size
                ),
            }
            .into());
        }

        if self.indexing.max_file_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "indexing.max_file_size".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.indexing.max_in_flight == 0 {
            return Err(ConfigError::InvalidValue {
                key: "indexing.max_in_flight".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.embedding.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "embedding.batch_size".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if !self.embedding.local_enabled && !self.embedding.remote_enabled {
            return Err(ConfigError::MissingRequired(
                "embedding.remote_api_key (local embedding is disabled)".to_string(),
            )
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.vector_store.url, "http://localhost:6334");
        assert_eq!(config.vector_store.collection_name, "code_chunks");
        assert_eq!(config.vector_store.dimension, 384);
        assert_eq!(config.vector_store.distance, DistanceMetric::Cosine);
        assert_eq!(config.indexing.chunk_size, 100);
        assert_eq!(config.indexing.overlap, 20);
        assert_eq!(config.indexing.max_file_size, 1_048_576);
        assert_eq!(config.indexing.max_depth, 10);
        assert_eq!(config.indexing.max_in_flight, 4);
        assert!(config.embedding.local_enabled);
        assert!(!config.embedding.remote_enabled);
    }

    #[test]
    fn test_default_excludes_cover_dependency_dirs() {
        let excludes = default_exclude_patterns();
        assert!(excludes.iter().any(|p| p.contains(".git")));
        assert!(excludes.iter().any(|p| p.contains("node_modules")));
        assert!(excludes.iter().any(|p| p.contains("target")));
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let mut config = Config::default();
        config.indexing.chunk_size = 20;
        config.indexing.overlap = 20;
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), "configuration_error");

        config.indexing.overlap = 19;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_no_provider_is_configuration_error() {
        let mut config = Config::default();
        config.embedding.local_enabled = false;
        assert!(config.validate().is_err());

        config.embedding.remote_api_key = Some("sk-test".to_string());
        config.finalize();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_remote_enabled_derived_once() {
        let mut config = Config::default();
        assert!(!config.embedding.remote_enabled);

        config.embedding.remote_api_key = Some("sk-test".to_string());
        config.finalize();
        assert!(config.embedding.remote_enabled);

        // Blank keys do not count as configured
        config.embedding.remote_api_key = Some("   ".to_string());
        config.finalize();
        assert!(!config.embedding.remote_enabled);
    }

    #[test]
    fn test_distance_metric_parse() {
        assert_eq!(DistanceMetric::parse("cosine"), Some(DistanceMetric::Cosine));
        assert_eq!(DistanceMetric::parse("Euclidean"), Some(DistanceMetric::Euclid));
        assert_eq!(DistanceMetric::parse("dot"), Some(DistanceMetric::Dot));
        assert_eq!(DistanceMetric::parse("hamming"), None);
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
            [vector_store]
            url = "http://qdrant:6334"
            dimension = 768

            [indexing]
            chunk_size = 50
            overlap = 10
        "#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.finalize();
        config.validate().unwrap();

        assert_eq!(config.vector_store.url, "http://qdrant:6334");
        assert_eq!(config.vector_store.dimension, 768);
        assert_eq!(config.indexing.chunk_size, 50);
        assert_eq!(config.indexing.overlap, 10);
        // Untouched sections keep their defaults
        assert_eq!(config.embedding.batch_size, 32);
    }
}
