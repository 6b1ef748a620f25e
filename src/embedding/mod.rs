//! Embedding generation
//!
//! A gateway wraps one concrete provider, chosen once at construction time:
//! the local fastembed model when enabled and loadable, otherwise the remote
//! OpenAI-compatible endpoint when a key is configured. The same gateway is
//! shared by the indexing and query paths so stored and query vectors are
//! always comparable.

mod local;
mod remote;

pub use local::LocalEmbedder;
pub use remote::RemoteEmbedder;

use crate::config::EmbeddingConfig;
use crate::error::EmbeddingError;
use std::sync::Arc;
use std::time::Duration;

/// Trait for embedding generation
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for a batch of texts, one vector per input
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Provider selection, retry and dimension validation in front of a provider
#[derive(Clone)]
pub struct EmbeddingGateway {
    provider: Arc<dyn EmbeddingProvider>,
    dimension: usize,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl EmbeddingGateway {
    /// Probe configuration and pick a provider once.
    ///
    /// Local is preferred when enabled; a local initialization failure falls
    /// back to the remote provider when a key is configured. With neither
    /// path usable the gateway cannot be built.
    pub fn from_config(config: &EmbeddingConfig, dimension: usize) -> Result<Self, EmbeddingError> {
        let provider: Arc<dyn EmbeddingProvider> = if config.local_enabled {
            match LocalEmbedder::new(&config.local_model) {
                Ok(local) => Arc::new(local),
                Err(e) if config.remote_enabled => {
                    tracing::warn!(
                        "Local embedding model unavailable ({}), falling back to remote provider",
                        e
                    );
                    Arc::new(RemoteEmbedder::from_config(config)?)
                }
                Err(e) => {
                    return Err(EmbeddingError::Unavailable(format!(
                        "local model failed to initialize and no remote key is configured: {}",
                        e
                    )));
                }
            }
        } else if config.remote_enabled {
            Arc::new(RemoteEmbedder::from_config(config)?)
        } else {
            return Err(EmbeddingError::Unavailable(
                "local embedding disabled and no remote key configured".to_string(),
            ));
        };

        tracing::info!("Using embedding provider: {}", provider.name());

        Ok(Self {
            provider,
            dimension,
            retry_attempts: config.retry_attempts.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    /// Wrap an existing provider (test seam and custom deployments).
    pub fn with_provider(
        provider: Arc<dyn EmbeddingProvider>,
        dimension: usize,
        retry_attempts: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            provider,
            dimension,
            retry_attempts: retry_attempts.max(1),
            retry_delay,
        }
    }

    /// The dimensionality every returned vector is validated against
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Embed a batch of texts.
    ///
    /// Transient failures are retried with a fixed delay up to the configured
    /// attempt count; anything else surfaces immediately. Every vector is
    /// checked against the configured dimension - a mismatch is fatal for the
    /// batch and never silently truncated or padded.
    pub async fn embed_batch(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut attempt = 0u32;
        let vectors = loop {
            attempt += 1;
            match self.provider.embed_batch(texts.clone()).await {
                Ok(vectors) => break vectors,
                Err(e) if e.is_transient() && attempt < self.retry_attempts => {
                    tracing::warn!(
                        "Transient embedding failure (attempt {}/{}): {}",
                        attempt,
                        self.retry_attempts,
                        e
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        };

        if vectors.len() != texts.len() {
            return Err(EmbeddingError::RequestFailed(format!(
                "provider returned {} vectors for {} inputs",
                vectors.len(),
                texts.len()
            )));
        }

        for vector in &vectors {
            if vector.len() != self.dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dimension,
                    actual: vector.len(),
                });
            }
        }

        Ok(vectors)
    }

    /// Embed a single text (the query path).
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_batch(vec![text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| EmbeddingError::RequestFailed("empty embedding response".to_string()))
    }
}
