use super::EmbeddingProvider;
use crate::error::EmbeddingError;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::{Arc, Mutex};

/// Local embedding provider backed by fastembed
///
/// The model requires `&mut self` to embed, so it lives behind a mutex and
/// batches are pushed onto a blocking thread.
pub struct LocalEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
    model_name: String,
}

impl LocalEmbedder {
    /// Initialize the local model by configured name.
    ///
    /// Failure here (model files missing, unsupported name) is what triggers
    /// the gateway's fallback to the remote provider.
    pub fn new(model_name: &str) -> Result<Self, EmbeddingError> {
        let model = match model_name {
            "all-MiniLM-L6-v2" => EmbeddingModel::AllMiniLML6V2,
            "all-MiniLM-L12-v2" => EmbeddingModel::AllMiniLML12V2,
            "BAAI/bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
            "BAAI/bge-base-en-v1.5" => EmbeddingModel::BGEBaseENV15,
            other => {
                return Err(EmbeddingError::InitializationFailed(format!(
                    "unsupported local model: {}",
                    other
                )));
            }
        };

        tracing::info!("Initializing local embedding model: {:?}", model);

        let mut options = InitOptions::default();
        options.model_name = model;
        options.show_download_progress = false;

        let embedding_model = TextEmbedding::try_new(options)
            .map_err(|e| EmbeddingError::InitializationFailed(e.to_string()))?;

        Ok(Self {
            model: Arc::new(Mutex::new(embedding_model)),
            model_name: model_name.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for LocalEmbedder {
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.model.clone();
        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|e| EmbeddingError::RequestFailed(format!("model lock poisoned: {}", e)))?;
            model
                .embed(texts, None)
                .map_err(|e| EmbeddingError::RequestFailed(e.to_string()))
        })
        .await
        .map_err(|e| EmbeddingError::RequestFailed(format!("embedding task panicked: {}", e)))?
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}
