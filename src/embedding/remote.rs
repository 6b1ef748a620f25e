use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;
use crate::error::EmbeddingError;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Remote embedding provider speaking the OpenAI-compatible `/embeddings` API
pub struct RemoteEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

impl RemoteEmbedder {
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let api_key = config
            .remote_api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                EmbeddingError::Unavailable("remote API key is not configured".to_string())
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::InitializationFailed(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.remote_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.remote_model.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    fn classify(&self, err: reqwest::Error) -> EmbeddingError {
        if err.is_timeout() {
            EmbeddingError::Timeout(self.timeout_secs)
        } else if err.is_connect() {
            EmbeddingError::Transient(err.to_string())
        } else {
            EmbeddingError::RequestFailed(err.to_string())
        }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for RemoteEmbedder {
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let expected = texts.len();
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "input": texts,
            }))
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(EmbeddingError::Transient(format!(
                "provider returned {}",
                status
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::RequestFailed(format!(
                "provider returned {}: {}",
                status, body
            )));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::RequestFailed(format!("malformed response: {}", e)))?;

        // Rows come back with an index field; order by it rather than trusting
        // response order
        let mut rows = parsed.data;
        rows.sort_by_key(|row| row.index);

        if rows.len() != expected {
            return Err(EmbeddingError::RequestFailed(format!(
                "provider returned {} embeddings for {} inputs",
                rows.len(),
                expected
            )));
        }

        Ok(rows.into_iter().map(|row| row.embedding).collect())
    }

    fn name(&self) -> &str {
        &self.model
    }
}
