use super::ChunkAnalysis;
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Chunk analyzer backed by an OpenAI-compatible chat completions endpoint
pub struct LlmAnalyzer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

const SYSTEM_PROMPT: &str = "You are a code analysis service. Given a source code fragment, reply with a single JSON object and nothing else, with keys: summary (one sentence), purpose (short phrase), complexity_score (integer >= 1), entities (array of declared identifier names).";

impl LlmAnalyzer {
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        let api_key = config
            .llm_api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                AnalysisError::Unavailable("LLM API key is not configured".to_string())
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AnalysisError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.llm_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.llm_model.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    /// Ask the model for a structured analysis of one chunk.
    pub async fn analyze(
        &self,
        text: &str,
        language: Option<&str>,
    ) -> Result<ChunkAnalysis, AnalysisError> {
        let user_prompt = match language {
            Some(lang) => format!("Language: {}\n\n{}", lang, text),
            None => text.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "temperature": 0,
                "messages": [
                    {"role": "system", "content": SYSTEM_PROMPT},
                    {"role": "user", "content": user_prompt},
                ],
            }))
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::RequestFailed(format!(
                "LLM returned {}: {}",
                status, body
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::MalformedResponse(e.to_string()))?;

        let content = parsed
            .choices
            .first()
            .map(|choice| choice.message.content.as_str())
            .ok_or_else(|| {
                AnalysisError::MalformedResponse("response contained no choices".to_string())
            })?;

        parse_analysis(content)
    }

    /// Ask the model why a retrieved chunk matches a query.
    pub async fn rationale(&self, query: &str, chunk_text: &str) -> Result<String, AnalysisError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "temperature": 0,
                "messages": [
                    {"role": "system", "content": "In one sentence, explain why the given code fragment is relevant to the query. Reply with the sentence only."},
                    {"role": "user", "content": format!("Query: {}\n\nFragment:\n{}", query, chunk_text)},
                ],
            }))
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        if !response.status().is_success() {
            return Err(AnalysisError::RequestFailed(format!(
                "LLM returned {}",
                response.status()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::MalformedResponse(e.to_string()))?;

        parsed
            .choices
            .first()
            .map(|choice| choice.message.content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| {
                AnalysisError::MalformedResponse("response contained no choices".to_string())
            })
    }

    fn classify(&self, err: reqwest::Error) -> AnalysisError {
        if err.is_timeout() {
            AnalysisError::Timeout(self.timeout_secs)
        } else {
            AnalysisError::RequestFailed(err.to_string())
        }
    }
}

/// Parse the model reply into a `ChunkAnalysis`, tolerating code fences.
fn parse_analysis(content: &str) -> Result<ChunkAnalysis, AnalysisError> {
    let trimmed = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let analysis: ChunkAnalysis = serde_json::from_str(trimmed)
        .map_err(|e| AnalysisError::MalformedResponse(e.to_string()))?;

    if analysis.complexity_score < 1 {
        return Err(AnalysisError::MalformedResponse(
            "complexity_score must be >= 1".to_string(),
        ));
    }

    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        let content = r#"{"summary": "Parses headers", "purpose": "parsing", "complexity_score": 3, "entities": ["parse_header"]}"#;
        let analysis = parse_analysis(content).unwrap();
        assert_eq!(analysis.summary, "Parses headers");
        assert_eq!(analysis.complexity_score, 3);
        assert_eq!(analysis.entities, vec!["parse_header".to_string()]);
    }

    #[test]
    fn test_parse_fenced_json() {
        let content = "```json\n{\"summary\": \"s\", \"purpose\": \"p\", \"complexity_score\": 1, \"entities\": []}\n```";
        let analysis = parse_analysis(content).unwrap();
        assert_eq!(analysis.summary, "s");
    }

    #[test]
    fn test_parse_rejects_prose() {
        let err = parse_analysis("This code parses headers.").unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_rejects_zero_complexity() {
        let content =
            r#"{"summary": "s", "purpose": "p", "complexity_score": 0, "entities": []}"#;
        let err = parse_analysis(content).unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse(_)));
    }
}
