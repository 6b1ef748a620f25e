//! Structural analysis of chunks
//!
//! The gateway is built once per client with an explicit mode: heuristic
//! (deterministic, no model call) or LLM-backed. The mode is decided from
//! configuration at construction time and logged once, never re-decided per
//! call. LLM failures degrade to the heuristic per chunk and are reported to
//! the caller so runs can count them as errors.

pub mod heuristic;
mod llm;

pub use llm::LlmAnalyzer;

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Structured semantic summary of one chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ChunkAnalysis {
    /// One-line summary of the chunk
    pub summary: String,
    /// Short phrase describing what the chunk is for
    pub purpose: String,
    /// Structural complexity estimate, always >= 1
    pub complexity_score: u32,
    /// Named entities (declared identifiers) detected in the chunk
    pub entities: Vec<String>,
}

enum Analyzer {
    Heuristic,
    Llm(Arc<LlmAnalyzer>),
}

/// Analysis strategy chosen once per client
pub struct AnalysisGateway {
    analyzer: Analyzer,
    enabled: bool,
}

impl AnalysisGateway {
    /// Pick the analyzer from configuration.
    ///
    /// LLM mode requires analysis to be enabled, mock not forced, and a key
    /// configured; anything else selects the heuristic.
    pub fn from_config(config: &AnalysisConfig) -> Self {
        if !config.enabled {
            tracing::info!("Chunk analysis disabled");
            return Self {
                analyzer: Analyzer::Heuristic,
                enabled: false,
            };
        }

        if config.force_mock {
            tracing::info!("Using heuristic chunk analysis (mock mode forced)");
            return Self {
                analyzer: Analyzer::Heuristic,
                enabled: true,
            };
        }

        match LlmAnalyzer::from_config(config) {
            Ok(llm) => {
                tracing::info!("Using LLM chunk analysis via {}", config.llm_model);
                Self {
                    analyzer: Analyzer::Llm(Arc::new(llm)),
                    enabled: true,
                }
            }
            Err(e) => {
                tracing::info!("Using heuristic chunk analysis ({})", e);
                Self {
                    analyzer: Analyzer::Heuristic,
                    enabled: true,
                }
            }
        }
    }

    /// Heuristic-only gateway (test seam).
    pub fn heuristic() -> Self {
        Self {
            analyzer: Analyzer::Heuristic,
            enabled: true,
        }
    }

    /// Whether analysis output should be attached to points at all
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Analyze one chunk.
    ///
    /// Never fails: an LLM error degrades to the heuristic result for this
    /// chunk and is returned alongside it so the run can count the error.
    pub async fn analyze(
        &self,
        text: &str,
        language: Option<&str>,
    ) -> (ChunkAnalysis, Option<AnalysisError>) {
        match &self.analyzer {
            Analyzer::Heuristic => (heuristic::analyze(text, language), None),
            Analyzer::Llm(llm) => match llm.analyze(text, language).await {
                Ok(analysis) => (analysis, None),
                Err(e) => {
                    tracing::warn!("LLM analysis failed, using heuristic fallback: {}", e);
                    (heuristic::analyze(text, language), Some(e))
                }
            },
        }
    }

    /// Produce a short rationale for a query match.
    ///
    /// Returns None when the rationale cannot be produced; a query never
    /// fails because of this path.
    pub async fn rationale(&self, query: &str, chunk_text: &str) -> Option<String> {
        match &self.analyzer {
            Analyzer::Heuristic => {
                let analysis = heuristic::analyze(chunk_text, None);
                Some(format!("{} - {}", analysis.purpose, analysis.summary))
            }
            Analyzer::Llm(llm) => match llm.rationale(query, chunk_text).await {
                Ok(rationale) => Some(rationale),
                Err(e) => {
                    tracing::debug!("Rationale generation failed: {}", e);
                    None
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_heuristic_gateway_never_errors() {
        let gateway = AnalysisGateway::heuristic();
        let (analysis, err) = gateway.analyze("fn main() {}", Some("rust")).await;
        assert!(err.is_none());
        assert!(analysis.complexity_score >= 1);
        assert_eq!(analysis.entities, vec!["main".to_string()]);
    }

    #[tokio::test]
    async fn test_disabled_config_selects_heuristic() {
        let config = AnalysisConfig {
            enabled: false,
            ..AnalysisConfig::default()
        };
        let gateway = AnalysisGateway::from_config(&config);
        assert!(!gateway.is_enabled());
    }

    #[tokio::test]
    async fn test_missing_key_selects_heuristic() {
        let config = AnalysisConfig::default();
        assert!(config.llm_api_key.is_none());
        let gateway = AnalysisGateway::from_config(&config);
        assert!(gateway.is_enabled());
        let (_, err) = gateway.analyze("x", None).await;
        assert!(err.is_none());
    }

    #[tokio::test]
    async fn test_heuristic_rationale_is_deterministic() {
        let gateway = AnalysisGateway::heuristic();
        let a = gateway.rationale("parsing", "fn parse() {}").await;
        let b = gateway.rationale("parsing", "fn parse() {}").await;
        assert_eq!(a, b);
        assert!(a.is_some());
    }
}
