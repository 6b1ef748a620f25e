//! MCP protocol server
//!
//! A thin wrapper over [`ScoutClient`]: each tool validates its request,
//! delegates, and serializes the typed response. All domain behavior lives in
//! the client so the same functionality is usable as a plain library.

use crate::client::ScoutClient;
use crate::error::ScoutError;
use crate::types::{CodebaseRequest, IndexRequest, QueryRequest};
use anyhow::{Context, Result};
use rmcp::{
    ServerHandler, ServiceExt,
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct ScoutMcpServer {
    client: Arc<ScoutClient>,
    tool_router: ToolRouter<Self>,
}

impl ScoutMcpServer {
    /// Create a server with default configuration.
    pub async fn new() -> Result<Self> {
        let client = ScoutClient::new()
            .await
            .context("Failed to create client")?;
        Ok(Self::with_client(Arc::new(client)))
    }

    /// Wrap an existing client.
    pub fn with_client(client: Arc<ScoutClient>) -> Self {
        Self {
            client,
            tool_router: Self::tool_router(),
        }
    }

    pub fn client(&self) -> &ScoutClient {
        &self.client
    }

    /// Serve over stdio until the client disconnects.
    ///
    /// Logging must go to stderr; stdout carries the protocol.
    pub async fn serve_stdio(self) -> Result<()> {
        tracing::info!("Starting MCP server on stdio");
        let transport = rmcp::transport::io::stdio();
        self.serve(transport).await?.waiting().await?;
        Ok(())
    }
}

/// Tool errors carry the machine-readable kind in front of the message
fn tool_error(e: ScoutError) -> String {
    format!("[{}] {}", e.kind(), e)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("Serialization failed: {}", e))
}

#[tool_router(router = tool_router)]
impl ScoutMcpServer {
    #[tool(
        description = "Index a codebase directory for semantic search. Unchanged chunks are detected and skipped, so re-running after edits only embeds what changed."
    )]
    async fn index_codebase(
        &self,
        Parameters(req): Parameters<IndexRequest>,
    ) -> Result<String, String> {
        let report = self
            .client
            .index_codebase(req)
            .await
            .map_err(tool_error)?;
        to_json(&report)
    }

    #[tool(
        description = "Search indexed codebases by semantic similarity. Supports filtering by codebase path and language, and an optional per-result rationale."
    )]
    async fn query_codebase(
        &self,
        Parameters(req): Parameters<QueryRequest>,
    ) -> Result<String, String> {
        let response = self
            .client
            .query_codebase(req)
            .await
            .map_err(tool_error)?;
        to_json(&response)
    }

    #[tool(description = "Check whether a codebase has been indexed")]
    async fn is_codebase_analyzed(
        &self,
        Parameters(req): Parameters<CodebaseRequest>,
    ) -> Result<String, String> {
        let response = self
            .client
            .is_codebase_analyzed(req)
            .await
            .map_err(tool_error)?;
        to_json(&response)
    }

    #[tool(description = "Get indexed file and chunk counts for a codebase")]
    async fn get_codebase_stats(
        &self,
        Parameters(req): Parameters<CodebaseRequest>,
    ) -> Result<String, String> {
        let response = self
            .client
            .get_codebase_stats(req)
            .await
            .map_err(tool_error)?;
        to_json(&response)
    }

    #[tool(description = "Remove all indexed data for a codebase")]
    async fn delete_codebase(
        &self,
        Parameters(req): Parameters<CodebaseRequest>,
    ) -> Result<String, String> {
        let response = self
            .client
            .delete_codebase(req)
            .await
            .map_err(tool_error)?;
        to_json(&response)
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for ScoutMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "codebase-scout".into(),
                title: Some("Codebase Scout - Semantic Code Search".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Codebase indexing and semantic search over a vector store. \
                Use index_codebase to embed a directory (incremental on re-runs), \
                query_codebase to search, and get_codebase_stats or \
                is_codebase_analyzed to inspect what is indexed."
                    .into(),
            ),
        }
    }
}
