//! # Codebase Scout - Codebase Indexing and Semantic Search
//!
//! A Model Context Protocol (MCP) server that indexes codebases into a vector
//! store and answers semantic queries over them.
//!
//! ## Overview
//!
//! Files are split into overlapping line-based chunks, embedded (local
//! fastembed model or a remote OpenAI-compatible endpoint), optionally
//! annotated with a structural analysis, and upserted into Qdrant under
//! deterministic content-addressed ids. Re-indexing is incremental: chunk
//! identity lives in the store itself, so unchanged chunks are skipped without
//! any local cache, and the check survives process restarts.
//!
//! ## Modules
//!
//! - [`client`]: core orchestration (indexing runs, queries, stats, deletion)
//! - [`mcp_server`]: MCP stdio server exposing the five tools
//! - [`indexer`]: file walking, filtering, and chunking
//! - [`embedding`]: embedding providers and the gateway in front of them
//! - [`analysis`]: heuristic and LLM-backed chunk analysis
//! - [`vector_db`]: vector store trait and the Qdrant adapter
//! - [`fingerprint`]: content hashes and stable point ids
//! - [`config`]: TOML + environment configuration
//! - [`types`]: request/response types of the tool surface
//! - [`error`]: error taxonomy with machine-readable kinds
//!
//! ## Usage Example
//!
//! ```no_run
//! use codebase_scout::{ScoutClient, IndexRequest, QueryRequest};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ScoutClient::new().await?;
//!
//!     let report = client.index_codebase(IndexRequest::new("/path/to/code")).await?;
//!     println!("Embedded {} chunks", report.chunks_embedded);
//!
//!     let response = client
//!         .query_codebase(QueryRequest::new("where are requests validated?"))
//!         .await?;
//!     for result in response.results {
//!         println!("{}:{} ({:.2})", result.file_path, result.start_line, result.score);
//!     }
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod client;
pub mod config;
pub mod embedding;
pub mod error;
pub mod fingerprint;
pub mod indexer;
pub mod mcp_server;
pub mod paths;
pub mod types;
pub mod vector_db;

pub use client::ScoutClient;
pub use config::Config;
pub use error::ScoutError;
pub use mcp_server::ScoutMcpServer;
pub use types::{
    AnalyzedResponse, CodebaseRequest, DeleteResponse, IndexReport, IndexRequest, QueryRequest,
    QueryResponse, RunState, SearchResult, StatsResponse,
};
