use anyhow::Result;
use clap::Parser;
use codebase_scout::client::ScoutClient;
use codebase_scout::config::Config;
use codebase_scout::mcp_server::ScoutMcpServer;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// MCP server for codebase indexing and semantic search
#[derive(Parser)]
#[command(name = "codebase-scout", version, about)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "SCOUT_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Stdout carries the MCP transport, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let client = ScoutClient::with_config(config).await?;
    let server = ScoutMcpServer::with_client(Arc::new(client));
    server.serve_stdio().await
}
