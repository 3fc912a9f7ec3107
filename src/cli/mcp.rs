//! MCP server command handler.

use color_eyre::{eyre::eyre, Result};
use rmcp::ServiceExt;

use crate::config::Config;
use crate::context::Context;
use crate::graph::BackendStatus;
use crate::mcp::McpServer;

use super::App;

impl App {
    /// Serve the knowledge graph tools over stdio until the client disconnects.
    ///
    /// An unreachable backend is logged but not fatal; tools report errors
    /// per call and `get_memory_server_status` shows the outage.
    pub async fn run_mcp(&self) -> Result<()> {
        let config = Config::load()?;
        tracing::info!(backend = %config.backend.describe(), "Starting memograph MCP server");

        let server = McpServer::new(Context::connect(&config).await?);

        let status = server.manager.status().await;
        if status.status == BackendStatus::Unavailable {
            tracing::warn!(backend = %status.backend, "Backend unreachable at startup");
        } else if server.manager.initialize().await {
            tracing::info!(index = %config.memory.vector_index, "Vector search ready");
        }
        tracing::info!(mode = ?status.search_mode, "Search mode selected");

        let running = server
            .serve(rmcp::transport::stdio())
            .await
            .map_err(|e| eyre!("Failed to start MCP server: {}", e))?;

        let reason = running
            .waiting()
            .await
            .map_err(|e| eyre!("MCP server error: {}", e))?;

        tracing::info!(?reason, "MCP server stopped");
        Ok(())
    }
}
