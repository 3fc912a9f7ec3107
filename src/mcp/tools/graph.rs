//! Graph-wide tools: status, schema, reads and search.

use rmcp::{
    handler::server::wrapper::Parameters,
    model::CallToolResult,
    schemars::{self, JsonSchema},
    tool, tool_router, ErrorData as McpError,
};
use serde::Deserialize;

use crate::mcp::protocol::{OutputFormat, Response};
use crate::mcp::server::McpServer;

// ============================================================================
// Parameter Types
// ============================================================================

/// Parameters for read_memory tool.
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ReadMemoryParams {
    /// Output format: json (default) or toon.
    #[serde(default)]
    pub format: Option<OutputFormat>,
}

/// Parameters for read_memory_with_depth tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReadMemoryWithDepthParams {
    /// Case-insensitive substring of entity names to start from. Omit to read everything.
    #[serde(default)]
    pub filter_query: Option<String>,
    /// Hops to expand from matching entities (0-2, default 1).
    #[serde(default = "default_depth")]
    pub depth: i64,
    #[serde(default)]
    pub format: Option<OutputFormat>,
}

/// Parameters for read_memory_from_entities tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReadMemoryFromEntitiesParams {
    /// Seed entity IDs.
    pub entity_ids: Vec<String>,
    /// Hops to expand from the seeds (0-2, default 1).
    #[serde(default = "default_depth")]
    pub depth: i64,
    #[serde(default)]
    pub format: Option<OutputFormat>,
}

/// Parameters for search_memory tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchMemoryParams {
    /// Search text. Empty queries return no results.
    pub query: String,
    /// Hops to expand from matches (0-2, default 0).
    #[serde(default)]
    pub depth: i64,
    #[serde(default)]
    pub format: Option<OutputFormat>,
}

fn default_depth() -> i64 {
    1
}

// ============================================================================
// Tool Router
// ============================================================================

#[tool_router(router = graph_tools, vis = "pub(crate)")]
impl McpServer {
    #[tool(description = "Retrieve the status of the graph database memory server.")]
    pub async fn get_memory_server_status(&self) -> Result<CallToolResult, McpError> {
        tracing::info!("Running get_memory_server_status tool");
        let status = self.manager.status().await;
        Response::json(status).into()
    }

    #[tool(description = "Describe node labels, relationship types and their property keys.")]
    pub async fn get_graph_schema(&self) -> Result<CallToolResult, McpError> {
        tracing::info!("Running get_graph_schema tool");
        let schema = self.manager.schema().await.map_err(McpError::from)?;
        Response::json(schema).into()
    }

    #[tool(description = "Read the memory knowledge graph")]
    pub async fn read_memory(
        &self,
        Parameters(params): Parameters<ReadMemoryParams>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!("Running read_memory tool");
        let graph = self.manager.read_graph().await.map_err(McpError::from)?;
        Response(graph, params.format).into()
    }

    #[tool(
        description = "Read entities whose name contains a filter plus their neighbourhood up to a depth (0-2)."
    )]
    pub async fn read_memory_with_depth(
        &self,
        Parameters(params): Parameters<ReadMemoryWithDepthParams>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(filter = ?params.filter_query, depth = params.depth, "Running read_memory_with_depth tool");
        let graph = self
            .manager
            .read_graph_with_depth(params.filter_query.as_deref(), params.depth)
            .await
            .map_err(McpError::from)?;
        Response(graph, params.format).into()
    }

    #[tool(description = "Read the neighbourhood of the given entity IDs up to a depth (0-2).")]
    pub async fn read_memory_from_entities(
        &self,
        Parameters(params): Parameters<ReadMemoryFromEntitiesParams>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(seeds = params.entity_ids.len(), depth = params.depth, "Running read_memory_from_entities tool");
        let graph = self
            .manager
            .read_graph_from_entities(&params.entity_ids, params.depth)
            .await
            .map_err(McpError::from)?;
        Response(graph, params.format).into()
    }

    #[tool(
        description = "Search the memory knowledge graph. Uses semantic search when available, otherwise entity name matching."
    )]
    pub async fn search_memory(
        &self,
        Parameters(params): Parameters<SearchMemoryParams>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(query = %params.query, depth = params.depth, "Running search_memory tool");
        let graph = self
            .manager
            .search(&params.query, params.depth)
            .await
            .map_err(McpError::from)?;
        Response(graph, params.format).into()
    }
}
