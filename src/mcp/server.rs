//! MCP server implementation for memograph.

use std::sync::Arc;

use rmcp::{
    handler::server::{router::tool::ToolRouter, ServerHandler},
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool_handler,
};

use crate::context::Context;
use crate::di::FromRef;
use crate::services::KnowledgeGraphManager;

/// MCP server exposing the knowledge graph manager as tools.
///
/// The manager is built once from the context and shared by every tool call.
#[derive(Clone)]
pub struct McpServer {
    pub(crate) ctx: Arc<Context>,
    pub(crate) manager: KnowledgeGraphManager,
    tool_router: ToolRouter<McpServer>,
}

impl McpServer {
    pub fn new(ctx: Context) -> Self {
        tracing::info!("Initializing memograph MCP server");

        let manager = KnowledgeGraphManager::from_ref(&ctx);
        Self {
            ctx: Arc::new(ctx),
            manager,
            tool_router: Self::tool_router(),
        }
    }

    /// Build the combined tool router from all tool modules.
    fn tool_router() -> ToolRouter<Self> {
        Self::graph_tools() + Self::entity_tools() + Self::relation_tools()
    }

    /// Resolve a dependency from the context.
    pub fn resolve<T: FromRef<Context>>(&self) -> T {
        T::from_ref(&self.ctx)
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }
}

// ============================================================================
// Server Handler
// ============================================================================

#[tool_handler]
impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                r#"memograph - knowledge graph memory for agentic workflows

Entities are named nodes with a type, recent observations and metadata.
Relations are directed, typed edges between entity names (active voice, e.g. "works_at").

## Writing

- **create_entities** - Create or merge entities by name (observations are prepended, max 15)
- **create_relations** - Connect existing entities; unknown names are skipped
- **update_entity_by_id** / **update_relation_by_id** - Patch attributes
- **delete_entity_by_id** / **delete_relation_by_id** - Remove (entity deletion removes its relations)

## Reading

- **read_memory** - The whole graph
- **read_memory_with_depth** - Entities matching a name filter plus 0-2 hops
- **read_memory_from_entities** - Neighbourhood of entity IDs
- **search_memory** - Semantic search when available, otherwise name matching
- **get_entity_by_id** / **get_relation_by_id** - Point lookups

## Identifying

- **find_entity_ids_by_name** - Exact name
- **find_entity_ids_by_attributes** - Exact name and/or type
- **find_relation_ids_by_attributes** - Exact relationType, source, target or endpoint IDs

## Diagnostics

- **get_memory_server_status** - Backend liveness and search mode
- **get_graph_schema** - Labels, relationship types and property keys
"#
                .to_string(),
            ),
        }
    }
}
