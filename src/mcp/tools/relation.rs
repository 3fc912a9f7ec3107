//! Relation tools: creation, lookups by id and id discovery.

use rmcp::{
    handler::server::wrapper::Parameters,
    model::CallToolResult,
    schemars::{self, JsonSchema},
    tool, tool_router, ErrorData as McpError,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use super::entity::{DeleteResult, IdsResult, UpdateResult};
use crate::mcp::protocol::{OutputFormat, Response};
use crate::mcp::server::McpServer;
use crate::models::Relation;

// ============================================================================
// Parameter Types
// ============================================================================

/// Relation input for create_relations.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct RelationInput {
    /// Source entity name.
    pub source: String,
    /// Target entity name.
    pub target: String,
    /// Active-voice verb phrase, e.g. "works_at".
    #[serde(rename = "relationType")]
    pub relation_type: String,
    #[serde(default)]
    pub properties: Map<String, JsonValue>,
}

impl From<RelationInput> for Relation {
    fn from(input: RelationInput) -> Self {
        Relation {
            properties: input.properties,
            ..Relation::new(input.source, input.target, input.relation_type)
        }
    }
}

/// Parameters for create_relations tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateRelationsParams {
    pub relations: Vec<RelationInput>,
    #[serde(default)]
    pub format: Option<OutputFormat>,
}

/// Parameters for tools addressing one relation.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct RelationIdParams {
    pub relation_id: String,
}

/// Parameters for update_relation_by_id tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateRelationParams {
    pub relation_id: String,
    /// Attributes to change: relationType, properties (merged), source and
    /// target (entity names; moves the edge). Other keys are ignored.
    pub updates: Map<String, JsonValue>,
}

/// Parameters for find_relation_ids_by_attributes tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct FindRelationIdsParams {
    /// Exact-match criteria. Supported keys: relationType, source (or
    /// source_name), target (or target_name), source_id, target_id.
    #[serde(default)]
    pub attributes: Map<String, JsonValue>,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CreateRelationsResult {
    /// Relations stored; requests with unknown endpoints are not counted.
    pub count: usize,
    pub requested: usize,
    pub relations: Vec<Relation>,
}

#[derive(Debug, Serialize)]
pub struct RelationLookupResult {
    pub relation_id: String,
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation: Option<Relation>,
}

// ============================================================================
// Tool Router
// ============================================================================

#[tool_router(router = relation_tools, vis = "pub(crate)")]
impl McpServer {
    #[tool(
        description = "Create multiple new relations between existing entities. Relations should be in active voice"
    )]
    pub async fn create_relations(
        &self,
        Parameters(params): Parameters<CreateRelationsParams>,
    ) -> Result<CallToolResult, McpError> {
        let requested = params.relations.len();
        tracing::info!(count = requested, "Running create_relations tool");

        let relations = params.relations.into_iter().map(Relation::from).collect();
        let created = self
            .manager
            .create_relations(relations)
            .await
            .map_err(McpError::from)?;

        Response(
            CreateRelationsResult {
                count: created.len(),
                requested,
                relations: created,
            },
            params.format,
        )
        .into()
    }

    #[tool(description = "Get a relationship by its unique ID")]
    pub async fn get_relation_by_id(
        &self,
        Parameters(params): Parameters<RelationIdParams>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(id = %params.relation_id, "Running get_relation_by_id tool");

        let relation = self
            .manager
            .get_relation(&params.relation_id)
            .await
            .map_err(McpError::from)?;

        Response::json(RelationLookupResult {
            relation_id: params.relation_id,
            found: relation.is_some(),
            relation,
        })
        .into()
    }

    #[tool(
        description = "Update a relationship by ID. Supported keys: relationType, properties, source, target."
    )]
    pub async fn update_relation_by_id(
        &self,
        Parameters(params): Parameters<UpdateRelationParams>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(id = %params.relation_id, "Running update_relation_by_id tool");

        let outcome = self
            .manager
            .update_relation(&params.relation_id, &params.updates)
            .await
            .map_err(McpError::from)?;

        Response::json(UpdateResult {
            id: params.relation_id,
            outcome,
        })
        .into()
    }

    #[tool(description = "Delete a relationship by ID")]
    pub async fn delete_relation_by_id(
        &self,
        Parameters(params): Parameters<RelationIdParams>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(id = %params.relation_id, "Running delete_relation_by_id tool");

        let deleted = self
            .manager
            .delete_relation(&params.relation_id)
            .await
            .map_err(McpError::from)?;

        Response::json(DeleteResult {
            id: params.relation_id,
            deleted,
        })
        .into()
    }

    #[tool(
        description = "Find relationship IDs by exact attributes - useful for identifying relationships before updates/deletes"
    )]
    pub async fn find_relation_ids_by_attributes(
        &self,
        Parameters(params): Parameters<FindRelationIdsParams>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(attributes = ?params.attributes, "Running find_relation_ids_by_attributes tool");

        let ids = self
            .manager
            .find_relation_ids_by_attributes(&params.attributes)
            .await
            .map_err(McpError::from)?;

        Response::json(IdsResult::from(ids)).into()
    }
}
