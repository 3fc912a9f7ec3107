//! Entity tools: creation, lookups by id and id discovery.

use rmcp::{
    handler::server::wrapper::Parameters,
    model::CallToolResult,
    schemars::{self, JsonSchema},
    tool, tool_router, ErrorData as McpError,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::mcp::protocol::{OutputFormat, Response};
use crate::mcp::server::McpServer;
use crate::models::{Entity, UpdateOutcome};

// ============================================================================
// Parameter Types
// ============================================================================

/// Entity input for create_entities.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct EntityInput {
    /// Unique name; an existing entity with this name is merged into.
    pub name: String,
    /// Category label, e.g. "Person".
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Recent, time-sensitive facts as "<timestamp> | <text>", newest first.
    #[serde(default)]
    pub observations: Vec<String>,
    /// Additional attributes.
    #[serde(default)]
    pub metadata: Map<String, JsonValue>,
}

impl From<EntityInput> for Entity {
    fn from(input: EntityInput) -> Self {
        Entity {
            metadata: input.metadata,
            ..Entity::new(input.name, input.entity_type).with_observations(input.observations)
        }
    }
}

/// Parameters for create_entities tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateEntitiesParams {
    pub entities: Vec<EntityInput>,
    #[serde(default)]
    pub format: Option<OutputFormat>,
}

/// Parameters for tools addressing one entity.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct EntityIdParams {
    pub entity_id: String,
}

/// Parameters for update_entity_by_id tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateEntityParams {
    pub entity_id: String,
    /// Attributes to change: name, type, observations (replaces the list),
    /// metadata (merged). Other keys are ignored.
    pub updates: Map<String, JsonValue>,
}

/// Parameters for find_entity_ids_by_name tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct FindByNameParams {
    /// Exact entity name.
    pub name: String,
}

/// Parameters for find_entity_ids_by_attributes tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct FindEntityIdsParams {
    /// Exact-match criteria. Supported keys: name, type.
    #[serde(default)]
    pub attributes: Map<String, JsonValue>,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CreateEntitiesResult {
    pub count: usize,
    pub entities: Vec<Entity>,
}

#[derive(Debug, Serialize)]
pub struct EntityLookupResult {
    pub entity_id: String,
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<Entity>,
}

#[derive(Debug, Serialize)]
pub struct UpdateResult {
    pub id: String,
    #[serde(flatten)]
    pub outcome: UpdateOutcome,
}

#[derive(Debug, Serialize)]
pub struct DeleteResult {
    pub id: String,
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct IdsResult {
    pub ids: Vec<String>,
    pub count: usize,
}

impl From<Vec<String>> for IdsResult {
    fn from(ids: Vec<String>) -> Self {
        Self {
            count: ids.len(),
            ids,
        }
    }
}

// ============================================================================
// Tool Router
// ============================================================================

#[tool_router(router = entity_tools, vis = "pub(crate)")]
impl McpServer {
    #[tool(description = "Create multiple new entities in the knowledge graph")]
    pub async fn create_entities(
        &self,
        Parameters(params): Parameters<CreateEntitiesParams>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(count = params.entities.len(), "Running create_entities tool");

        let entities = params.entities.into_iter().map(Entity::from).collect();
        let created = self
            .manager
            .create_entities(entities)
            .await
            .map_err(McpError::from)?;

        Response(
            CreateEntitiesResult {
                count: created.len(),
                entities: created,
            },
            params.format,
        )
        .into()
    }

    #[tool(description = "Get an entity by its unique ID")]
    pub async fn get_entity_by_id(
        &self,
        Parameters(params): Parameters<EntityIdParams>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(id = %params.entity_id, "Running get_entity_by_id tool");

        let entity = self
            .manager
            .get_entity(&params.entity_id)
            .await
            .map_err(McpError::from)?;

        Response::json(EntityLookupResult {
            entity_id: params.entity_id,
            found: entity.is_some(),
            entity,
        })
        .into()
    }

    #[tool(
        description = "Update an entity by ID. Supported keys: name, type, observations, metadata."
    )]
    pub async fn update_entity_by_id(
        &self,
        Parameters(params): Parameters<UpdateEntityParams>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(id = %params.entity_id, "Running update_entity_by_id tool");

        let outcome = self
            .manager
            .update_entity(&params.entity_id, &params.updates)
            .await
            .map_err(McpError::from)?;

        Response::json(UpdateResult {
            id: params.entity_id,
            outcome,
        })
        .into()
    }

    #[tool(description = "Delete an entity by ID, together with all its relations")]
    pub async fn delete_entity_by_id(
        &self,
        Parameters(params): Parameters<EntityIdParams>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(id = %params.entity_id, "Running delete_entity_by_id tool");

        let deleted = self
            .manager
            .delete_entity(&params.entity_id)
            .await
            .map_err(McpError::from)?;

        Response::json(DeleteResult {
            id: params.entity_id,
            deleted,
        })
        .into()
    }

    #[tool(
        description = "Find entity IDs by exact name - useful for identifying entities before updates/deletes"
    )]
    pub async fn find_entity_ids_by_name(
        &self,
        Parameters(params): Parameters<FindByNameParams>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(name = %params.name, "Running find_entity_ids_by_name tool");

        let ids = self
            .manager
            .find_entity_ids_by_name(&params.name)
            .await
            .map_err(McpError::from)?;

        Response::json(IdsResult::from(ids)).into()
    }

    #[tool(
        description = "Find entity IDs by exact attributes (name, type). Observation content is not searchable here; use search_memory."
    )]
    pub async fn find_entity_ids_by_attributes(
        &self,
        Parameters(params): Parameters<FindEntityIdsParams>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(attributes = ?params.attributes, "Running find_entity_ids_by_attributes tool");

        let ids = self
            .manager
            .find_entity_ids_by_attributes(&params.attributes)
            .await
            .map_err(McpError::from)?;

        Response::json(IdsResult::from(ids)).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_input_conversion() {
        let input: EntityInput = serde_json::from_value(json!({
            "name": "Alice",
            "type": "Person",
            "observations": ["2024-05-01 | joined TechCorp"],
            "metadata": {"team": "core"}
        }))
        .unwrap();

        let entity = Entity::from(input);
        assert_eq!(entity.entity_type, "Person");
        assert_eq!(entity.observations.len(), 1);
        assert_eq!(entity.metadata["team"], "core");
        assert!(entity.id.is_none());
    }

    #[test]
    fn test_update_result_flattens_outcome() {
        let value = serde_json::to_value(UpdateResult {
            id: "01A".into(),
            outcome: UpdateOutcome::NotFound,
        })
        .unwrap();
        assert_eq!(value, json!({"id": "01A", "status": "not_found"}));
    }
}
