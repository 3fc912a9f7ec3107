//! Knowledge graph manager: the public operation set over entities and relations.

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::context::{AppGraph, Context};
use crate::di::FromContext;
use crate::error::AppError;
use crate::graph::{BackendStatus, GraphSchema};
use crate::models::{
    Entity, EntityFilter, EntityUpdate, KnowledgeGraph, Relation, RelationFilter,
    RelationUpdate, UpdateOutcome,
};
use crate::repositories::{EntityRepository, RelationRepository, TraversalRepository};

use super::search::{SearchMode, SearchService};

/// Backend liveness plus the search mode in effect.
#[derive(Debug, Clone, Serialize)]
pub struct ManagerStatus {
    pub backend: String,
    pub status: BackendStatus,
    pub search_mode: SearchMode,
}

/// Facade composing the repositories and search into the public API.
///
/// Lookups by id never fail on absence: reads return `None`, deletes
/// return `false` and updates report [`UpdateOutcome::NotFound`].
#[derive(FromContext, Clone)]
pub struct KnowledgeGraphManager {
    graph: AppGraph,
    entities: EntityRepository,
    relations: RelationRepository,
    traversal: TraversalRepository,
    search: SearchService,
}

impl KnowledgeGraphManager {
    pub async fn status(&self) -> ManagerStatus {
        ManagerStatus {
            backend: self.graph.name().to_string(),
            status: self.graph.status().await,
            search_mode: self.search.mode(),
        }
    }

    pub async fn schema(&self) -> Result<GraphSchema, AppError> {
        self.graph.schema().await
    }

    /// Prepares the store for vector search. Returns whether a vector index
    /// is available.
    pub async fn initialize(&self) -> bool {
        self.entities.ensure_vector_index().await
    }

    pub async fn create_entities(&self, entities: Vec<Entity>) -> Result<Vec<Entity>, AppError> {
        let created = self.entities.upsert_many(entities).await?;
        tracing::info!(count = created.len(), "Created entities");
        Ok(created)
    }

    /// Creates relations between existing entities; others are skipped.
    pub async fn create_relations(
        &self,
        relations: Vec<Relation>,
    ) -> Result<Vec<Relation>, AppError> {
        let created = self.relations.upsert_many(relations).await?;
        tracing::info!(count = created.len(), "Created relations");
        Ok(created)
    }

    pub async fn read_graph(&self) -> Result<KnowledgeGraph, AppError> {
        self.traversal.read_all().await
    }

    /// Neighborhood of entities whose name contains `filter`; without a
    /// filter the whole graph is returned.
    pub async fn read_graph_with_depth(
        &self,
        filter: Option<&str>,
        depth: i64,
    ) -> Result<KnowledgeGraph, AppError> {
        match filter.map(str::trim).filter(|f| !f.is_empty()) {
            Some(filter) => self.traversal.from_filter(filter, depth).await,
            None => self.traversal.read_all().await,
        }
    }

    pub async fn read_graph_from_entities(
        &self,
        ids: &[String],
        depth: i64,
    ) -> Result<KnowledgeGraph, AppError> {
        self.traversal.from_ids(ids, depth).await
    }

    pub async fn search(&self, query: &str, depth: i64) -> Result<KnowledgeGraph, AppError> {
        self.search.search(query, depth).await
    }

    pub async fn get_entity(&self, id: &str) -> Result<Option<Entity>, AppError> {
        self.entities.find_by_id(id).await
    }

    /// Updates `name`, `type`, `observations` and `metadata`; other keys are
    /// ignored with a warning.
    pub async fn update_entity(
        &self,
        id: &str,
        attributes: &Map<String, JsonValue>,
    ) -> Result<UpdateOutcome, AppError> {
        let (update, ignored) = EntityUpdate::from_attributes(attributes)?;
        warn_ignored("entity", id, &ignored);

        let Some(current) = self.entities.find_by_id(id).await? else {
            return Ok(UpdateOutcome::NotFound);
        };
        if update.is_empty() {
            return Ok(UpdateOutcome::NothingToUpdate { ignored });
        }

        match self.entities.update(&current, &update).await? {
            Some(_) => {
                tracing::info!(entity_id = %id, keys = ?update.keys(), "Updated entity");
                Ok(UpdateOutcome::Updated {
                    updated: update.keys(),
                    ignored,
                })
            }
            None => Ok(UpdateOutcome::NotFound),
        }
    }

    pub async fn delete_entity(&self, id: &str) -> Result<bool, AppError> {
        self.entities.delete(id).await
    }

    pub async fn get_relation(&self, id: &str) -> Result<Option<Relation>, AppError> {
        self.relations.find_by_id(id).await
    }

    /// Updates `relationType` and `properties`, or moves the edge when
    /// `source`/`target` change.
    pub async fn update_relation(
        &self,
        id: &str,
        attributes: &Map<String, JsonValue>,
    ) -> Result<UpdateOutcome, AppError> {
        let (update, ignored) = RelationUpdate::from_attributes(attributes)?;
        warn_ignored("relation", id, &ignored);

        let Some(current) = self.relations.find_by_id(id).await? else {
            return Ok(UpdateOutcome::NotFound);
        };
        if update.is_empty() {
            return Ok(UpdateOutcome::NothingToUpdate { ignored });
        }

        match self.relations.update(&current, &update).await? {
            Some(_) => {
                tracing::info!(relation_id = %id, keys = ?update.keys(), "Updated relation");
                Ok(UpdateOutcome::Updated {
                    updated: update.keys(),
                    ignored,
                })
            }
            None => Ok(UpdateOutcome::NotFound),
        }
    }

    pub async fn delete_relation(&self, id: &str) -> Result<bool, AppError> {
        self.relations.delete(id).await
    }

    pub async fn find_entity_ids_by_name(&self, name: &str) -> Result<Vec<String>, AppError> {
        self.entities
            .find_ids(&EntityFilter {
                name: Some(name.to_string()),
                entity_type: None,
            })
            .await
    }

    /// Exact match on `name` and/or `type`; an empty map matches every entity.
    pub async fn find_entity_ids_by_attributes(
        &self,
        attributes: &Map<String, JsonValue>,
    ) -> Result<Vec<String>, AppError> {
        let filter = EntityFilter::from_attributes(attributes)?;
        self.entities.find_ids(&filter).await
    }

    pub async fn find_relation_ids_by_attributes(
        &self,
        attributes: &Map<String, JsonValue>,
    ) -> Result<Vec<String>, AppError> {
        let filter = RelationFilter::from_attributes(attributes)?;
        self.relations.find_ids(&filter).await
    }
}

fn warn_ignored(kind: &str, id: &str, ignored: &[String]) {
    if !ignored.is_empty() {
        tracing::warn!(kind, id, ignored = ?ignored, "Ignoring unsupported update attributes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemorySettings;
    use crate::graph::testing::ScriptedBackend;
    use crate::FromRef;
    use serde_json::json;
    use std::sync::Arc;

    fn manager(backend: Arc<ScriptedBackend>) -> KnowledgeGraphManager {
        let ctx = Context::new(backend, None, MemorySettings::default());
        KnowledgeGraphManager::from_ref(&ctx)
    }

    fn attrs(value: JsonValue) -> Map<String, JsonValue> {
        value.as_object().cloned().unwrap()
    }

    fn alice() -> JsonValue {
        json!({"id": "01A", "name": "Alice", "type": "Person", "observations": ["likes tea"]})
    }

    #[tokio::test]
    async fn test_update_missing_entity_is_not_found() {
        let manager = manager(Arc::new(ScriptedBackend::new()));
        let outcome = manager
            .update_entity("nope", &attrs(json!({"type": "Robot"})))
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_update_with_only_unknown_keys_does_nothing() {
        let backend = Arc::new(ScriptedBackend::new().on("MATCH (e:Memory {id: $id}) RETURN", vec![alice()]));
        let manager = manager(backend.clone());

        let outcome = manager
            .update_entity("01A", &attrs(json!({"color": "blue"})))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            UpdateOutcome::NothingToUpdate {
                ignored: vec!["color".into()]
            }
        );
        assert!(backend.calls_matching("SET e.name").is_empty());
    }

    #[tokio::test]
    async fn test_update_reports_updated_and_ignored_keys() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .on("MATCH (e:Memory {id: $id}) RETURN", vec![alice()])
                .on("SET e.name = coalesce", vec![alice()]),
        );
        let manager = manager(backend);

        let outcome = manager
            .update_entity("01A", &attrs(json!({"type": "Engineer", "mood": "happy"})))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            UpdateOutcome::Updated {
                updated: vec!["type".into()],
                ignored: vec!["mood".into()]
            }
        );
    }

    #[tokio::test]
    async fn test_update_relation_not_found() {
        let manager = manager(Arc::new(ScriptedBackend::new()));
        let outcome = manager
            .update_relation("01R", &attrs(json!({"relationType": "knows"})))
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_find_entity_ids_rejects_observation_search() {
        let backend = Arc::new(ScriptedBackend::new());
        let manager = manager(backend.clone());

        let err = manager
            .find_entity_ids_by_attributes(&attrs(json!({"observation_contains": "tea"})))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::UnsupportedAttribute { .. }));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_find_entity_ids_by_name_is_exact() {
        let backend = Arc::new(ScriptedBackend::new().on("WHERE ($name IS NULL", vec![json!({"id": "01A"})]));
        let manager = manager(backend.clone());

        assert_eq!(manager.find_entity_ids_by_name("Alice").await.unwrap(), vec!["01A"]);
        assert_eq!(backend.calls()[0].params["name"], "Alice");
    }

    #[tokio::test]
    async fn test_read_graph_with_blank_filter_reads_everything() {
        let backend = Arc::new(ScriptedBackend::new());
        let manager = manager(backend.clone());

        manager.read_graph_with_depth(Some("  "), 1).await.unwrap();
        assert!(backend.calls_matching("CONTAINS").is_empty());
        assert_eq!(backend.calls_matching("MATCH (e:Memory) RETURN").len(), 1);
    }

    #[tokio::test]
    async fn test_status_reports_string_mode_without_embedder() {
        let manager = manager(Arc::new(ScriptedBackend::new().with_vector_search()));
        let status = manager.status().await;

        assert_eq!(status.backend, "scripted");
        assert_eq!(status.status, BackendStatus::Available);
        assert_eq!(status.search_mode, SearchMode::String);
    }
}
