//! Relation repository: `related_to` edges between `Memory` nodes.
//!
//! Every relation is stored as one `related_to` edge carrying its kind in the
//! `type` property, so any verb phrase can be used without schema changes.

use serde_json::{Map, Value as JsonValue};

use crate::context::{AppGraph, Context};
use crate::di::FromContext;
use crate::error::AppError;
use crate::graph::QueryExt;
use crate::models::{
    now_timestamp, strip_core_fields, Relation, RelationFilter, RelationUpdate,
    RELATION_CORE_FIELDS,
};

use super::decoder::{decode_relation, decode_relations};
use super::entity::{collect_ids, ENTITY_LABEL};

/// Edge type shared by every relation.
pub const RELATION_EDGE: &str = "related_to";

/// Named projection of a relation `r` from `a` to `b`.
pub(crate) const RELATION_RETURN: &str = "r.id AS id, a.name AS source, b.name AS target, \
     r.type AS relationType, coalesce(r.source_id, a.id) AS source_id, \
     coalesce(r.target_id, b.id) AS target_id, r.created_at AS created_at, \
     properties(r) AS all_properties";

/// Repository for relation edges.
#[derive(FromContext, Clone)]
pub struct RelationRepository {
    graph: AppGraph,
}

impl RelationRepository {
    /// Creates or merges relations on (source, target, type).
    ///
    /// Relations whose endpoints do not both exist are silently skipped. An
    /// existing edge keeps its id and `created_at`; properties are merged.
    pub async fn upsert_many(&self, relations: Vec<Relation>) -> Result<Vec<Relation>, AppError> {
        let now = now_timestamp();
        let requested = relations.len();
        let mut stored = Vec::with_capacity(requested);

        for mut relation in relations {
            relation.prepare(now);
            let row = self
                .graph
                .query(&format!(
                    "MATCH (a:{label} {{name: $source}}), (b:{label} {{name: $target}})
                     MERGE (a)-[r:{edge} {{type: $relation_type}}]->(b)
                     SET r.id = coalesce(r.id, $id),
                         r.created_at = coalesce(r.created_at, $created_at),
                         r.source_id = a.id,
                         r.target_id = b.id
                     SET r += $properties
                     RETURN {RELATION_RETURN}",
                    label = ENTITY_LABEL,
                    edge = RELATION_EDGE,
                ))
                .param("source", &relation.source)
                .param("target", &relation.target)
                .param("relation_type", &relation.relation_type)
                .param("id", &relation.id)
                .param("created_at", relation.created_at)
                .param_raw("properties", JsonValue::Object(relation.storable_properties()))
                .fetch_one()
                .await?;

            match row.and_then(|row| decode_relation(&row, now)) {
                Some(saved) => stored.push(saved),
                None => tracing::debug!(
                    source = %relation.source,
                    target = %relation.target,
                    "Skipped relation with missing endpoint"
                ),
            }
        }

        if stored.len() < requested {
            tracing::debug!(requested, created = stored.len(), "Relations upserted with skips");
        }
        Ok(stored)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Relation>, AppError> {
        let row = self
            .graph
            .query(&format!(
                "MATCH (a:{label})-[r:{edge} {{id: $id}}]->(b:{label}) RETURN {RELATION_RETURN}",
                label = ENTITY_LABEL,
                edge = RELATION_EDGE,
            ))
            .param("id", id)
            .fetch_one()
            .await?;

        Ok(row.and_then(|row| decode_relation(&row, now_timestamp())))
    }

    pub async fn exists(&self, id: &str) -> Result<bool, AppError> {
        let row = self
            .graph
            .query(&format!(
                "MATCH ()-[r:{} {{id: $id}}]->() RETURN r.id AS id LIMIT 1",
                RELATION_EDGE
            ))
            .param("id", id)
            .fetch_one()
            .await?;
        Ok(row.is_some())
    }

    /// Applies `update` to `current` and returns the stored result.
    ///
    /// Changing an endpoint deletes the edge and creates a new one under the
    /// same id, type, `created_at` and properties. Both new endpoints must
    /// exist. If the re-create fails the original edge is restored on a best
    /// effort basis and the error is returned.
    pub async fn update(
        &self,
        current: &Relation,
        update: &RelationUpdate,
    ) -> Result<Option<Relation>, AppError> {
        let id = current
            .id
            .as_deref()
            .ok_or_else(|| AppError::Internal("relation has no id".into()))?;

        let properties = update
            .properties
            .as_ref()
            .map(|p| strip_core_fields(p, RELATION_CORE_FIELDS))
            .unwrap_or_default();

        if update.changes_endpoints() {
            return self.replace_endpoints(id, current, update, properties).await.map(Some);
        }

        let row = self
            .graph
            .query(&format!(
                "MATCH (a:{label})-[r:{edge} {{id: $id}}]->(b:{label})
                 SET r.type = coalesce($relation_type, r.type)
                 SET r += $properties
                 RETURN {RELATION_RETURN}",
                label = ENTITY_LABEL,
                edge = RELATION_EDGE,
            ))
            .param("id", id)
            .param("relation_type", &update.relation_type)
            .param_raw("properties", JsonValue::Object(properties))
            .fetch_one()
            .await?;

        Ok(row.and_then(|row| decode_relation(&row, now_timestamp())))
    }

    async fn replace_endpoints(
        &self,
        id: &str,
        current: &Relation,
        update: &RelationUpdate,
        properties: Map<String, JsonValue>,
    ) -> Result<Relation, AppError> {
        let mut replacement = current.clone();
        if let Some(source) = &update.source {
            replacement.source = source.clone();
        }
        if let Some(target) = &update.target {
            replacement.target = target.clone();
        }
        if let Some(relation_type) = &update.relation_type {
            replacement.relation_type = relation_type.clone();
        }
        replacement.properties = strip_core_fields(&current.properties, RELATION_CORE_FIELDS);
        replacement.properties.extend(properties);

        self.require_entities(&[replacement.source.as_str(), replacement.target.as_str()])
            .await?;

        self.delete_edge(id).await?;

        match self.create_edge(id, &replacement).await {
            Ok(Some(relation)) => {
                tracing::info!(
                    relation_id = %id,
                    source = %relation.source,
                    target = %relation.target,
                    "Re-created relation with new endpoints"
                );
                Ok(relation)
            }
            outcome => {
                let err = match outcome {
                    Err(e) => e,
                    _ => AppError::Internal(format!("relation {} was not re-created", id)),
                };
                tracing::error!(relation_id = %id, error = %err, "Re-creating relation failed, restoring original");
                if let Err(restore) = self.create_edge(id, current).await {
                    tracing::error!(relation_id = %id, error = %restore, "Failed to restore original relation");
                }
                Err(err)
            }
        }
    }

    /// Fails with a validation error naming the first missing entity.
    async fn require_entities(&self, names: &[&str]) -> Result<(), AppError> {
        let rows = self
            .graph
            .query(&format!(
                "MATCH (e:{}) WHERE e.name IN $names RETURN DISTINCT e.name AS name",
                ENTITY_LABEL
            ))
            .param("names", names)
            .fetch_all()
            .await?;

        let found: Vec<String> = rows
            .iter()
            .filter_map(|row| row.get_opt::<String>("name").ok().flatten())
            .collect();

        match names
            .iter()
            .find(|name| !found.iter().any(|f| f.as_str() == **name))
        {
            Some(missing) => Err(AppError::Validation(format!(
                "relation endpoint '{}' does not exist",
                missing
            ))),
            None => Ok(()),
        }
    }

    async fn delete_edge(&self, id: &str) -> Result<(), AppError> {
        self.graph
            .query(&format!("MATCH ()-[r:{} {{id: $id}}]->() DELETE r", RELATION_EDGE))
            .param("id", id)
            .run()
            .await
    }

    async fn create_edge(&self, id: &str, relation: &Relation) -> Result<Option<Relation>, AppError> {
        let row = self
            .graph
            .query(&format!(
                "MATCH (a:{label} {{name: $source}}), (b:{label} {{name: $target}})
                 CREATE (a)-[r:{edge} {{id: $id, type: $relation_type, created_at: $created_at}}]->(b)
                 SET r.source_id = a.id, r.target_id = b.id
                 SET r += $properties
                 RETURN {RELATION_RETURN}",
                label = ENTITY_LABEL,
                edge = RELATION_EDGE,
            ))
            .param("id", id)
            .param("source", &relation.source)
            .param("target", &relation.target)
            .param("relation_type", &relation.relation_type)
            .param("created_at", relation.created_at.unwrap_or_else(now_timestamp))
            .param_raw("properties", JsonValue::Object(relation.storable_properties()))
            .fetch_one()
            .await?;

        Ok(row.and_then(|row| decode_relation(&row, now_timestamp())))
    }

    /// Deletes exactly the edge with this id. Returns `false` if absent.
    pub async fn delete(&self, id: &str) -> Result<bool, AppError> {
        if !self.exists(id).await? {
            return Ok(false);
        }
        self.delete_edge(id).await?;
        tracing::info!(relation_id = %id, "Deleted relation");
        Ok(true)
    }

    /// Ids of relations matching every set field of `filter` exactly.
    pub async fn find_ids(&self, filter: &RelationFilter) -> Result<Vec<String>, AppError> {
        let rows = self
            .graph
            .query(&format!(
                "MATCH (a:{label})-[r:{edge}]->(b:{label})
                 WHERE ($relation_type IS NULL OR r.type = $relation_type)
                   AND ($source IS NULL OR a.name = $source)
                   AND ($target IS NULL OR b.name = $target)
                   AND ($source_id IS NULL OR coalesce(r.source_id, a.id) = $source_id)
                   AND ($target_id IS NULL OR coalesce(r.target_id, b.id) = $target_id)
                 RETURN r.id AS id",
                label = ENTITY_LABEL,
                edge = RELATION_EDGE,
            ))
            .param("relation_type", &filter.relation_type)
            .param("source", &filter.source)
            .param("target", &filter.target)
            .param("source_id", &filter.source_id)
            .param("target_id", &filter.target_id)
            .fetch_all()
            .await?;

        collect_ids(&rows)
    }

    /// Relations whose endpoints are both among `names`.
    pub async fn among(&self, names: &[&str]) -> Result<Vec<Relation>, AppError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let rows = self
            .graph
            .query(&format!(
                "MATCH (a:{label})-[r:{edge}]->(b:{label})
                 WHERE a.name IN $names AND b.name IN $names
                 RETURN {RELATION_RETURN}",
                label = ENTITY_LABEL,
                edge = RELATION_EDGE,
            ))
            .param("names", names)
            .fetch_all()
            .await?;
        Ok(decode_relations(&rows))
    }

    pub async fn all(&self) -> Result<Vec<Relation>, AppError> {
        let rows = self
            .graph
            .query(&format!(
                "MATCH (a:{label})-[r:{edge}]->(b:{label}) RETURN {RELATION_RETURN}",
                label = ENTITY_LABEL,
                edge = RELATION_EDGE,
            ))
            .fetch_all()
            .await?;
        Ok(decode_relations(&rows))
    }
}
