//! Entity repository: upsert, point reads, updates and deletes on `Memory` nodes.

use std::collections::{HashMap, HashSet};

use serde_json::Value as JsonValue;

use crate::context::{AppEmbedder, AppGraph, AppSettings, Context};
use crate::di::FromContext;
use crate::error::AppError;
use crate::graph::{QueryExt, Row};
use crate::models::{
    embedding_text, now_timestamp, strip_core_fields, Entity, EntityFilter, EntityUpdate,
    ENTITY_CORE_FIELDS,
};

use super::decoder::{decode_entities, decode_entity};

/// Node label shared by every entity.
pub const ENTITY_LABEL: &str = "Memory";

/// Named projection of an entity bound to `e`.
pub(crate) const ENTITY_RETURN: &str = "e.id AS id, e.name AS name, e.type AS type, \
     e.observations AS observations, e.created_at AS created_at, \
     e.last_modified AS last_modified, properties(e) AS all_properties";

/// Repository for entity nodes.
#[derive(FromContext, Clone)]
pub struct EntityRepository {
    graph: AppGraph,
    embedder: AppEmbedder,
    settings: AppSettings,
}

impl EntityRepository {
    /// Creates or merges entities by name and returns them as stored.
    ///
    /// A name that already exists keeps its id, type and `created_at`; new
    /// observations are prepended (duplicates skipped, capped at the
    /// configured limit) and metadata is merged. The embedding is recomputed
    /// only when the merged observations differ from the stored ones.
    ///
    /// Each entity is written by a plain `MERGE` followed by `SET`, which
    /// both Neo4j and Apache AGE accept.
    pub async fn upsert_many(&self, entities: Vec<Entity>) -> Result<Vec<Entity>, AppError> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }

        let now = now_timestamp();
        let limit = self.settings.observation_limit;
        let names: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        let mut known: HashMap<String, Entity> = self
            .by_names(&names)
            .await?
            .into_iter()
            .map(|entity| (entity.name.clone(), entity))
            .collect();

        let mut stored = Vec::with_capacity(entities.len());
        for mut entity in entities {
            entity.prepare(now);
            let current = known.get(&entity.name);

            let incoming = std::mem::take(&mut entity.observations);
            let (observations, changed) = match current {
                Some(current) => {
                    let merged = dedup_observations(
                        incoming.into_iter().chain(current.observations.iter().cloned()).collect(),
                        limit,
                    );
                    let changed = merged != current.observations;
                    (merged, changed)
                }
                None => (dedup_observations(incoming, limit), true),
            };

            let embedding = match entity.embedding.take() {
                Some(explicit) => Some(explicit),
                None if changed => {
                    let entity_type = current.map_or(&entity.entity_type, |c| &c.entity_type);
                    self.embed(&embedding_text(&entity.name, entity_type, &observations))
                }
                None => None,
            };

            let row = self
                .graph
                .query(&format!(
                    "MERGE (e:{} {{name: $name}})
                     SET e.id = coalesce(e.id, $id),
                         e.type = coalesce(e.type, $type),
                         e.created_at = coalesce(e.created_at, $created_at),
                         e.observations = $observations,
                         e.embedding = coalesce($embedding, e.embedding),
                         e.last_modified = $now
                     SET e += $metadata
                     RETURN {}",
                    ENTITY_LABEL, ENTITY_RETURN
                ))
                .param("name", &entity.name)
                .param("id", &entity.id)
                .param("type", &entity.entity_type)
                .param("created_at", entity.created_at)
                .param("observations", &observations)
                .param("embedding", &embedding)
                .param("now", now)
                .param_raw("metadata", JsonValue::Object(entity.storable_metadata()))
                .fetch_one()
                .await?;

            if let Some(saved) = row.and_then(|row| decode_entity(&row, now)) {
                known.insert(saved.name.clone(), saved.clone());
                stored.push(saved);
            }
        }

        tracing::debug!(count = stored.len(), "Upserted entities");
        Ok(stored)
    }

    /// Entities with any of the given names.
    pub async fn by_names(&self, names: &[&str]) -> Result<Vec<Entity>, AppError> {
        let rows = self
            .graph
            .query(&format!(
                "MATCH (e:{}) WHERE e.name IN $names RETURN {}",
                ENTITY_LABEL, ENTITY_RETURN
            ))
            .param("names", names)
            .fetch_all()
            .await?;
        Ok(decode_entities(&rows))
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Entity>, AppError> {
        let row = self
            .graph
            .query(&format!(
                "MATCH (e:{} {{id: $id}}) RETURN {}",
                ENTITY_LABEL, ENTITY_RETURN
            ))
            .param("id", id)
            .fetch_one()
            .await?;

        Ok(row.and_then(|row| decode_entity(&row, now_timestamp())))
    }

    pub async fn exists(&self, id: &str) -> Result<bool, AppError> {
        let row = self
            .graph
            .query(&format!(
                "MATCH (e:{} {{id: $id}}) RETURN e.id AS id LIMIT 1",
                ENTITY_LABEL
            ))
            .param("id", id)
            .fetch_one()
            .await?;
        Ok(row.is_some())
    }

    /// Applies `update` to `current` and returns the stored result.
    ///
    /// Observations are replaced and metadata is merged. Returns `None` if
    /// the node disappeared after `current` was read.
    pub async fn update(
        &self,
        current: &Entity,
        update: &EntityUpdate,
    ) -> Result<Option<Entity>, AppError> {
        let id = current
            .id
            .as_deref()
            .ok_or_else(|| AppError::Internal("entity has no id".into()))?;

        if let Some(name) = update.name.as_deref().filter(|n| *n != current.name) {
            let taken = self
                .find_ids(&EntityFilter {
                    name: Some(name.to_string()),
                    entity_type: None,
                })
                .await?;
            if !taken.is_empty() {
                return Err(AppError::Validation(format!(
                    "an entity named '{}' already exists",
                    name
                )));
            }
        }

        let observations = update
            .observations
            .as_ref()
            .map(|obs| dedup_observations(obs.clone(), self.settings.observation_limit));

        let embedding = if update.touches_embedding() {
            let text = embedding_text(
                update.name.as_deref().unwrap_or(&current.name),
                update.entity_type.as_deref().unwrap_or(&current.entity_type),
                observations.as_deref().unwrap_or(&current.observations),
            );
            self.embed(&text)
        } else {
            None
        };

        let metadata = update
            .metadata
            .as_ref()
            .map(|m| strip_core_fields(m, ENTITY_CORE_FIELDS))
            .unwrap_or_default();

        let row = self
            .graph
            .query(&format!(
                "MATCH (e:{} {{id: $id}})
                 SET e.name = coalesce($name, e.name),
                     e.type = coalesce($type, e.type),
                     e.observations = coalesce($observations, e.observations),
                     e.embedding = coalesce($embedding, e.embedding),
                     e.last_modified = $now
                 SET e += $metadata
                 RETURN {}",
                ENTITY_LABEL, ENTITY_RETURN
            ))
            .param("id", id)
            .param("name", &update.name)
            .param("type", &update.entity_type)
            .param("observations", &observations)
            .param("embedding", &embedding)
            .param("now", now_timestamp())
            .param_raw("metadata", JsonValue::Object(metadata))
            .fetch_one()
            .await?;

        Ok(row.and_then(|row| decode_entity(&row, now_timestamp())))
    }

    /// Deletes an entity and every relation touching it.
    ///
    /// Returns `false` if no entity has this id.
    pub async fn delete(&self, id: &str) -> Result<bool, AppError> {
        if !self.exists(id).await? {
            return Ok(false);
        }

        self.graph
            .query(&format!("MATCH (e:{} {{id: $id}}) DETACH DELETE e", ENTITY_LABEL))
            .param("id", id)
            .run()
            .await?;

        tracing::info!(entity_id = %id, "Deleted entity");
        Ok(true)
    }

    /// Ids of entities matching every set field of `filter` exactly.
    pub async fn find_ids(&self, filter: &EntityFilter) -> Result<Vec<String>, AppError> {
        let rows = self
            .graph
            .query(&format!(
                "MATCH (e:{})
                 WHERE ($name IS NULL OR e.name = $name)
                   AND ($type IS NULL OR e.type = $type)
                 RETURN e.id AS id",
                ENTITY_LABEL
            ))
            .param("name", &filter.name)
            .param("type", &filter.entity_type)
            .fetch_all()
            .await?;

        collect_ids(&rows)
    }

    pub async fn all(&self) -> Result<Vec<Entity>, AppError> {
        let rows = self
            .graph
            .query(&format!("MATCH (e:{}) RETURN {}", ENTITY_LABEL, ENTITY_RETURN))
            .fetch_all()
            .await?;
        Ok(decode_entities(&rows))
    }

    /// Entities whose name contains `text`, ignoring case.
    pub async fn name_containing(&self, text: &str) -> Result<Vec<Entity>, AppError> {
        let rows = self
            .graph
            .query(&format!(
                "MATCH (e:{})
                 WHERE toLower(e.name) CONTAINS toLower($filter)
                 RETURN {}",
                ENTITY_LABEL, ENTITY_RETURN
            ))
            .param("filter", text)
            .fetch_all()
            .await?;
        Ok(decode_entities(&rows))
    }

    pub async fn by_ids(&self, ids: &[String]) -> Result<Vec<Entity>, AppError> {
        let rows = self
            .graph
            .query(&format!(
                "MATCH (e:{}) WHERE e.id IN $ids RETURN {}",
                ENTITY_LABEL, ENTITY_RETURN
            ))
            .param("ids", ids)
            .fetch_all()
            .await?;
        Ok(decode_entities(&rows))
    }

    /// Nearest entities to `embedding` with their similarity scores.
    ///
    /// Fails if the backend has no vector search.
    pub async fn nearest(
        &self,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<(Entity, Option<f64>)>, AppError> {
        let clause = self.graph.vector_search_statement().ok_or_else(|| {
            AppError::Internal(format!("backend '{}' has no vector search", self.graph.name()))
        })?;

        let rows = self
            .graph
            .query(&format!(
                "{} WITH entity AS e, score RETURN {}, score ORDER BY score DESC",
                clause, ENTITY_RETURN
            ))
            .param("index", &self.settings.vector_index)
            .param("top_k", top_k as i64)
            .param("embedding", embedding)
            .fetch_all()
            .await?;

        let now = now_timestamp();
        Ok(rows
            .iter()
            .filter_map(|row| {
                let score = row.get_opt::<f64>("score").ok().flatten();
                decode_entity(row, now).map(|entity| (entity, score))
            })
            .collect())
    }

    /// Creates the vector index over entity embeddings if the backend and
    /// embedder support it. Failures are logged, not returned.
    pub async fn ensure_vector_index(&self) -> bool {
        let Some(embedder) = &self.embedder else {
            return false;
        };
        let Some(statement) = self.graph.vector_index_statement(
            &self.settings.vector_index,
            ENTITY_LABEL,
            "embedding",
            embedder.dimensions(),
        ) else {
            tracing::info!(backend = self.graph.name(), "Backend has no vector index support");
            return false;
        };

        match self.graph.query(&statement).run().await {
            Ok(()) => {
                tracing::info!(
                    index = %self.settings.vector_index,
                    dimensions = embedder.dimensions(),
                    "Vector index ready"
                );
                true
            }
            Err(e) if e.to_string().contains("already exists") => true,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to create vector index");
                false
            }
        }
    }

    fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref()?;
        match embedder.embed(text) {
            Ok(embedding) if !embedding.is_empty() => Some(embedding),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Embedding failed, storing entity without one");
                None
            }
        }
    }
}

/// Drops repeated observations, keeping first occurrences, then caps the list.
fn dedup_observations(observations: Vec<String>, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    observations
        .into_iter()
        .filter(|obs| seen.insert(obs.clone()))
        .take(limit)
        .collect()
}

pub(crate) fn collect_ids(rows: &[Row]) -> Result<Vec<String>, AppError> {
    rows.iter()
        .filter_map(|row| row.get_opt::<String>("id").transpose())
        .collect()
}
