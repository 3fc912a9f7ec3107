//! Two-tier entity search: vector similarity, falling back to name matching.

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::context::{AppEmbedder, AppGraph, AppSettings, Context};
use crate::di::FromContext;
use crate::error::AppError;
use crate::models::KnowledgeGraph;
use crate::repositories::{clamp_depth, EntityRepository, RelationRepository, TraversalRepository};

/// Metadata key holding the similarity score of a vector hit.
pub const VECTOR_SCORE_KEY: &str = "vector_search_score";

/// How a search call is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Vector,
    String,
}

#[derive(FromContext, Clone)]
pub struct SearchService {
    graph: AppGraph,
    embedder: AppEmbedder,
    settings: AppSettings,
    entities: EntityRepository,
    relations: RelationRepository,
    traversal: TraversalRepository,
}

impl SearchService {
    /// Vector mode needs both an embedder and backend vector support.
    pub fn mode(&self) -> SearchMode {
        if self.embedder.is_some() && self.graph.vector_search_statement().is_some() {
            SearchMode::Vector
        } else {
            SearchMode::String
        }
    }

    /// Searches entities for `query` and expands to `depth` (clamped to 0..=2).
    ///
    /// A blank query returns an empty graph without touching the backend.
    /// Vector failures are logged and answered by name matching instead.
    pub async fn search(&self, query: &str, depth: i64) -> Result<KnowledgeGraph, AppError> {
        if query.trim().is_empty() {
            tracing::debug!("Empty search query, returning empty graph");
            return Ok(KnowledgeGraph::empty());
        }

        let depth = clamp_depth(depth);

        if self.mode() == SearchMode::Vector {
            match self.vector_search(query, depth).await {
                Ok(graph) => return Ok(graph),
                Err(e) => {
                    tracing::warn!(error = %e, "Vector search failed, falling back to name matching")
                }
            }
        }

        let graph = self.traversal.from_filter(query, depth as i64).await?;
        tracing::debug!(
            query,
            depth,
            entities = graph.entities.len(),
            relations = graph.relations.len(),
            "Name search complete"
        );
        Ok(graph)
    }

    async fn vector_search(&self, query: &str, depth: u8) -> Result<KnowledgeGraph, AppError> {
        let embedder = self
            .embedder
            .as_ref()
            .ok_or_else(|| AppError::Embedding("no embedder configured".into()))?;
        let embedding = embedder.embed(query)?;
        if embedding.is_empty() {
            return Err(AppError::Embedding("empty query embedding".into()));
        }

        let hits = self
            .entities
            .nearest(&embedding, self.settings.search_top_k)
            .await?;

        let entities: Vec<_> = hits
            .into_iter()
            .map(|(mut entity, score)| {
                entity
                    .metadata
                    .insert(VECTOR_SCORE_KEY.to_string(), JsonValue::from(score.unwrap_or(0.0)));
                entity
            })
            .collect();

        tracing::debug!(query, depth, entities = entities.len(), "Vector search complete");

        if depth == 0 {
            return Ok(KnowledgeGraph::new(entities, Vec::new()));
        }

        let names: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        let relations = self.relations.among(&names).await?;
        let mut graph = KnowledgeGraph::new(entities, relations);
        graph.retain_internal_relations();
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemorySettings;
    use crate::embedding::{Embedder, HashingEmbedder};
    use crate::graph::testing::ScriptedBackend;
    use crate::FromRef;
    use serde_json::json;
    use std::sync::Arc;

    fn service(backend: Arc<ScriptedBackend>, embedder: bool) -> SearchService {
        let embedder: AppEmbedder =
            embedder.then(|| Arc::new(HashingEmbedder::new(16)) as Arc<dyn Embedder>);
        let ctx = Context::new(backend, embedder, MemorySettings::default());
        SearchService::from_ref(&ctx)
    }

    fn alice() -> JsonValue {
        json!({"id": "01A", "name": "Alice", "type": "Person", "observations": []})
    }

    #[tokio::test]
    async fn test_blank_query_short_circuits_in_both_modes() {
        for vector in [false, true] {
            let backend = ScriptedBackend::new();
            let backend = Arc::new(if vector { backend.with_vector_search() } else { backend });
            let service = service(backend.clone(), vector);

            let graph = service.search("   ", 1).await.unwrap();
            assert!(graph.is_empty());
            assert!(backend.calls().is_empty());
        }
    }

    #[tokio::test]
    async fn test_mode_selection() {
        let plain = service(Arc::new(ScriptedBackend::new()), true);
        assert_eq!(plain.mode(), SearchMode::String);

        let no_embedder = service(Arc::new(ScriptedBackend::new().with_vector_search()), false);
        assert_eq!(no_embedder.mode(), SearchMode::String);

        let vector = service(Arc::new(ScriptedBackend::new().with_vector_search()), true);
        assert_eq!(vector.mode(), SearchMode::Vector);
    }

    #[tokio::test]
    async fn test_vector_hits_carry_score() {
        let mut hit = alice();
        hit["score"] = json!(0.87);
        let backend = Arc::new(
            ScriptedBackend::new()
                .with_vector_search()
                .on("CALL test.vector", vec![hit]),
        );
        let service = service(backend.clone(), true);

        let graph = service.search("alice", 0).await.unwrap();
        assert_eq!(graph.entities.len(), 1);
        assert_eq!(graph.entities[0].metadata[VECTOR_SCORE_KEY], json!(0.87));
        assert!(graph.relations.is_empty());
        assert!(backend.calls_matching("CONTAINS").is_empty());
    }

    #[tokio::test]
    async fn test_vector_depth_fetches_relations_among_hits() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .with_vector_search()
                .on("CALL test.vector", vec![alice()])
                .on("a.name IN $names", vec![json!({
                    "source": "Alice", "target": "Alice", "relationType": "reflects_on"
                })]),
        );
        let service = service(backend.clone(), true);

        let graph = service.search("alice", 3).await.unwrap();
        assert_eq!(graph.relations.len(), 1);
        assert_eq!(
            backend.calls_matching("a.name IN $names")[0].params["names"],
            json!(["Alice"])
        );
    }

    #[tokio::test]
    async fn test_vector_failure_falls_back_to_name_search() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .with_vector_search()
                .fail("CALL test.vector", "no such index")
                .on("CONTAINS toLower($filter)", vec![alice()]),
        );
        let service = service(backend.clone(), true);

        let graph = service.search("Ali", 0).await.unwrap();
        assert_eq!(graph.entities.len(), 1);
        assert_eq!(graph.entities[0].name, "Alice");
        assert!(!graph.entities[0].metadata.contains_key(VECTOR_SCORE_KEY));
    }

    #[tokio::test]
    async fn test_string_mode_expands_neighborhood() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .on("CONTAINS toLower($filter)", vec![alice()])
                .on("RETURN DISTINCT b.id", vec![json!({"id": "01T"})])
                .on(
                    "WHERE e.id IN $ids",
                    vec![json!({"id": "01T", "name": "TechCorp", "type": "Company", "observations": []})],
                )
                .on(
                    "a.name IN $names",
                    vec![json!({"source": "Alice", "target": "TechCorp", "relationType": "works_at"})],
                ),
        );
        let service = service(backend.clone(), false);

        let graph = service.search("Alice", 1).await.unwrap();
        assert_eq!(graph.entities.len(), 2);
        assert_eq!(graph.relations.len(), 1);
        assert_eq!(backend.calls_matching("RETURN DISTINCT b.id").len(), 1);
    }
}
