//! Depth-bounded subgraph reads.
//!
//! Roots are chosen by a case-insensitive name filter or by explicit ids;
//! the neighborhood is every entity within `depth` hops of a root, in either
//! direction. Relations are then restricted to pairs inside that set.
//!
//! Hops are expanded level by level with a fixed single-hop pattern, which
//! Neo4j and Apache AGE both run.

use std::collections::HashSet;

use crate::context::{AppGraph, Context};
use crate::di::FromContext;
use crate::error::AppError;
use crate::graph::QueryExt;
use crate::models::{Entity, KnowledgeGraph};

use super::entity::{collect_ids, EntityRepository, ENTITY_LABEL};
use super::relation::{RelationRepository, RELATION_EDGE};

/// Largest supported traversal depth.
pub const MAX_DEPTH: u8 = 2;

/// Clamps a requested depth to `0..=MAX_DEPTH`.
pub fn clamp_depth(depth: i64) -> u8 {
    depth.clamp(0, MAX_DEPTH as i64) as u8
}

#[derive(FromContext, Clone)]
pub struct TraversalRepository {
    graph: AppGraph,
    entities: EntityRepository,
    relations: RelationRepository,
}

impl TraversalRepository {
    /// The whole graph.
    pub async fn read_all(&self) -> Result<KnowledgeGraph, AppError> {
        let entities = self.entities.all().await?;
        let relations = self.relations.all().await?;
        tracing::debug!(
            entities = entities.len(),
            relations = relations.len(),
            "Read full graph"
        );
        Ok(KnowledgeGraph::new(entities, relations))
    }

    /// Entities whose name contains `filter` (ignoring case) plus their
    /// neighborhood. Depth 0 returns the matches without relations.
    pub async fn from_filter(&self, filter: &str, depth: i64) -> Result<KnowledgeGraph, AppError> {
        let roots = self.entities.name_containing(filter).await?;
        self.expand(roots, clamp_depth(depth)).await
    }

    /// Seed entities by id plus their neighborhood.
    pub async fn from_ids(&self, ids: &[String], depth: i64) -> Result<KnowledgeGraph, AppError> {
        if ids.is_empty() {
            return Ok(KnowledgeGraph::empty());
        }

        let roots = self.entities.by_ids(ids).await?;
        self.expand(roots, clamp_depth(depth)).await
    }

    /// Breadth-first expansion from `roots`, one single-hop query per level.
    async fn expand(&self, roots: Vec<Entity>, depth: u8) -> Result<KnowledgeGraph, AppError> {
        if depth == 0 {
            return Ok(KnowledgeGraph::new(roots, Vec::new()));
        }

        let mut frontier: Vec<String> = roots.iter().filter_map(|e| e.id.clone()).collect();
        let mut seen: HashSet<String> = frontier.iter().cloned().collect();
        let mut reached = Vec::new();

        for _ in 0..depth {
            if frontier.is_empty() {
                break;
            }
            frontier = self
                .neighbour_ids(&frontier)
                .await?
                .into_iter()
                .filter(|id| seen.insert(id.clone()))
                .collect();
            reached.extend(frontier.iter().cloned());
        }

        let mut entities = roots;
        if !reached.is_empty() {
            entities.extend(self.entities.by_ids(&reached).await?);
        }
        self.with_internal_relations(entities).await
    }

    /// Ids one `related_to` hop away from any of `ids`, in either direction.
    async fn neighbour_ids(&self, ids: &[String]) -> Result<Vec<String>, AppError> {
        let rows = self
            .graph
            .query(&format!(
                "MATCH (a:{label})-[:{edge}]-(b:{label})
                 WHERE a.id IN $ids
                 RETURN DISTINCT b.id AS id",
                label = ENTITY_LABEL,
                edge = RELATION_EDGE,
            ))
            .param("ids", ids)
            .fetch_all()
            .await?;

        collect_ids(&rows)
    }

    async fn with_internal_relations(
        &self,
        entities: Vec<Entity>,
    ) -> Result<KnowledgeGraph, AppError> {
        let names: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        let relations = self.relations.among(&names).await?;

        let mut graph = KnowledgeGraph::new(entities, relations);
        graph.retain_internal_relations();
        tracing::debug!(
            entities = graph.entities.len(),
            relations = graph.relations.len(),
            "Traversed neighborhood"
        );
        Ok(graph)
    }
}
