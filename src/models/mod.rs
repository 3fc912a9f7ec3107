//! Domain models for the knowledge graph.

mod entity;
mod filter;
mod graph;
mod relation;
mod update;

pub use entity::{
    embedding_text, generate_ulid, now_timestamp, parse_observations, strip_core_fields, Entity,
    ENTITY_CORE_FIELDS,
};
pub use filter::{EntityFilter, RelationFilter};
pub use graph::KnowledgeGraph;
pub use relation::{Relation, RELATION_CORE_FIELDS};
pub use update::{EntityUpdate, RelationUpdate, UpdateOutcome};
