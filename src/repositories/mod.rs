//! Data access layer for the knowledge graph.
//!
//! Repositories build the Cypher for each operation, run it through the
//! configured backend and decode the rows. They are resolved from the
//! application context with the `FromContext` derive macro.

mod decoder;
mod entity;
mod relation;
mod traversal;

pub use decoder::{
    decode_entities, decode_entity, decode_relation, decode_relations, detect_entity_shape,
    detect_relation_shape, RowShape,
};
pub use entity::{EntityRepository, ENTITY_LABEL};
pub use relation::{RelationRepository, RELATION_EDGE};
pub use traversal::{clamp_depth, TraversalRepository, MAX_DEPTH};
