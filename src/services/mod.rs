//! Business logic services for the knowledge graph.
//!
//! Services orchestrate repositories and handle business rules,
//! using the `FromContext` derive macro for dependency injection.

mod manager;
mod search;

pub use manager::{KnowledgeGraphManager, ManagerStatus};
pub use search::{SearchMode, SearchService, VECTOR_SCORE_KEY};
