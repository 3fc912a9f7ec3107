//! Backend implementations for different graph databases.
//!
//! Each backend implements [`GraphBackend`](crate::graph::GraphBackend).
//!
//! # Available Backends
//!
//! | Backend | Module | Vector search |
//! |---------|--------|---------------|
//! | Neo4j 5.x | [`neo4j`] | Native vector index |
//! | PostgreSQL + Apache AGE | [`postgres`] | No |
//!
//! # Implementing a Backend
//!
//! 1. Create a client struct (e.g., `Neo4jBackend`)
//! 2. Implement `GraphBackend`, rejecting languages other than openCypher
//! 3. Override the vector hooks if the store has a vector index
//! 4. Add a `BackendConfig` variant and wire it in `Context::connect`

pub mod neo4j;
pub mod postgres;

pub use neo4j::Neo4jBackend;
pub use postgres::PostgresBackend;
