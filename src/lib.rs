//! memograph - Knowledge Graph Memory MCP Server
//!
//! Entities, relations and time-stamped observations kept in a graph store
//! (Neo4j or PostgreSQL + Apache AGE), with semantic search when an
//! embedding provider and vector index are available.

pub mod cli;
pub mod config;
pub mod context;
pub mod di;
pub mod embedding;
pub mod error;
pub mod graph;
pub mod mcp;
pub mod models;
pub mod repositories;
pub mod services;

// Re-export FromRef at crate root for di-macros generated code
pub use di::FromRef;
