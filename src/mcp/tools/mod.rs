//! MCP tool implementations organized by domain.

pub mod entity;
pub mod graph;
pub mod relation;
