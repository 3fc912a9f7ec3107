//! Model Context Protocol (MCP) server for memograph.
//!
//! Tools are thin handlers over [`KnowledgeGraphManager`](crate::services::KnowledgeGraphManager),
//! grouped by domain:
//!
//! - `graph`: status, schema, graph reads and search
//! - `entity`: entity creation, lookups and id discovery
//! - `relation`: relation creation, lookups and id discovery

pub(crate) mod protocol;
pub(crate) mod server;
mod tools;

pub use protocol::OutputFormat;
pub use server::McpServer;
