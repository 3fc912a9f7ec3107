//! Graph abstraction layer for backend-agnostic database access.
//!
//! The knowledge graph code talks to a store only through [`GraphBackend`],
//! so the same repositories run on Neo4j and on PostgreSQL + Apache AGE.
//!
//! # Usage
//!
//! ```ignore
//! use memograph::graph::QueryExt;
//!
//! // Query with parameters
//! let rows = backend.query("MATCH (e:Memory) WHERE e.id = $id RETURN e.name AS name")
//!     .param("id", entity_id)
//!     .fetch_all()
//!     .await?;
//!
//! // Write query (rows discarded)
//! backend.query("MATCH (e:Memory {id: $id}) DETACH DELETE e")
//!     .param("id", entity_id)
//!     .run()
//!     .await?;
//! ```

mod query;
mod return_clause;
mod row;
mod schema;
mod traits;

pub mod backends;

#[cfg(test)]
pub(crate) mod testing;

pub use query::{Query, QueryExt};
pub use return_clause::{extract_return_columns, ParseError};
pub use row::{Params, Row, RowStream};
pub use schema::{GraphSchema, NodeSchema, RelationshipSchema, SchemaPattern};
pub use traits::{BackendStatus, GraphBackend, QueryLanguage};
