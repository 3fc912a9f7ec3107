//! Neo4j backend over the Bolt protocol.
//!
//! # Example
//!
//! ```ignore
//! use memograph::graph::backends::neo4j::Neo4jBackend;
//! use memograph::graph::QueryExt;
//!
//! let backend = Neo4jBackend::connect("bolt://localhost:7687", "neo4j", "password").await?;
//! let rows = backend.query("MATCH (e:Memory) RETURN e.name AS name").fetch_all().await?;
//! ```

use std::collections::HashMap;

use async_stream::try_stream;
use async_trait::async_trait;
use neo4rs::{
    query, BoltBoolean, BoltFloat, BoltInteger, BoltList, BoltMap, BoltNull, BoltString,
    BoltType, Graph,
};
use serde_json::Value as JsonValue;

use crate::error::AppError;
use crate::graph::query::QueryExt;
use crate::graph::row::{Params, Row, RowStream};
use crate::graph::schema::{self, GraphSchema};
use crate::graph::traits::{require_opencypher, BackendStatus, GraphBackend, QueryLanguage};

const BACKEND_NAME: &str = "neo4j";

/// Neo4j graph backend.
///
/// `neo4rs::Graph` pools connections internally and is cheap to clone.
#[derive(Clone)]
pub struct Neo4jBackend {
    graph: Graph,
}

impl Neo4jBackend {
    /// Connects to a Neo4j server.
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self, AppError> {
        let graph = Graph::new(uri, user, password).await?;
        tracing::info!(uri, "Connected to Neo4j");
        Ok(Self { graph })
    }

    async fn list_strings(&self, text: &str, column: &str) -> Result<Vec<String>, AppError> {
        let rows = self.query(text).fetch_all().await?;
        rows.iter().map(|row| row.get::<String>(column)).collect()
    }
}

#[async_trait]
impl GraphBackend for Neo4jBackend {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    async fn status(&self) -> BackendStatus {
        match self.query("RETURN 1 AS ok").fetch_one().await {
            Ok(Some(_)) => BackendStatus::Available,
            Ok(None) => BackendStatus::Unavailable,
            Err(e) => {
                tracing::warn!(error = %e, "Neo4j liveness check failed");
                BackendStatus::Unavailable
            }
        }
    }

    async fn schema(&self) -> Result<GraphSchema, AppError> {
        let labels = self
            .list_strings("CALL db.labels() YIELD label RETURN label", "label")
            .await?;
        let relationship_types = self
            .list_strings(
                "CALL db.relationshipTypes() YIELD relationshipType RETURN relationshipType",
                "relationshipType",
            )
            .await?;

        Ok(schema::describe(self, &labels, &relationship_types).await)
    }

    async fn execute(
        &self,
        text: &str,
        language: QueryLanguage,
        params: Params,
    ) -> Result<RowStream<'_>, AppError> {
        require_opencypher(BACKEND_NAME, language)?;

        let mut q = query(text);
        for (name, value) in params {
            q = q.param(&name, json_to_bolt(value));
        }

        let text = text.to_string();
        let mut result = self
            .graph
            .execute(q)
            .await
            .map_err(|e| AppError::query(format!("Cypher query failed: {}", e), &text))?;

        Ok(Box::pin(try_stream! {
            while let Some(row) = result
                .next()
                .await
                .map_err(|e| AppError::query(format!("Failed to fetch row: {}", e), &text))?
            {
                let data: HashMap<String, JsonValue> = row
                    .to()
                    .map_err(|e| AppError::Decode(format!("Failed to decode Bolt row: {}", e)))?;
                yield Row::new(data);
            }
        }))
    }

    fn vector_search_statement(&self) -> Option<String> {
        Some(
            "CALL db.index.vector.queryNodes($index, $top_k, $embedding) \
             YIELD node AS entity, score"
                .to_string(),
        )
    }

    fn vector_index_statement(
        &self,
        index: &str,
        label: &str,
        property: &str,
        dimensions: usize,
    ) -> Option<String> {
        Some(format!(
            "CREATE VECTOR INDEX {} IF NOT EXISTS FOR (e:{}) ON (e.{}) \
             OPTIONS {{indexConfig: {{`vector.dimensions`: {}, `vector.similarity_function`: 'cosine'}}}}",
            schema::quote_identifier(index),
            schema::quote_identifier(label),
            schema::quote_identifier(property),
            dimensions
        ))
    }
}

/// Converts a JSON parameter into its Bolt representation.
///
/// Integers stay integers so `LIMIT $n` and list slicing keep working.
fn json_to_bolt(value: JsonValue) -> BoltType {
    match value {
        JsonValue::Null => BoltType::Null(BoltNull),
        JsonValue::Bool(b) => BoltType::Boolean(BoltBoolean::new(b)),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => BoltType::Integer(BoltInteger::new(i)),
            None => BoltType::Float(BoltFloat::new(n.as_f64().unwrap_or(f64::NAN))),
        },
        JsonValue::String(s) => BoltType::String(BoltString::new(&s)),
        JsonValue::Array(items) => BoltType::List(BoltList {
            value: items.into_iter().map(json_to_bolt).collect(),
        }),
        JsonValue::Object(map) => BoltType::Map(BoltMap {
            value: map
                .into_iter()
                .map(|(k, v)| (BoltString::new(&k), json_to_bolt(v)))
                .collect(),
        }),
    }
}
