//! Best-effort schema summary reported by backends.

use serde::{Deserialize, Serialize};

use crate::graph::query::QueryExt;
use crate::graph::traits::GraphBackend;

/// A node label with the property keys sampled from its nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSchema {
    pub label: String,
    pub properties: Vec<String>,
}

/// A relationship type with the property keys sampled from its edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipSchema {
    #[serde(rename = "type")]
    pub relationship_type: String,
    pub properties: Vec<String>,
}

/// An observed `(left)-[relation]->(right)` label combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaPattern {
    pub left: String,
    pub relation: String,
    pub right: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSchema {
    pub nodes: Vec<NodeSchema>,
    pub relationships: Vec<RelationshipSchema>,
    pub patterns: Vec<SchemaPattern>,
}

/// Quotes a label or relationship type for interpolation into openCypher.
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Samples the distinct property keys of nodes (or edges) matched by `pattern`.
///
/// `pattern` must bind the element to `x`. Failures are logged and yield an
/// empty key list so one bad label does not spoil the whole summary.
pub(crate) async fn sample_property_keys<B: GraphBackend + ?Sized>(
    backend: &B,
    pattern: &str,
) -> Vec<String> {
    let text = format!(
        "MATCH {} WITH x LIMIT 100 UNWIND keys(x) AS key RETURN DISTINCT key",
        pattern
    );
    let rows = match backend.query(&text).fetch_all().await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!(backend = backend.name(), pattern, error = %e, "Failed to sample property keys");
            return Vec::new();
        }
    };

    let mut keys: Vec<String> = rows
        .iter()
        .filter_map(|row| row.get_opt::<String>("key").ok().flatten())
        .filter(|key| key != "embedding")
        .collect();
    keys.sort();
    keys
}

/// Samples `(left)-[type]->(right)` label combinations for a relationship type.
pub(crate) async fn sample_patterns<B: GraphBackend + ?Sized>(
    backend: &B,
    relationship_type: &str,
) -> Vec<SchemaPattern> {
    let text = format!(
        "MATCH (a)-[r:{}]->(b) RETURN DISTINCT labels(a)[0] AS from_label, labels(b)[0] AS to_label LIMIT 100",
        quote_identifier(relationship_type)
    );
    let rows = match backend.query(&text).fetch_all().await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!(backend = backend.name(), relationship_type, error = %e, "Failed to sample patterns");
            return Vec::new();
        }
    };

    rows.iter()
        .filter_map(|row| {
            let left = row.get_opt::<String>("from_label").ok().flatten()?;
            let right = row.get_opt::<String>("to_label").ok().flatten()?;
            Some(SchemaPattern {
                left,
                relation: relationship_type.to_string(),
                right,
            })
        })
        .collect()
}

/// Builds a [`GraphSchema`] from known labels and relationship types.
pub(crate) async fn describe<B: GraphBackend + ?Sized>(
    backend: &B,
    labels: &[String],
    relationship_types: &[String],
) -> GraphSchema {
    let mut schema = GraphSchema::default();

    for label in labels {
        let pattern = format!("(x:{})", quote_identifier(label));
        schema.nodes.push(NodeSchema {
            label: label.clone(),
            properties: sample_property_keys(backend, &pattern).await,
        });
    }

    for relationship_type in relationship_types {
        let pattern = format!("()-[x:{}]->()", quote_identifier(relationship_type));
        schema.relationships.push(RelationshipSchema {
            relationship_type: relationship_type.clone(),
            properties: sample_property_keys(backend, &pattern).await,
        });
        schema
            .patterns
            .extend(sample_patterns(backend, relationship_type).await);
    }

    schema
}
