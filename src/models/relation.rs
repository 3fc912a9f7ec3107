//! Relation model representing directed, typed edges between entities.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use super::entity::{generate_ulid, strip_core_fields};

/// Property keys stored on a relation edge that are not free-form properties.
///
/// The relation type is stored on the edge as `type`.
pub const RELATION_CORE_FIELDS: &[&str] = &["id", "type", "source_id", "target_id", "created_at"];

/// A directed edge between two entities, addressed by entity name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Source entity name.
    pub source: String,
    /// Target entity name.
    pub target: String,
    /// Active-voice verb phrase, e.g. `works_at`.
    #[serde(rename = "relationType")]
    pub relation_type: String,
    /// Source entity id, copied at edge creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<f64>,
    #[serde(default)]
    pub properties: Map<String, JsonValue>,
}

impl Relation {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        relation_type: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            source: source.into(),
            target: target.into(),
            relation_type: relation_type.into(),
            source_id: None,
            target_id: None,
            created_at: None,
            properties: Map::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: JsonValue) -> Self {
        self.properties.insert(key.to_string(), value);
        self
    }

    /// Fills in a generated id and creation time where absent.
    pub fn prepare(&mut self, now: f64) {
        self.id.get_or_insert_with(generate_ulid);
        self.created_at.get_or_insert(now);
    }

    /// Properties with core keys removed, safe to merge onto an edge.
    pub fn storable_properties(&self) -> Map<String, JsonValue> {
        strip_core_fields(&self.properties, RELATION_CORE_FIELDS)
    }

    /// True if both endpoints are among `names`.
    pub fn connects(&self, names: &HashSet<&str>) -> bool {
        names.contains(self.source.as_str()) && names.contains(self.target.as_str())
    }
}
