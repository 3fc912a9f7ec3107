//! Entity model representing named nodes in the knowledge graph.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use ulid::Ulid;

/// Property keys stored on an entity node that are not metadata.
pub const ENTITY_CORE_FIELDS: &[&str] = &[
    "id",
    "name",
    "type",
    "observations",
    "created_at",
    "last_modified",
    "embedding",
];

/// Number of leading observations folded into the embedding text.
const EMBEDDING_OBSERVATIONS: usize = 3;

/// A named node with a type, recent observations and free-form metadata.
///
/// `name` is the merge key: two entities with the same name are the same
/// entity. The embedding is write-only and never serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier (ULID), assigned on creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Newest first; conventionally `"<timestamp> | <text>"`.
    #[serde(default)]
    pub observations: Vec<String>,
    /// Vector embedding for semantic search (internal, not serialized).
    #[serde(default, skip_serializing)]
    pub embedding: Option<Vec<f32>>,
    /// Seconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<f64>,
    #[serde(default)]
    pub metadata: Map<String, JsonValue>,
}

impl Entity {
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            entity_type: entity_type.into(),
            observations: Vec::new(),
            embedding: None,
            created_at: None,
            last_modified: None,
            metadata: Map::new(),
        }
    }

    pub fn with_observations<I, S>(mut self, observations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.observations = observations.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_metadata(mut self, key: &str, value: JsonValue) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    /// Fills in a generated id and the current timestamps where absent.
    pub fn prepare(&mut self, now: f64) {
        self.id.get_or_insert_with(generate_ulid);
        self.created_at.get_or_insert(now);
        self.last_modified.get_or_insert(now);
    }

    /// Metadata with core keys removed, safe to merge onto a node.
    pub fn storable_metadata(&self) -> Map<String, JsonValue> {
        strip_core_fields(&self.metadata, ENTITY_CORE_FIELDS)
    }
}

/// Builds the embedding text for the given entity fields.
pub fn embedding_text(name: &str, entity_type: &str, observations: &[String]) -> String {
    let mut text = format!("{} {}", name, entity_type);
    if !observations.is_empty() {
        let leading: Vec<&str> = observations
            .iter()
            .take(EMBEDDING_OBSERVATIONS)
            .map(String::as_str)
            .collect();
        text.push(' ');
        text.push_str(&leading.join(" "));
    }
    text
}

/// Coerces an `observations` value into a list.
///
/// Some backends flatten lists into a `|`-delimited string; an empty string
/// is an empty list. Anything else that is not a list becomes empty.
pub fn parse_observations(value: Option<&JsonValue>) -> Vec<String> {
    match value {
        Some(JsonValue::String(s)) if s.is_empty() => Vec::new(),
        Some(JsonValue::String(s)) => s.split('|').map(str::to_string).collect(),
        Some(JsonValue::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                JsonValue::String(s) => Some(s.clone()),
                JsonValue::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Returns `properties` minus the keys listed in `core`.
pub fn strip_core_fields(properties: &Map<String, JsonValue>, core: &[&str]) -> Map<String, JsonValue> {
    properties
        .iter()
        .filter(|(k, _)| !core.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Current time as fractional seconds since the Unix epoch.
pub fn now_timestamp() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Generates a new ULID string.
pub fn generate_ulid() -> String {
    Ulid::new().to_string()
}
