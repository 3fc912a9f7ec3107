//! Partial updates for entities and relations.
//!
//! Updates are parsed from attribute maps. Unrecognized keys are collected
//! rather than rejected so the caller can be warned and retry.

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::error::AppError;

/// Declared-updatable entity attributes; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityUpdate {
    pub name: Option<String>,
    pub entity_type: Option<String>,
    /// Replaces the observation list.
    pub observations: Option<Vec<String>>,
    /// Shallow-merged into the existing metadata.
    pub metadata: Option<Map<String, JsonValue>>,
}

impl EntityUpdate {
    /// Parses an attribute map, returning the update and the ignored keys.
    pub fn from_attributes(
        attributes: &Map<String, JsonValue>,
    ) -> Result<(Self, Vec<String>), AppError> {
        let mut update = Self::default();
        let mut ignored = Vec::new();

        for (key, value) in attributes {
            match key.as_str() {
                "name" => update.name = Some(expect_string(key, value)?),
                "type" => update.entity_type = Some(expect_string(key, value)?),
                "observations" => update.observations = Some(expect_observations(value)?),
                "metadata" => update.metadata = Some(expect_object(key, value)?),
                _ => ignored.push(key.clone()),
            }
        }

        Ok((update, ignored))
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.entity_type.is_none()
            && self.observations.is_none()
            && self.metadata.is_none()
    }

    /// True if the update changes an input of the embedding text.
    pub fn touches_embedding(&self) -> bool {
        self.name.is_some() || self.entity_type.is_some() || self.observations.is_some()
    }

    /// Names of the attributes this update sets.
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        if self.name.is_some() {
            keys.push("name".to_string());
        }
        if self.entity_type.is_some() {
            keys.push("type".to_string());
        }
        if self.observations.is_some() {
            keys.push("observations".to_string());
        }
        if self.metadata.is_some() {
            keys.push("metadata".to_string());
        }
        keys
    }
}

/// Declared-updatable relation attributes.
///
/// Changing `source` or `target` re-creates the edge under the same id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationUpdate {
    pub relation_type: Option<String>,
    pub properties: Option<Map<String, JsonValue>>,
    pub source: Option<String>,
    pub target: Option<String>,
}

impl RelationUpdate {
    pub fn from_attributes(
        attributes: &Map<String, JsonValue>,
    ) -> Result<(Self, Vec<String>), AppError> {
        let mut update = Self::default();
        let mut ignored = Vec::new();

        for (key, value) in attributes {
            match key.as_str() {
                "relationType" => update.relation_type = Some(expect_string(key, value)?),
                "properties" => update.properties = Some(expect_object(key, value)?),
                "source" => update.source = Some(expect_string(key, value)?),
                "target" => update.target = Some(expect_string(key, value)?),
                _ => ignored.push(key.clone()),
            }
        }

        Ok((update, ignored))
    }

    pub fn is_empty(&self) -> bool {
        self.relation_type.is_none()
            && self.properties.is_none()
            && self.source.is_none()
            && self.target.is_none()
    }

    pub fn changes_endpoints(&self) -> bool {
        self.source.is_some() || self.target.is_some()
    }

    pub fn keys(&self) -> Vec<String> {
        [
            ("relationType", self.relation_type.is_some()),
            ("properties", self.properties.is_some()),
            ("source", self.source.is_some()),
            ("target", self.target.is_some()),
        ]
        .into_iter()
        .filter(|(_, set)| *set)
        .map(|(key, _)| key.to_string())
        .collect()
    }
}

/// Result of an update by id. A missing target is an outcome, not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UpdateOutcome {
    Updated {
        updated: Vec<String>,
        ignored: Vec<String>,
    },
    NotFound,
    /// No recognized attribute was supplied.
    NothingToUpdate { ignored: Vec<String> },
}

impl UpdateOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, UpdateOutcome::Updated { .. })
    }
}

fn expect_string(key: &str, value: &JsonValue) -> Result<String, AppError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| AppError::Validation(format!("attribute '{}' must be a string", key)))
}

fn expect_object(key: &str, value: &JsonValue) -> Result<Map<String, JsonValue>, AppError> {
    value
        .as_object()
        .cloned()
        .ok_or_else(|| AppError::Validation(format!("attribute '{}' must be an object", key)))
}

/// A single string is one observation; a list must hold only strings.
fn expect_observations(value: &JsonValue) -> Result<Vec<String>, AppError> {
    match value {
        JsonValue::String(s) if s.is_empty() => Ok(Vec::new()),
        JsonValue::String(s) => Ok(vec![s.clone()]),
        JsonValue::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    AppError::Validation("observations must be a list of strings".into())
                })
            })
            .collect(),
        _ => Err(AppError::Validation(
            "observations must be a string or a list of strings".into(),
        )),
    }
}
