//! Exact-match attribute filters for id lookups.
//!
//! Filters are built from loosely typed attribute maps (as received from the
//! tool layer) and reject anything outside their fixed field set.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::AppError;

/// Keys that would require matching on observation or free-text content.
const CONTENT_MATCH_KEYS: &[&str] = &[
    "observations",
    "observation_contains",
    "name_contains",
    "type_contains",
];

/// Equality filter over entity attributes; unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityFilter {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub entity_type: Option<String>,
}

impl EntityFilter {
    pub const SUPPORTED: &'static [&'static str] = &["name", "type"];

    /// Builds a filter, rejecting unknown and content-matching keys.
    pub fn from_attributes(attributes: &Map<String, JsonValue>) -> Result<Self, AppError> {
        let mut filter = Self::default();
        for (key, value) in attributes {
            match key.as_str() {
                "name" => filter.name = Some(expect_string(key, value)?),
                "type" => filter.entity_type = Some(expect_string(key, value)?),
                other => return Err(unsupported(other, Self::SUPPORTED)),
            }
        }
        Ok(filter)
    }
}

/// Equality filter over relation attributes; unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationFilter {
    #[serde(rename = "relationType")]
    pub relation_type: Option<String>,
    /// Source entity name.
    pub source: Option<String>,
    pub target: Option<String>,
    pub source_id: Option<String>,
    pub target_id: Option<String>,
}

impl RelationFilter {
    pub const SUPPORTED: &'static [&'static str] = &[
        "relationType",
        "source",
        "source_name",
        "target",
        "target_name",
        "source_id",
        "target_id",
    ];

    /// Builds a filter; `source_name`/`target_name` alias `source`/`target`.
    pub fn from_attributes(attributes: &Map<String, JsonValue>) -> Result<Self, AppError> {
        let mut filter = Self::default();
        for (key, value) in attributes {
            match key.as_str() {
                "relationType" => filter.relation_type = Some(expect_string(key, value)?),
                "source" | "source_name" => filter.source = Some(expect_string(key, value)?),
                "target" | "target_name" => filter.target = Some(expect_string(key, value)?),
                "source_id" => filter.source_id = Some(expect_string(key, value)?),
                "target_id" => filter.target_id = Some(expect_string(key, value)?),
                other => return Err(unsupported(other, Self::SUPPORTED)),
            }
        }
        Ok(filter)
    }
}

fn expect_string(key: &str, value: &JsonValue) -> Result<String, AppError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| AppError::Validation(format!("attribute '{}' must be a string", key)))
}

fn unsupported(key: &str, supported: &[&str]) -> AppError {
    let reason = if CONTENT_MATCH_KEYS.contains(&key) {
        "searching on observation or partial text content is not supported; use search_memory"
            .to_string()
    } else {
        format!("supported attributes are: {}", supported.join(", "))
    };
    tracing::warn!(attribute = key, "Rejected filter attribute");
    AppError::UnsupportedAttribute {
        attribute: key.to_string(),
        reason,
    }
}
