//! Decoding of backend result rows into entities and relations.
//!
//! Backends disagree on row layout. A row is classified by the first
//! matching shape, in this order:
//!
//! 1. **Named**: projected columns (`name`, `type`, ... or `source`,
//!    `target`, `relationType`, ...).
//! 2. **Columnar**: positional columns `col_0`, `col_1`, ...
//! 3. **Nested**: the named payload wrapped under `node` or `rel`.
//!
//! Rows matching no shape are skipped, not rejected.

use serde_json::{Map, Value as JsonValue};

use crate::graph::Row;
use crate::models::{
    now_timestamp, parse_observations, strip_core_fields, Entity, Relation, ENTITY_CORE_FIELDS,
    RELATION_CORE_FIELDS,
};

/// Entity type assumed when a nested payload has none.
const UNKNOWN_TYPE: &str = "Unknown";

/// The detected layout of a result row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowShape {
    Named,
    Columnar,
    Nested,
}

/// Anything a field can be looked up in: a row or a nested map.
trait Fields {
    fn field(&self, key: &str) -> Option<&JsonValue>;
}

impl Fields for Row {
    fn field(&self, key: &str) -> Option<&JsonValue> {
        self.get_raw(key)
    }
}

impl Fields for Map<String, JsonValue> {
    fn field(&self, key: &str) -> Option<&JsonValue> {
        self.get(key)
    }
}

/// Column names for each entity field in one layout.
struct EntityColumns {
    id: &'static str,
    name: &'static str,
    entity_type: &'static str,
    observations: &'static str,
    created_at: &'static str,
    last_modified: &'static str,
    /// Candidate columns for the full property map, first object wins.
    properties: &'static [&'static str],
}

const NAMED_ENTITY: EntityColumns = EntityColumns {
    id: "id",
    name: "name",
    entity_type: "type",
    observations: "observations",
    created_at: "created_at",
    last_modified: "last_modified",
    properties: &["all_properties"],
};

// col_6 holds the embedding when it is projected, pushing the map to col_7
const COLUMNAR_ENTITY: EntityColumns = EntityColumns {
    id: "col_0",
    name: "col_1",
    entity_type: "col_2",
    observations: "col_3",
    created_at: "col_4",
    last_modified: "col_5",
    properties: &["col_7", "col_6"],
};

struct RelationColumns {
    id: &'static str,
    source: &'static str,
    target: &'static str,
    relation_type: &'static str,
    source_id: &'static str,
    target_id: &'static str,
    created_at: &'static str,
    properties: &'static str,
}

const NAMED_RELATION: RelationColumns = RelationColumns {
    id: "id",
    source: "source",
    target: "target",
    relation_type: "relationType",
    source_id: "source_id",
    target_id: "target_id",
    created_at: "created_at",
    properties: "all_properties",
};

const COLUMNAR_RELATION: RelationColumns = RelationColumns {
    id: "col_0",
    source: "col_1",
    target: "col_2",
    relation_type: "col_3",
    source_id: "col_4",
    target_id: "col_5",
    created_at: "col_6",
    properties: "col_7",
};

/// Classifies a row holding an entity.
pub fn detect_entity_shape(row: &Row) -> Option<RowShape> {
    if row.contains("name") && row.contains("type") {
        Some(RowShape::Named)
    } else if row.contains("col_0") && row.contains("col_1") {
        Some(RowShape::Columnar)
    } else if nested(row, "node").is_some_and(|node| node.contains_key("name")) {
        Some(RowShape::Nested)
    } else {
        None
    }
}

/// Classifies a row holding a relation.
pub fn detect_relation_shape(row: &Row) -> Option<RowShape> {
    if row.contains("source") && row.contains("target") && row.contains("relationType") {
        Some(RowShape::Named)
    } else if row.contains("col_0") && row.contains("col_1") && row.contains("col_2") {
        Some(RowShape::Columnar)
    } else if nested(row, "rel").is_some_and(|rel| rel.contains_key("relationType")) {
        Some(RowShape::Nested)
    } else {
        None
    }
}

/// Decodes one row into an entity, or `None` if no shape matches.
///
/// Missing timestamps default to `now`.
pub fn decode_entity(row: &Row, now: f64) -> Option<Entity> {
    match detect_entity_shape(row)? {
        RowShape::Named => entity_from(row, &NAMED_ENTITY, None, now),
        RowShape::Columnar => entity_from(row, &COLUMNAR_ENTITY, Some(UNKNOWN_TYPE), now),
        RowShape::Nested => entity_from(nested(row, "node")?, &NAMED_ENTITY, Some(UNKNOWN_TYPE), now),
    }
}

/// Decodes one row into a relation, or `None` if no shape matches.
pub fn decode_relation(row: &Row, now: f64) -> Option<Relation> {
    match detect_relation_shape(row)? {
        RowShape::Named => relation_from(row, &NAMED_RELATION, now),
        RowShape::Columnar => relation_from(row, &COLUMNAR_RELATION, now),
        RowShape::Nested => relation_from(nested(row, "rel")?, &NAMED_RELATION, now),
    }
}

/// Decodes every entity row, skipping rows of unknown shape.
pub fn decode_entities(rows: &[Row]) -> Vec<Entity> {
    let now = now_timestamp();
    let entities: Vec<Entity> = rows.iter().filter_map(|row| decode_entity(row, now)).collect();
    if entities.len() < rows.len() {
        tracing::debug!(
            rows = rows.len(),
            decoded = entities.len(),
            "Skipped entity rows of unknown shape"
        );
    }
    entities
}

/// Decodes every relation row, skipping rows of unknown shape.
pub fn decode_relations(rows: &[Row]) -> Vec<Relation> {
    let now = now_timestamp();
    let relations: Vec<Relation> = rows
        .iter()
        .filter_map(|row| decode_relation(row, now))
        .collect();
    if relations.len() < rows.len() {
        tracing::debug!(
            rows = rows.len(),
            decoded = relations.len(),
            "Skipped relation rows of unknown shape"
        );
    }
    relations
}

fn nested<'a>(row: &'a Row, key: &str) -> Option<&'a Map<String, JsonValue>> {
    row.get_raw(key).and_then(JsonValue::as_object)
}

fn entity_from<F: Fields + ?Sized>(
    fields: &F,
    columns: &EntityColumns,
    default_type: Option<&str>,
    now: f64,
) -> Option<Entity> {
    let name = string_field(fields, columns.name)?;
    let entity_type = string_field(fields, columns.entity_type)
        .or_else(|| default_type.map(str::to_string))?;

    let metadata = columns
        .properties
        .iter()
        .find_map(|key| fields.field(key).and_then(JsonValue::as_object))
        .map(|props| strip_core_fields(props, ENTITY_CORE_FIELDS))
        .unwrap_or_default();

    Some(Entity {
        id: id_field(fields, columns.id),
        name,
        entity_type,
        observations: parse_observations(fields.field(columns.observations)),
        embedding: None,
        created_at: Some(timestamp_field(fields, columns.created_at).unwrap_or(now)),
        last_modified: Some(timestamp_field(fields, columns.last_modified).unwrap_or(now)),
        metadata,
    })
}

fn relation_from<F: Fields + ?Sized>(
    fields: &F,
    columns: &RelationColumns,
    now: f64,
) -> Option<Relation> {
    let properties = fields
        .field(columns.properties)
        .and_then(JsonValue::as_object)
        .map(|props| strip_core_fields(props, RELATION_CORE_FIELDS))
        .unwrap_or_default();

    Some(Relation {
        id: id_field(fields, columns.id),
        source: string_field(fields, columns.source)?,
        target: string_field(fields, columns.target)?,
        relation_type: string_field(fields, columns.relation_type)?,
        source_id: id_field(fields, columns.source_id),
        target_id: id_field(fields, columns.target_id),
        created_at: Some(timestamp_field(fields, columns.created_at).unwrap_or(now)),
        properties,
    })
}

fn string_field<F: Fields + ?Sized>(fields: &F, key: &str) -> Option<String> {
    fields.field(key).and_then(JsonValue::as_str).map(str::to_string)
}

/// Ids are strings, but some stores hand back numeric ids.
fn id_field<F: Fields + ?Sized>(fields: &F, key: &str) -> Option<String> {
    match fields.field(key)? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn timestamp_field<F: Fields + ?Sized>(fields: &F, key: &str) -> Option<f64> {
    fields.field(key).and_then(JsonValue::as_f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: JsonValue) -> Row {
        Row::from(value.as_object().cloned().unwrap())
    }

    #[test]
    fn test_named_entity() {
        let entity = decode_entity(
            &row(json!({
                "id": "e1",
                "name": "Alice",
                "type": "Person",
                "observations": ["2024 | joined"],
                "created_at": 100.0,
                "last_modified": 200.0,
                "all_properties": {
                    "id": "e1", "name": "Alice", "embedding": [0.1], "team": "core"
                }
            })),
            999.0,
        )
        .unwrap();

        assert_eq!(entity.id.as_deref(), Some("e1"));
        assert_eq!(entity.entity_type, "Person");
        assert_eq!(entity.observations, vec!["2024 | joined"]);
        assert_eq!(entity.created_at, Some(100.0));
        assert_eq!(entity.last_modified, Some(200.0));
        assert_eq!(entity.metadata.len(), 1);
        assert_eq!(entity.metadata["team"], "core");
        assert!(entity.embedding.is_none());
    }

    #[test]
    fn test_columnar_entity_with_pipe_observations() {
        let r = row(json!({
            "col_0": "e2",
            "col_1": "TechCorp",
            "col_2": "Company",
            "col_3": "founded 2001|public",
            "col_6": {"industry": "software"}
        }));
        assert_eq!(detect_entity_shape(&r), Some(RowShape::Columnar));

        let entity = decode_entity(&r, 5.0).unwrap();
        assert_eq!(entity.name, "TechCorp");
        assert_eq!(entity.observations, vec!["founded 2001", "public"]);
        assert_eq!(entity.created_at, Some(5.0));
        assert_eq!(entity.last_modified, Some(5.0));
        assert_eq!(entity.metadata["industry"], "software");
    }

    #[test]
    fn test_columnar_entity_with_embedding_column() {
        let entity = decode_entity(
            &row(json!({
                "col_0": "e3", "col_1": "Bob", "col_2": "Person", "col_3": "",
                "col_6": [0.5, 0.5],
                "col_7": {"role": "ops"}
            })),
            1.0,
        )
        .unwrap();

        assert!(entity.observations.is_empty());
        assert_eq!(entity.metadata["role"], "ops");
    }

    #[test]
    fn test_columnar_entity_without_type_column_defaults_type() {
        let r = row(json!({"col_0": "e4", "col_1": "Dana"}));
        assert_eq!(detect_entity_shape(&r), Some(RowShape::Columnar));

        let entity = decode_entity(&r, 1.0).unwrap();
        assert_eq!(entity.name, "Dana");
        assert_eq!(entity.entity_type, "Unknown");
        assert!(entity.observations.is_empty());
    }

    #[test]
    fn test_nested_entity_defaults_type() {
        let r = row(json!({"node": {"id": 7, "name": "Carol"}}));
        assert_eq!(detect_entity_shape(&r), Some(RowShape::Nested));

        let entity = decode_entity(&r, 1.0).unwrap();
        assert_eq!(entity.id.as_deref(), Some("7"));
        assert_eq!(entity.entity_type, "Unknown");
    }

    #[test]
    fn test_named_shape_takes_precedence() {
        let r = row(json!({
            "name": "Alice", "type": "Person",
            "col_0": "x", "col_1": "Other",
            "node": {"name": "Nested"}
        }));
        assert_eq!(detect_entity_shape(&r), Some(RowShape::Named));
        assert_eq!(decode_entity(&r, 1.0).unwrap().name, "Alice");
    }

    #[test]
    fn test_unknown_shape_is_skipped() {
        let rows = vec![
            row(json!({"something": "else"})),
            row(json!({"name": "Alice", "type": "Person"})),
            row(json!({"node": "not a map"})),
        ];
        let entities = decode_entities(&rows);
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].name, "Alice");
    }

    #[test]
    fn test_named_relation() {
        let relation = decode_relation(
            &row(json!({
                "id": "r1",
                "source": "Alice",
                "target": "TechCorp",
                "relationType": "works_at",
                "source_id": "e1",
                "target_id": "e2",
                "created_at": 10.0,
                "all_properties": {"id": "r1", "type": "works_at", "since": 2020}
            })),
            99.0,
        )
        .unwrap();

        assert_eq!(relation.relation_type, "works_at");
        assert_eq!(relation.source_id.as_deref(), Some("e1"));
        assert_eq!(relation.created_at, Some(10.0));
        assert_eq!(relation.properties.len(), 1);
        assert_eq!(relation.properties["since"], 2020);
    }

    #[test]
    fn test_columnar_relation() {
        let relation = decode_relation(
            &row(json!({
                "col_0": "r2", "col_1": "Alice", "col_2": "TechCorp", "col_3": "works_at",
                "col_4": "e1", "col_5": "e2", "col_7": {"weight": 1}
            })),
            42.0,
        )
        .unwrap();

        assert_eq!(relation.id.as_deref(), Some("r2"));
        assert_eq!(relation.target, "TechCorp");
        assert_eq!(relation.created_at, Some(42.0));
        assert_eq!(relation.properties["weight"], 1);
    }

    #[test]
    fn test_nested_relation() {
        let r = row(json!({"rel": {
            "id": "r3", "source": "A", "target": "B", "relationType": "knows"
        }}));
        assert_eq!(detect_relation_shape(&r), Some(RowShape::Nested));
        assert_eq!(decode_relation(&r, 1.0).unwrap().relation_type, "knows");
    }

    #[test]
    fn test_relation_missing_endpoint_is_skipped() {
        let rows = vec![row(json!({"rel": {"relationType": "knows", "source": "A"}}))];
        assert!(decode_relations(&rows).is_empty());
    }
}
