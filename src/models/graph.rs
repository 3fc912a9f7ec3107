//! Knowledge graph snapshot returned by read and search operations.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{Entity, Relation};

/// Entities paired with the relations among them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
}

impl KnowledgeGraph {
    pub fn new(entities: Vec<Entity>, relations: Vec<Relation>) -> Self {
        Self {
            entities,
            relations,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty()
    }

    /// Drops relations with an endpoint outside the entity set.
    pub fn retain_internal_relations(&mut self) {
        let names: HashSet<&str> = self.entities.iter().map(|e| e.name.as_str()).collect();
        self.relations.retain(|r| r.connects(&names));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retain_internal_relations() {
        let mut graph = KnowledgeGraph::new(
            vec![Entity::new("Alice", "Person"), Entity::new("TechCorp", "Company")],
            vec![
                Relation::new("Alice", "TechCorp", "works_at"),
                Relation::new("Alice", "Bob", "knows"),
            ],
        );
        graph.retain_internal_relations();

        assert_eq!(graph.relations.len(), 1);
        assert_eq!(graph.relations[0].relation_type, "works_at");
    }

    #[test]
    fn test_empty_graph_serialization() {
        let value = serde_json::to_value(KnowledgeGraph::empty()).unwrap();
        assert_eq!(value, serde_json::json!({"entities": [], "relations": []}));
    }
}
