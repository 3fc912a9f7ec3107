//! End-to-end tests for the knowledge graph manager against Neo4j.
//!
//! These tests require a running Neo4j 5 instance and wipe every `Memory`
//! node in it. Configure with `MEMOGRAPH_TEST_NEO4J_URI`,
//! `MEMOGRAPH_TEST_NEO4J_USER` and `MEMOGRAPH_TEST_NEO4J_PASSWORD`.
//! Run with: `cargo test --features integration --test neo4j_integration`

#![cfg(feature = "integration")]

use std::sync::Arc;

use memograph::config::MemorySettings;
use memograph::context::Context;
use memograph::embedding::{Embedder, HashingEmbedder};
use memograph::graph::backends::neo4j::Neo4jBackend;
use memograph::graph::{BackendStatus, QueryExt};
use memograph::models::{Entity, Relation, UpdateOutcome};
use memograph::services::{KnowledgeGraphManager, SearchMode};
use memograph::FromRef;
use serde_json::json;
use serial_test::serial;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

async fn connect() -> Neo4jBackend {
    Neo4jBackend::connect(
        &env_or("MEMOGRAPH_TEST_NEO4J_URI", "bolt://localhost:7687"),
        &env_or("MEMOGRAPH_TEST_NEO4J_USER", "neo4j"),
        &env_or("MEMOGRAPH_TEST_NEO4J_PASSWORD", "password"),
    )
    .await
    .expect("Failed to connect to test database")
}

/// Manager without an embedder (string search), on a clean store.
async fn manager() -> KnowledgeGraphManager {
    let backend = connect().await;
    cleanup(&backend).await;
    let ctx = Context::new(Arc::new(backend), None, MemorySettings::default());
    KnowledgeGraphManager::from_ref(&ctx)
}

async fn cleanup(backend: &Neo4jBackend) {
    backend
        .query("MATCH (e:Memory) DETACH DELETE e")
        .run()
        .await
        .expect("Failed to clean up");
}

fn names(entities: &[Entity]) -> Vec<&str> {
    let mut names: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
    names.sort();
    names
}

async fn seed_alice(manager: &KnowledgeGraphManager) -> (Entity, Entity, Relation) {
    let mut entities = manager
        .create_entities(vec![
            Entity::new("Alice", "Person").with_observations(["2024-05-01 | joined TechCorp"]),
            Entity::new("TechCorp", "Company"),
        ])
        .await
        .expect("create_entities failed");
    let mut relations = manager
        .create_relations(vec![Relation::new("Alice", "TechCorp", "works_at")])
        .await
        .expect("create_relations failed");

    let position = entities.iter().position(|e| e.name == "Alice").unwrap();
    let alice = entities.remove(position);
    let techcorp = entities.pop().unwrap();
    (alice, techcorp, relations.pop().expect("relation not created"))
}

#[serial]
mod manager_tests {
    use super::*;

    #[tokio::test]
    async fn test_status_reports_string_mode_without_embedder() {
        let manager = manager().await;
        let status = manager.status().await;

        assert_eq!(status.backend, "neo4j");
        assert_eq!(status.status, BackendStatus::Available);
        assert_eq!(status.search_mode, SearchMode::String);
    }

    #[tokio::test]
    async fn test_duplicate_upsert_keeps_one_entity() {
        let manager = manager().await;

        let first = manager
            .create_entities(vec![Entity::new("Alice", "Person")])
            .await
            .unwrap();
        let second = manager
            .create_entities(vec![Entity::new("Alice", "Person")])
            .await
            .unwrap();

        assert_eq!(first[0].id, second[0].id);
        assert_eq!(first[0].created_at, second[0].created_at);
        assert_eq!(manager.read_graph().await.unwrap().entities.len(), 1);
    }

    #[tokio::test]
    async fn test_observations_are_deduplicated_newest_first() {
        let manager = manager().await;

        manager
            .create_entities(vec![
                Entity::new("Alice", "Person").with_observations(["x", "y", "x"])
            ])
            .await
            .unwrap();
        let merged = manager
            .create_entities(vec![
                Entity::new("Alice", "Person").with_observations(["z", "x"])
            ])
            .await
            .unwrap();

        assert_eq!(merged[0].observations, vec!["z", "x", "y"]);
    }

    #[tokio::test]
    async fn test_observation_limit_applies_on_merge() {
        let manager = manager().await;
        let limit = MemorySettings::default().observation_limit;

        let many: Vec<String> = (0..limit + 5).map(|i| format!("obs {i}")).collect();
        let created = manager
            .create_entities(vec![Entity::new("Alice", "Person").with_observations(many)])
            .await
            .unwrap();

        assert_eq!(created[0].observations.len(), limit);
        assert_eq!(created[0].observations[0], "obs 0");
    }

    #[tokio::test]
    async fn test_relation_with_missing_endpoint_is_skipped() {
        let manager = manager().await;
        manager
            .create_entities(vec![Entity::new("Alice", "Person")])
            .await
            .unwrap();

        let created = manager
            .create_relations(vec![Relation::new("Alice", "Nobody", "knows")])
            .await
            .unwrap();

        assert!(created.is_empty());
        assert!(manager.read_graph().await.unwrap().relations.is_empty());
    }

    #[tokio::test]
    async fn test_blank_search_returns_empty_graph() {
        let manager = manager().await;
        seed_alice(&manager).await;

        let graph = manager.search("   ", 2).await.unwrap();
        assert!(graph.is_empty());
    }

    #[tokio::test]
    async fn test_search_alice_with_neighbourhood() {
        let manager = manager().await;
        let (_, _, works_at) = seed_alice(&manager).await;

        let full = manager.read_graph().await.unwrap();
        assert_eq!(full.entities.len(), 2);
        assert_eq!(full.relations.len(), 1);

        let graph = manager.search("alice", 0).await.unwrap();
        assert_eq!(names(&graph.entities), vec!["Alice"]);
        assert!(graph.relations.is_empty());

        let graph = manager.search("alice", 1).await.unwrap();
        assert_eq!(names(&graph.entities), vec!["Alice", "TechCorp"]);
        assert_eq!(graph.relations.len(), 1);
        assert_eq!(graph.relations[0].id, works_at.id);
        assert_eq!(graph.relations[0].relation_type, "works_at");
    }

    #[tokio::test]
    async fn test_depth_is_clamped_to_two() {
        let manager = manager().await;
        manager
            .create_entities(vec![
                Entity::new("A", "Node"),
                Entity::new("B", "Node"),
                Entity::new("C", "Node"),
                Entity::new("D", "Node"),
            ])
            .await
            .unwrap();
        manager
            .create_relations(vec![
                Relation::new("A", "B", "next"),
                Relation::new("B", "C", "next"),
                Relation::new("C", "D", "next"),
            ])
            .await
            .unwrap();
        let seed = manager.find_entity_ids_by_name("A").await.unwrap();

        let clamped = manager.read_graph_from_entities(&seed, 7).await.unwrap();
        let two = manager.read_graph_from_entities(&seed, 2).await.unwrap();

        assert_eq!(names(&clamped.entities), vec!["A", "B", "C"]);
        assert_eq!(names(&clamped.entities), names(&two.entities));
        assert_eq!(clamped.relations.len(), 2);

        let negative = manager.read_graph_from_entities(&seed, -3).await.unwrap();
        assert_eq!(names(&negative.entities), vec!["A"]);
    }

    #[tokio::test]
    async fn test_delete_entity_removes_its_relations() {
        let manager = manager().await;
        let (alice, _, works_at) = seed_alice(&manager).await;
        let alice_id = alice.id.unwrap();

        assert!(manager.delete_entity(&alice_id).await.unwrap());
        assert!(!manager.delete_entity(&alice_id).await.unwrap());

        let relation_id = works_at.id.unwrap();
        assert!(manager.get_relation(&relation_id).await.unwrap().is_none());
        assert_eq!(names(&manager.read_graph().await.unwrap().entities), vec!["TechCorp"]);
    }

    #[tokio::test]
    async fn test_update_entity_merges_metadata() {
        let manager = manager().await;
        let (alice, _, _) = seed_alice(&manager).await;
        let alice_id = alice.id.unwrap();

        let updates = json!({"metadata": {"team": "core"}, "colour": "blue"});
        let outcome = manager
            .update_entity(&alice_id, updates.as_object().unwrap())
            .await
            .unwrap();
        assert!(outcome.is_updated());

        let alice = manager.get_entity(&alice_id).await.unwrap().unwrap();
        assert_eq!(alice.metadata["team"], "core");
        assert_eq!(alice.observations.len(), 1);

        let missing = manager
            .update_entity("01NOTANID", updates.as_object().unwrap())
            .await
            .unwrap();
        assert_eq!(missing, UpdateOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_update_relation_moves_endpoint() {
        let manager = manager().await;
        let (_, _, works_at) = seed_alice(&manager).await;
        manager
            .create_entities(vec![Entity::new("OtherCorp", "Company")])
            .await
            .unwrap();
        let relation_id = works_at.id.unwrap();

        let updates = json!({"target": "OtherCorp"});
        let outcome = manager
            .update_relation(&relation_id, updates.as_object().unwrap())
            .await
            .unwrap();
        assert!(outcome.is_updated());

        let moved = manager.get_relation(&relation_id).await.unwrap().unwrap();
        assert_eq!(moved.target, "OtherCorp");
        assert_eq!(moved.relation_type, "works_at");

        let bad = json!({"target": "Nobody"});
        assert!(manager
            .update_relation(&relation_id, bad.as_object().unwrap())
            .await
            .is_err());
        let unchanged = manager.get_relation(&relation_id).await.unwrap().unwrap();
        assert_eq!(unchanged.target, "OtherCorp");
    }

    #[tokio::test]
    async fn test_find_ids_by_attributes() {
        let manager = manager().await;
        let (alice, _, works_at) = seed_alice(&manager).await;

        let by_type = json!({"type": "Person"});
        let ids = manager
            .find_entity_ids_by_attributes(by_type.as_object().unwrap())
            .await
            .unwrap();
        assert_eq!(ids, vec![alice.id.unwrap()]);

        let by_relation = json!({"relationType": "works_at", "source": "Alice"});
        let ids = manager
            .find_relation_ids_by_attributes(by_relation.as_object().unwrap())
            .await
            .unwrap();
        assert_eq!(ids, vec![works_at.id.unwrap()]);
    }

    #[tokio::test]
    async fn test_vector_search_falls_back_without_index() {
        let backend = connect().await;
        cleanup(&backend).await;
        let settings = MemorySettings {
            vector_index: "memograph_missing_index".to_string(),
            ..MemorySettings::default()
        };
        let embedder = Arc::new(HashingEmbedder::new(64)) as Arc<dyn Embedder>;
        let ctx = Context::new(Arc::new(backend), Some(embedder), settings);
        let manager = KnowledgeGraphManager::from_ref(&ctx);
        seed_alice(&manager).await;

        assert_eq!(manager.status().await.search_mode, SearchMode::Vector);

        let graph = manager.search("Alice", 0).await.unwrap();
        assert_eq!(names(&graph.entities), vec!["Alice"]);
    }
}
