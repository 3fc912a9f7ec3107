//! Application context providing dependency injection root.

use std::sync::Arc;

use crate::config::{BackendConfig, Config, MemorySettings};
use crate::di::Context as ContextDerive;
use crate::embedding::{build_embedder, Embedder};
use crate::error::AppError;
use crate::graph::backends::{Neo4jBackend, PostgresBackend};
use crate::graph::GraphBackend;

/// Shared handle to the configured graph store.
pub type AppGraph = Arc<dyn GraphBackend>;

/// Embedding function; `None` disables vector search.
pub type AppEmbedder = Option<Arc<dyn Embedder>>;

pub type AppSettings = Arc<MemorySettings>;

/// Root application context for dependency injection.
///
/// Every field is extractable through `FromRef`, so repositories and
/// services declare what they need and are built with `from_ref(&ctx)`.
#[derive(ContextDerive, Clone)]
pub struct Context {
    pub graph: AppGraph,
    pub embedder: AppEmbedder,
    pub settings: AppSettings,
}

impl Context {
    pub fn new(graph: AppGraph, embedder: AppEmbedder, settings: MemorySettings) -> Self {
        Self {
            graph,
            embedder,
            settings: Arc::new(settings),
        }
    }

    /// Connects to the configured backend and builds the embedder.
    pub async fn connect(config: &Config) -> Result<Self, AppError> {
        tracing::info!(backend = %config.backend.describe(), "Connecting to graph backend");

        let graph: AppGraph = match &config.backend {
            BackendConfig::Neo4j {
                uri,
                user,
                password,
            } => Arc::new(Neo4jBackend::connect(uri, user, password.as_deref().unwrap_or("")).await?),
            BackendConfig::Postgres { uri, graph } => {
                let backend = PostgresBackend::connect(uri, graph).await?;
                backend.ensure_graph_exists().await?;
                Arc::new(backend)
            }
        };

        let embedder = build_embedder(&config.embedding);

        Ok(Self::new(graph, embedder, config.memory.clone()))
    }
}
