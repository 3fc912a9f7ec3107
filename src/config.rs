//! Configuration with layered resolution using figment.
//!
//! Resolution order (highest priority last):
//! 1. User config: `~/.config/memograph/config.toml` (XDG) or platform config dir
//! 2. Project config: `.memograph.toml`
//! 3. Environment variables: `MEMOGRAPH_*`, nested keys split on `__`
//!    (e.g. `MEMOGRAPH_MEMORY__OBSERVATION_LIMIT=20`)
//!
//! # Example
//!
//! ```toml
//! [backend]
//! kind = "neo4j"
//! uri = "bolt://localhost:7687"
//! user = "neo4j"
//! password = "secret"
//!
//! [embedding]
//! provider = "fastembed"
//! model = "BAAI/bge-small-en-v1.5"
//! dimensions = 384
//!
//! [memory]
//! observation_limit = 15
//! search_top_k = 5
//! ```
//!
//! A PostgreSQL + Apache AGE backend is selected with `kind = "postgres"`,
//! a connection `uri` and the AGE `graph` name.

use std::ops::Deref;
use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

/// Boxed wrapper for figment::Error to reduce Result size on the stack.
#[derive(Debug)]
pub struct ConfigError(Box<figment::Error>);

impl Deref for ConfigError {
    type Target = figment::Error;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self(Box::new(err))
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub memory: MemorySettings,
}

/// Graph store connection, tagged by `kind`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    Neo4j {
        uri: String,
        #[serde(default = "default_neo4j_user")]
        user: String,
        #[serde(default)]
        password: Option<String>,
    },
    /// PostgreSQL with the Apache AGE extension.
    Postgres {
        uri: String,
        #[serde(default = "default_graph_name")]
        graph: String,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Neo4j {
            uri: "bolt://localhost:7687".to_string(),
            user: default_neo4j_user(),
            password: None,
        }
    }
}

impl BackendConfig {
    /// Connection target for logging, without credentials.
    pub fn describe(&self) -> String {
        match self {
            BackendConfig::Neo4j { uri, user, .. } => format!("neo4j {} as {}", uri, user),
            BackendConfig::Postgres { graph, .. } => format!("postgres graph '{}'", graph),
        }
    }
}

fn default_neo4j_user() -> String {
    "neo4j".to_string()
}

fn default_graph_name() -> String {
    "memograph".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Vector search disabled.
    #[default]
    None,
    /// Offline feature hashing.
    Hashing,
    /// Local model, requires the `fastembed` feature.
    Fastembed,
}

/// Embedding provider configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProvider,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            model: default_model(),
            dimensions: default_dimensions(),
        }
    }
}

fn default_model() -> String {
    "BAAI/bge-small-en-v1.5".to_string()
}

fn default_dimensions() -> usize {
    384
}

/// Tunables for the knowledge graph manager.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MemorySettings {
    /// Maximum observations kept per entity, newest first.
    #[serde(default = "default_observation_limit")]
    pub observation_limit: usize,
    /// Number of nearest neighbours returned by vector search.
    #[serde(default = "default_search_top_k")]
    pub search_top_k: usize,
    /// Name of the vector index over entity embeddings.
    #[serde(default = "default_vector_index")]
    pub vector_index: String,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            observation_limit: default_observation_limit(),
            search_top_k: default_search_top_k(),
            vector_index: default_vector_index(),
        }
    }
}

fn default_observation_limit() -> usize {
    15
}

fn default_search_top_k() -> usize {
    5
}

fn default_vector_index() -> String {
    "memory_embedding".to_string()
}

impl Config {
    /// Load config with layered resolution (user → project → env).
    pub fn load() -> Result<Self, ConfigError> {
        Self::figment(Self::user_config_path()).extract().map_err(ConfigError::from)
    }

    fn figment(user_config: PathBuf) -> Figment {
        Figment::new()
            .merge(Toml::file(user_config))
            .merge(Toml::file(".memograph.toml"))
            .merge(Env::prefixed("MEMOGRAPH_").split("__"))
    }

    /// User config path: ~/.config/memograph/config.toml (XDG) or platform config dir.
    fn user_config_path() -> PathBuf {
        if let Some(home) = dirs::home_dir() {
            let xdg_path = home.join(".config").join("memograph").join("config.toml");
            if xdg_path.exists() {
                return xdg_path;
            }
        }
        dirs::config_dir()
            .map(|p| p.join("memograph").join("config.toml"))
            .unwrap_or_default()
    }
}
