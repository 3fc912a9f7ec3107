//! The backend capability interface.
//!
//! Every graph store plugged into memograph implements [`GraphBackend`].
//! The knowledge graph code depends only on this trait, never on a concrete
//! driver.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::graph::row::{Params, RowStream};
use crate::graph::schema::GraphSchema;

/// Declarative query languages a backend may be asked to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueryLanguage {
    #[default]
    OpenCypher,
    Gremlin,
    Sparql,
}

impl fmt::Display for QueryLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryLanguage::OpenCypher => write!(f, "openCypher"),
            QueryLanguage::Gremlin => write!(f, "Gremlin"),
            QueryLanguage::Sparql => write!(f, "SPARQL"),
        }
    }
}

/// Result of a liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendStatus {
    Available,
    Unavailable,
}

/// A graph store that executes declarative queries.
///
/// Implementations execute exactly one statement per [`execute`](Self::execute)
/// call and must reject languages they do not implement with
/// [`AppError::UnsupportedLanguage`] before touching the network.
#[async_trait]
pub trait GraphBackend: Send + Sync {
    /// Short backend name used in logs and error messages.
    fn name(&self) -> &str;

    /// Runs a trivial liveness query.
    async fn status(&self) -> BackendStatus;

    /// Best-effort listing of labels, relationship types and their property keys.
    async fn schema(&self) -> Result<GraphSchema, AppError>;

    /// Executes a single statement and streams its result rows.
    async fn execute(
        &self,
        text: &str,
        language: QueryLanguage,
        params: Params,
    ) -> Result<RowStream<'_>, AppError>;

    /// Nearest-neighbour clause over a vector index.
    ///
    /// The clause receives `$index`, `$top_k` and `$embedding` and binds the
    /// matched node to `entity` and its similarity to `score`; callers append
    /// their own `RETURN`. `None` means the backend has no vector search.
    fn vector_search_statement(&self) -> Option<String> {
        None
    }

    /// DDL creating a vector index over `label.property`, if supported.
    fn vector_index_statement(
        &self,
        _index: &str,
        _label: &str,
        _property: &str,
        _dimensions: usize,
    ) -> Option<String> {
        None
    }
}

/// Fails fast unless `language` is openCypher.
pub(crate) fn require_opencypher(backend: &str, language: QueryLanguage) -> Result<(), AppError> {
    match language {
        QueryLanguage::OpenCypher => Ok(()),
        other => Err(AppError::UnsupportedLanguage {
            backend: backend.to_string(),
            language: other,
        }),
    }
}
