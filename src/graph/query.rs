//! Query builder for fluent statement construction.

use futures::{StreamExt, TryStreamExt};
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::AppError;
use crate::graph::row::{Params, Row, RowStream};
use crate::graph::traits::{GraphBackend, QueryLanguage};

/// A builder for constructing and executing graph queries.
///
/// `Query` provides a fluent API for adding parameters and executing
/// statements against any [`GraphBackend`].
///
/// # Example
///
/// ```ignore
/// let rows = Query::new(&backend, "MATCH (e:Memory) WHERE e.id = $id RETURN e.name AS name")
///     .param("id", "01J...")
///     .fetch_all()
///     .await?;
/// ```
pub struct Query<'a, B: GraphBackend + ?Sized> {
    backend: &'a B,
    text: String,
    language: QueryLanguage,
    params: Params,
    error: Option<AppError>,
}

impl<'a, B: GraphBackend + ?Sized> Query<'a, B> {
    /// Creates a new openCypher query builder.
    pub fn new(backend: &'a B, text: &str) -> Self {
        Self {
            backend,
            text: text.to_string(),
            language: QueryLanguage::OpenCypher,
            params: Params::new(),
            error: None,
        }
    }

    /// Overrides the query language.
    pub fn language(mut self, language: QueryLanguage) -> Self {
        self.language = language;
        self
    }

    /// Adds a parameter to the query.
    ///
    /// Parameters are referenced using `$name` syntax. A value that fails to
    /// serialize is reported when the query executes.
    pub fn param<T: Serialize>(mut self, name: &str, value: T) -> Self {
        match serde_json::to_value(value) {
            Ok(json_value) => {
                self.params.insert(name.to_string(), json_value);
            }
            Err(e) => {
                self.error.get_or_insert_with(|| {
                    AppError::Validation(format!("failed to serialize parameter '{}': {}", name, e))
                });
            }
        }
        self
    }

    /// Adds a parameter that's already a JSON value.
    pub fn param_raw(mut self, name: &str, value: JsonValue) -> Self {
        self.params.insert(name.to_string(), value);
        self
    }

    /// Executes the query and returns a stream of rows.
    pub async fn execute(self) -> Result<RowStream<'a>, AppError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        self.backend
            .execute(&self.text, self.language, self.params)
            .await
    }

    /// Executes the query and collects all rows into a vector.
    pub async fn fetch_all(self) -> Result<Vec<Row>, AppError> {
        self.execute().await?.try_collect().await
    }

    /// Executes the query and returns the first row, if any.
    pub async fn fetch_one(self) -> Result<Option<Row>, AppError> {
        let mut stream = self.execute().await?;
        stream.next().await.transpose()
    }

    /// Executes the query, draining and discarding its rows.
    pub async fn run(self) -> Result<(), AppError> {
        let mut stream = self.execute().await?;
        while let Some(row) = stream.next().await {
            row?;
        }
        Ok(())
    }
}

/// Extension trait providing a convenient `query()` method.
///
/// Implemented for every [`GraphBackend`], including `dyn GraphBackend`,
/// so repositories can write `self.graph.query("...")`.
pub trait QueryExt: GraphBackend {
    /// Creates a new query builder for this backend.
    fn query(&self, text: &str) -> Query<'_, Self> {
        Query::new(self, text)
    }
}

impl<B: GraphBackend + ?Sized> QueryExt for B {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::schema::GraphSchema;
    use crate::graph::traits::BackendStatus;
    use std::collections::HashMap;

    // Mock backend for testing
    struct MockBackend {
        expected_text: String,
        expected_params: Params,
    }

    #[async_trait::async_trait]
    impl GraphBackend for MockBackend {
        fn name(&self) -> &str {
            "mock"
        }

        async fn status(&self) -> BackendStatus {
            BackendStatus::Available
        }

        async fn schema(&self) -> Result<GraphSchema, AppError> {
            Ok(GraphSchema::default())
        }

        async fn execute(
            &self,
            text: &str,
            language: QueryLanguage,
            params: Params,
        ) -> Result<RowStream<'_>, AppError> {
            crate::graph::traits::require_opencypher("mock", language)?;
            assert_eq!(text, self.expected_text);
            assert_eq!(params, self.expected_params);
            Ok(Box::pin(futures::stream::empty()))
        }
    }

    #[tokio::test]
    async fn test_query_no_params() {
        let backend = MockBackend {
            expected_text: "MATCH (n) RETURN n".to_string(),
            expected_params: HashMap::new(),
        };

        let result = backend.query("MATCH (n) RETURN n").fetch_all().await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_query_with_params() {
        let mut expected_params = HashMap::new();
        expected_params.insert("id".to_string(), serde_json::json!("test-id"));
        expected_params.insert("count".to_string(), serde_json::json!(42));

        let backend = MockBackend {
            expected_text: "MATCH (n) WHERE n.id = $id RETURN n LIMIT $count".to_string(),
            expected_params,
        };

        let result = backend
            .query("MATCH (n) WHERE n.id = $id RETURN n LIMIT $count")
            .param("id", "test-id")
            .param("count", 42)
            .fetch_all()
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_query_run_through_trait_object() {
        let mut expected_params = HashMap::new();
        expected_params.insert("id".to_string(), serde_json::json!("new-id"));

        let backend: Box<dyn GraphBackend> = Box::new(MockBackend {
            expected_text: "CREATE (n:Memory {id: $id})".to_string(),
            expected_params,
        });

        let result = backend
            .query("CREATE (n:Memory {id: $id})")
            .param("id", "new-id")
            .run()
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_query_rejects_other_language() {
        let backend = MockBackend {
            expected_text: "g.V()".to_string(),
            expected_params: HashMap::new(),
        };

        let result = backend
            .query("g.V()")
            .language(QueryLanguage::Gremlin)
            .fetch_all()
            .await;
        assert!(matches!(result, Err(AppError::UnsupportedLanguage { .. })));
    }

    #[tokio::test]
    async fn test_param_serialization_error_surfaces_on_execute() {
        let backend = MockBackend {
            expected_text: "RETURN 1".to_string(),
            expected_params: HashMap::new(),
        };

        // Maps with non-string keys cannot become JSON objects
        let mut bad = HashMap::new();
        bad.insert((1, 2), "x");

        let result = backend.query("RETURN 1").param("bad", bad).run().await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
