//! Application error types with MCP protocol conversion.

use rmcp::model::ErrorCode;
use thiserror::Error;

use crate::graph::QueryLanguage;

/// Application-level errors for memograph.
///
/// Missing entities and relations are not errors: lookups return `Option`,
/// deletes return `bool` and updates return an [`UpdateOutcome`](crate::models::UpdateOutcome).
#[derive(Error, Debug)]
pub enum AppError {
    // Backend errors
    #[error("Neo4j connection error: {0}")]
    Connection(#[from] neo4rs::Error),

    #[error("Query error: {message}")]
    Query { message: String, query: String },

    #[error("Malformed result payload: {0}")]
    Decode(String),

    #[error("Backend '{backend}' does not support {language} queries")]
    UnsupportedLanguage {
        backend: String,
        language: QueryLanguage,
    },

    // Input errors
    #[error("Unsupported attribute '{attribute}': {reason}")]
    UnsupportedAttribute { attribute: String, reason: String },

    #[error("Validation error: {0}")]
    Validation(String),

    // Embedding errors
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shorthand for a query failure carrying the offending statement.
    pub fn query(message: impl Into<String>, query: &str) -> Self {
        AppError::Query {
            message: message.into(),
            query: query.to_string(),
        }
    }
}

impl From<AppError> for rmcp::model::ErrorData {
    fn from(err: AppError) -> Self {
        let (code, app_code) = match &err {
            AppError::UnsupportedLanguage { .. } => {
                (ErrorCode::INVALID_PARAMS, "UNSUPPORTED_LANGUAGE")
            }
            AppError::UnsupportedAttribute { .. } => {
                (ErrorCode::INVALID_PARAMS, "UNSUPPORTED_ATTRIBUTE")
            }
            AppError::Validation(_) => (ErrorCode::INVALID_PARAMS, "VALIDATION_ERROR"),
            AppError::Config(_) => (ErrorCode::INTERNAL_ERROR, "CONFIG_ERROR"),
            AppError::Connection(_) => (ErrorCode::INTERNAL_ERROR, "CONNECTION_ERROR"),
            AppError::Query { .. } => (ErrorCode::INTERNAL_ERROR, "QUERY_ERROR"),
            AppError::Decode(_) => (ErrorCode::INTERNAL_ERROR, "DECODE_ERROR"),
            AppError::Embedding(_) => (ErrorCode::INTERNAL_ERROR, "EMBEDDING_ERROR"),
            AppError::Internal(_) => (ErrorCode::INTERNAL_ERROR, "INTERNAL_ERROR"),
        };

        rmcp::model::ErrorData::new(code, format!("[{}] {}", app_code, err), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_attribute_maps_to_invalid_params() {
        let err = AppError::UnsupportedAttribute {
            attribute: "observations".into(),
            reason: "observation search is not supported".into(),
        };
        let data: rmcp::model::ErrorData = err.into();
        assert_eq!(data.code, ErrorCode::INVALID_PARAMS);
        assert!(data.message.starts_with("[UNSUPPORTED_ATTRIBUTE]"));
    }

    #[test]
    fn test_query_error_keeps_statement() {
        let err = AppError::query("boom", "MATCH (n) RETURN n");
        match err {
            AppError::Query { message, query } => {
                assert_eq!(message, "boom");
                assert_eq!(query, "MATCH (n) RETURN n");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
