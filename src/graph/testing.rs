//! Scripted backend for unit tests.
//!
//! Responses are keyed by a substring of the statement text. One-shot rules
//! are consumed in FIFO order before persistent rules are consulted; a
//! statement matching nothing yields zero rows. Every call is recorded.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::AppError;
use crate::graph::row::{Params, Row, RowStream};
use crate::graph::schema::GraphSchema;
use crate::graph::traits::{require_opencypher, BackendStatus, GraphBackend, QueryLanguage};

#[derive(Clone)]
enum Response {
    Rows(Vec<Row>),
    Fail(String),
}

struct Rule {
    needle: String,
    response: Response,
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub text: String,
    pub params: Params,
}

#[derive(Default)]
pub(crate) struct ScriptedBackend {
    once: Mutex<Vec<Rule>>,
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<RecordedCall>>,
    vector_search: bool,
}

fn rows(values: Vec<JsonValue>) -> Vec<Row> {
    values
        .into_iter()
        .map(|value| match value {
            JsonValue::Object(map) => Row::from(map),
            other => panic!("scripted row must be an object, got {other}"),
        })
        .collect()
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables the vector hooks so vector-mode search is attempted.
    pub fn with_vector_search(mut self) -> Self {
        self.vector_search = true;
        self
    }

    /// Answers every statement containing `needle` with `values`.
    pub fn on(self, needle: &str, values: Vec<JsonValue>) -> Self {
        self.push(&self.rules, needle, Response::Rows(rows(values)));
        self
    }

    /// Answers the next statement containing `needle` with `values`.
    pub fn once(self, needle: &str, values: Vec<JsonValue>) -> Self {
        self.push(&self.once, needle, Response::Rows(rows(values)));
        self
    }

    /// Fails every statement containing `needle`.
    pub fn fail(self, needle: &str, message: &str) -> Self {
        self.push(&self.rules, needle, Response::Fail(message.to_string()));
        self
    }

    /// Fails the next statement containing `needle`.
    pub fn fail_once(self, needle: &str, message: &str) -> Self {
        self.push(&self.once, needle, Response::Fail(message.to_string()));
        self
    }

    fn push(&self, list: &Mutex<Vec<Rule>>, needle: &str, response: Response) {
        list.lock().unwrap().push(Rule {
            needle: needle.to_string(),
            response,
        });
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls whose text contains `needle`.
    pub fn calls_matching(&self, needle: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.text.contains(needle))
            .collect()
    }

    fn respond(&self, text: &str) -> Response {
        let mut once = self.once.lock().unwrap();
        if let Some(pos) = once.iter().position(|r| text.contains(&r.needle)) {
            return once.remove(pos).response;
        }
        drop(once);

        self.rules
            .lock()
            .unwrap()
            .iter()
            .find(|r| text.contains(&r.needle))
            .map(|r| r.response.clone())
            .unwrap_or(Response::Rows(Vec::new()))
    }
}

#[async_trait]
impl GraphBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
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
        require_opencypher("scripted", language)?;

        self.calls.lock().unwrap().push(RecordedCall {
            text: text.to_string(),
            params,
        });

        match self.respond(text) {
            Response::Rows(rows) => Ok(Box::pin(futures::stream::iter(rows.into_iter().map(Ok)))),
            Response::Fail(message) => Err(AppError::query(message, text)),
        }
    }

    fn vector_search_statement(&self) -> Option<String> {
        self.vector_search.then(|| {
            "CALL test.vector($index, $top_k, $embedding) YIELD node AS entity, score".to_string()
        })
    }

    fn vector_index_statement(
        &self,
        index: &str,
        _label: &str,
        _property: &str,
        dimensions: usize,
    ) -> Option<String> {
        self.vector_search
            .then(|| format!("CREATE VECTOR INDEX {} DIMENSIONS {}", index, dimensions))
    }
}
