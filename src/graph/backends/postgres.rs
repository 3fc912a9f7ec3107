//! PostgreSQL + Apache AGE backend.
//!
//! openCypher statements are wrapped in AGE's `cypher()` set-returning
//! function; parameters travel as a single binary `agtype` map.
//!
//! # Example
//!
//! ```ignore
//! use memograph::graph::backends::postgres::PostgresBackend;
//!
//! let backend = PostgresBackend::connect("postgresql://localhost/memory", "memory_graph").await?;
//! backend.ensure_graph_exists().await?;
//! ```

use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;

use async_stream::try_stream;
use async_trait::async_trait;
use bytes::BytesMut;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use futures::TryStreamExt;
use serde_json::Value as JsonValue;
use tokio_postgres::types::{to_sql_checked, FromSql, IsNull, ToSql, Type};
use tokio_postgres::NoTls;

use crate::error::AppError;
use crate::graph::query::QueryExt;
use crate::graph::return_clause::{extract_return_columns, ParseError};
use crate::graph::row::{Params, Row, RowStream};
use crate::graph::schema::{self, GraphSchema};
use crate::graph::traits::{require_opencypher, BackendStatus, GraphBackend, QueryLanguage};

const BACKEND_NAME: &str = "postgres";

/// Binary `agtype` parameter: version byte `1` followed by JSON text.
///
/// Parameters are never interpolated into the statement text.
#[derive(Debug, Clone)]
struct Agtype(String);

impl ToSql for Agtype {
    fn to_sql(
        &self,
        _ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        out.extend_from_slice(&[1]);
        out.extend_from_slice(self.0.as_bytes());
        Ok(IsNull::No)
    }

    // The agtype OID differs per installation
    fn accepts(ty: &Type) -> bool {
        ty.name() == "agtype"
    }

    to_sql_checked!();
}

/// `agtype` column value decoded to JSON.
#[derive(Debug)]
struct AgtypeValue(JsonValue);

impl<'a> FromSql<'a> for AgtypeValue {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        if raw.is_empty() {
            return Ok(AgtypeValue(JsonValue::Null));
        }

        let json_bytes = if raw[0] == 1 { &raw[1..] } else { raw };
        let text = std::str::from_utf8(json_bytes)?;
        Ok(AgtypeValue(parse_agtype_text(text)?))
    }

    fn accepts(ty: &Type) -> bool {
        ty.name() == "agtype"
    }
}

/// Parses agtype text, unwrapping vertices and edges to their properties.
///
/// AGE appends `::vertex`, `::edge` or `::path` to graph values; a vertex or
/// edge becomes its `properties` map so it decodes like a projected map.
fn parse_agtype_text(text: &str) -> Result<JsonValue, serde_json::Error> {
    let trimmed = text.trim();
    let (body, graph_value) = match trimmed
        .strip_suffix("::vertex")
        .or_else(|| trimmed.strip_suffix("::edge"))
    {
        Some(body) => (body, true),
        None => (trimmed.strip_suffix("::path").unwrap_or(trimmed), false),
    };

    let value: JsonValue = serde_json::from_str(body)?;
    if !graph_value {
        return Ok(value);
    }
    Ok(match value {
        JsonValue::Object(mut map) => map
            .remove("properties")
            .unwrap_or(JsonValue::Object(map)),
        other => other,
    })
}

/// PostgreSQL + Apache AGE graph backend.
///
/// Cheap to clone; the connection pool is `Arc`-based.
#[derive(Clone)]
pub struct PostgresBackend {
    pool: Pool,
    graph_name: Arc<str>,
}

impl PostgresBackend {
    /// Creates a pooled backend for the given AGE graph.
    pub async fn connect(connection_string: &str, graph_name: &str) -> Result<Self, AppError> {
        let pg_config: tokio_postgres::Config = connection_string.parse().map_err(|e| {
            AppError::Internal(format!("Invalid PostgreSQL connection string: {}", e))
        })?;

        let mgr = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        let pool = Pool::builder(mgr)
            .max_size(16)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create connection pool: {}", e)))?;

        tracing::info!(graph = graph_name, "Configured PostgreSQL/AGE pool");
        Ok(Self {
            pool,
            graph_name: Arc::from(graph_name),
        })
    }

    pub fn graph_name(&self) -> &str {
        &self.graph_name
    }

    /// Gets a pooled connection with the AGE session prepared.
    async fn get_connection(&self) -> Result<Object, AppError> {
        let conn = self.pool.get().await.map_err(|e| {
            AppError::Internal(format!("Failed to get connection from pool: {}", e))
        })?;

        conn.batch_execute("LOAD 'age'; SET search_path = ag_catalog, \"$user\", public;")
            .await
            .map_err(|e| AppError::Internal(format!("Failed to initialize AGE session: {}", e)))?;

        Ok(conn)
    }

    /// Creates the AGE graph if it does not exist yet.
    pub async fn ensure_graph_exists(&self) -> Result<(), AppError> {
        let conn = self.get_connection().await?;
        let graph_name: &str = &self.graph_name;

        let exists = conn
            .query_opt(
                "SELECT 1 FROM ag_catalog.ag_graph WHERE name = $1",
                &[&graph_name],
            )
            .await
            .map_err(|e| AppError::Internal(format!("Failed to look up graph: {}", pg_detail(&e))))?
            .is_some();

        if !exists {
            conn.execute(
                "SELECT ag_catalog.create_graph($1::text::name)",
                &[&graph_name],
            )
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create graph: {}", pg_detail(&e))))?;
            tracing::info!(graph = %self.graph_name, "Created AGE graph");
        }

        Ok(())
    }

    /// Lists vertex (`v`) or edge (`e`) labels of this graph, minus AGE's defaults.
    async fn labels(&self, kind: &str) -> Result<Vec<String>, AppError> {
        let conn = self.get_connection().await?;
        let graph_name: &str = &self.graph_name;
        let rows = conn
            .query(
                "SELECT l.name::text FROM ag_catalog.ag_label l \
                 JOIN ag_catalog.ag_graph g ON l.graph = g.graphid \
                 WHERE g.name = $1 AND l.kind::text = $2 AND l.name NOT LIKE '\\_ag\\_%' \
                 ORDER BY l.name",
                &[&graph_name, &kind],
            )
            .await
            .map_err(|e| AppError::Internal(format!("Failed to list labels: {}", pg_detail(&e))))?;

        rows.iter()
            .map(|row| {
                row.try_get::<_, String>(0)
                    .map_err(|e| AppError::Decode(format!("Invalid label row: {}", e)))
            })
            .collect()
    }
}

#[async_trait]
impl GraphBackend for PostgresBackend {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    async fn status(&self) -> BackendStatus {
        match self.query("RETURN 1 AS ok").fetch_one().await {
            Ok(Some(_)) => BackendStatus::Available,
            Ok(None) => BackendStatus::Unavailable,
            Err(e) => {
                tracing::warn!(error = %e, "AGE liveness check failed");
                BackendStatus::Unavailable
            }
        }
    }

    async fn schema(&self) -> Result<GraphSchema, AppError> {
        let labels = self.labels("v").await?;
        let relationship_types = self.labels("e").await?;
        Ok(schema::describe(self, &labels, &relationship_types).await)
    }

    async fn execute(
        &self,
        text: &str,
        language: QueryLanguage,
        params: Params,
    ) -> Result<RowStream<'_>, AppError> {
        require_opencypher(BACKEND_NAME, language)?;

        let (sql, agtype_param) = build_age_query(&self.graph_name, text, &params)?;
        let conn = self.get_connection().await?;
        let cypher = text.to_string();

        // The generator owns the connection for the lifetime of the stream
        Ok(Box::pin(try_stream! {
            let stream = match &agtype_param {
                None => conn.query_raw::<_, &Agtype, _>(&sql, std::iter::empty()).await,
                Some(param) => conn.query_raw(&sql, std::iter::once(param)).await,
            };
            let stream = stream.map_err(|e| {
                AppError::query(format!("Cypher query failed: {}", pg_detail(&e)), &cypher)
            })?;

            futures::pin_mut!(stream);
            while let Some(pg_row) = stream
                .try_next()
                .await
                .map_err(|e| AppError::query(format!("Failed to fetch row: {}", pg_detail(&e)), &cypher))?
            {
                yield parse_pg_row(&pg_row)?;
            }
        }))
    }
}

fn pg_detail(e: &tokio_postgres::Error) -> String {
    e.as_db_error()
        .map(|db| format!("{}: {} ({})", db.severity(), db.message(), db.code().code()))
        .unwrap_or_else(|| e.to_string())
}

/// Wraps an openCypher statement in AGE's `cypher()` call.
///
/// The SQL column list mirrors the statement's final `RETURN`; statements
/// without one get a placeholder column and yield no rows.
fn build_age_query(
    graph_name: &str,
    cypher: &str,
    params: &Params,
) -> Result<(String, Option<Agtype>), AppError> {
    let columns_sql = match extract_return_columns(cypher) {
        Ok(columns) => columns
            .iter()
            .map(|name| format!("\"{}\" agtype", name.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(", "),
        Err(ParseError::NoReturnClause) => "result agtype".to_string(),
        Err(e) => return Err(AppError::query(e.to_string(), cypher)),
    };

    if params.is_empty() {
        let sql = format!(
            "SELECT * FROM cypher('{}', $$ {} $$) as ({})",
            graph_name, cypher, columns_sql
        );
        return Ok((sql, None));
    }

    let sql = format!(
        "SELECT * FROM cypher('{}', $$ {} $$, $1) as ({})",
        graph_name, cypher, columns_sql
    );
    let params_json = serde_json::to_string(params)
        .map_err(|e| AppError::Validation(format!("Failed to serialize parameters: {}", e)))?;
    Ok((sql, Some(Agtype(params_json))))
}

/// Converts a PostgreSQL row into a [`Row`].
///
/// Every column produced by `cypher()` is `agtype`; other types only show up
/// in hand-written SQL and are read as text.
fn parse_pg_row(pg_row: &tokio_postgres::Row) -> Result<Row, AppError> {
    let mut data = HashMap::new();

    for (idx, column) in pg_row.columns().iter().enumerate() {
        let value = if column.type_().name() == "agtype" {
            pg_row
                .try_get::<_, Option<AgtypeValue>>(idx)
                .map_err(|e| {
                    AppError::Decode(format!("Invalid agtype in '{}': {}", column.name(), e))
                })?
                .map(|v| v.0)
                .unwrap_or(JsonValue::Null)
        } else {
            pg_row
                .try_get::<_, Option<String>>(idx)
                .ok()
                .flatten()
                .map(JsonValue::String)
                .unwrap_or(JsonValue::Null)
        };
        data.insert(column.name().to_string(), value);
    }

    Ok(Row::new(data))
}
