//! Single-query execution with guaranteed connection cleanup
//!
//! The executor owns the resource-lifecycle contract: validate bind
//! arity before touching the pool, lease a connection for exactly the
//! duration of one query, and hand it back on every exit path. Release
//! is structural (the guard drops when the call leaves scope), so no
//! failure mode can leak a connection.

use crate::db::pool::{ConnectionPool, PoolError};
use crate::error::{GatewayError, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio_postgres::Row;
use tokio_postgres::types::{ToSql, Type};
use tracing::{debug, instrument};

static NULL_TEXT: Option<String> = None;

/// A bind parameter for a parameterized query
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl BindValue {
    fn as_sql(&self) -> &(dyn ToSql + Sync) {
        match self {
            BindValue::Text(v) => v,
            BindValue::Int(v) => v,
            BindValue::Float(v) => v,
            BindValue::Bool(v) => v,
            BindValue::Null => &NULL_TEXT,
        }
    }
}

impl From<&str> for BindValue {
    fn from(v: &str) -> Self {
        BindValue::Text(v.to_string())
    }
}

impl From<String> for BindValue {
    fn from(v: String) -> Self {
        BindValue::Text(v)
    }
}

impl From<i64> for BindValue {
    fn from(v: i64) -> Self {
        BindValue::Int(v)
    }
}

impl From<bool> for BindValue {
    fn from(v: bool) -> Self {
        BindValue::Bool(v)
    }
}

/// Result of a successful query
///
/// Rows are ordered as returned by the server, each as a JSON object
/// keyed by column name. Transient; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub rows: Vec<Map<String, Value>>,
    pub row_count: usize,
    pub executed_at: DateTime<Utc>,
}

impl QueryResult {
    pub fn first_row(&self) -> Option<&Map<String, Value>> {
        self.rows.first()
    }
}

/// Executes parameterized queries against the pool
pub struct QueryExecutor {
    pool: ConnectionPool,
    placeholder_re: Regex,
}

impl QueryExecutor {
    pub fn new(pool: ConnectionPool) -> Self {
        Self {
            pool,
            placeholder_re: Regex::new(r"\$(\d+)").unwrap(),
        }
    }

    /// The pool backing this executor
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Highest `$n` placeholder referenced by the statement
    fn placeholder_count(&self, sql: &str) -> usize {
        self.placeholder_re
            .captures_iter(sql)
            .filter_map(|caps| caps[1].parse::<usize>().ok())
            .max()
            .unwrap_or(0)
    }

    /// Run one parameterized query and normalize the result
    ///
    /// Bind arity is checked before the pool is touched; a mismatch
    /// fails with `QueryMalformed` without acquiring a connection. The
    /// leased connection is returned to the pool on success, on query
    /// failure, and on cancellation alike.
    #[instrument(skip(self, sql, params), fields(bind_count = params.len()))]
    pub async fn execute(&self, sql: &str, params: &[BindValue]) -> Result<QueryResult> {
        let expected = self.placeholder_count(sql);
        if expected != params.len() {
            return Err(GatewayError::QueryMalformed {
                expected,
                provided: params.len(),
            });
        }

        let conn = self.pool.acquire().await.map_err(|e| match e {
            PoolError::Timeout => GatewayError::PoolExhausted {
                waited_secs: self.pool.config().connection_timeout_secs,
            },
            other => GatewayError::ConnectFailed(other.to_string()),
        })?;

        let bound: Vec<&(dyn ToSql + Sync)> = params.iter().map(BindValue::as_sql).collect();

        let rows = conn
            .query(sql, &bound)
            .await
            .map_err(|e| GatewayError::QueryFailed {
                cause: e.to_string(),
                at: Utc::now(),
            })?;
        // `conn` drops from here on out, returning its slot to the pool
        // regardless of which branch was taken above.

        let rows: Vec<Map<String, Value>> = rows.iter().map(row_to_json).collect();
        debug!("Query returned {} rows", rows.len());

        Ok(QueryResult {
            row_count: rows.len(),
            rows,
            executed_at: Utc::now(),
        })
    }
}

/// Convert one row into a JSON object keyed by column name
fn row_to_json(row: &Row) -> Map<String, Value> {
    let mut object = Map::new();
    for (idx, column) in row.columns().iter().enumerate() {
        object.insert(column.name().to_string(), cell_to_json(row, idx, column.type_()));
    }
    object
}

/// Convert one cell by its PostgreSQL column type
///
/// Unmapped types fall back to their text representation; cells that
/// cannot be decoded at all serialize as null.
fn cell_to_json(row: &Row, idx: usize, ty: &Type) -> Value {
    match ty {
        t if *t == Type::BOOL => row
            .try_get::<_, Option<bool>>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, Value::Bool),
        t if *t == Type::INT2 => row
            .try_get::<_, Option<i16>>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, Value::from),
        t if *t == Type::INT4 => row
            .try_get::<_, Option<i32>>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, Value::from),
        t if *t == Type::INT8 => row
            .try_get::<_, Option<i64>>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, Value::from),
        t if *t == Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, |v| Value::from(f64::from(v))),
        t if *t == Type::FLOAT8 => row
            .try_get::<_, Option<f64>>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, Value::from),
        t if *t == Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, |v| Value::String(v.to_rfc3339())),
        t if *t == Type::TIMESTAMP => row
            .try_get::<_, Option<chrono::NaiveDateTime>>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, |v| Value::String(v.to_string())),
        t if *t == Type::JSON || *t == Type::JSONB => row
            .try_get::<_, Option<Value>>(idx)
            .ok()
            .flatten()
            .unwrap_or(Value::Null),
        _ => row
            .try_get::<_, Option<String>>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, Value::String),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::db::manager::PgConnectionConfig;

    fn unreachable_executor() -> QueryExecutor {
        let connection_config = PgConnectionConfig::new(
            "127.0.0.1".to_string(),
            1,
            "app".to_string(),
            "postgres".to_string(),
            String::new(),
        )
        .with_connect_timeout(1);

        let pool_config = PoolConfig {
            max_size: 2,
            min_idle: 0,
            connection_timeout_secs: 1,
            idle_timeout_secs: 60,
            max_lifetime_secs: 300,
        };

        QueryExecutor::new(ConnectionPool::new(connection_config, pool_config).unwrap())
    }

    // Pool construction spawns bb8 maintenance tasks, so even the
    // validation-only tests need a runtime.
    #[tokio::test]
    async fn test_placeholder_count() {
        let executor = unreachable_executor();

        assert_eq!(executor.placeholder_count("SELECT 1"), 0);
        assert_eq!(
            executor.placeholder_count("SELECT NOW() as current_time, $1 as tenant"),
            1
        );
        assert_eq!(
            executor.placeholder_count("SELECT $1, $2 WHERE x = $2"),
            2
        );
        assert_eq!(executor.placeholder_count("SELECT $3"), 3);
    }

    #[test]
    fn test_bind_value_conversions() {
        assert_eq!(BindValue::from("acme"), BindValue::Text("acme".to_string()));
        assert_eq!(BindValue::from(42i64), BindValue::Int(42));
        assert_eq!(BindValue::from(true), BindValue::Bool(true));
    }

    #[tokio::test]
    async fn test_arity_mismatch_fails_without_acquiring() {
        let executor = unreachable_executor();

        let started = std::time::Instant::now();
        let result = executor
            .execute("SELECT NOW() as current_time, $1 as tenant", &[])
            .await;

        assert!(matches!(
            result,
            Err(GatewayError::QueryMalformed {
                expected: 1,
                provided: 0,
            })
        ));
        // Validation failed before the pool was touched; an acquisition
        // attempt against the dead address would have taken ~1s.
        assert!(started.elapsed().as_millis() < 500);
        assert_eq!(executor.pool().stats().active, 0);
    }

    #[tokio::test]
    async fn test_excess_parameters_fail() {
        let executor = unreachable_executor();

        let result = executor
            .execute("SELECT 1 as health_check", &[BindValue::Int(7)])
            .await;

        assert!(matches!(
            result,
            Err(GatewayError::QueryMalformed {
                expected: 0,
                provided: 1,
            })
        ));
    }

    #[tokio::test]
    async fn test_unreachable_database_surfaces_connect_error() {
        let executor = unreachable_executor();

        let result = executor
            .execute(
                "SELECT NOW() as current_time, $1 as tenant",
                &[BindValue::from("acme")],
            )
            .await;

        match result {
            Err(GatewayError::ConnectFailed(cause)) => assert!(!cause.is_empty()),
            Err(GatewayError::PoolExhausted { waited_secs }) => assert_eq!(waited_secs, 1),
            other => panic!("expected a connection-layer error, got {:?}", other),
        }
        assert_eq!(executor.pool().stats().active, 0);
    }
}
