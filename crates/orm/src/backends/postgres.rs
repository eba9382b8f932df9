//! PostgreSQL Backend Implementation
//!
//! Renders statements as PostgreSQL and runs them through a sqlx pool.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

use super::core::{Row, SqlDialect, StatementExecutor};
use crate::error::{OrmError, OrmResult};
use crate::statement::SelectStatement;
use crate::value::DatabaseValue;

/// Connection pool settings
#[derive(Debug, Clone)]
pub struct PostgresPoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
}

impl Default for PostgresPoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            min_connections: 0,
            acquire_timeout_seconds: 30,
        }
    }
}

/// Statement executor backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PostgresExecutor {
    pool: Arc<Pool<Postgres>>,
}

impl PostgresExecutor {
    pub fn new(pool: Arc<Pool<Postgres>>) -> Self {
        Self { pool }
    }

    /// Connect a new pool
    pub async fn connect(database_url: &str, config: PostgresPoolConfig) -> OrmResult<Self> {
        validate_database_url(database_url)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .connect(database_url)
            .await
            .map_err(|e| OrmError::Database(format!("Failed to create PostgreSQL pool: {}", e)))?;

        tracing::info!(max_connections = config.max_connections, "PostgreSQL pool ready");
        Ok(Self::new(Arc::new(pool)))
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl StatementExecutor for PostgresExecutor {
    async fn fetch_all(&self, statement: &SelectStatement) -> OrmResult<Vec<Row>> {
        let (sql, params) = statement.to_sql(&SqlDialect::PostgreSQL);
        tracing::debug!(sql = %sql, params = params.len(), "executing statement");

        let mut query = sqlx::query(&sql);
        for param in &params {
            query = bind_database_value(query, param)?;
        }

        let rows = query
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| OrmError::Database(format!("Query fetch failed: {}", e)))?;

        rows.iter().map(convert_row).collect()
    }

    fn dialect(&self) -> SqlDialect {
        SqlDialect::PostgreSQL
    }
}

/// Reject anything that is not a postgres:// URL before dialing
pub fn validate_database_url(url: &str) -> OrmResult<()> {
    let parsed = url::Url::parse(url).map_err(|e| OrmError::Configuration(format!("Invalid database URL: {}", e)))?;

    if parsed.scheme() != "postgresql" && parsed.scheme() != "postgres" {
        return Err(OrmError::Configuration("Invalid PostgreSQL URL scheme".to_string()));
    }
    if parsed.host_str().is_none() {
        return Err(OrmError::Configuration("Missing host in database URL".to_string()));
    }
    if parsed.path().trim_start_matches('/').is_empty() {
        return Err(OrmError::Configuration("Missing database name in URL".to_string()));
    }
    Ok(())
}

/// Bind a DatabaseValue to a sqlx query
fn bind_database_value<'a>(
    query: sqlx::query::Query<'a, Postgres, sqlx::postgres::PgArguments>,
    value: &DatabaseValue,
) -> OrmResult<sqlx::query::Query<'a, Postgres, sqlx::postgres::PgArguments>> {
    Ok(match value {
        DatabaseValue::Null => query.bind(Option::<String>::None),
        DatabaseValue::Bool(b) => query.bind(*b),
        DatabaseValue::Int32(i) => query.bind(*i),
        DatabaseValue::Int64(i) => query.bind(*i),
        DatabaseValue::Float64(f) => query.bind(*f),
        DatabaseValue::String(s) => query.bind(s.clone()),
        DatabaseValue::Bytes(b) => query.bind(b.clone()),
        DatabaseValue::Uuid(u) => query.bind(*u),
        DatabaseValue::DateTime(dt) => query.bind(*dt),
        DatabaseValue::Date(d) => query.bind(*d),
        DatabaseValue::Time(t) => query.bind(*t),
        DatabaseValue::Json(j) => query.bind(j.clone()),
    })
}

fn convert_row(row: &sqlx::postgres::PgRow) -> OrmResult<Row> {
    use sqlx::{Column, Row as _};

    let mut converted = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        converted.insert(column.name(), postgres_value_to_database_value(row, index)?);
    }
    Ok(converted)
}

fn get_optional<'r, T>(row: &'r sqlx::postgres::PgRow, index: usize) -> OrmResult<Option<T>>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    use sqlx::Row as _;

    row.try_get::<Option<T>, _>(index)
        .map_err(|e| OrmError::Serialization(format!("Failed to read column {}: {}", index, e)))
}

/// How a PostgreSQL column type is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Bool,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Numeric,
    Text,
    Bytes,
    Uuid,
    TimestampTz,
    Timestamp,
    Date,
    Time,
    Json,
}

fn column_kind(type_name: &str) -> OrmResult<ColumnKind> {
    Ok(match type_name {
        "BOOL" => ColumnKind::Bool,
        "INT2" => ColumnKind::Int2,
        "INT4" => ColumnKind::Int4,
        "INT8" => ColumnKind::Int8,
        "FLOAT4" => ColumnKind::Float4,
        "FLOAT8" => ColumnKind::Float8,
        "NUMERIC" => ColumnKind::Numeric,
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" | "CITEXT" => ColumnKind::Text,
        "BYTEA" => ColumnKind::Bytes,
        "UUID" => ColumnKind::Uuid,
        "TIMESTAMPTZ" => ColumnKind::TimestampTz,
        "TIMESTAMP" => ColumnKind::Timestamp,
        "DATE" => ColumnKind::Date,
        "TIME" => ColumnKind::Time,
        "JSON" | "JSONB" => ColumnKind::Json,
        other => {
            return Err(OrmError::Serialization(format!(
                "Unsupported PostgreSQL column type '{}'",
                other
            )))
        }
    })
}

/// NUMERIC values are surfaced as floats, the same way the in-memory store holds them
fn numeric_to_f64(value: rust_decimal::Decimal) -> OrmResult<f64> {
    use rust_decimal::prelude::ToPrimitive;

    value
        .to_f64()
        .ok_or_else(|| OrmError::Serialization(format!("NUMERIC value {} does not fit a float", value)))
}

/// Convert a PostgreSQL column value to DatabaseValue
fn postgres_value_to_database_value(row: &sqlx::postgres::PgRow, index: usize) -> OrmResult<DatabaseValue> {
    use sqlx::{Column, Row as _, TypeInfo};

    let column = &row.columns()[index];
    let kind = column_kind(column.type_info().name())
        .map_err(|e| OrmError::Serialization(format!("Column '{}': {}", column.name(), e)))?;

    let value = match kind {
        ColumnKind::Bool => get_optional::<bool>(row, index)?.map(DatabaseValue::Bool),
        ColumnKind::Int2 => get_optional::<i16>(row, index)?.map(|v| DatabaseValue::Int32(v as i32)),
        ColumnKind::Int4 => get_optional::<i32>(row, index)?.map(DatabaseValue::Int32),
        ColumnKind::Int8 => get_optional::<i64>(row, index)?.map(DatabaseValue::Int64),
        ColumnKind::Float4 => get_optional::<f32>(row, index)?.map(|v| DatabaseValue::Float64(v as f64)),
        ColumnKind::Float8 => get_optional::<f64>(row, index)?.map(DatabaseValue::Float64),
        ColumnKind::Numeric => match get_optional::<rust_decimal::Decimal>(row, index)? {
            Some(decimal) => Some(DatabaseValue::Float64(numeric_to_f64(decimal)?)),
            None => None,
        },
        ColumnKind::Text => get_optional::<String>(row, index)?.map(DatabaseValue::String),
        ColumnKind::Bytes => get_optional::<Vec<u8>>(row, index)?.map(DatabaseValue::Bytes),
        ColumnKind::Uuid => get_optional::<uuid::Uuid>(row, index)?.map(DatabaseValue::Uuid),
        ColumnKind::TimestampTz => {
            get_optional::<chrono::DateTime<chrono::Utc>>(row, index)?.map(DatabaseValue::DateTime)
        }
        ColumnKind::Timestamp => get_optional::<chrono::NaiveDateTime>(row, index)?
            .map(|v| DatabaseValue::DateTime(v.and_utc())),
        ColumnKind::Date => get_optional::<chrono::NaiveDate>(row, index)?.map(DatabaseValue::Date),
        ColumnKind::Time => get_optional::<chrono::NaiveTime>(row, index)?.map(DatabaseValue::Time),
        ColumnKind::Json => get_optional::<JsonValue>(row, index)?.map(DatabaseValue::Json),
    };

    Ok(value.unwrap_or(DatabaseValue::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_database_url() {
        assert!(validate_database_url("postgres://user:pw@localhost:5432/university").is_ok());
        assert!(validate_database_url("postgresql://localhost/university").is_ok());
        assert!(validate_database_url("mysql://localhost/university").is_err());
        assert!(validate_database_url("postgres://localhost").is_err());
        assert!(validate_database_url("not a url").is_err());
    }

    #[test]
    fn test_column_kinds() {
        assert_eq!(column_kind("NUMERIC").unwrap(), ColumnKind::Numeric);
        assert_eq!(column_kind("FLOAT8").unwrap(), ColumnKind::Float8);
        assert_eq!(column_kind("BYTEA").unwrap(), ColumnKind::Bytes);
        assert_eq!(column_kind("TIME").unwrap(), ColumnKind::Time);
        assert_eq!(column_kind("VARCHAR").unwrap(), ColumnKind::Text);
    }

    #[test]
    fn test_unsupported_column_type_is_named() {
        match column_kind("INTERVAL") {
            Err(OrmError::Serialization(message)) => assert!(message.contains("INTERVAL")),
            other => panic!("expected a serialization error, got {:?}", other),
        }
    }

    #[test]
    fn test_numeric_becomes_float() {
        let budget = rust_decimal::Decimal::new(125050, 2);
        assert_eq!(numeric_to_f64(budget).unwrap(), 1250.5);
    }
}
