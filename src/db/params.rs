//! Parameter binding utilities.
//!
//! This module provides functions to bind [`ScriptValue`]s to
//! database-specific query objects, one positional slot per compiled
//! placeholder occurrence.

use crate::models::ScriptValue;
use sqlx::mysql::MySqlArguments;
use sqlx::postgres::PgArguments;
use sqlx::sqlite::SqliteArguments;
use sqlx::types::Json;
use sqlx::{MySql, Postgres, Sqlite};

/// Bind a value to a MySQL query.
pub(crate) fn bind_mysql_value<'q>(
    query: sqlx::query::Query<'q, MySql, MySqlArguments>,
    value: &'q ScriptValue,
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    match value {
        ScriptValue::Null => query.bind(None::<String>),
        ScriptValue::Bool(v) => query.bind(*v),
        ScriptValue::Int(v) => query.bind(*v),
        ScriptValue::Float(v) => query.bind(*v),
        ScriptValue::Text(v) => query.bind(v.as_str()),
        ScriptValue::Json(v) => query.bind(Json(v)),
    }
}

/// Bind a value to a PostgreSQL query.
pub(crate) fn bind_postgres_value<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    value: &'q ScriptValue,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match value {
        ScriptValue::Null => query.bind(None::<String>),
        ScriptValue::Bool(v) => query.bind(*v),
        ScriptValue::Int(v) => query.bind(*v),
        ScriptValue::Float(v) => query.bind(*v),
        ScriptValue::Text(v) => query.bind(v.as_str()),
        ScriptValue::Json(v) => query.bind(Json(v)),
    }
}

/// Bind a value to a SQLite query.
pub(crate) fn bind_sqlite_value<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &'q ScriptValue,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        ScriptValue::Null => query.bind(None::<String>),
        ScriptValue::Bool(v) => query.bind(*v),
        ScriptValue::Int(v) => query.bind(*v),
        ScriptValue::Float(v) => query.bind(*v),
        ScriptValue::Text(v) => query.bind(v.as_str()),
        // SQLite doesn't have a native JSON type, store as string
        ScriptValue::Json(v) => query.bind(v.to_string()),
    }
}
