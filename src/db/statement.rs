//! The named statement engine.
//!
//! Every call translates a `:identifier` template into the driver's
//! positional form, binds values extracted from the caller's arguments in
//! placeholder order, and executes with statement persistence disabled —
//! no prepared statement is cached or reused between calls, and the driver
//! closes it on every exit path. The compiled form lives for exactly one
//! call.

use crate::config::DriverKind;
use crate::db::params::{bind_mysql_value, bind_postgres_value, bind_sqlite_value};
use crate::db::pool::DbPool;
use crate::db::types::RowToJson;
use crate::error::{Error, Result};
use crate::models::{CallOptions, ExecSummary, ScriptValue};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// How the driver spells positional placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PlaceholderStyle {
    /// `?` (MySQL, SQLite)
    Question,
    /// `$1`..`$n` (PostgreSQL)
    Dollar,
}

impl PlaceholderStyle {
    pub(crate) fn for_driver(driver: DriverKind) -> Self {
        match driver {
            DriverKind::Postgres => Self::Dollar,
            DriverKind::MySql | DriverKind::Sqlite => Self::Question,
        }
    }
}

/// Positional form of one template, valid for a single call.
///
/// `names` lists the placeholder identifiers in occurrence order; repeated
/// names appear once per occurrence, each owning one positional slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CompiledStatement {
    pub sql: String,
    pub names: Vec<String>,
}

/// Scan `template` for `:identifier` placeholders and emit the positional
/// statement text.
///
/// Identifiers are alphanumeric/underscore runs. A doubled colon (`::type`
/// cast) and anything inside a single-quoted literal pass through verbatim.
pub(crate) fn compile(template: &str, style: PlaceholderStyle) -> CompiledStatement {
    let mut sql = String::with_capacity(template.len());
    let mut names = Vec::new();
    let mut chars = template.chars().peekable();
    let mut in_literal = false;

    while let Some(c) = chars.next() {
        if c == '\'' {
            // An escaped '' inside a literal toggles twice, which nets out
            in_literal = !in_literal;
            sql.push(c);
            continue;
        }
        if in_literal || c != ':' {
            sql.push(c);
            continue;
        }

        match chars.peek() {
            Some(':') => {
                sql.push_str("::");
                chars.next();
            }
            Some(&d) if d == '_' || d.is_ascii_alphanumeric() => {
                let mut name = String::new();
                while let Some(&d) = chars.peek() {
                    if d == '_' || d.is_ascii_alphanumeric() {
                        name.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                names.push(name);
                match style {
                    PlaceholderStyle::Question => sql.push('?'),
                    PlaceholderStyle::Dollar => {
                        sql.push('$');
                        sql.push_str(&names.len().to_string());
                    }
                }
            }
            _ => sql.push(':'),
        }
    }

    CompiledStatement { sql, names }
}

/// Serialize the caller's argument source into a named-value map.
pub(crate) fn argument_map(args: &impl Serialize) -> Result<serde_json::Map<String, JsonValue>> {
    let value = serde_json::to_value(args).map_err(|e| Error::InvalidArguments {
        message: e.to_string(),
    })?;
    match value {
        JsonValue::Object(map) => Ok(map),
        other => Err(Error::InvalidArguments {
            message: format!("expected a struct or map, got {}", json_kind(&other)),
        }),
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "a map",
    }
}

/// Extract one bind value per placeholder, in occurrence order.
///
/// Fails with [`Error::Bind`] on the first identifier the argument map does
/// not cover; nothing reaches the connection in that case.
pub(crate) fn bind_values(
    names: &[String],
    args: &serde_json::Map<String, JsonValue>,
) -> Result<Vec<ScriptValue>> {
    names
        .iter()
        .map(|name| {
            args.get(name)
                .cloned()
                .map(ScriptValue::from)
                .ok_or_else(|| Error::bind(name.clone()))
        })
        .collect()
}

/// Run `fut` under the call's optional deadline.
async fn with_deadline<F, T>(script: &str, deadline: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match deadline {
        None => fut.await,
        Some(limit) => match timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                script: script.to_string(),
                elapsed_secs: limit.as_secs(),
            }),
        },
    }
}

/// Execute expecting exactly one row; zero rows surfaces the driver's
/// no-rows error unmodified.
pub(crate) async fn fetch_one(
    pool: &DbPool,
    script: &str,
    stmt: &CompiledStatement,
    values: &[ScriptValue],
    call: &CallOptions,
) -> Result<serde_json::Map<String, JsonValue>> {
    debug!(script, sql = %stmt.sql, params = values.len(), "Executing query (one row)");

    with_deadline(script, call.timeout, async {
        let row = match pool {
            DbPool::MySql(p) => mysql::fetch_one(p, &stmt.sql, values).await?.to_json_map(),
            DbPool::Postgres(p) => postgres::fetch_one(p, &stmt.sql, values).await?.to_json_map(),
            DbPool::SQLite(p) => sqlite::fetch_one(p, &stmt.sql, values).await?.to_json_map(),
        };
        Ok(row)
    })
    .await
}

/// Execute expecting zero or more rows.
pub(crate) async fn fetch_all(
    pool: &DbPool,
    script: &str,
    stmt: &CompiledStatement,
    values: &[ScriptValue],
    call: &CallOptions,
) -> Result<Vec<serde_json::Map<String, JsonValue>>> {
    debug!(script, sql = %stmt.sql, params = values.len(), "Executing query (many rows)");

    with_deadline(script, call.timeout, async {
        let rows = match pool {
            DbPool::MySql(p) => mysql::fetch_all(p, &stmt.sql, values)
                .await?
                .iter()
                .map(RowToJson::to_json_map)
                .collect(),
            DbPool::Postgres(p) => postgres::fetch_all(p, &stmt.sql, values)
                .await?
                .iter()
                .map(RowToJson::to_json_map)
                .collect(),
            DbPool::SQLite(p) => sqlite::fetch_all(p, &stmt.sql, values)
                .await?
                .iter()
                .map(RowToJson::to_json_map)
                .collect(),
        };
        Ok(rows)
    })
    .await
}

/// Execute a data-mutating statement.
pub(crate) async fn execute(
    pool: &DbPool,
    script: &str,
    stmt: &CompiledStatement,
    values: &[ScriptValue],
    call: &CallOptions,
) -> Result<ExecSummary> {
    debug!(script, sql = %stmt.sql, params = values.len(), "Executing statement");

    with_deadline(script, call.timeout, async {
        match pool {
            DbPool::MySql(p) => mysql::execute(p, &stmt.sql, values).await,
            DbPool::Postgres(p) => postgres::execute(p, &stmt.sql, values).await,
            DbPool::SQLite(p) => sqlite::execute(p, &stmt.sql, values).await,
        }
    })
    .await
}

// =============================================================================
// Driver-Specific Implementations
// =============================================================================
//
// Each module below provides the same interface adapted to its driver.
// The code structure is intentionally parallel to make differences obvious.

mod mysql {
    use super::*;
    use sqlx::MySqlPool;
    use sqlx::mysql::{MySqlArguments, MySqlRow};

    fn build<'q>(
        sql: &'q str,
        values: &'q [ScriptValue],
    ) -> sqlx::query::Query<'q, sqlx::MySql, MySqlArguments> {
        let mut query = sqlx::query(sql).persistent(false);
        for value in values {
            query = bind_mysql_value(query, value);
        }
        query
    }

    pub async fn fetch_one(
        pool: &MySqlPool,
        sql: &str,
        values: &[ScriptValue],
    ) -> Result<MySqlRow> {
        Ok(build(sql, values).fetch_one(pool).await?)
    }

    pub async fn fetch_all(
        pool: &MySqlPool,
        sql: &str,
        values: &[ScriptValue],
    ) -> Result<Vec<MySqlRow>> {
        Ok(build(sql, values).fetch_all(pool).await?)
    }

    pub async fn execute(
        pool: &MySqlPool,
        sql: &str,
        values: &[ScriptValue],
    ) -> Result<ExecSummary> {
        let done = build(sql, values).execute(pool).await?;
        Ok(ExecSummary {
            rows_affected: done.rows_affected(),
            last_insert_id: Some(done.last_insert_id() as i64),
        })
    }
}

mod postgres {
    use super::*;
    use sqlx::PgPool;
    use sqlx::postgres::{PgArguments, PgRow};

    fn build<'q>(
        sql: &'q str,
        values: &'q [ScriptValue],
    ) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
        let mut query = sqlx::query(sql).persistent(false);
        for value in values {
            query = bind_postgres_value(query, value);
        }
        query
    }

    pub async fn fetch_one(pool: &PgPool, sql: &str, values: &[ScriptValue]) -> Result<PgRow> {
        Ok(build(sql, values).fetch_one(pool).await?)
    }

    pub async fn fetch_all(
        pool: &PgPool,
        sql: &str,
        values: &[ScriptValue],
    ) -> Result<Vec<PgRow>> {
        Ok(build(sql, values).fetch_all(pool).await?)
    }

    pub async fn execute(
        pool: &PgPool,
        sql: &str,
        values: &[ScriptValue],
    ) -> Result<ExecSummary> {
        let done = build(sql, values).execute(pool).await?;
        // PostgreSQL reports no insert id through this interface
        Ok(ExecSummary {
            rows_affected: done.rows_affected(),
            last_insert_id: None,
        })
    }
}

mod sqlite {
    use super::*;
    use sqlx::SqlitePool;
    use sqlx::sqlite::{SqliteArguments, SqliteRow};

    fn build<'q>(
        sql: &'q str,
        values: &'q [ScriptValue],
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, SqliteArguments<'q>> {
        let mut query = sqlx::query(sql).persistent(false);
        for value in values {
            query = bind_sqlite_value(query, value);
        }
        query
    }

    pub async fn fetch_one(
        pool: &SqlitePool,
        sql: &str,
        values: &[ScriptValue],
    ) -> Result<SqliteRow> {
        Ok(build(sql, values).fetch_one(pool).await?)
    }

    pub async fn fetch_all(
        pool: &SqlitePool,
        sql: &str,
        values: &[ScriptValue],
    ) -> Result<Vec<SqliteRow>> {
        Ok(build(sql, values).fetch_all(pool).await?)
    }

    pub async fn execute(
        pool: &SqlitePool,
        sql: &str,
        values: &[ScriptValue],
    ) -> Result<ExecSummary> {
        let done = build(sql, values).execute(pool).await?;
        Ok(ExecSummary {
            rows_affected: done.rows_affected(),
            last_insert_id: Some(done.last_insert_rowid()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(stmt: &CompiledStatement) -> Vec<&str> {
        stmt.names.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_compile_question_style() {
        let stmt = compile(
            "SELECT * FROM users WHERE name = :name AND age > :age",
            PlaceholderStyle::Question,
        );
        assert_eq!(stmt.sql, "SELECT * FROM users WHERE name = ? AND age > ?");
        assert_eq!(names(&stmt), ["name", "age"]);
    }

    #[test]
    fn test_compile_dollar_style() {
        let stmt = compile(
            "SELECT * FROM users WHERE name = :name AND age > :age",
            PlaceholderStyle::Dollar,
        );
        assert_eq!(stmt.sql, "SELECT * FROM users WHERE name = $1 AND age > $2");
        assert_eq!(names(&stmt), ["name", "age"]);
    }

    #[test]
    fn test_compile_repeated_placeholder_gets_one_slot_each() {
        let stmt = compile(
            "SELECT :x AS a, :y AS b, :x AS c",
            PlaceholderStyle::Dollar,
        );
        assert_eq!(stmt.sql, "SELECT $1 AS a, $2 AS b, $3 AS c");
        assert_eq!(names(&stmt), ["x", "y", "x"]);
    }

    #[test]
    fn test_compile_cast_is_not_a_placeholder() {
        let stmt = compile(
            "SELECT :id::text, created_at::date FROM t",
            PlaceholderStyle::Dollar,
        );
        assert_eq!(stmt.sql, "SELECT $1::text, created_at::date FROM t");
        assert_eq!(names(&stmt), ["id"]);
    }

    #[test]
    fn test_compile_quoted_literal_passes_through() {
        let stmt = compile(
            "SELECT ':nope', '12:30:00', :real FROM t",
            PlaceholderStyle::Question,
        );
        assert_eq!(stmt.sql, "SELECT ':nope', '12:30:00', ? FROM t");
        assert_eq!(names(&stmt), ["real"]);
    }

    #[test]
    fn test_compile_escaped_quote_inside_literal() {
        let stmt = compile(
            "SELECT 'it''s :ok' , :x",
            PlaceholderStyle::Question,
        );
        assert_eq!(stmt.sql, "SELECT 'it''s :ok' , ?");
        assert_eq!(names(&stmt), ["x"]);
    }

    #[test]
    fn test_compile_identifier_charset() {
        let stmt = compile("WHERE a = :user_name2!", PlaceholderStyle::Question);
        assert_eq!(stmt.sql, "WHERE a = ?!");
        assert_eq!(names(&stmt), ["user_name2"]);
    }

    #[test]
    fn test_compile_lone_colon_kept() {
        let stmt = compile("SELECT a : b, c :: d", PlaceholderStyle::Question);
        assert_eq!(stmt.sql, "SELECT a : b, c :: d");
        assert!(stmt.names.is_empty());
    }

    #[test]
    fn test_compile_no_placeholders() {
        let stmt = compile("SELECT 1", PlaceholderStyle::Dollar);
        assert_eq!(stmt.sql, "SELECT 1");
        assert!(stmt.names.is_empty());
    }

    #[test]
    fn test_argument_map_from_struct() {
        #[derive(Serialize)]
        struct Args {
            username: String,
            age: i64,
        }
        let map = argument_map(&Args {
            username: "root".to_string(),
            age: 30,
        })
        .unwrap();
        assert_eq!(map.get("username"), Some(&json!("root")));
        assert_eq!(map.get("age"), Some(&json!(30)));
    }

    #[test]
    fn test_argument_map_rejects_scalar() {
        let err = argument_map(&42).unwrap_err();
        assert!(matches!(err, Error::InvalidArguments { .. }));
    }

    #[test]
    fn test_bind_values_in_order() {
        let stmt = compile("VALUES (:b, :a, :b)", PlaceholderStyle::Question);
        let mut args = serde_json::Map::new();
        args.insert("a".to_string(), json!(1));
        args.insert("b".to_string(), json!("two"));

        let values = bind_values(&stmt.names, &args).unwrap();
        assert_eq!(
            values,
            vec![
                ScriptValue::Text("two".to_string()),
                ScriptValue::Int(1),
                ScriptValue::Text("two".to_string()),
            ]
        );
    }

    #[test]
    fn test_bind_values_missing_key_names_placeholder() {
        let stmt = compile(
            "VALUES (:username, :password)",
            PlaceholderStyle::Question,
        );
        let mut args = serde_json::Map::new();
        args.insert("username".to_string(), json!("root"));

        let err = bind_values(&stmt.names, &args).unwrap_err();
        match err {
            Error::Bind { name } => assert_eq!(name, "password"),
            other => panic!("expected Bind error, got: {other:?}"),
        }
    }
}
