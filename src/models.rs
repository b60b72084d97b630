//! Data models for script calls.
//!
//! This module defines the unified bind-value type produced from caller
//! arguments, the summary returned by data-mutating calls, and the per-call
//! options threaded through every handle operation.

use serde::Serialize;
use serde_json::Value as JsonValue;
use std::time::Duration;

/// A value bound to one placeholder of a compiled statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    Text(String),
    /// Nested structure, bound as the driver's JSON type
    Json(JsonValue),
}

impl ScriptValue {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this value for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Json(_) => "json",
        }
    }
}

impl From<JsonValue> for ScriptValue {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(f) = n.as_f64() {
                    Self::Float(f)
                } else {
                    // u64 beyond i64 range round-trips through its text form
                    Self::Text(n.to_string())
                }
            }
            JsonValue::String(s) => Self::Text(s),
            v @ (JsonValue::Array(_) | JsonValue::Object(_)) => Self::Json(v),
        }
    }
}

/// Outcome of a data-mutating call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExecSummary {
    /// Rows touched by the statement.
    pub rows_affected: u64,
    /// Insert id reported by the driver (MySQL insert id, SQLite rowid;
    /// PostgreSQL reports none).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_insert_id: Option<i64>,
}

/// Per-call context: an optional deadline for the driver round trip.
///
/// Cancellation is the dropped future; a deadline additionally fails the
/// call with [`Error::Timeout`](crate::Error::Timeout) once elapsed. The
/// default carries no deadline.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub timeout: Option<Duration>,
}

impl CallOptions {
    /// Create call options with no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the deadline for this call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
