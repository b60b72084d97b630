//! Error types for querybook.
//!
//! All fallible operations in this crate return [`Error`]. Construction-time
//! failures are stored on the [`Client`](crate::Client) and handed back from
//! every subsequent call, so the enum is `Clone`; driver errors are wrapped
//! in `Arc` to keep that cheap.

use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A required construction option was left empty.
    #[error("{option} is required")]
    ConfigMissing { option: &'static str },

    /// A configuration or script document could not be read or parsed.
    #[error("failed to load {path}: {message}")]
    DocumentParse { path: String, message: String },

    /// Environment filtering removed every configured database.
    #[error("no available database")]
    NoAvailableDatabase,

    /// Two database entries share the same name.
    #[error("the database name ({name}) is duplicate")]
    DuplicateDatabase { name: String },

    /// Two script documents define the same script name.
    #[error("the script name ({name}) is duplicate")]
    DuplicateScript { name: String },

    /// A database entry names a driver this crate does not support.
    #[error("unsupported driver ({driver}) for database '{database}'")]
    UnsupportedDriver { driver: String, database: String },

    /// Lookup of an unregistered database name.
    #[error("the database name ({name}) is not found")]
    UnknownDatabase { name: String },

    /// A call referenced an unregistered script name.
    #[error("the script name ({name}) is not found")]
    UnknownScript { name: String },

    /// The caller's argument source did not serialize to a named-field map.
    #[error("script arguments must serialize to a map of named values: {message}")]
    InvalidArguments { message: String },

    /// A template placeholder had no matching argument.
    #[error("missing value for placeholder :{name}")]
    Bind { name: String },

    /// A result row could not be deserialized into the caller's record type.
    #[error("failed to decode result row: {message}")]
    Decode { message: String },

    /// The per-call deadline elapsed before the driver answered.
    #[error("'{script}' timed out after {elapsed_secs}s")]
    Timeout { script: String, elapsed_secs: u64 },

    /// Open/prepare/execute failure from the underlying connection,
    /// passed through unmodified.
    #[error("{0}")]
    Driver(#[source] Arc<sqlx::Error>),
}

impl Error {
    /// Create a document error for the given path.
    pub(crate) fn document(path: impl Into<String>, message: impl ToString) -> Self {
        Self::DocumentParse {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create an unknown-database error.
    pub(crate) fn unknown_database(name: impl Into<String>) -> Self {
        Self::UnknownDatabase { name: name.into() }
    }

    /// Create an unknown-script error.
    pub(crate) fn unknown_script(name: impl Into<String>) -> Self {
        Self::UnknownScript { name: name.into() }
    }

    /// Create a bind error naming the unmatched placeholder.
    pub(crate) fn bind(name: impl Into<String>) -> Self {
        Self::Bind { name: name.into() }
    }

    /// Create a decode error.
    pub(crate) fn decode(message: impl ToString) -> Self {
        Self::Decode {
            message: message.to_string(),
        }
    }

    /// True when this error originated in the underlying driver.
    pub fn is_driver(&self) -> bool {
        matches!(self, Self::Driver(_))
    }

    /// The driver error behind this one, if any.
    pub fn as_driver(&self) -> Option<&sqlx::Error> {
        match self {
            Self::Driver(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::Driver(Arc::new(err))
    }
}

/// Result type alias for querybook operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnknownDatabase {
            name: "orders".to_string(),
        };
        assert_eq!(err.to_string(), "the database name (orders) is not found");

        let err = Error::Bind {
            name: "username".to_string(),
        };
        assert!(err.to_string().contains(":username"));
    }

    #[test]
    fn test_driver_passthrough_message() {
        let err: Error = sqlx::Error::RowNotFound.into();
        // Driver text is surfaced unmodified, no added prefix
        assert_eq!(err.to_string(), sqlx::Error::RowNotFound.to_string());
        assert!(err.is_driver());
        assert!(matches!(err.as_driver(), Some(sqlx::Error::RowNotFound)));
    }

    #[test]
    fn test_errors_clone() {
        let err: Error = sqlx::Error::PoolClosed.into();
        let copy = err.clone();
        assert_eq!(err.to_string(), copy.to_string());
    }
}
