//! querybook
//!
//! Named SQL script execution over environment-scoped connection pools.
//! Scripts are declared once in TOML documents and invoked by name, with
//! arguments bound by `:identifier` placeholder rather than position:
//!
//! ```no_run
//! use querybook::{CallOptions, Client, ClientOptions};
//! use serde_json::json;
//!
//! # async fn demo() -> querybook::Result<()> {
//! let client = Client::connect(
//!     ClientOptions::new("config/databases.toml", "config/scripts/*.toml").with_env("dev"),
//! );
//! if let Some(err) = client.error() {
//!     return Err(err.clone());
//! }
//!
//! let main = client.database("main");
//! let user: serde_json::Value = main
//!     .query_one(&CallOptions::new(), "GetUser", &json!({ "id": 7 }))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use client::{Client, ClientOptions, Database};
pub use config::{DatabaseConfig, DriverKind, PoolTuning, ScriptConfig};
pub use db::{DbPool, DsnDecryptFn};
pub use error::{Error, Result};
pub use models::{CallOptions, ExecSummary, ScriptValue};
