//! Client facade.
//!
//! A [`Client`] owns the database and script registries, built once at
//! construction. Construction never panics and never returns `Result`: a
//! failure is stored on the client and handed back, unchanged, from every
//! subsequent operation until the configuration is corrected. Handles are
//! obtained per use and carry their own resolution error the same way.

use crate::config;
use crate::db::pool::DbPool;
use crate::db::registry::{self, DsnDecryptFn};
use crate::db::statement::{self, CompiledStatement, PlaceholderStyle};
use crate::error::{Error, Result};
use crate::models::{CallOptions, ExecSummary, ScriptValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Construction options for [`Client`].
#[derive(Clone)]
pub struct ClientOptions {
    database_file: String,
    scripts_glob: String,
    env: Option<String>,
    dsn_decrypt: Option<Arc<DsnDecryptFn>>,
}

impl ClientOptions {
    /// Options pointing at a database document and a script glob pattern.
    pub fn new(database_file: impl Into<String>, scripts_glob: impl Into<String>) -> Self {
        Self {
            database_file: database_file.into(),
            scripts_glob: scripts_glob.into(),
            env: None,
            dsn_decrypt: None,
        }
    }

    /// Only register databases tagged with this environment.
    pub fn with_env(mut self, env: impl Into<String>) -> Self {
        self.env = Some(env.into());
        self
    }

    /// Decrypt each connection string before the pool opens.
    pub fn with_dsn_decrypt(
        mut self,
        decrypt: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        self.dsn_decrypt = Some(Arc::new(decrypt));
        self
    }
}

impl std::fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientOptions")
            .field("database_file", &self.database_file)
            .field("scripts_glob", &self.scripts_glob)
            .field("env", &self.env)
            .field("has_dsn_decrypt", &self.dsn_decrypt.is_some())
            .finish()
    }
}

/// Facade owning the database and script registries.
///
/// `Client` is `Send + Sync`; any number of tasks may share one instance.
/// Each instance owns independent registries, so multiple configurations
/// can coexist in one process.
pub struct Client {
    databases: HashMap<String, DbPool>,
    scripts: HashMap<String, String>,
    err: Option<Error>,
}

impl Client {
    /// Build a client from `options`.
    ///
    /// Pools open lazily, so this performs no database I/O. Any failure —
    /// missing option, unreadable document, empty post-filter registry,
    /// duplicate names — is stored on the returned client; check
    /// [`error`](Self::error) before use.
    pub fn connect(options: ClientOptions) -> Self {
        match Self::build(options) {
            Ok(client) => client,
            Err(err) => Self {
                databases: HashMap::new(),
                scripts: HashMap::new(),
                err: Some(err),
            },
        }
    }

    fn build(options: ClientOptions) -> Result<Self> {
        if options.database_file.is_empty() {
            return Err(Error::ConfigMissing {
                option: "database_file",
            });
        }
        if options.scripts_glob.is_empty() {
            return Err(Error::ConfigMissing {
                option: "scripts_glob",
            });
        }

        let configs = config::load_database_document(&options.database_file)?;
        let databases = registry::build_databases(
            &configs,
            options.env.as_deref(),
            options.dsn_decrypt.as_deref(),
        )?;

        let documents = config::load_script_documents(&options.scripts_glob)?;
        let scripts = registry::build_scripts(&documents)?;

        info!(
            databases = databases.len(),
            scripts = scripts.len(),
            env = options.env.as_deref().unwrap_or("<all>"),
            "Client ready"
        );

        Ok(Self {
            databases,
            scripts,
            err: None,
        })
    }

    /// The construction error, if any. Operations on an errored client
    /// return a clone of this error.
    pub fn error(&self) -> Option<&Error> {
        self.err.as_ref()
    }

    /// A handle bound to the named database.
    ///
    /// An unregistered name yields a handle carrying
    /// [`Error::UnknownDatabase`]; the error surfaces from the handle's
    /// operations (and from [`Database::error`]).
    pub fn database(&self, name: &str) -> Database<'_> {
        let binding = if let Some(err) = &self.err {
            Err(err.clone())
        } else {
            match self.databases.get(name) {
                Some(pool) => Ok(pool.clone()),
                None => Err(Error::unknown_database(name)),
            }
        };

        Database {
            client: self,
            binding,
        }
    }

    /// Registered database names, sorted.
    pub fn database_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.databases.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Registered script names, sorted.
    pub fn script_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.scripts.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// The verbatim template text behind a script name.
    pub fn script(&self, name: &str) -> Option<&str> {
        self.scripts.get(name).map(String::as_str)
    }

    /// Close every pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        for (name, pool) in &self.databases {
            info!(database = %name, "Closing pool");
            pool.close().await;
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("databases", &self.database_names())
            .field("scripts", &self.scripts.len())
            .field("err", &self.err)
            .finish()
    }
}

/// Short-lived view binding a [`Client`] to one resolved database.
#[derive(Debug)]
pub struct Database<'c> {
    client: &'c Client,
    binding: std::result::Result<DbPool, Error>,
}

impl Database<'_> {
    /// The resolution (or inherited construction) error, if any.
    pub fn error(&self) -> Option<&Error> {
        self.binding.as_ref().err()
    }

    /// Run a script expecting exactly one row, deserialized into `T`.
    ///
    /// Zero rows is the driver's no-rows error, passed through unmodified.
    pub async fn query_one<A, T>(&self, call: &CallOptions, script: &str, args: &A) -> Result<T>
    where
        A: Serialize,
        T: DeserializeOwned,
    {
        let (pool, stmt, values) = self.prepare_call(script, args)?;
        let row = statement::fetch_one(pool, script, &stmt, &values, call).await?;
        serde_json::from_value(JsonValue::Object(row)).map_err(Error::decode)
    }

    /// Run a script expecting zero or more rows, each deserialized into `T`.
    pub async fn query_many<A, T>(
        &self,
        call: &CallOptions,
        script: &str,
        args: &A,
    ) -> Result<Vec<T>>
    where
        A: Serialize,
        T: DeserializeOwned,
    {
        let (pool, stmt, values) = self.prepare_call(script, args)?;
        let rows = statement::fetch_all(pool, script, &stmt, &values, call).await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(JsonValue::Object(row)).map_err(Error::decode))
            .collect()
    }

    /// Run a data-mutating script.
    pub async fn execute<A>(
        &self,
        call: &CallOptions,
        script: &str,
        args: &A,
    ) -> Result<ExecSummary>
    where
        A: Serialize,
    {
        let (pool, stmt, values) = self.prepare_call(script, args)?;
        statement::execute(pool, script, &stmt, &values, call).await
    }

    /// Resolve, compile and bind, without touching the connection.
    fn prepare_call(
        &self,
        script: &str,
        args: &impl Serialize,
    ) -> Result<(&DbPool, CompiledStatement, Vec<ScriptValue>)> {
        let pool = self.binding.as_ref().map_err(Error::clone)?;

        let template = self
            .client
            .scripts
            .get(script)
            .ok_or_else(|| Error::unknown_script(script))?;

        let stmt =
            statement::compile(template, PlaceholderStyle::for_driver(pool.driver_kind()));
        let map = statement::argument_map(args)?;
        let values = statement::bind_values(&stmt.names, &map)?;

        Ok((pool, stmt, values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_database_file_is_stored() {
        let client = Client::connect(ClientOptions::new("", "scripts/*.toml"));
        assert!(matches!(
            client.error(),
            Some(Error::ConfigMissing {
                option: "database_file"
            })
        ));
    }

    #[test]
    fn test_missing_scripts_glob_is_stored() {
        let client = Client::connect(ClientOptions::new("databases.toml", ""));
        assert!(matches!(
            client.error(),
            Some(Error::ConfigMissing {
                option: "scripts_glob"
            })
        ));
    }

    #[test]
    fn test_unreadable_document_is_stored() {
        let client = Client::connect(ClientOptions::new(
            "/definitely/not/here.toml",
            "scripts/*.toml",
        ));
        assert!(matches!(client.error(), Some(Error::DocumentParse { .. })));
    }

    #[tokio::test]
    async fn test_errored_client_propagates_to_handles() {
        let client = Client::connect(ClientOptions::new("", "scripts/*.toml"));

        let db = client.database("anything");
        assert!(matches!(
            db.error(),
            Some(Error::ConfigMissing { .. })
        ));

        // Calls return the stored error too, not UnknownScript
        let result: Result<serde_json::Value> = db
            .query_one(&CallOptions::new(), "Whatever", &serde_json::json!({}))
            .await;
        assert!(matches!(result, Err(Error::ConfigMissing { .. })));
    }

    #[test]
    fn test_client_options_debug_hides_decrypt() {
        let options = ClientOptions::new("db.toml", "s/*.toml")
            .with_env("dev")
            .with_dsn_decrypt(|dsn| dsn.to_string());
        let debug = format!("{options:?}");
        assert!(debug.contains("has_dsn_decrypt: true"));
    }
}
