//! Registry builders.
//!
//! Both registries are built exactly once during client construction and
//! are immutable afterward. Databases are filtered by the requested
//! environment tag before a pool ever opens; scripts are never filtered,
//! only checked for cross-document name collisions.

use crate::config::{DatabaseConfig, DriverKind, ScriptConfig};
use crate::db::pool::{self, DbPool};
use crate::error::{Error, Result};
use std::collections::HashMap;
use tracing::{debug, info};

/// Closure applied to a raw connection string before the pool opens.
pub type DsnDecryptFn = dyn Fn(&str) -> String + Send + Sync;

/// Build the database registry from configuration records.
///
/// Records whose `env` differs from `env` (when one is requested) are
/// excluded entirely — never opened, never reachable by name. Two surviving
/// records with the same name fail with [`Error::DuplicateDatabase`].
pub(crate) fn build_databases(
    configs: &[DatabaseConfig],
    env: Option<&str>,
    decrypt: Option<&DsnDecryptFn>,
) -> Result<HashMap<String, DbPool>> {
    let mut registry = HashMap::new();

    for config in configs {
        if let Some(requested) = env {
            if config.env != requested {
                debug!(
                    database = %config.name,
                    entry_env = %config.env,
                    requested_env = %requested,
                    "Skipping database outside requested environment"
                );
                continue;
            }
        }

        let driver =
            DriverKind::parse(&config.driver).ok_or_else(|| Error::UnsupportedDriver {
                driver: config.driver.clone(),
                database: config.name.clone(),
            })?;

        let dsn = match decrypt {
            Some(f) => f(&config.dsn),
            None => config.dsn.clone(),
        };

        let pool = pool::open(driver, &dsn, &config.tuning())?;
        if registry.insert(config.name.clone(), pool).is_some() {
            return Err(Error::DuplicateDatabase {
                name: config.name.clone(),
            });
        }

        info!(database = %config.name, driver = %driver, env = %config.env, "Registered database");
    }

    if registry.is_empty() {
        return Err(Error::NoAvailableDatabase);
    }

    Ok(registry)
}

/// Build the script registry from loaded documents, in document order.
///
/// A name contributed by two documents fails with [`Error::DuplicateScript`]
/// naming the offending script. Template text is stored verbatim.
pub(crate) fn build_scripts(
    documents: &[(String, Vec<ScriptConfig>)],
) -> Result<HashMap<String, String>> {
    let mut registry = HashMap::new();

    for (path, scripts) in documents {
        for script in scripts {
            if registry.contains_key(&script.name) {
                return Err(Error::DuplicateScript {
                    name: script.name.clone(),
                });
            }
            registry.insert(script.name.clone(), script.sql.clone());
        }
        debug!(document = %path, scripts = scripts.len(), "Loaded script document");
    }

    info!(scripts = registry.len(), "Script registry built");
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_config(name: &str, env: &str) -> DatabaseConfig {
        DatabaseConfig {
            name: name.to_string(),
            env: env.to_string(),
            driver: "sqlite".to_string(),
            dsn: "sqlite::memory:".to_string(),
            max_idle_conns: None,
            max_open_conns: None,
            conn_max_lifetime_seconds: None,
            conn_max_idle_time_seconds: None,
        }
    }

    fn script(name: &str, sql: &str) -> ScriptConfig {
        ScriptConfig {
            name: name.to_string(),
            sql: sql.to_string(),
        }
    }

    #[tokio::test]
    async fn test_environment_filter_excludes_entirely() {
        let configs = vec![sqlite_config("a", "dev"), sqlite_config("b", "prod")];
        let registry = build_databases(&configs, Some("dev"), None).unwrap();

        assert!(registry.contains_key("a"));
        assert!(!registry.contains_key("b"));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_no_filter_keeps_all() {
        let configs = vec![sqlite_config("a", "dev"), sqlite_config("b", "prod")];
        let registry = build_databases(&configs, None, None).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_filter_removing_everything_fails() {
        let configs = vec![sqlite_config("a", "dev")];
        let err = build_databases(&configs, Some("prod"), None).unwrap_err();
        assert!(matches!(err, Error::NoAvailableDatabase));
    }

    #[test]
    fn test_empty_config_fails() {
        let err = build_databases(&[], None, None).unwrap_err();
        assert!(matches!(err, Error::NoAvailableDatabase));
    }

    #[tokio::test]
    async fn test_duplicate_database_name_fails() {
        let configs = vec![sqlite_config("a", "dev"), sqlite_config("a", "dev")];
        let err = build_databases(&configs, None, None).unwrap_err();
        match err {
            Error::DuplicateDatabase { name } => assert_eq!(name, "a"),
            other => panic!("expected DuplicateDatabase, got: {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_driver_fails() {
        let mut config = sqlite_config("a", "dev");
        config.driver = "oracle".to_string();
        let err = build_databases(&[config], None, None).unwrap_err();
        assert!(matches!(err, Error::UnsupportedDriver { .. }));
    }

    #[tokio::test]
    async fn test_decrypt_applied_before_open() {
        // The stored dsn is unusable until the decrypt closure rewrites it
        let mut config = sqlite_config("a", "dev");
        config.dsn = "vault:sqlite::memory:".to_string();

        let decrypt = |dsn: &str| dsn.strip_prefix("vault:").unwrap_or(dsn).to_string();
        let registry = build_databases(&[config], None, Some(&decrypt)).unwrap();
        assert!(registry.contains_key("a"));
    }

    #[test]
    fn test_duplicate_script_across_documents_fails() {
        let documents = vec![
            ("one.toml".to_string(), vec![script("GetUser", "SELECT 1")]),
            ("two.toml".to_string(), vec![script("GetUser", "SELECT 2")]),
        ];
        let err = build_scripts(&documents).unwrap_err();
        match err {
            Error::DuplicateScript { name } => assert_eq!(name, "GetUser"),
            other => panic!("expected DuplicateScript, got: {other:?}"),
        }
    }

    #[test]
    fn test_disjoint_scripts_resolve_independently() {
        let documents = vec![
            ("one.toml".to_string(), vec![script("GetUser", "SELECT 1")]),
            ("two.toml".to_string(), vec![script("AddUser", "INSERT")]),
        ];
        let registry = build_scripts(&documents).unwrap();
        assert_eq!(registry.get("GetUser").map(String::as_str), Some("SELECT 1"));
        assert_eq!(registry.get("AddUser").map(String::as_str), Some("INSERT"));
    }

    #[test]
    fn test_duplicate_within_one_document_fails() {
        let documents = vec![(
            "one.toml".to_string(),
            vec![script("X", "SELECT 1"), script("X", "SELECT 2")],
        )];
        assert!(matches!(
            build_scripts(&documents),
            Err(Error::DuplicateScript { .. })
        ));
    }

    #[test]
    fn test_no_documents_is_an_empty_registry() {
        let registry = build_scripts(&[]).unwrap();
        assert!(registry.is_empty());
    }
}
