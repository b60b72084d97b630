//! Connection pool management.
//!
//! Databases are held in driver-specific pools (MySqlPool, PgPool,
//! SqlitePool) to ensure full type support. Pools open lazily: constructing
//! one performs no I/O, the first checkout dials the server.

use crate::config::{DriverKind, PoolTuning};
use crate::error::Result;
use sqlx::pool::PoolOptions;
use sqlx::{MySql, MySqlPool, PgPool, Postgres, Sqlite, SqlitePool};
use std::time::Duration;
use tracing::debug;

/// Driver-specific connection pool.
#[derive(Debug, Clone)]
pub enum DbPool {
    MySql(MySqlPool),
    Postgres(PgPool),
    SQLite(SqlitePool),
}

impl DbPool {
    /// The driver behind this pool.
    pub fn driver_kind(&self) -> DriverKind {
        match self {
            DbPool::MySql(_) => DriverKind::MySql,
            DbPool::Postgres(_) => DriverKind::Postgres,
            DbPool::SQLite(_) => DriverKind::Sqlite,
        }
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        match self {
            DbPool::MySql(pool) => pool.close().await,
            DbPool::Postgres(pool) => pool.close().await,
            DbPool::SQLite(pool) => pool.close().await,
        }
    }
}

/// Build pool options carrying the entry's tuning.
///
/// Each present value is applied independently; an absent value keeps the
/// driver's built-in default. `max_idle_conns` feeds `min_connections`, the
/// warm-connection floor.
fn tuned_options<DB: sqlx::Database>(tuning: &PoolTuning) -> PoolOptions<DB> {
    let mut options = PoolOptions::new();
    if let Some(max) = tuning.max_open_conns {
        options = options.max_connections(max);
    }
    if let Some(idle) = tuning.max_idle_conns {
        options = options.min_connections(idle);
    }
    if let Some(secs) = tuning.conn_max_lifetime_seconds {
        options = options.max_lifetime(Duration::from_secs(secs));
    }
    if let Some(secs) = tuning.conn_max_idle_time_seconds {
        options = options.idle_timeout(Duration::from_secs(secs));
    }
    options
}

/// Open a lazily connecting pool for `driver` at `dsn` with `tuning` applied.
pub(crate) fn open(driver: DriverKind, dsn: &str, tuning: &PoolTuning) -> Result<DbPool> {
    debug!(driver = %driver, tuned = !tuning.is_unset(), "Opening connection pool");

    let pool = match driver {
        DriverKind::MySql => DbPool::MySql(tuned_options::<MySql>(tuning).connect_lazy(dsn)?),
        DriverKind::Postgres => {
            DbPool::Postgres(tuned_options::<Postgres>(tuning).connect_lazy(dsn)?)
        }
        DriverKind::Sqlite => DbPool::SQLite(tuned_options::<Sqlite>(tuning).connect_lazy(dsn)?),
    };

    Ok(pool)
}
