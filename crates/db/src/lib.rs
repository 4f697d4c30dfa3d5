//! Relational persistence for labbook entities.
//!
//! [`RecordStore`] implements versioned create / get / archive on top of any
//! [`RelationalStore`]; [`MemoryStore`] and [`SqliteStore`] are the two
//! backends shipped here.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

pub mod config;
pub mod error;
pub mod memory;
pub mod record_store;
pub mod relational;
pub mod schema;
pub mod sqlite;

pub use config::DbConfig;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use record_store::{CreatePolicy, RecordStore};
pub use relational::RelationalStore;
pub use sqlite::SqliteStore;

pub type DbPool = sqlx::SqlitePool;

/// Create a connection pool from the database configuration.
///
/// In-memory databases are private to one connection, so their pool is
/// pinned to a single connection that is never recycled.
pub async fn create_pool(config: &DbConfig) -> StoreResult<DbPool> {
    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool_options = if config.is_in_memory() {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(config.max_connections)
    };

    let pool = pool_options.connect_with(options).await?;
    tracing::info!(url = %config.database_url, "Database connection pool created");
    Ok(pool)
}

/// Check that the database is reachable.
pub async fn health_check(pool: &DbPool) -> StoreResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Open the configured database and create every record table.
pub async fn open_sqlite_store(config: &DbConfig) -> StoreResult<RecordStore<SqliteStore>> {
    let pool = create_pool(config).await?;
    health_check(&pool).await?;
    let store = RecordStore::with_policy(SqliteStore::new(pool), config.create_policy);
    store.bootstrap().await?;
    Ok(store)
}
