//! Persistence for Quill: entities, schema migrations and repositories.
//!
//! The same code runs against `PostgreSQL` in production and `SQLite` in
//! development and tests; the backend is picked by the URL scheme.

pub mod entities;
pub mod migrations;
pub mod repositories;
pub mod test_utils;

use quill_common::config::DatabaseConfig;
use quill_common::{AppError, Config};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;
use tracing::log::LevelFilter;

/// Open the connection pool described by `[database]`.
///
/// Statements are logged by sqlx at debug level, so they only show up with
/// `RUST_LOG=sqlx=debug` or wider.
pub async fn init(config: &Config) -> Result<DatabaseConnection, AppError> {
    Database::connect(connect_options(&config.database))
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

/// Pool settings for a database URL.
///
/// Every connection to `sqlite::memory:` opens its own empty database, so an
/// in-memory URL gets a single long-lived connection whatever the config says.
fn connect_options(config: &DatabaseConfig) -> ConnectOptions {
    let mut opt = ConnectOptions::new(&config.url);

    if is_in_memory_sqlite(&config.url) {
        opt.max_connections(1).min_connections(1);
    } else {
        opt.max_connections(config.max_connections)
            .min_connections(config.min_connections.min(config.max_connections))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800));
    }

    opt.connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .sqlx_logging(true)
        .sqlx_logging_level(LevelFilter::Debug);
    opt
}

fn is_in_memory_sqlite(url: &str) -> bool {
    url.starts_with("sqlite:") && url.contains(":memory:")
}

/// Create or upgrade the users, groups, posts, comments and follows tables.
pub async fn migrate(db: &DatabaseConnection) -> Result<(), AppError> {
    use sea_orm_migration::MigratorTrait;
    migrations::Migrator::up(db, None)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}
