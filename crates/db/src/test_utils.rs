//! Test utilities for database operations.
//!
//! Provides a migrated database for tests plus fixture helpers that insert
//! rows directly, bypassing services.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use sea_orm::{
    ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, DbErr, Set,
};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::entities::{comment, follow, group, post, user};
use crate::migrations::Migrator;

/// Test database configuration for running against `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct TestDbConfig {
    /// Database host.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Database username.
    pub username: String,
    /// Database password.
    pub password: String,
    /// Database name.
    pub database: String,
}

impl Default for TestDbConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("TEST_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("TEST_DB_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5433),
            username: std::env::var("TEST_DB_USER").unwrap_or_else(|_| "quill_test".to_string()),
            password: std::env::var("TEST_DB_PASSWORD")
                .unwrap_or_else(|_| "quill_test".to_string()),
            database: std::env::var("TEST_DB_NAME").unwrap_or_else(|_| "quill_test".to_string()),
        }
    }
}

impl TestDbConfig {
    /// Get the database URL.
    #[must_use]
    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }
}

/// A migrated test database.
pub struct TestDatabase {
    conn: Arc<DatabaseConnection>,
}

impl TestDatabase {
    /// Create a private in-memory `SQLite` database with the schema applied.
    ///
    /// The pool is pinned to one connection so every query sees the same
    /// in-memory database.
    pub async fn in_memory() -> Result<Self, DbErr> {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1)
            .min_connections(1)
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;
        Migrator::up(&conn, None).await?;

        Ok(Self {
            conn: Arc::new(conn),
        })
    }

    /// Connect to a `PostgreSQL` test database and apply migrations.
    pub async fn with_config(config: &TestDbConfig) -> Result<Self, DbErr> {
        let conn = Database::connect(&config.database_url()).await?;
        Migrator::up(&conn, None).await?;

        info!(database = %config.database, "Connected to test database");

        Ok(Self {
            conn: Arc::new(conn),
        })
    }

    /// Get the database connection.
    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        self.conn.as_ref()
    }

    /// Get a shared handle to the connection, as repositories take it.
    #[must_use]
    pub fn shared(&self) -> Arc<DatabaseConnection> {
        Arc::clone(&self.conn)
    }
}

/// A fixed base time for fixtures so orderings are deterministic.
#[must_use]
pub fn base_time() -> DateTime<FixedOffset> {
    DateTime::<Utc>::from_timestamp(1_700_000_000, 0)
        .unwrap_or_default()
        .fixed_offset()
}

/// `base_time()` shifted by `minutes`.
#[must_use]
pub fn minutes_after_base(minutes: i64) -> DateTime<FixedOffset> {
    base_time() + Duration::minutes(minutes)
}

/// Insert a user. The password hash is a placeholder and never verifies.
pub async fn create_user(db: &DatabaseConnection, username: &str) -> Result<user::Model, DbErr> {
    user::ActiveModel {
        id: Set(format!("u_{}", username.to_lowercase())),
        username: Set(username.to_string()),
        username_lower: Set(username.to_lowercase()),
        name: Set(None),
        password_hash: Set("!".to_string()),
        token: Set(None),
        created_at: Set(base_time()),
    }
    .insert(db)
    .await
}

/// Insert a group.
pub async fn create_group(
    db: &DatabaseConnection,
    slug: &str,
    title: &str,
) -> Result<group::Model, DbErr> {
    group::ActiveModel {
        id: Set(format!("g_{slug}")),
        title: Set(title.to_string()),
        slug: Set(slug.to_string()),
        description: Set(format!("About {title}")),
    }
    .insert(db)
    .await
}

/// Insert a post published `minutes` after [`base_time`].
pub async fn create_post(
    db: &DatabaseConnection,
    id: &str,
    author: &user::Model,
    group: Option<&group::Model>,
    text: &str,
    minutes: i64,
) -> Result<post::Model, DbErr> {
    post::ActiveModel {
        id: Set(id.to_string()),
        text: Set(text.to_string()),
        pub_date: Set(minutes_after_base(minutes)),
        author_id: Set(author.id.clone()),
        group_id: Set(group.map(|g| g.id.clone())),
        image: Set(None),
    }
    .insert(db)
    .await
}

/// Insert a comment on a post.
pub async fn create_comment(
    db: &DatabaseConnection,
    id: &str,
    author: &user::Model,
    post: &post::Model,
    text: &str,
) -> Result<comment::Model, DbErr> {
    comment::ActiveModel {
        id: Set(id.to_string()),
        text: Set(text.to_string()),
        pub_date: Set(base_time()),
        author_id: Set(author.id.clone()),
        post_id: Set(Some(post.id.clone())),
    }
    .insert(db)
    .await
}

/// Insert a follow edge from `user` to `author`.
pub async fn create_follow(
    db: &DatabaseConnection,
    user: &user::Model,
    author: &user::Model,
) -> Result<follow::Model, DbErr> {
    follow::ActiveModel {
        id: Set(format!("f_{}_{}", user.id, author.id)),
        user_id: Set(user.id.clone()),
        author_id: Set(author.id.clone()),
        created_at: Set(base_time()),
    }
    .insert(db)
    .await
}
