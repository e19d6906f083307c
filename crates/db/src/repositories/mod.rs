//! Repositories wrapping database access for each entity.

mod comment;
mod follow;
mod group;
mod post;
mod user;

pub use comment::CommentRepository;
pub use follow::FollowRepository;
pub use group::GroupRepository;
pub use post::{PostRepository, PostScope};
pub use user::UserRepository;

use quill_common::AppError;
use sea_orm::{DbErr, SqlErr};

/// Map a database error, turning unique-constraint violations into conflicts.
pub(crate) fn map_insert_err(e: DbErr, what: &str) -> AppError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict(format!("{what} already exists"))
        }
        _ => AppError::Database(e.to_string()),
    }
}
