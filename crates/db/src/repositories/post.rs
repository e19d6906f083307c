//! Post repository.

use std::sync::Arc;

use quill_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, sea_query::Query,
};

use crate::entities::{Follow, Post, follow, post};

/// Which posts a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostScope<'a> {
    /// Every post.
    All,
    /// Posts in the group with this ID.
    Group(&'a str),
    /// Posts written by the user with this ID.
    Author(&'a str),
    /// Posts written by authors the user with this ID follows.
    FollowedBy(&'a str),
}

impl PostScope<'_> {
    fn apply(self, query: Select<Post>) -> Select<Post> {
        match self {
            Self::All => query,
            Self::Group(group_id) => query.filter(post::Column::GroupId.eq(group_id)),
            Self::Author(author_id) => query.filter(post::Column::AuthorId.eq(author_id)),
            Self::FollowedBy(user_id) => query.filter(
                post::Column::AuthorId.in_subquery(
                    Query::select()
                        .column(follow::Column::AuthorId)
                        .from(Follow)
                        .and_where(follow::Column::UserId.eq(user_id))
                        .to_owned(),
                ),
            ),
        }
    }
}

/// Post repository for database operations.
#[derive(Clone)]
pub struct PostRepository {
    db: Arc<DatabaseConnection>,
}

impl PostRepository {
    /// Create a new post repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a post by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<post::Model>> {
        Post::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a post by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<post::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::PostNotFound(id.to_string()))
    }

    /// Count posts in a scope.
    pub async fn count(&self, scope: PostScope<'_>) -> AppResult<u64> {
        scope
            .apply(Post::find())
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get one page of posts in a scope, newest first.
    pub async fn find(
        &self,
        scope: PostScope<'_>,
        offset: u64,
        limit: u64,
    ) -> AppResult<Vec<post::Model>> {
        scope
            .apply(Post::find())
            .order_by_desc(post::Column::PubDate)
            .order_by_desc(post::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new post.
    pub async fn create(&self, model: post::ActiveModel) -> AppResult<post::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a post.
    pub async fn update(&self, model: post::ActiveModel) -> AppResult<post::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a post. Its comments stay, detached from it.
    pub async fn delete(&self, post: post::Model) -> AppResult<()> {
        post.delete(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Set};

    fn create_test_post(id: &str, author_id: &str, minutes_ago: i64) -> post::Model {
        post::Model {
            id: id.to_string(),
            text: format!("Post {id}"),
            pub_date: (Utc::now() - Duration::minutes(minutes_ago)).into(),
            author_id: author_id.to_string(),
            group_id: None,
            image: None,
        }
    }

    #[tokio::test]
    async fn test_get_by_id_not_found_returns_error() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<post::Model>::new()])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        let result = repo.get_by_id("missing").await;

        assert!(matches!(result, Err(AppError::PostNotFound(id)) if id == "missing"));
    }

    #[tokio::test]
    async fn test_count_scope() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(13))
                }]])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        let count = repo.count(PostScope::Author("user1")).await.unwrap();

        assert_eq!(count, 13);
    }

    #[tokio::test]
    async fn test_find_returns_rows_in_query_order() {
        let posts = vec![
            create_test_post("p2", "user1", 1),
            create_test_post("p1", "user1", 5),
        ];

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([posts])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        let result = repo.find(PostScope::All, 0, 10).await.unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].id, "p2");
    }

    #[tokio::test]
    async fn test_update_text() {
        let post = create_test_post("p1", "user1", 0);
        let mut updated = post.clone();
        updated.text = "Edited".to_string();

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[updated]])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        let mut active: post::ActiveModel = post.into();
        active.text = Set("Edited".to_string());
        let result = repo.update(active).await.unwrap();

        assert_eq!(result.text, "Edited");
        assert_eq!(result.author_id, "user1");
    }

    #[tokio::test]
    async fn test_delete() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        let result = repo.delete(create_test_post("p1", "user1", 0)).await;

        assert!(result.is_ok());
    }

    #[test]
    fn test_followed_scope_filters_by_subquery() {
        use sea_orm::{DbBackend, QueryTrait};

        let sql = PostScope::FollowedBy("reader")
            .apply(Post::find())
            .build(DbBackend::Postgres)
            .to_string();

        assert!(sql.contains("IN (SELECT"));
        assert!(sql.contains("\"follow\""));
        assert!(sql.contains("'reader'"));
    }
}
