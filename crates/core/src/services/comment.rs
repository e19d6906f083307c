//! Comment service.

use std::collections::HashMap;

use chrono::Utc;
use quill_common::{AppResult, IdGenerator};
use quill_db::{
    entities::{comment, user},
    repositories::{CommentRepository, PostRepository, UserRepository},
};
use sea_orm::Set;
use serde::Serialize;
use tracing::{debug, info};

use crate::forms::CommentForm;

/// A comment with its author resolved.
#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: comment::Model,
    pub author: Option<user::Model>,
}

/// Comment service for business logic.
#[derive(Clone)]
pub struct CommentService {
    comment_repo: CommentRepository,
    post_repo: PostRepository,
    user_repo: UserRepository,
    id_gen: IdGenerator,
}

impl CommentService {
    /// Create a new comment service.
    #[must_use]
    pub const fn new(
        comment_repo: CommentRepository,
        post_repo: PostRepository,
        user_repo: UserRepository,
    ) -> Self {
        Self {
            comment_repo,
            post_repo,
            user_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Comment on a post.
    ///
    /// Fails with `PostNotFound` for an unknown post. An invalid form is
    /// dropped and yields `None`.
    pub async fn add(
        &self,
        author: &user::Model,
        post_id: &str,
        form: &CommentForm,
    ) -> AppResult<Option<comment::Model>> {
        let post = self.post_repo.get_by_id(post_id).await?;

        let text = match form.clean() {
            Ok(text) => text,
            Err(errors) => {
                debug!(post_id = %post.id, ?errors, "Dropped invalid comment");
                return Ok(None);
            }
        };

        let model = comment::ActiveModel {
            id: Set(self.id_gen.generate()),
            text: Set(text),
            pub_date: Set(Utc::now().fixed_offset()),
            author_id: Set(author.id.clone()),
            post_id: Set(Some(post.id.clone())),
        };

        let comment = self.comment_repo.create(model).await?;
        info!(comment_id = %comment.id, post_id = %post.id, author_id = %author.id, "Added comment");
        Ok(Some(comment))
    }

    /// Comments on a post, newest first.
    pub async fn list_for_post(&self, post_id: &str) -> AppResult<Vec<CommentView>> {
        let comments = self.comment_repo.find_by_post(post_id).await?;

        let mut author_ids: Vec<String> = comments.iter().map(|c| c.author_id.clone()).collect();
        author_ids.sort_unstable();
        author_ids.dedup();

        let authors: HashMap<String, user::Model> = self
            .user_repo
            .find_by_ids(&author_ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        Ok(comments
            .into_iter()
            .map(|comment| CommentView {
                author: authors.get(&comment.author_id).cloned(),
                comment,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_common::AppError;
    use quill_db::test_utils::{TestDatabase, create_post, create_user};

    fn service(db: &TestDatabase) -> CommentService {
        CommentService::new(
            CommentRepository::new(db.shared()),
            PostRepository::new(db.shared()),
            UserRepository::new(db.shared()),
        )
    }

    fn form(text: &str) -> CommentForm {
        CommentForm {
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_add_comment() {
        let db = TestDatabase::in_memory().await.unwrap();
        let author = create_user(db.connection(), "leo").await.unwrap();
        let reader = create_user(db.connection(), "mia").await.unwrap();
        let post = create_post(db.connection(), "p1", &author, None, "hello", 0)
            .await
            .unwrap();
        let service = service(&db);

        let comment = service
            .add(&reader, &post.id, &form("Great post"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(comment.author_id, reader.id);
        assert_eq!(comment.post_id.as_deref(), Some("p1"));
        let listed = service.list_for_post("p1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].author.as_ref().unwrap().username, "mia");
    }

    #[tokio::test]
    async fn test_blank_comment_is_dropped() {
        let db = TestDatabase::in_memory().await.unwrap();
        let author = create_user(db.connection(), "leo").await.unwrap();
        create_post(db.connection(), "p1", &author, None, "hello", 0)
            .await
            .unwrap();
        let service = service(&db);

        let result = service.add(&author, "p1", &form("   ")).await.unwrap();
        assert!(result.is_none());
        assert!(service.list_for_post("p1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_comment_on_missing_post() {
        let db = TestDatabase::in_memory().await.unwrap();
        let author = create_user(db.connection(), "leo").await.unwrap();

        let result = service(&db).add(&author, "ghost", &form("hi")).await;
        assert!(matches!(result, Err(AppError::PostNotFound(_))));
    }
}
