//! Following service.

use chrono::Utc;
use quill_common::{AppError, AppResult, IdGenerator};
use quill_db::{entities::follow, repositories::FollowRepository};
use sea_orm::Set;
use tracing::{info, warn};

/// What a follow request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    /// A new edge was stored.
    Created,
    /// The edge already existed; nothing changed.
    AlreadyFollowing,
    /// The user tried to follow themselves; nothing changed.
    SelfFollow,
}

/// Following service for business logic.
#[derive(Clone)]
pub struct FollowingService {
    follow_repo: FollowRepository,
    id_gen: IdGenerator,
}

impl FollowingService {
    /// Create a new following service.
    #[must_use]
    pub const fn new(follow_repo: FollowRepository) -> Self {
        Self {
            follow_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Follow an author. Following twice is a no-op.
    pub async fn follow(&self, user_id: &str, author_id: &str) -> AppResult<FollowOutcome> {
        if user_id == author_id {
            return Ok(FollowOutcome::SelfFollow);
        }

        if self.follow_repo.is_following(user_id, author_id).await? {
            return Ok(FollowOutcome::AlreadyFollowing);
        }

        let model = follow::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id.to_string()),
            author_id: Set(author_id.to_string()),
            created_at: Set(Utc::now().fixed_offset()),
        };

        match self.follow_repo.create(model).await {
            Ok(_) => {
                info!(user_id = %user_id, author_id = %author_id, "Followed author");
                Ok(FollowOutcome::Created)
            }
            Err(AppError::Conflict(_)) => {
                // A concurrent request inserted the same pair first
                warn!(user_id = %user_id, author_id = %author_id, "Follow insert raced");
                if self.follow_repo.is_following(user_id, author_id).await? {
                    Ok(FollowOutcome::AlreadyFollowing)
                } else {
                    Err(AppError::Internal("Follow edge vanished after conflict".to_string()))
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Remove the edge from `user_id` to `author_id`.
    pub async fn unfollow(&self, user_id: &str, author_id: &str) -> AppResult<()> {
        let removed = self.follow_repo.delete_by_pair(user_id, author_id).await?;
        if removed == 0 {
            return Err(AppError::NotFound(format!(
                "Follow from {user_id} to {author_id}"
            )));
        }

        info!(user_id = %user_id, author_id = %author_id, "Unfollowed author");
        Ok(())
    }

    /// Check if a user follows an author.
    pub async fn is_following(&self, user_id: &str, author_id: &str) -> AppResult<bool> {
        self.follow_repo.is_following(user_id, author_id).await
    }
}
