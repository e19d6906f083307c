//! Group service.

use quill_common::{AppResult, IdGenerator};
use quill_db::{entities::group, repositories::GroupRepository};
use sea_orm::Set;
use serde::Deserialize;
use tracing::info;
use validator::{Validate, ValidationError};

/// Input for creating a group.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateGroupInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(length(min = 1, max = 50), custom(function = "valid_slug"))]
    pub slug: String,

    #[serde(default)]
    pub description: String,
}

fn valid_slug(slug: &str) -> Result<(), ValidationError> {
    let ok = slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(ValidationError::new("slug"))
    }
}

/// Group service for business logic.
#[derive(Clone)]
pub struct GroupService {
    group_repo: GroupRepository,
    id_gen: IdGenerator,
}

impl GroupService {
    /// Create a new group service.
    #[must_use]
    pub const fn new(group_repo: GroupRepository) -> Self {
        Self {
            group_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Get a group by its slug.
    pub async fn get_by_slug(&self, slug: &str) -> AppResult<group::Model> {
        self.group_repo.get_by_slug(slug).await
    }

    /// Create a group. A taken slug is a conflict.
    pub async fn create(&self, input: CreateGroupInput) -> AppResult<group::Model> {
        input.validate()?;

        let model = group::ActiveModel {
            id: Set(self.id_gen.generate()),
            title: Set(input.title),
            slug: Set(input.slug),
            description: Set(input.description),
        };

        let group = self.group_repo.create(model).await?;
        info!(group_id = %group.id, slug = %group.slug, "Created group");
        Ok(group)
    }

    /// Delete a group by slug. Its posts remain, without a group.
    pub async fn delete(&self, slug: &str) -> AppResult<()> {
        let group = self.group_repo.get_by_slug(slug).await?;
        let id = group.id.clone();
        self.group_repo.delete(group).await?;
        info!(group_id = %id, slug = %slug, "Deleted group");
        Ok(())
    }
}
