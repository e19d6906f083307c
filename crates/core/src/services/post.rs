//! Post service: listings, detail, create and edit.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use quill_common::{
    AppError, AppResult, IdGenerator, Page, PageWindow, StorageBackend, generate_storage_key,
};
use quill_db::{
    entities::{group, post, user},
    repositories::{GroupRepository, PostRepository, PostScope, UserRepository},
};
use sea_orm::Set;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::forms::{CheckedImage, FormErrors, FormResult, MSG_INVALID_CHOICE, PostForm, PostInput};

/// Storage key prefix for post images.
const IMAGE_PREFIX: &str = "posts";

/// A post with its author and group resolved, as pages display it.
#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: post::Model,
    /// Short display form of the text.
    pub excerpt: String,
    pub author: user::Model,
    pub group: Option<group::Model>,
    /// Public URL of the attached image.
    pub image_url: Option<String>,
}

/// Post service for business logic.
#[derive(Clone)]
pub struct PostService {
    post_repo: PostRepository,
    user_repo: UserRepository,
    group_repo: GroupRepository,
    storage: Arc<dyn StorageBackend>,
    id_gen: IdGenerator,
    page_size: u64,
}

impl PostService {
    /// Create a new post service.
    #[must_use]
    pub fn new(
        post_repo: PostRepository,
        user_repo: UserRepository,
        group_repo: GroupRepository,
        storage: Arc<dyn StorageBackend>,
        page_size: u64,
    ) -> Self {
        Self {
            post_repo,
            user_repo,
            group_repo,
            storage,
            id_gen: IdGenerator::new(),
            page_size,
        }
    }

    /// One page of posts in `scope`, newest first.
    ///
    /// `page` is the raw query value; see [`PageWindow::resolve`].
    pub async fn list(&self, scope: PostScope<'_>, page: Option<&str>) -> AppResult<Page<PostView>> {
        let count = self.post_repo.count(scope).await?;
        let window = PageWindow::resolve(count, self.page_size, page);

        let posts = self
            .post_repo
            .find(scope, window.offset(), window.limit())
            .await?;

        debug!(?scope, page = window.number, count, "Listed posts");
        Ok(window.into_page(self.hydrate(posts).await?))
    }

    /// Number of posts in `scope`.
    pub async fn count(&self, scope: PostScope<'_>) -> AppResult<u64> {
        self.post_repo.count(scope).await
    }

    /// Get a post by ID.
    pub async fn get(&self, id: &str) -> AppResult<post::Model> {
        self.post_repo.get_by_id(id).await
    }

    /// Resolve author, group and image URL for one post.
    pub async fn view(&self, post: post::Model) -> AppResult<PostView> {
        self.hydrate(vec![post])
            .await?
            .pop()
            .ok_or_else(|| AppError::Internal("Post author is missing".to_string()))
    }

    /// Groups a post can be filed under, ordered by title.
    pub async fn group_choices(&self) -> AppResult<Vec<group::Model>> {
        self.group_repo.find_all().await
    }

    /// Create a post authored by `author`.
    pub async fn create(
        &self,
        author: &user::Model,
        form: &PostForm,
    ) -> AppResult<FormResult<post::Model>> {
        let input = match self.clean(form).await? {
            Ok(input) => input,
            Err(errors) => return Ok(Err(errors)),
        };

        let image = match &input.image {
            Some(image) => Some(self.store_image(&author.id, image).await?),
            None => None,
        };

        let model = post::ActiveModel {
            id: Set(self.id_gen.generate()),
            text: Set(input.text),
            pub_date: Set(Utc::now().fixed_offset()),
            author_id: Set(author.id.clone()),
            group_id: Set(input.group_id),
            image: Set(image),
        };

        let post = self.post_repo.create(model).await?;
        info!(post_id = %post.id, author_id = %author.id, "Created post");
        Ok(Ok(post))
    }

    /// Apply an edit. Only the author may edit; the author and publication
    /// date never change.
    pub async fn update(
        &self,
        editor: &user::Model,
        post: post::Model,
        form: &PostForm,
    ) -> AppResult<FormResult<post::Model>> {
        if post.author_id != editor.id {
            return Err(AppError::Forbidden(format!(
                "Only the author can edit post {}",
                post.id
            )));
        }

        let input = match self.clean(form).await? {
            Ok(input) => input,
            Err(errors) => return Ok(Err(errors)),
        };

        let new_image = match &input.image {
            Some(image) => Some(self.store_image(&post.author_id, image).await?),
            None => None,
        };

        let post_id = post.id.clone();
        let replaced_image = new_image.as_ref().and(post.image.clone());
        let mut active: post::ActiveModel = post.into();
        active.text = Set(input.text);
        active.group_id = Set(input.group_id);
        if let Some(key) = new_image {
            active.image = Set(Some(key));
        }

        let post = self.post_repo.update(active).await?;
        info!(post_id = %post_id, "Edited post");

        // The row already points at the new file
        if let Some(old_key) = replaced_image {
            if let Err(e) = self.storage.delete(&old_key).await {
                warn!(post_id = %post_id, key = %old_key, error = %e, "Failed to delete replaced image");
            }
        }

        Ok(Ok(post))
    }

    /// Field validation plus the check that the chosen group exists.
    async fn clean(&self, form: &PostForm) -> AppResult<FormResult<PostInput>> {
        let mut errors = FormErrors::new();
        let cleaned = form.clean();

        if let Err(field_errors) = &cleaned {
            errors.extend(field_errors.clone());
        }

        if let Some(group_id) = &form.group {
            if self.group_repo.find_by_id(group_id).await?.is_none() {
                errors.add("group", MSG_INVALID_CHOICE);
            }
        }

        if !errors.is_empty() {
            debug!(?errors, "Post form rejected");
            return Ok(Err(errors));
        }

        Ok(cleaned)
    }

    async fn store_image(&self, owner_id: &str, image: &CheckedImage) -> AppResult<String> {
        let name = format!("upload.{}", image.extension());
        let key = generate_storage_key(IMAGE_PREFIX, owner_id, &name);
        self.storage
            .upload(&key, &image.data, image.mime_type())
            .await?;
        Ok(key)
    }

    async fn hydrate(&self, posts: Vec<post::Model>) -> AppResult<Vec<PostView>> {
        let mut author_ids: Vec<String> = posts.iter().map(|p| p.author_id.clone()).collect();
        author_ids.sort_unstable();
        author_ids.dedup();

        let mut group_ids: Vec<String> = posts.iter().filter_map(|p| p.group_id.clone()).collect();
        group_ids.sort_unstable();
        group_ids.dedup();

        let authors: HashMap<String, user::Model> = self
            .user_repo
            .find_by_ids(&author_ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();
        let groups: HashMap<String, group::Model> = self
            .group_repo
            .find_by_ids(&group_ids)
            .await?
            .into_iter()
            .map(|g| (g.id.clone(), g))
            .collect();

        let views = posts
            .into_iter()
            .filter_map(|post| {
                let Some(author) = authors.get(&post.author_id).cloned() else {
                    warn!(post_id = %post.id, author_id = %post.author_id, "Skipping post without author");
                    return None;
                };
                let group = post.group_id.as_ref().and_then(|id| groups.get(id).cloned());
                let image_url = post.image.as_deref().map(|key| self.storage.public_url(key));
                Some(PostView {
                    excerpt: post.excerpt(),
                    post,
                    author,
                    group,
                    image_url,
                })
            })
            .collect();

        Ok(views)
    }
}
