//! Post endpoints: listings, detail, create, edit and comments.

use axum::{
    Router,
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use quill_common::{AppResult, Page};
use quill_core::{
    CommentView, FormErrors, PostView,
    forms::{CommentForm, PostForm},
};
use quill_db::{
    entities::{group, post as post_entity, user},
    repositories::PostScope,
};
use serde::Serialize;
use tracing::debug;

use super::{post_path, profile_path};
use crate::{
    extractors::{AuthUser, FormData, MaybeAuthUser, PageParam},
    middleware::AppState,
    response::{ApiResponse, found},
};

#[derive(Serialize)]
struct IndexContext {
    page: Page<PostView>,
}

#[derive(Serialize)]
struct GroupContext {
    group: group::Model,
    page: Page<PostView>,
}

#[derive(Serialize)]
struct ProfileContext {
    author: user::Model,
    post_count: u64,
    following: bool,
    page: Page<PostView>,
}

#[derive(Serialize)]
struct PostDetailContext {
    post: PostView,
    author_post_count: u64,
    comments: Vec<CommentView>,
    form: CommentForm,
}

/// Context of the create and edit pages.
#[derive(Serialize)]
struct PostFormContext {
    form: PostForm,
    errors: FormErrors,
    groups: Vec<group::Model>,
    is_edit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    post_id: Option<String>,
}

/// Feed of every post.
async fn index(
    State(state): State<AppState>,
    PageParam(page_number): PageParam,
) -> AppResult<ApiResponse<IndexContext>> {
    let page = state
        .post_service
        .list(PostScope::All, page_number.as_deref())
        .await?;

    Ok(ApiResponse::ok(IndexContext { page }))
}

/// Posts filed under one group.
async fn group_posts(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    PageParam(page_number): PageParam,
) -> AppResult<ApiResponse<GroupContext>> {
    let group = state.group_service.get_by_slug(&slug).await?;
    let page = state
        .post_service
        .list(PostScope::Group(&group.id), page_number.as_deref())
        .await?;

    Ok(ApiResponse::ok(GroupContext { group, page }))
}

/// An author's posts and whether the viewer follows them.
async fn profile(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
    PageParam(page_number): PageParam,
) -> AppResult<ApiResponse<ProfileContext>> {
    let author = state.user_service.get_by_username(&username).await?;
    let page = state
        .post_service
        .list(PostScope::Author(&author.id), page_number.as_deref())
        .await?;

    let following = match &viewer {
        Some(viewer) => {
            state
                .following_service
                .is_following(&viewer.id, &author.id)
                .await?
        }
        None => false,
    };

    Ok(ApiResponse::ok(ProfileContext {
        post_count: page.count,
        author,
        following,
        page,
    }))
}

/// One post with its comments.
async fn post_detail(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<PostDetailContext>> {
    let post = state.post_service.get(&post_id).await?;
    let view = state.post_service.view(post).await?;
    let author_post_count = state
        .post_service
        .count(PostScope::Author(&view.author.id))
        .await?;
    let comments = state.comment_service.list_for_post(&post_id).await?;

    Ok(ApiResponse::ok(PostDetailContext {
        post: view,
        author_post_count,
        comments,
        form: CommentForm::default(),
    }))
}

/// Blank create form.
async fn post_create_form(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<PostFormContext>> {
    Ok(ApiResponse::ok(PostFormContext {
        form: PostForm::default(),
        errors: FormErrors::new(),
        groups: state.post_service.group_choices().await?,
        is_edit: false,
        post_id: None,
    }))
}

/// Publish a post and go to the author's profile.
async fn post_create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    FormData { form, mut files }: FormData<PostForm>,
) -> AppResult<Response> {
    let form = PostForm {
        image: files.remove("image"),
        ..form
    };

    match state.post_service.create(&user, &form).await? {
        Ok(_) => Ok(found(&profile_path(&user.username))),
        Err(errors) => {
            debug!(user_id = %user.id, ?errors, "Post form rejected");
            Ok(ApiResponse::ok(PostFormContext {
                form,
                errors,
                groups: state.post_service.group_choices().await?,
                is_edit: false,
                post_id: None,
            })
            .into_response())
        }
    }
}

/// Load the post for editing, or decide where a non-author goes.
async fn editable_post(
    state: &AppState,
    user: &user::Model,
    post_id: &str,
) -> AppResult<Result<post_entity::Model, Response>> {
    let post = state.post_service.get(post_id).await?;
    if post.author_id == user.id {
        Ok(Ok(post))
    } else {
        debug!(post_id = %post_id, user_id = %user.id, "Edit by non-author redirected");
        Ok(Err(found(&post_path(post_id))))
    }
}

/// Edit form pre-populated from the post.
async fn post_edit_form(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<Response> {
    let post = match editable_post(&state, &user, &post_id).await? {
        Ok(post) => post,
        Err(redirect) => return Ok(redirect),
    };

    Ok(ApiResponse::ok(PostFormContext {
        form: PostForm::from_post(&post),
        errors: FormErrors::new(),
        groups: state.post_service.group_choices().await?,
        is_edit: true,
        post_id: Some(post.id),
    })
    .into_response())
}

/// Save an edit and go to the post.
async fn post_edit(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    FormData { form, mut files }: FormData<PostForm>,
) -> AppResult<Response> {
    let post = match editable_post(&state, &user, &post_id).await? {
        Ok(post) => post,
        Err(redirect) => return Ok(redirect),
    };

    let form = PostForm {
        image: files.remove("image"),
        ..form
    };

    match state.post_service.update(&user, post, &form).await? {
        Ok(post) => Ok(found(&post_path(&post.id))),
        Err(errors) => Ok(ApiResponse::ok(PostFormContext {
            form,
            errors,
            groups: state.post_service.group_choices().await?,
            is_edit: true,
            post_id: Some(post_id),
        })
        .into_response()),
    }
}

/// Comment on a post. Invalid comments are dropped.
///
/// An unreadable body counts as an empty comment.
async fn add_comment(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    submitted: Result<FormData<CommentForm>, Response>,
) -> AppResult<Response> {
    let form = submitted.map(|data| data.form).unwrap_or_default();
    state.comment_service.add(&user, &post_id, &form).await?;
    Ok(found(&post_path(&post_id)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/group/{slug}/", get(group_posts))
        .route("/profile/{username}/", get(profile))
        .route("/create/", get(post_create_form).post(post_create))
        .route("/posts/{post_id}/", get(post_detail))
        .route("/posts/{post_id}/edit/", get(post_edit_form).post(post_edit))
        .route("/posts/{post_id}/comment/", post(add_comment))
}
