//! Following endpoints.

use axum::{
    Router,
    extract::{Path, State},
    response::Response,
    routing::get,
};
use quill_common::{AppResult, Page};
use quill_core::{FollowOutcome, PostView};
use quill_db::repositories::PostScope;
use serde::Serialize;
use tracing::debug;

use super::profile_path;
use crate::{
    extractors::{AuthUser, PageParam},
    middleware::AppState,
    response::{ApiResponse, found},
};

#[derive(Serialize)]
struct FollowContext {
    page: Page<PostView>,
}

/// Posts by the authors the user follows.
async fn follow_index(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    PageParam(page_number): PageParam,
) -> AppResult<ApiResponse<FollowContext>> {
    let page = state
        .post_service
        .list(PostScope::FollowedBy(&user.id), page_number.as_deref())
        .await?;

    Ok(ApiResponse::ok(FollowContext { page }))
}

async fn profile_follow(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let author = state.user_service.get_by_username(&username).await?;

    let outcome = state.following_service.follow(&user.id, &author.id).await?;
    if outcome != FollowOutcome::Created {
        debug!(user_id = %user.id, author_id = %author.id, ?outcome, "Follow left unchanged");
    }

    Ok(found(&profile_path(&author.username)))
}

async fn profile_unfollow(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let author = state.user_service.get_by_username(&username).await?;
    state
        .following_service
        .unfollow(&user.id, &author.id)
        .await?;

    Ok(found(&profile_path(&author.username)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/follow/", get(follow_index))
        .route("/profile/{username}/follow/", get(profile_follow))
        .route("/profile/{username}/unfollow/", get(profile_unfollow))
}
