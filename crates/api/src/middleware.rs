//! API middleware.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use quill_common::{AppError, Config, LocalStorage, StorageBackend};
use quill_core::{CommentService, FollowingService, GroupService, PostService, UserService};
use quill_db::repositories::{
    CommentRepository, FollowRepository, GroupRepository, PostRepository, UserRepository,
};
use sea_orm::DatabaseConnection;
use tracing::debug;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    pub post_service: PostService,
    pub comment_service: CommentService,
    pub following_service: FollowingService,
    pub group_service: GroupService,
    /// Where anonymous users are sent from protected pages.
    pub login_url: String,
    /// Name of the session cookie.
    pub session_cookie: String,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Wire repositories and services over one connection pool.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>, config: &Config) -> Self {
        let storage: Arc<dyn StorageBackend> =
            Arc::new(LocalStorage::from_config(&config.storage));
        Self::with_storage(db, config, storage)
    }

    /// Same as [`AppState::new`] with a caller-supplied storage backend.
    #[must_use]
    pub fn with_storage(
        db: Arc<DatabaseConnection>,
        config: &Config,
        storage: Arc<dyn StorageBackend>,
    ) -> Self {
        let user_repo = UserRepository::new(Arc::clone(&db));
        let post_repo = PostRepository::new(Arc::clone(&db));
        let group_repo = GroupRepository::new(Arc::clone(&db));
        let comment_repo = CommentRepository::new(Arc::clone(&db));
        let follow_repo = FollowRepository::new(db);

        Self {
            user_service: UserService::new(user_repo.clone()),
            post_service: PostService::new(
                post_repo.clone(),
                user_repo.clone(),
                group_repo.clone(),
                storage,
                config.pagination.page_size,
            ),
            comment_service: CommentService::new(comment_repo, post_repo, user_repo),
            following_service: FollowingService::new(follow_repo),
            group_service: GroupService::new(group_repo),
            login_url: config.auth.login_url.clone(),
            session_cookie: config.auth.session_cookie.clone(),
            max_upload_bytes: config.storage.max_upload_bytes,
        }
    }
}

/// Authentication middleware.
///
/// Resolves the session token from `Authorization: Bearer` or the session
/// cookie and stores the user in the request extensions. Unknown tokens
/// leave the request anonymous; a failed lookup aborts with its error.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = bearer_token(&req).or_else(|| {
        CookieJar::from_headers(req.headers())
            .get(&state.session_cookie)
            .map(|cookie| cookie.value().to_string())
    });

    if let Some(token) = token {
        match state.user_service.authenticate_by_token(&token).await {
            Ok(user) => {
                req.extensions_mut().insert(user);
            }
            Err(AppError::Unauthorized) => debug!("Ignoring unknown session token"),
            Err(e) => return e.into_response(),
        }
    }

    next.run(req).await
}

fn bearer_token(req: &Request<Body>) -> Option<String> {
    let value = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}
