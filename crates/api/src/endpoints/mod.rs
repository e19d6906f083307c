//! Page endpoints.

mod auth;
mod follow;
mod posts;

use axum::Router;

use crate::middleware::AppState;

/// Create the page router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(posts::router())
        .merge(follow::router())
        .nest("/auth", auth::router())
}

/// Path of an author's profile page.
fn profile_path(username: &str) -> String {
    format!("/profile/{}/", urlencoding::encode(username))
}

/// Path of a post's detail page.
fn post_path(post_id: &str) -> String {
    format!("/posts/{post_id}/")
}
