//! HTTP layer for quill.
//!
//! This crate maps the blog's pages onto axum routes:
//!
//! - **Endpoints**: feed, group and profile listings, post pages, following, accounts
//! - **Extractors**: the session user and form bodies (urlencoded or multipart)
//! - **Middleware**: session resolution from a bearer token or cookie
//!
//! Pages respond with a JSON context (`{"data": ...}`) or a 302 redirect.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

use axum::{Router, extract::DefaultBodyLimit, http::Uri, middleware::from_fn_with_state};
use quill_common::AppError;

pub use endpoints::router;
pub use middleware::AppState;

/// Build the complete application router.
///
/// Unknown paths answer 404 with the usual error body.
pub fn app(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;

    Router::new()
        .merge(router())
        .fallback(not_found)
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("No page at {}", uri.path()))
}
