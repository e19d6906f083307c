//! Account endpoints: login, signup and logout.

use axum::{
    Router,
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use quill_common::{AppError, AppResult};
use quill_core::{
    FormErrors,
    forms::{LoginForm, SignupForm},
};
use quill_db::entities::user;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    extractors::{FormData, MaybeAuthUser},
    middleware::AppState,
    response::{ApiResponse, found},
};

#[derive(Debug, Default, Deserialize)]
struct NextQuery {
    next: Option<String>,
}

#[derive(Serialize)]
struct LoginContext {
    form: LoginForm,
    errors: FormErrors,
}

#[derive(Serialize)]
struct SignupContext {
    form: SignupForm,
    errors: FormErrors,
}

/// `next` when it is a path on this site, `/` otherwise.
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path
        }
        _ => "/",
    }
}

fn session_cookie(name: &str, token: String) -> Cookie<'static> {
    Cookie::build((name.to_string(), token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Set the session cookie for `user` and redirect.
fn start_session(
    state: &AppState,
    jar: CookieJar,
    user: user::Model,
    location: &str,
) -> AppResult<Response> {
    let token = user
        .token
        .ok_or_else(|| AppError::Internal(format!("User {} has no session token", user.id)))?;

    Ok((jar.add(session_cookie(&state.session_cookie, token)), found(location)).into_response())
}

async fn login_form(Query(query): Query<NextQuery>) -> ApiResponse<LoginContext> {
    ApiResponse::ok(LoginContext {
        form: LoginForm {
            next: query.next,
            ..LoginForm::default()
        },
        errors: FormErrors::new(),
    })
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<NextQuery>,
    FormData { mut form, .. }: FormData<LoginForm>,
) -> AppResult<Response> {
    if form.next.is_none() {
        form.next = query.next;
    }

    match state.user_service.login(&form).await? {
        Ok(user) => {
            let location = safe_next(form.next.as_deref()).to_string();
            start_session(&state, jar, user, &location)
        }
        Err(errors) => Ok(ApiResponse::ok(LoginContext { form, errors }).into_response()),
    }
}

async fn signup_form() -> ApiResponse<SignupContext> {
    ApiResponse::ok(SignupContext {
        form: SignupForm::default(),
        errors: FormErrors::new(),
    })
}

async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    FormData { form, .. }: FormData<SignupForm>,
) -> AppResult<Response> {
    match state.user_service.signup(&form).await? {
        Ok(user) => start_session(&state, jar, user, "/"),
        Err(errors) => Ok(ApiResponse::ok(SignupContext { form, errors }).into_response()),
    }
}

/// End every session of the current user and drop the cookie.
async fn logout(
    MaybeAuthUser(user): MaybeAuthUser,
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<Response> {
    if let Some(user) = user {
        state.user_service.regenerate_token(&user.id).await?;
        info!(user_id = %user.id, "User logged out");
    }

    let expired = Cookie::build((state.session_cookie.clone(), "")).path("/");
    Ok((jar.remove(expired), found("/")).into_response())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login/", get(login_form).post(login))
        .route("/signup/", get(signup_form).post(signup))
        .route("/logout/", get(logout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_next_accepts_local_paths() {
        assert_eq!(safe_next(Some("/follow/?page=2")), "/follow/?page=2");
        assert_eq!(safe_next(None), "/");
    }

    #[test]
    fn test_safe_next_rejects_other_hosts() {
        assert_eq!(safe_next(Some("https://evil.example/")), "/");
        assert_eq!(safe_next(Some("//evil.example/")), "/");
        assert_eq!(safe_next(Some("/\\evil.example")), "/");
    }
}
