//! Request extractors.

use std::collections::HashMap;

use axum::{
    Form,
    extract::{FromRequest, FromRequestParts, Multipart, OriginalUri, Query, Request},
    http::{Uri, header::CONTENT_TYPE, request::Parts},
    response::{IntoResponse, Response},
};
use quill_common::AppError;
use quill_core::forms::ImageUpload;
use quill_db::entities::user;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::{middleware::AppState, response::found};

/// Authenticated user extractor.
///
/// Anonymous requests are redirected to the login page with the original
/// path and query in `next`.
#[derive(Debug, Clone)]
pub struct AuthUser(pub user::Model);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Set by auth middleware
        if let Some(user) = parts.extensions.get::<user::Model>() {
            return Ok(Self(user.clone()));
        }

        let uri = parts
            .extensions
            .get::<OriginalUri>()
            .map_or(&parts.uri, |original| &original.0);
        let next = uri
            .path_and_query()
            .map_or_else(|| uri.path(), |pq| pq.as_str());

        Err(found(&login_redirect(&state.login_url, next)))
    }
}

/// Optional authenticated user extractor.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<user::Model>);

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<user::Model>().cloned()))
    }
}

/// `?page=` on listing pages.
///
/// Kept raw so junk falls back to page 1. A repeated parameter takes its
/// last value, and an unparseable query string counts as absent.
#[derive(Debug, Default)]
pub struct PageParam(pub Option<String>);

impl<S> FromRequestParts<S> for PageParam
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(last_page_value(&parts.uri)))
    }
}

fn last_page_value(uri: &Uri) -> Option<String> {
    let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(uri).ok()?;
    pairs
        .into_iter()
        .filter(|(key, _)| key == "page")
        .map(|(_, value)| value)
        .last()
}

/// `{login_url}?next=<path>`, keeping slashes readable.
#[must_use]
pub fn login_redirect(login_url: &str, next: &str) -> String {
    let next = urlencoding::encode(next).replace("%2F", "/");
    format!("{login_url}?next={next}")
}

/// A submitted form, from a urlencoded or a multipart body.
///
/// Text fields bind to `T`; file parts land in `files` by field name.
#[derive(Debug)]
pub struct FormData<T> {
    pub form: T,
    pub files: HashMap<String, ImageUpload>,
}

impl<T, S> FromRequest<S> for FormData<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));

        if !is_multipart {
            let Form(form) = Form::<T>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            return Ok(Self {
                form,
                files: HashMap::new(),
            });
        }

        let multipart = Multipart::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;
        read_multipart(multipart)
            .await
            .map_err(IntoResponse::into_response)
    }
}

async fn read_multipart<T: DeserializeOwned>(mut multipart: Multipart) -> Result<FormData<T>, AppError> {
    let mut fields = Map::new();
    let mut files = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();

        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?
                    .to_vec();
                // An empty file input submits a nameless, empty part
                if !(file_name.is_empty() && data.is_empty()) {
                    files.insert(name, ImageUpload::new(file_name, content_type, data));
                }
            }
            None => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                fields.insert(name, Value::String(text));
            }
        }
    }

    let form = serde_json::from_value(Value::Object(fields))
        .map_err(|e| AppError::BadRequest(format!("Invalid form data: {e}")))?;

    Ok(FormData { form, files })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_of(uri: &str) -> Option<String> {
        last_page_value(&uri.parse::<Uri>().unwrap())
    }

    #[test]
    fn test_page_param_takes_last_value() {
        assert_eq!(page_of("/?page=1&page=2").as_deref(), Some("2"));
        assert_eq!(page_of("/?page=3&sort=new").as_deref(), Some("3"));
        assert_eq!(page_of("/?page=abc").as_deref(), Some("abc"));
        assert_eq!(page_of("/?sort=new"), None);
        assert_eq!(page_of("/"), None);
    }

    #[test]
    fn test_login_redirect_keeps_slashes() {
        assert_eq!(
            login_redirect("/auth/login/", "/create/"),
            "/auth/login/?next=/create/"
        );
    }

    #[test]
    fn test_login_redirect_escapes_query() {
        assert_eq!(
            login_redirect("/auth/login/", "/follow/?page=2"),
            "/auth/login/?next=/follow/%3Fpage%3D2"
        );
    }
}
