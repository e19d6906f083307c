//! User service: accounts, passwords and session tokens.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use quill_common::{AppError, AppResult, IdGenerator};
use quill_db::{entities::user, repositories::UserRepository};
use sea_orm::Set;
use tracing::{debug, info};

use crate::forms::{FormErrors, FormResult, LoginForm, MSG_INVALID_LOGIN, MSG_USERNAME_TAKEN, SignupForm};

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    id_gen: IdGenerator,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub const fn new(user_repo: UserRepository) -> Self {
        Self {
            user_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Register a new account from the signup form.
    ///
    /// The new user gets a session token straight away.
    pub async fn signup(&self, form: &SignupForm) -> AppResult<FormResult<user::Model>> {
        if let Err(errors) = form.clean() {
            return Ok(Err(errors));
        }

        if self.user_repo.find_by_username(&form.username).await?.is_some() {
            return Ok(Err(username_taken()));
        }

        let password_hash = hash_password(&form.password)?;

        let model = user::ActiveModel {
            id: Set(self.id_gen.generate()),
            username: Set(form.username.clone()),
            username_lower: Set(form.username.to_lowercase()),
            name: Set(form.name.clone()),
            password_hash: Set(password_hash),
            token: Set(Some(self.id_gen.generate_token())),
            created_at: Set(Utc::now().fixed_offset()),
        };

        match self.user_repo.create(model).await {
            Ok(user) => {
                info!(user_id = %user.id, username = %user.username, "User signed up");
                Ok(Ok(user))
            }
            // Lost a race with a concurrent signup for the same name
            Err(AppError::Conflict(_)) => Ok(Err(username_taken())),
            Err(e) => Err(e),
        }
    }

    /// Check the login form and return the user with a usable session token.
    pub async fn login(&self, form: &LoginForm) -> AppResult<FormResult<user::Model>> {
        if let Err(errors) = form.clean() {
            return Ok(Err(errors));
        }

        let user = match self.authenticate(&form.username, &form.password).await {
            Ok(user) => user,
            Err(AppError::Unauthorized) => {
                debug!(username = %form.username, "Rejected login");
                let mut errors = FormErrors::new();
                errors.add_non_field(MSG_INVALID_LOGIN);
                return Ok(Err(errors));
            }
            Err(e) => return Err(e),
        };

        let user = if user.token.is_some() {
            user
        } else {
            let token = self.id_gen.generate_token();
            self.user_repo.set_token(user, Some(token)).await?
        };

        info!(user_id = %user.id, "User logged in");
        Ok(Ok(user))
    }

    /// Get a user by username.
    pub async fn get_by_username(&self, username: &str) -> AppResult<user::Model> {
        self.user_repo.get_by_username(username).await
    }

    /// Authenticate a user by token.
    pub async fn authenticate_by_token(&self, token: &str) -> AppResult<user::Model> {
        self.user_repo
            .find_by_token(token)
            .await?
            .ok_or(AppError::Unauthorized)
    }

    /// Authenticate a user by username and password.
    pub async fn authenticate(&self, username: &str, password: &str) -> AppResult<user::Model> {
        let user = self
            .user_repo
            .find_by_username(username)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(AppError::Unauthorized);
        }

        Ok(user)
    }

    /// Replace a user's token, ending every session that used the old one.
    pub async fn regenerate_token(&self, user_id: &str) -> AppResult<String> {
        let user = self.user_repo.get_by_id(user_id).await?;
        let new_token = self.id_gen.generate_token();

        self.user_repo
            .set_token(user, Some(new_token.clone()))
            .await?;

        info!(user_id = %user_id, "Rotated session token");
        Ok(new_token)
    }
}

fn username_taken() -> FormErrors {
    let mut errors = FormErrors::new();
    errors.add("username", MSG_USERNAME_TAKEN);
    errors
}

/// Hash a password using Argon2.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash. Unparsable hashes never match.
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        return Ok(false);
    };

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_db::test_utils::{TestDatabase, create_user};
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    async fn service() -> (TestDatabase, UserService) {
        let db = TestDatabase::in_memory().await.unwrap();
        let service = UserService::new(UserRepository::new(db.shared()));
        (db, service)
    }

    fn signup_form(username: &str) -> SignupForm {
        SignupForm {
            username: username.to_string(),
            password: "correct horse".to_string(),
            name: Some("Leo".to_string()),
        }
    }

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("battery staple", &hash).unwrap());
        assert!(!verify_password("anything", "!").unwrap());
    }

    #[tokio::test]
    async fn test_authenticate_by_token_missing() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user::Model>::new()])
                .into_connection(),
        );
        let service = UserService::new(UserRepository::new(db));

        let result = service.authenticate_by_token("nope").await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_signup_then_login() {
        let (_db, service) = service().await;

        let user = service.signup(&signup_form("Leo")).await.unwrap().unwrap();
        assert_eq!(user.username_lower, "leo");
        assert!(user.token.is_some());

        let login = LoginForm {
            username: "leo".to_string(),
            password: "correct horse".to_string(),
            next: None,
        };
        let logged_in = service.login(&login).await.unwrap().unwrap();
        assert_eq!(logged_in.id, user.id);
        assert_eq!(logged_in.token, user.token);
    }

    #[tokio::test]
    async fn test_signup_duplicate_username_is_field_error() {
        let (_db, service) = service().await;
        service.signup(&signup_form("leo")).await.unwrap().unwrap();

        let errors = service.signup(&signup_form("LEO")).await.unwrap().unwrap_err();
        assert_eq!(errors.get("username"), [MSG_USERNAME_TAKEN.to_string()]);
    }

    #[tokio::test]
    async fn test_login_wrong_password_is_non_field_error() {
        let (_db, service) = service().await;
        service.signup(&signup_form("leo")).await.unwrap().unwrap();

        let login = LoginForm {
            username: "leo".to_string(),
            password: "wrong password".to_string(),
            next: None,
        };
        let errors = service.login(&login).await.unwrap().unwrap_err();
        assert_eq!(
            errors.get(crate::forms::NON_FIELD_ERRORS),
            [MSG_INVALID_LOGIN.to_string()]
        );
    }

    #[tokio::test]
    async fn test_login_issues_token_when_missing() {
        let (db, service) = service().await;
        let user = create_user(db.connection(), "mia").await.unwrap();
        assert!(user.token.is_none());

        // Fixture users carry an unusable hash, so give one a real password
        let repo = UserRepository::new(db.shared());
        let mut active: user::ActiveModel = user.into();
        active.password_hash = Set(hash_password("correct horse").unwrap());
        sea_orm::ActiveModelTrait::update(active, db.connection()).await.unwrap();

        let login = LoginForm {
            username: "mia".to_string(),
            password: "correct horse".to_string(),
            next: Some("/follow/".to_string()),
        };
        let user = service.login(&login).await.unwrap().unwrap();
        let token = user.token.clone().unwrap();

        let by_token = service.authenticate_by_token(&token).await.unwrap();
        assert_eq!(by_token.id, user.id);
        assert!(repo.find_by_token(&token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_regenerate_token_invalidates_old() {
        let (_db, service) = service().await;
        let user = service.signup(&signup_form("leo")).await.unwrap().unwrap();
        let old = user.token.unwrap();

        let new = service.regenerate_token(&user.id).await.unwrap();
        assert_ne!(old, new);
        assert!(matches!(
            service.authenticate_by_token(&old).await,
            Err(AppError::Unauthorized)
        ));
        assert_eq!(service.authenticate_by_token(&new).await.unwrap().id, user.id);
    }
}
