//! Login and signup forms.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::{FormErrors, FormResult, MSG_REQUIRED, empty_as_none, field_error, required};

/// Longest accepted username.
pub const USERNAME_MAX_CHARS: usize = 150;

/// Password length bounds.
pub const PASSWORD_MIN_CHARS: usize = 8;
pub const PASSWORD_MAX_CHARS: usize = 128;

/// Message shown when the credentials do not match.
pub const MSG_INVALID_LOGIN: &str = "Please enter a correct username and password. Note that both fields may be case-sensitive.";

/// Message shown when a signup picks a taken username.
pub const MSG_USERNAME_TAKEN: &str = "A user with that username already exists.";

/// Submission of the login page.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoginForm {
    #[validate(custom(function = "required"))]
    pub username: String,

    #[serde(skip_serializing)]
    #[validate(custom(function = "password_present"))]
    pub password: String,

    /// Where to go after a successful login.
    #[serde(deserialize_with = "empty_as_none")]
    pub next: Option<String>,
}

impl LoginForm {
    /// Check that both credentials were supplied.
    pub fn clean(&self) -> FormResult<()> {
        self.validate().map_err(FormErrors::from)
    }
}

/// Submission of the signup page.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SignupForm {
    #[validate(custom(function = "valid_username"))]
    pub username: String,

    #[serde(skip_serializing)]
    #[validate(custom(function = "valid_password"))]
    pub password: String,

    /// Optional display name.
    #[serde(deserialize_with = "empty_as_none")]
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    pub name: Option<String>,
}

impl SignupForm {
    /// Validate the fields that need no database lookup.
    pub fn clean(&self) -> FormResult<()> {
        self.validate().map_err(FormErrors::from)
    }
}

/// Passwords are not trimmed, so only emptiness counts as missing.
fn password_present(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(field_error("required", MSG_REQUIRED));
    }
    Ok(())
}

fn valid_username(value: &str) -> Result<(), ValidationError> {
    required(value)?;

    if value.chars().count() > USERNAME_MAX_CHARS {
        return Err(field_error(
            "max_length",
            "Ensure this value has at most 150 characters.",
        ));
    }

    let allowed = |c: char| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_');
    if !value.chars().all(allowed) {
        return Err(field_error(
            "invalid",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        ));
    }

    Ok(())
}

fn valid_password(value: &str) -> Result<(), ValidationError> {
    password_present(value)?;

    let len = value.chars().count();
    if len < PASSWORD_MIN_CHARS {
        return Err(field_error(
            "password_too_short",
            "This password is too short. It must contain at least 8 characters.",
        ));
    }
    if len > PASSWORD_MAX_CHARS {
        return Err(field_error(
            "max_length",
            "Ensure this value has at most 128 characters.",
        ));
    }

    Ok(())
}
