//! Form binding and validation.
//!
//! A form is the raw submission of a page. Validating it yields either a
//! cleaned value or a [`FormErrors`] map, which the page re-displays next
//! to the submitted values.

mod account;
mod post;

pub use account::{LoginForm, MSG_INVALID_LOGIN, MSG_USERNAME_TAKEN, SignupForm};
pub use post::{CheckedImage, CommentForm, ImageUpload, PostForm, PostInput};

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use validator::{ValidationError, ValidationErrors};

/// Key under which errors not tied to one field are reported.
pub const NON_FIELD_ERRORS: &str = "__all__";

/// Message for a missing or blank required field.
pub const MSG_REQUIRED: &str = "This field is required.";

/// Message for a choice that does not exist.
pub const MSG_INVALID_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";

/// Message for an upload that is not a readable image.
pub const MSG_INVALID_IMAGE: &str = "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// Outcome of validating a form: the cleaned value or the field errors.
pub type FormResult<T> = Result<T, FormErrors>;

/// Validation messages keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    /// An empty error map.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Record a message against a field.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Record a message that applies to the form as a whole.
    pub fn add_non_field(&mut self, message: impl Into<String>) {
        self.add(NON_FIELD_ERRORS, message);
    }

    /// Messages recorded against a field.
    #[must_use]
    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    /// Whether a field has at least one message.
    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        !self.get(field).is_empty()
    }

    /// Whether no messages were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Ok(value)` when empty, otherwise `Err(self)`.
    pub fn into_result<T>(self, value: T) -> FormResult<T> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }

    /// Merge another error map into this one.
    pub fn extend(&mut self, other: Self) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }
}

impl From<ValidationErrors> for FormErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut out = Self::new();
        for (field, list) in errors.field_errors() {
            for error in list {
                let message = error
                    .message
                    .as_ref()
                    .map_or_else(|| error.code.to_string(), ToString::to_string);
                out.add(&field, message);
            }
        }
        out
    }
}

/// Build a validation error carrying a user-facing message.
pub(crate) fn field_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

/// Reject empty and whitespace-only input.
pub(crate) fn required(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(field_error("required", MSG_REQUIRED));
    }
    Ok(())
}

/// Treat an empty or blank form value as absent.
pub(crate) fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.trim().is_empty()))
}
