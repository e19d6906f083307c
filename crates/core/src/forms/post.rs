//! Post and comment forms.

use std::fmt;

use image::ImageFormat;
use quill_db::entities::post;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{FormErrors, FormResult, MSG_INVALID_IMAGE, empty_as_none, required};

/// Submission of the create/edit post page.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PostForm {
    #[validate(custom(function = "required"))]
    pub text: String,

    /// Group ID, or absent for a post outside any group.
    #[serde(deserialize_with = "empty_as_none")]
    pub group: Option<String>,

    /// Uploaded image, bound from a multipart body.
    #[serde(skip)]
    pub image: Option<ImageUpload>,
}

/// A post submission that passed field validation.
#[derive(Debug)]
pub struct PostInput {
    /// Text with surrounding whitespace removed.
    pub text: String,
    pub group_id: Option<String>,
    pub image: Option<CheckedImage>,
}

/// Image data whose format has been recognised.
pub struct CheckedImage {
    pub format: ImageFormat,
    pub data: Vec<u8>,
}

impl fmt::Debug for CheckedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckedImage")
            .field("format", &self.format)
            .field("len", &self.data.len())
            .finish()
    }
}

impl CheckedImage {
    /// File extension matching the detected format.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("bin")
    }

    /// MIME type matching the detected format.
    #[must_use]
    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }
}

impl PostForm {
    /// A form pre-populated from an existing post.
    #[must_use]
    pub fn from_post(post: &post::Model) -> Self {
        Self {
            text: post.text.clone(),
            group: post.group_id.clone(),
            image: None,
        }
    }

    /// Validate every field that can be checked without the database.
    ///
    /// Whether `group` names an existing group is left to the caller.
    pub fn clean(&self) -> FormResult<PostInput> {
        let mut errors = self
            .validate()
            .err()
            .map(FormErrors::from)
            .unwrap_or_default();

        let image = match &self.image {
            Some(upload) => match upload.detect_format() {
                Some(format) => Some(CheckedImage {
                    format,
                    data: upload.data.clone(),
                }),
                None => {
                    errors.add("image", MSG_INVALID_IMAGE);
                    None
                }
            },
            None => None,
        };

        errors.into_result(PostInput {
            text: self.text.trim().to_string(),
            group_id: self.group.clone(),
            image,
        })
    }
}

/// A file received in a multipart body.
#[derive(Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl fmt::Debug for ImageUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageUpload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.data.len())
            .finish()
    }
}

impl ImageUpload {
    /// Create an upload from its parts.
    #[must_use]
    pub fn new(file_name: impl Into<String>, content_type: Option<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type,
            data,
        }
    }

    /// Sniff the format and make sure the data actually decodes.
    ///
    /// The declared content type and file name are ignored.
    #[must_use]
    pub fn detect_format(&self) -> Option<ImageFormat> {
        let format = image::guess_format(&self.data).ok()?;
        image::load_from_memory_with_format(&self.data, format).ok()?;
        Some(format)
    }
}

/// Submission of the comment box on the post detail page.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CommentForm {
    #[validate(custom(function = "required"))]
    pub text: String,
}

impl CommentForm {
    /// The trimmed comment text, or the field errors.
    pub fn clean(&self) -> FormResult<String> {
        match self.validate() {
            Ok(()) => Ok(self.text.trim().to_string()),
            Err(e) => Err(e.into()),
        }
    }
}
