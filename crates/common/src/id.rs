//! Primary keys and session tokens.

use ulid::Ulid;
use uuid::Uuid;

/// Mints row ids and session tokens.
///
/// Row ids are lowercase ULIDs: 26 characters that sort by creation time,
/// so a post's id orders the same way as its `pub_date`. Session tokens are
/// random v4 UUIDs in simple form and carry no timestamp.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator;

impl IdGenerator {
    /// Create a generator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Primary key for a new user, group, post, comment or follow.
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Value stored in `users.token` and handed out as the session cookie.
    #[must_use]
    pub fn generate_token(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}
