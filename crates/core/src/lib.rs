//! Core business logic for quill.
//!
//! Forms bind and validate page submissions; services apply the rules for
//! posts, groups, comments, following and accounts on top of the
//! repositories in `quill-db`.

pub mod forms;
pub mod services;

pub use forms::{FormErrors, FormResult};
pub use services::*;
