//! # Blog Post
//!
//! The draft a demo session edits. Generation results land here: generated
//! content replaces `content`, a generated image sets `header_image_url`.

use crate::ScribeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum title length, in characters.
pub const MAX_TITLE_LENGTH: usize = 100;

/// A blog post draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogPost {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub header_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for BlogPost {
    fn default() -> Self {
        Self::new()
    }
}

impl BlogPost {
    /// Create an empty draft with a fresh id.
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: String::new(),
            content: String::new(),
            header_image_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the title after validating it.
    pub fn set_title(&mut self, title: impl Into<String>) -> Result<(), ScribeError> {
        let title = title.into();
        validate_title(&title)?;
        self.title = title;
        self.touch();
        Ok(())
    }

    /// Replace the content.
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.touch();
    }

    /// Attach a generated header image.
    pub fn set_header_image(&mut self, url: impl Into<String>) {
        self.header_image_url = Some(url.into());
        self.touch();
    }

    /// Check that the post is complete enough to publish.
    pub fn validate(&self) -> Result<(), ScribeError> {
        validate_title(&self.title)?;
        validate_content(&self.content)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Title rules: required (non-blank) and at most [`MAX_TITLE_LENGTH`] characters.
pub fn validate_title(title: &str) -> Result<(), ScribeError> {
    if title.trim().is_empty() {
        return Err(ScribeError::InvalidTitle);
    }
    let length = title.chars().count();
    if length > MAX_TITLE_LENGTH {
        return Err(ScribeError::TitleTooLong(length, MAX_TITLE_LENGTH));
    }
    Ok(())
}

/// Content rules: required (non-blank).
pub fn validate_content(content: &str) -> Result<(), ScribeError> {
    if content.trim().is_empty() {
        return Err(ScribeError::EmptyContent);
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
