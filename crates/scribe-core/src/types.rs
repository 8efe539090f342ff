//! # Error Types
//!
//! - No silent failures
//! - Use `Result<T, ScribeError>` for fallible operations
//! - The sequencer itself never fails; these errors come from input
//!   validation and configuration

use thiserror::Error;

/// Errors that can occur in Scribe.
#[derive(Debug, Error)]
pub enum ScribeError {
    /// A blog post title is missing or blank.
    #[error("Title is required.")]
    InvalidTitle,

    /// A blog post title exceeds the length limit.
    #[error("Title is too long. ({0} characters, maximum {1})")]
    TitleTooLong(usize, usize),

    /// Content is required for this operation.
    #[error("Content is required.")]
    EmptyContent,

    /// Configuration could not be loaded or is incomplete.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================
