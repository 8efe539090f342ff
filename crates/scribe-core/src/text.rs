//! # Prompt & Text Helpers
//!
//! Pure string transformations used by the AI adapters:
//! - prompt construction for content and image generation
//! - HTML to plain text for narration

use regex::Regex;
use std::sync::LazyLock;

/// Number of content characters used to describe a post in an image prompt.
pub const IMAGE_SUMMARY_CHARS: usize = 100;

/// Non-greedy tag matcher, applied to generated markup only. `.` does not
/// cross newlines, so a `<` and `>` on different lines are left alone.
// Literal pattern; cannot fail to compile.
#[allow(clippy::unwrap_used)]
static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<.*?>").unwrap());

/// Entities decoded before narration, in replacement order.
const HTML_ENTITIES: [(&str, &str); 5] = [
    ("&nbsp;", " "),
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
];

/// Build the blog-writing prompt for a title.
///
/// Shared by the one-shot and streaming content adapters so both produce the
/// same kind of post.
#[must_use]
pub fn blog_prompt(title: &str) -> String {
    format!(
        "Write a professional blog post with the title: \"{title}\"\n\
         \n\
         Please follow these guidelines:\n\
         1. Write approximately 300-500 words\n\
         2. Include an introduction, 2-3 main points with subheadings, and a conclusion\n\
         3. Use a professional but engaging tone\n\
         4. Format the content with HTML tags like <h2>, <p>, <ul>, etc.\n\
         5. Do not include any meta text or notes - only the actual blog content\n\
         6. Start directly with the content, do not include the title (it will be displayed separately)"
    )
}

/// Short plain description of a post body for an image prompt.
///
/// Takes the first [`IMAGE_SUMMARY_CHARS`] characters, then drops paragraph
/// and subheading tags.
#[must_use]
pub fn content_summary(content: &str) -> String {
    let head: String = content.chars().take(IMAGE_SUMMARY_CHARS).collect();
    head.replace("<p>", "")
        .replace("</p>", "")
        .replace("<h2>", "")
        .replace("</h2>", "")
}

/// Build the header-image prompt from a post's title and content.
#[must_use]
pub fn image_prompt(title: &str, content: &str) -> String {
    format!(
        "Create a professional header image for a blog post titled '{title}'. \
         The blog discusses: {summary}... \
         The image should be high quality, suitable for a professional blog, \
         with a clean composition and subtle colors. No text should be included in the image.",
        summary = content_summary(content)
    )
}

/// Strip HTML tags and decode common entities for speech synthesis.
#[must_use]
pub fn strip_html(content: &str) -> String {
    let mut plain = HTML_TAG.replace_all(content, "").into_owned();
    for (entity, replacement) in HTML_ENTITIES {
        plain = plain.replace(entity, replacement);
    }
    plain
}

// =============================================================================
// TESTS
// =============================================================================
