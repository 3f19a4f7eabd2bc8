//! Image reference types produced by extraction.

use std::ops::Range;

use serde::Serialize;

/// Syntax form an image reference was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// `![alt](url "title")`
    Markdown,
    /// `<img src="url" ...>`
    HtmlTag,
}

/// One textual occurrence of an image link in the source text.
///
/// Spans are byte offsets into the text the reference was extracted from.
/// `url_span` always lies inside `span`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Syntax form of the reference.
    pub kind: ReferenceKind,
    /// Full matched text (`![..](..)` or the whole `<img ...>` tag).
    pub raw_match: String,
    /// Byte range of `raw_match` in the source text.
    pub span: Range<usize>,
    /// Image URL exactly as written.
    pub url: String,
    /// Byte range of `url` in the source text.
    pub url_span: Range<usize>,
    /// Alt text for markdown, the full attribute list for HTML tags.
    pub alt_or_attributes: String,
}

impl ImageReference {
    /// Whether the URL points at a remote resource that can be fetched.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        let lower = self.url.to_ascii_lowercase();
        lower.starts_with("http://") || lower.starts_with("https://")
    }

    /// URL offset relative to the start of `raw_match`.
    pub(crate) fn relative_url_span(&self) -> Range<usize> {
        (self.url_span.start - self.span.start)..(self.url_span.end - self.span.start)
    }
}
