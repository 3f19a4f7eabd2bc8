//! Image reference extraction.
//!
//! Markdown and HTML references are found by two independent scanners over the
//! same text. Their results are merged by start offset:
//! - Markdown: `![alt](url)` or `![alt](url "title")`, the URL being the longest
//!   run of non-whitespace, non-`)` characters
//! - HTML: `<img ...>` tags (case-insensitive) with a single- or double-quoted
//!   `src` attribute; the tag is read as a list of attributes so quoted values
//!   may contain `>` or text that looks like another attribute
//!
//! A reference nested inside another one (markdown text inside an `alt`
//! attribute, say) is dropped so spans never overlap.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

use crate::reference::{ImageReference, ReferenceKind};

static MARKDOWN_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"!\[([^\]]*)\]\(([^\s)]+)(\s+(?:"[^"]*"|'[^']*'))?\s*\)"#).unwrap()
});

static HTML_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img((?:\s+[^\s"'<>/=]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'<>=`]+))?)*)\s*/?>"#)
        .unwrap()
});

static HTML_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s"'<>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'<>=`]+)))?"#).unwrap()
});

/// Extract all image references from `text` in left-to-right order.
///
/// The result is deterministic: extracting the same text twice yields equal
/// references.
///
/// # Examples
///
/// ```
/// use rehost_images::{ReferenceKind, extract_references};
///
/// let refs = extract_references(r#"![a](https://x.test/a.png) <img src='https://x.test/b.gif'>"#);
/// assert_eq!(refs.len(), 2);
/// assert_eq!(refs[0].kind, ReferenceKind::Markdown);
/// assert_eq!(refs[1].url, "https://x.test/b.gif");
/// ```
pub fn extract_references(text: &str) -> Vec<ImageReference> {
    let mut refs: Vec<ImageReference> = scan_markdown(text);
    refs.extend(scan_html(text));
    refs.sort_by_key(|r| r.span.start);

    let mut merged: Vec<ImageReference> = Vec::with_capacity(refs.len());
    for reference in refs {
        if let Some(last) = merged.last()
            && reference.span.start < last.span.end
        {
            debug!(
                "dropping image reference nested at {}..{}",
                reference.span.start, reference.span.end
            );
            continue;
        }
        merged.push(reference);
    }
    merged
}

/// Scan markdown image syntax only.
fn scan_markdown(text: &str) -> Vec<ImageReference> {
    MARKDOWN_IMAGE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let url = caps.get(2)?;
            Some(ImageReference {
                kind: ReferenceKind::Markdown,
                raw_match: whole.as_str().to_owned(),
                span: whole.range(),
                url: url.as_str().to_owned(),
                url_span: url.range(),
                alt_or_attributes: caps.get(1).map_or("", |m| m.as_str()).to_owned(),
            })
        })
        .collect()
}

/// Scan HTML `<img>` tags only.
fn scan_html(text: &str) -> Vec<ImageReference> {
    HTML_IMAGE
        .captures_iter(text)
        .filter_map(|caps| html_reference(&caps))
        .collect()
}

fn html_reference(caps: &Captures<'_>) -> Option<ImageReference> {
    let whole = caps.get(0)?;
    let attributes = caps.get(1)?;

    // The first `src` wins; only quoted values count.
    let src = HTML_ATTRIBUTE
        .captures_iter(attributes.as_str())
        .find(|attr| attr[1].eq_ignore_ascii_case("src"))?;
    let value = src.get(2).or_else(|| src.get(3))?;
    if value.is_empty() {
        return None;
    }
    let offset = attributes.start();

    Some(ImageReference {
        kind: ReferenceKind::HtmlTag,
        raw_match: whole.as_str().to_owned(),
        span: whole.range(),
        url: value.as_str().to_owned(),
        url_span: (offset + value.start())..(offset + value.end()),
        alt_or_attributes: attributes.as_str().trim().to_owned(),
    })
}
