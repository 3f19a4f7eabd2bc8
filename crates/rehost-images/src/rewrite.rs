//! Substitution of remote image URLs with local paths.
//!
//! Only the URL token inside each reference changes. Markdown alt text and
//! titles, HTML attributes and quoting style, and all text between references
//! are copied through byte for byte.

use regex::Regex;
use tracing::warn;

use crate::reference::{ImageReference, ReferenceKind};

/// Rewrite a single reference's raw match so it points at `local_path`.
///
/// For markdown the original URL is matched literally (regex metacharacters
/// escaped) inside the `![alt](...)` structure, keeping any title group. For
/// HTML tags only the `src` attribute value is replaced.
#[must_use]
pub fn rewrite_reference(reference: &ImageReference, local_path: &str) -> String {
    match reference.kind {
        ReferenceKind::Markdown => rewrite_markdown(reference, local_path),
        ReferenceKind::HtmlTag => splice_url(reference, local_path),
    }
}

fn rewrite_markdown(reference: &ImageReference, local_path: &str) -> String {
    let pattern = format!(
        r#"^(!\[[^\]]*\]\(){}((?:\s+(?:"[^"]*"|'[^']*'))?\s*\))$"#,
        regex::escape(&reference.url)
    );
    let caps = Regex::new(&pattern)
        .ok()
        .and_then(|re| re.captures(&reference.raw_match));
    let Some(caps) = caps else {
        warn!(
            "markdown structure not matched for {}, splicing URL span",
            reference.url
        );
        return splice_url(reference, local_path);
    };

    format!("{}{local_path}{}", &caps[1], &caps[2])
}

/// Replace the URL bytes of `raw_match` using the recorded URL span.
fn splice_url(reference: &ImageReference, local_path: &str) -> String {
    let range = reference.relative_url_span();
    let raw = &reference.raw_match;
    let mut out = String::with_capacity(raw.len() - range.len() + local_path.len());
    out.push_str(&raw[..range.start]);
    out.push_str(local_path);
    out.push_str(&raw[range.end..]);
    out
}

/// Return `text` with only `reference` rewritten to `local_path`.
#[must_use]
pub fn rewrite_one(text: &str, reference: &ImageReference, local_path: &str) -> String {
    rewrite_all(text, &[(reference, local_path)])
}

/// Apply all substitutions in one pass over `text`, driven by reference spans.
///
/// Substitutions must come from the same text and must not overlap; references
/// are applied in span order regardless of the slice order. A substitution
/// whose span no longer matches `text` is skipped.
#[must_use]
pub fn rewrite_all(text: &str, substitutions: &[(&ImageReference, &str)]) -> String {
    let mut ordered: Vec<&(&ImageReference, &str)> = substitutions.iter().collect();
    ordered.sort_by_key(|(reference, _)| reference.span.start);

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (reference, local_path) in ordered {
        let span = reference.span.clone();
        if span.start < cursor || text.get(span.clone()) != Some(reference.raw_match.as_str()) {
            warn!(
                "skipping rewrite of {}: span {}..{} does not match source",
                reference.url, span.start, span.end
            );
            continue;
        }
        out.push_str(&text[cursor..span.start]);
        out.push_str(&rewrite_reference(reference, local_path));
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    out
}
