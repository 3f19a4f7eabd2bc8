//! Content-based image format detection.
//!
//! Formats are identified from leading bytes only. File extensions and
//! `Content-Type` headers are accepted as hints that decide which signature is
//! checked first, never as a reason to accept a buffer.
//!
//! Error pages served with a 200 status (CDN or auth pages behind an
//! image-looking URL) are rejected before any signature is checked.

use std::borrow::Cow;
use std::fmt;

use serde::Serialize;

use crate::consts::TEXT_SNIFF_WINDOW;

/// Image formats recognized by signature sniffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
    Bmp,
    Ico,
    Svg,
}

impl ImageFormat {
    /// All known formats in default sniffing order.
    pub const ALL: [Self; 7] = [
        Self::Png,
        Self::Jpeg,
        Self::Gif,
        Self::Webp,
        Self::Bmp,
        Self::Ico,
        Self::Svg,
    ];

    /// File extension for stored images, including the leading dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => ".png",
            Self::Jpeg => ".jpg",
            Self::Gif => ".gif",
            Self::Webp => ".webp",
            Self::Bmp => ".bmp",
            Self::Ico => ".ico",
            Self::Svg => ".svg",
        }
    }

    /// MIME type for the format.
    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
            Self::Bmp => "image/bmp",
            Self::Ico => "image/x-icon",
            Self::Svg => "image/svg+xml",
        }
    }

    /// Format hint from a file extension (with or without the leading dot).
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" | "jpe" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::Webp),
            "bmp" => Some(Self::Bmp),
            "ico" => Some(Self::Ico),
            "svg" => Some(Self::Svg),
            _ => None,
        }
    }

    /// Format hint from a `Content-Type` header value.
    ///
    /// Parameters such as `; charset=utf-8` are ignored.
    #[must_use]
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/gif" => Some(Self::Gif),
            "image/webp" => Some(Self::Webp),
            "image/bmp" | "image/x-ms-bmp" => Some(Self::Bmp),
            "image/x-icon" | "image/vnd.microsoft.icon" => Some(Self::Ico),
            "image/svg+xml" => Some(Self::Svg),
            _ => None,
        }
    }

    /// Check whether `bytes` carry this format's signature.
    fn matches(self, bytes: &[u8], text_head: &str) -> bool {
        match self {
            Self::Png => bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]),
            Self::Jpeg => bytes.starts_with(&[0xFF, 0xD8, 0xFF]),
            Self::Gif => bytes.starts_with(b"GIF"),
            Self::Webp => bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP",
            Self::Bmp => bytes.starts_with(b"BM"),
            Self::Ico => bytes.starts_with(&[0x00, 0x00, 0x01, 0x00]),
            Self::Svg => {
                text_head.starts_with("<svg")
                    || (text_head.starts_with("<?xml") && contains_svg_tag(bytes))
            }
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Bmp => "bmp",
            Self::Ico => "ico",
            Self::Svg => "svg",
        };
        f.write_str(name)
    }
}

/// Reason a buffer was rejected as an image.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("empty response body")]
    Empty,
    #[error("response is an HTML page, not an image")]
    HtmlErrorPage,
    #[error("unrecognized image signature")]
    UnrecognizedSignature,
}

/// Detect the image format of `bytes`.
///
/// `hint` only changes the order signatures are tried in.
///
/// # Examples
///
/// ```
/// use rehost_images::{ImageFormat, ValidationError, validate_image};
///
/// assert_eq!(validate_image(b"\x89PNG\r\n\x1a\n", None), Ok(ImageFormat::Png));
/// assert_eq!(
///     validate_image(b"<!DOCTYPE html><html>", Some(ImageFormat::Png)),
///     Err(ValidationError::HtmlErrorPage)
/// );
/// ```
pub fn validate_image(bytes: &[u8], hint: Option<ImageFormat>) -> Result<ImageFormat, ValidationError> {
    if bytes.is_empty() {
        return Err(ValidationError::Empty);
    }

    let head = text_head(bytes);
    if head.starts_with("<!doctype html") || head.starts_with("<html") {
        return Err(ValidationError::HtmlErrorPage);
    }

    hint.into_iter()
        .chain(ImageFormat::ALL.into_iter().filter(|f| Some(*f) != hint))
        .find(|format| format.matches(bytes, &head))
        .ok_or(ValidationError::UnrecognizedSignature)
}

/// Whether an `<svg` tag appears anywhere in `bytes`, ignoring case.
///
/// XML prologs can carry long DOCTYPE entity tables, so the search is not
/// limited to the sniffing window.
fn contains_svg_tag(bytes: &[u8]) -> bool {
    bytes.windows(4).any(|w| w.eq_ignore_ascii_case(b"<svg"))
}

/// Leading bytes decoded as UTF-8, BOM and leading whitespace trimmed, lower-cased.
fn text_head(bytes: &[u8]) -> String {
    let window = &bytes[..bytes.len().min(TEXT_SNIFF_WINDOW)];
    let decoded: Cow<'_, str> = String::from_utf8_lossy(window);
    decoded
        .trim_start_matches('\u{feff}')
        .trim_start()
        .to_lowercase()
}
