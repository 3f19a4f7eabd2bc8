//! HTTP retrieval of referenced images.
//!
//! [`HttpFetcher`] wraps a [`ureq::Agent`] configured with a global timeout and
//! a redirect limit. HTTP status codes are inspected instead of being turned
//! into transport errors, so 4xx responses can be classified:
//! - `403`/`410` on a pre-signed URL → [`FetchError::Expired`]
//! - any other 4xx → [`FetchError::NotFound`]
//! - 5xx, connection, DNS, timeout and body read failures → [`FetchError::Network`]
//!
//! A 200 response is returned as-is even if the body is an error page; content
//! checks belong to [`crate::validate_image`].

use std::time::Duration;

use ureq::http::Uri;
use ureq::{Agent, ResponseExt};

use crate::consts::{DEFAULT_MAX_BYTES, DEFAULT_MAX_REDIRECTS, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
use crate::format::ImageFormat;

/// Query parameters that mark a URL as pre-signed (time-limited).
const SIGNED_URL_PARAMS: &[&str] = &[
    "x-amz-expires",
    "x-amz-signature",
    "x-goog-expires",
    "x-goog-signature",
    "se",
    "sig",
    "expires",
    "signature",
    "jwt",
];

/// Successfully downloaded response body.
#[derive(Debug)]
pub struct FetchedContent {
    /// Response body.
    pub bytes: Vec<u8>,
    /// URL of the final response after redirects.
    pub final_url: String,
    /// `Content-Type` header of the final response, if any.
    pub content_type: Option<String>,
    /// Format hint from the content type or the final URL's extension.
    pub hint: Option<ImageFormat>,
}

/// Classified fetch failure.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("not found (HTTP {status})")]
    NotFound { status: u16 },
    #[error("pre-signed URL expired (HTTP {status})")]
    Expired { status: u16 },
    #[error("network error: {0}")]
    Network(String),
}

/// Capability to retrieve the bytes behind an image URL.
///
/// Implementations must be shareable across the fetch worker threads.
pub trait Fetcher: Send + Sync {
    /// Fetch `url`, following redirects.
    fn fetch(&self, url: &str) -> Result<FetchedContent, FetchError>;
}

/// Transport settings for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Global timeout for one request including the body.
    pub timeout: Duration,
    /// Maximum redirects followed before failing.
    pub max_redirects: u32,
    /// Maximum accepted body size in bytes.
    pub max_bytes: u64,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            max_bytes: DEFAULT_MAX_BYTES,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

/// [`Fetcher`] backed by a pooled `ureq` agent.
pub struct HttpFetcher {
    agent: Agent,
    max_bytes: u64,
    user_agent: String,
}

impl HttpFetcher {
    /// Create a fetcher from transport settings.
    #[must_use]
    pub fn new(config: &FetchConfig) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .max_redirects(config.max_redirects)
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            max_bytes: config.max_bytes,
            user_agent: config.user_agent.clone(),
        }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedContent, FetchError> {
        let response = self
            .agent
            .get(url)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "image/*,*/*;q=0.8")
            .call()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status >= 400 {
            return Err(classify_status(status, url));
        }

        let final_url = response.get_uri().to_string();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let bytes = response
            .into_body()
            .with_config()
            .limit(self.max_bytes)
            .read_to_vec()
            .map_err(|e| FetchError::Network(format!("failed to read body: {e}")))?;

        let hint = format_hint(content_type.as_deref(), &final_url);
        Ok(FetchedContent {
            bytes,
            final_url,
            content_type,
            hint,
        })
    }
}

/// Map an error status to a fetch failure.
fn classify_status(status: u16, url: &str) -> FetchError {
    match status {
        403 | 410 if is_presigned(url) => FetchError::Expired { status },
        400..=499 => FetchError::NotFound { status },
        _ => FetchError::Network(format!("server error (HTTP {status})")),
    }
}

/// Whether `url` carries pre-signed query parameters.
pub(crate) fn is_presigned(url: &str) -> bool {
    let Ok(uri) = url.parse::<Uri>() else {
        return false;
    };
    uri.query().is_some_and(|query| {
        query.split('&').any(|pair| {
            let key = pair.split('=').next().unwrap_or_default();
            SIGNED_URL_PARAMS.contains(&key.to_ascii_lowercase().as_str())
        })
    })
}

/// Pick a sniffing hint, preferring the content type over the URL extension.
fn format_hint(content_type: Option<&str>, url: &str) -> Option<ImageFormat> {
    content_type
        .and_then(ImageFormat::from_content_type)
        .or_else(|| extension_hint(url))
}

fn extension_hint(url: &str) -> Option<ImageFormat> {
    let uri = url.parse::<Uri>().ok()?;
    let last_segment = uri.path().rsplit('/').next()?;
    let (_, ext) = last_segment.rsplit_once('.')?;
    ImageFormat::from_extension(ext)
}
