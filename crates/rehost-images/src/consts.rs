//! Internal constants for image fetching and sniffing.

use std::time::Duration;

/// Default HTTP timeout for a single image request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default redirect limit handed to the transport.
pub const DEFAULT_MAX_REDIRECTS: u32 = 10;

/// Default upper bound on a downloaded image body (25 MiB).
pub const DEFAULT_MAX_BYTES: u64 = 25 * 1024 * 1024;

/// Default number of concurrent fetches.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default `User-Agent` header for image requests.
pub const DEFAULT_USER_AGENT: &str = concat!("rehost/", env!("CARGO_PKG_VERSION"));

/// Number of leading bytes decoded as text when looking for HTML or SVG markers.
pub(crate) const TEXT_SNIFF_WINDOW: usize = 1024;
