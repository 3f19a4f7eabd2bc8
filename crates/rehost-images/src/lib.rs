//! Image localization for issue and comment text.
//!
//! This crate finds image references in markdown/HTML text, downloads them,
//! checks that the bytes really are images, stores them under a per-issue
//! directory and rewrites the text to point at the local copies.
//!
//! # Architecture
//!
//! - [`extract`](extract_references): markdown and HTML reference scanners
//! - [`format`](validate_image): signature sniffing and error-page rejection
//! - [`fetch`](HttpFetcher): HTTP retrieval with failure classification
//! - [`store`](LocalStore): deterministic per-issue file layout
//! - [`rewrite`](rewrite_all): span-driven URL substitution
//! - [`pipeline`](Pipeline): orchestration and summary
//!
//! # Example
//!
//! ```ignore
//! use rehost_images::{FetchConfig, FsSink, HttpFetcher, Pipeline, PipelineOptions};
//!
//! let fetcher = HttpFetcher::new(&FetchConfig::default());
//! let sink = FsSink::new(".");
//! let pipeline = Pipeline::new(&fetcher, &sink, PipelineOptions::new(42));
//!
//! let result = pipeline.run("![screenshot](https://example.com/shot.png)")?;
//! assert_eq!(result.body, "![screenshot](issue-42-images/image-1.png)");
//! ```

mod consts;
mod extract;
mod fetch;
mod format;
mod outcome;
mod pipeline;
mod reference;
mod rewrite;
mod store;

pub use consts::{
    DEFAULT_CONCURRENCY, DEFAULT_MAX_BYTES, DEFAULT_MAX_REDIRECTS, DEFAULT_TIMEOUT,
    DEFAULT_USER_AGENT,
};
pub use extract::extract_references;
pub use fetch::{FetchConfig, FetchError, FetchedContent, Fetcher, HttpFetcher};
pub use format::{ImageFormat, ValidationError, validate_image};
pub use outcome::{DownloadOutcome, OutcomeRecord, OutcomeStatus, PipelineSummary, StatusCounts};
pub use pipeline::{Pipeline, PipelineError, PipelineOptions, PipelineResult};
pub use reference::{ImageReference, ReferenceKind};
pub use rewrite::{rewrite_all, rewrite_one, rewrite_reference};
pub use store::{FsSink, ImageSink, LocalStore, StoreError, StoredImage, image_dir_name, image_file_name};
