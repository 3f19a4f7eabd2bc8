//! Extraction → fetch → validate → store → rewrite orchestration.
//!
//! Fetching and validation run on a dedicated rayon pool, one task per
//! reference. Results are collected in extraction order, then stored
//! sequentially so success indices follow extraction order rather than
//! completion order. Finally all successful references are rewritten in one
//! pass over the source text.

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::consts::DEFAULT_CONCURRENCY;
use crate::extract::extract_references;
use crate::fetch::{FetchError, Fetcher};
use crate::format::{ImageFormat, ValidationError, validate_image};
use crate::outcome::{DownloadOutcome, PipelineSummary};
use crate::reference::ImageReference;
use crate::rewrite::rewrite_all;
use crate::store::{ImageSink, LocalStore, StoreError};

/// Run settings for [`Pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Issue the images belong to; selects the `issue-N-images` directory.
    pub issue_number: u64,
    /// When false, references are only extracted and reported as skipped.
    pub download_images: bool,
    /// Maximum number of concurrent fetches (at least 1).
    pub concurrency: usize,
}

impl PipelineOptions {
    /// Default options for `issue_number`.
    #[must_use]
    pub fn new(issue_number: u64) -> Self {
        Self {
            issue_number,
            download_images: true,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Rewritten text plus the per-reference summary.
#[derive(Debug)]
pub struct PipelineResult {
    pub body: String,
    pub summary: PipelineSummary,
}

/// Fatal pipeline error. Per-reference failures never surface here.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{0}")]
    ImageDir(#[source] StoreError),
    #[error("failed to start fetch workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Result of fetching and validating one reference.
enum Checked {
    NotRemote,
    FetchFailed(FetchError),
    Invalid(ValidationError),
    Valid { bytes: Vec<u8>, format: ImageFormat },
}

/// Image localization pipeline over a fetcher and a sink.
pub struct Pipeline<'a> {
    fetcher: &'a dyn Fetcher,
    sink: &'a dyn ImageSink,
    options: PipelineOptions,
}

impl<'a> Pipeline<'a> {
    /// Create a pipeline.
    pub fn new(fetcher: &'a dyn Fetcher, sink: &'a dyn ImageSink, options: PipelineOptions) -> Self {
        Self {
            fetcher,
            sink,
            options,
        }
    }

    /// Localize every image referenced in `text`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ImageDir`] if the issue directory cannot be
    /// created, and [`PipelineError::ThreadPool`] if the fetch pool cannot be
    /// started. Failures of individual references are recorded in the summary.
    pub fn run(&self, text: &str) -> Result<PipelineResult, PipelineError> {
        let references = extract_references(text);
        info!("found {} image reference(s)", references.len());

        if !self.options.download_images {
            let outcomes = references
                .into_iter()
                .map(|r| DownloadOutcome::skipped(r, "image download disabled"))
                .collect();
            return Ok(PipelineResult {
                body: text.to_owned(),
                summary: PipelineSummary::from_outcomes(outcomes),
            });
        }

        let checked = self.check_all(&references)?;
        let outcomes = self.store_all(references, checked)?;

        let substitutions: Vec<(&ImageReference, &str)> = outcomes
            .iter()
            .filter_map(|o| o.local_path.as_deref().map(|path| (&o.reference, path)))
            .collect();
        let body = rewrite_all(text, &substitutions);

        Ok(PipelineResult {
            body,
            summary: PipelineSummary::from_outcomes(outcomes),
        })
    }

    /// Fetch and validate all references, preserving extraction order.
    fn check_all(&self, references: &[ImageReference]) -> Result<Vec<Checked>, PipelineError> {
        let threads = self.options.concurrency.max(1);
        if threads == 1 || references.len() <= 1 {
            return Ok(references.iter().map(|r| self.check_one(r)).collect());
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(threads.min(references.len()))
            .thread_name(|i| format!("rehost-fetch-{i}"))
            .build()?;
        Ok(pool.install(|| references.par_iter().map(|r| self.check_one(r)).collect()))
    }

    fn check_one(&self, reference: &ImageReference) -> Checked {
        if !reference.is_remote() {
            return Checked::NotRemote;
        }

        let content = match self.fetcher.fetch(&reference.url) {
            Ok(content) => content,
            Err(err) => return Checked::FetchFailed(err),
        };
        if content.final_url != reference.url {
            debug!("{} redirected to {}", reference.url, content.final_url);
        }

        match validate_image(&content.bytes, content.hint) {
            Ok(format) => Checked::Valid {
                bytes: content.bytes,
                format,
            },
            Err(err) => Checked::Invalid(err),
        }
    }

    /// Persist valid images in extraction order and build outcomes.
    fn store_all(
        &self,
        references: Vec<ImageReference>,
        checked: Vec<Checked>,
    ) -> Result<Vec<DownloadOutcome>, PipelineError> {
        let store = LocalStore::new(self.sink, self.options.issue_number);
        let mut next_index = 1;
        let mut outcomes = Vec::with_capacity(references.len());

        for (reference, result) in references.into_iter().zip(checked) {
            let outcome = match result {
                Checked::NotRemote => DownloadOutcome::skipped(reference, "not a remote URL"),
                Checked::FetchFailed(err) => DownloadOutcome::fetch_failed(reference, &err),
                Checked::Invalid(err) => DownloadOutcome::invalid(reference, &err),
                Checked::Valid { bytes, format } => {
                    match store.store(&bytes, format, next_index) {
                        Ok(stored) => {
                            next_index += 1;
                            info!("saved {} as {}", reference.url, stored.local_path);
                            DownloadOutcome::success(reference, format, stored)
                        }
                        Err(err @ StoreError::CreateDir { .. }) => {
                            return Err(PipelineError::ImageDir(err));
                        }
                        Err(err) => DownloadOutcome::store_failed(reference, format, &err),
                    }
                }
            };

            if let Some(message) = outcome.message.as_deref()
                && outcome.status.is_failure()
            {
                warn!("{}: {message}", outcome.reference.url);
            }
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchedContent;
    use crate::outcome::OutcomeStatus;
    use crate::store::FsSink;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const GIF: &[u8] = b"GIF89a\x01\x00\x01\x00";
    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];

    enum Response {
        Body(&'static [u8], Duration),
        Status(u16),
        Timeout,
    }

    /// Fetcher serving canned responses keyed by URL.
    #[derive(Default)]
    struct StubFetcher {
        responses: HashMap<String, Response>,
    }

    impl StubFetcher {
        fn body(mut self, url: &str, bytes: &'static [u8]) -> Self {
            self.responses
                .insert(url.to_owned(), Response::Body(bytes, Duration::ZERO));
            self
        }

        fn slow_body(mut self, url: &str, bytes: &'static [u8], delay: Duration) -> Self {
            self.responses
                .insert(url.to_owned(), Response::Body(bytes, delay));
            self
        }

        fn status(mut self, url: &str, status: u16) -> Self {
            self.responses.insert(url.to_owned(), Response::Status(status));
            self
        }

        fn timeout(mut self, url: &str) -> Self {
            self.responses.insert(url.to_owned(), Response::Timeout);
            self
        }
    }

    impl Fetcher for StubFetcher {
        fn fetch(&self, url: &str) -> Result<FetchedContent, FetchError> {
            match self.responses.get(url) {
                Some(Response::Body(bytes, delay)) => {
                    std::thread::sleep(*delay);
                    Ok(FetchedContent {
                        bytes: bytes.to_vec(),
                        final_url: url.to_owned(),
                        content_type: None,
                        hint: None,
                    })
                }
                Some(Response::Status(404)) | None => Err(FetchError::NotFound { status: 404 }),
                Some(Response::Status(status)) => Err(FetchError::Expired { status: *status }),
                Some(Response::Timeout) => Err(FetchError::Network("timed out".to_owned())),
            }
        }
    }

    /// Sink whose writes always fail.
    struct FullDisk;

    impl ImageSink for FullDisk {
        fn create_dir(&self, _dir: &Path) -> io::Result<()> {
            Ok(())
        }

        fn write(&self, _path: &Path, _bytes: &[u8]) -> io::Result<()> {
            Err(io::Error::other("no space left on device"))
        }
    }

    /// Sink whose directory creation always fails.
    struct ReadOnly;

    impl ImageSink for ReadOnly {
        fn create_dir(&self, _dir: &Path) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        }

        fn write(&self, _path: &Path, _bytes: &[u8]) -> io::Result<()> {
            Ok(())
        }
    }

    fn files_in(dir: &Path) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_one_missing_one_downloaded() {
        let tmp = TempDir::new().unwrap();
        let sink = FsSink::new(tmp.path());
        let fetcher = StubFetcher::default()
            .status("https://x.test/gone.png", 404)
            .body("https://x.test/ok.png", PNG);
        let text = "First ![gone](https://x.test/gone.png) then ![ok](https://x.test/ok.png) end";

        let result = Pipeline::new(&fetcher, &sink, PipelineOptions::new(1))
            .run(text)
            .unwrap();

        assert_eq!(result.summary.succeeded, 1);
        assert_eq!(result.summary.failed, 1);
        assert_eq!(
            result.body,
            "First ![gone](https://x.test/gone.png) then ![ok](issue-1-images/image-1.png) end"
        );
        assert_eq!(files_in(&tmp.path().join("issue-1-images")), vec!["image-1.png"]);
        assert_eq!(result.summary.outcomes[0].status, OutcomeStatus::NotFound);
        assert_eq!(result.summary.outcomes[0].local_path, None);
    }

    #[test]
    fn test_extraction_only_mode() {
        let tmp = TempDir::new().unwrap();
        let sink = FsSink::new(tmp.path());
        let fetcher = StubFetcher::default().body("https://x.test/a.png", PNG);
        let text = "![a](https://x.test/a.png) <img src=\"https://x.test/b.png\">";
        let options = PipelineOptions {
            download_images: false,
            ..PipelineOptions::new(2)
        };

        let result = Pipeline::new(&fetcher, &sink, options).run(text).unwrap();

        assert_eq!(result.body, text);
        assert_eq!(result.summary.total, 2);
        assert_eq!(result.summary.skipped, 2);
        assert_eq!(result.summary.failed, 0);
        assert!(!tmp.path().join("issue-2-images").exists());
    }

    #[test]
    fn test_error_page_is_invalid_format() {
        let tmp = TempDir::new().unwrap();
        let sink = FsSink::new(tmp.path());
        let fetcher = StubFetcher::default()
            .body("https://x.test/a.png", b"<!DOCTYPE html><html>Sign in</html>");
        let text = "![a](https://x.test/a.png)";

        let result = Pipeline::new(&fetcher, &sink, PipelineOptions::new(3))
            .run(text)
            .unwrap();

        assert_eq!(result.body, text);
        assert_eq!(result.summary.outcomes[0].status, OutcomeStatus::InvalidFormat);
        assert!(files_in(&tmp.path().join("issue-3-images")).is_empty());
    }

    #[test]
    fn test_extension_from_content_not_url() {
        let tmp = TempDir::new().unwrap();
        let sink = FsSink::new(tmp.path());
        let fetcher = StubFetcher::default().body("https://x.test/photo.png", GIF);

        let result = Pipeline::new(&fetcher, &sink, PipelineOptions::new(4))
            .run("![p](https://x.test/photo.png)")
            .unwrap();

        assert_eq!(result.body, "![p](issue-4-images/image-1.gif)");
        assert_eq!(
            result.summary.outcomes[0].detected_format,
            Some(ImageFormat::Gif)
        );
    }

    #[test]
    fn test_indices_follow_extraction_order_under_concurrency() {
        let tmp = TempDir::new().unwrap();
        let sink = FsSink::new(tmp.path());
        let fetcher = StubFetcher::default()
            .slow_body("https://x.test/1", PNG, Duration::from_millis(150))
            .status("https://x.test/2", 404)
            .slow_body("https://x.test/3", JPEG, Duration::from_millis(50))
            .body("https://x.test/4", GIF);
        let text = concat!(
            "![1](https://x.test/1)\n",
            "![2](https://x.test/2)\n",
            "<img src=\"https://x.test/3\" alt=\"three\">\n",
            "![4](https://x.test/4 \"four\")",
        );
        let options = PipelineOptions {
            concurrency: 4,
            ..PipelineOptions::new(5)
        };

        let result = Pipeline::new(&fetcher, &sink, options).run(text).unwrap();

        assert_eq!(
            result.body,
            concat!(
                "![1](issue-5-images/image-1.png)\n",
                "![2](https://x.test/2)\n",
                "<img src=\"issue-5-images/image-2.jpg\" alt=\"three\">\n",
                "![4](issue-5-images/image-3.gif \"four\")",
            )
        );
        let urls: Vec<&str> = result
            .summary
            .outcomes
            .iter()
            .map(|o| o.reference.url.as_str())
            .collect();
        assert_eq!(
            urls,
            vec!["https://x.test/1", "https://x.test/2", "https://x.test/3", "https://x.test/4"]
        );
        assert_eq!(
            files_in(&tmp.path().join("issue-5-images")),
            vec!["image-1.png", "image-2.jpg", "image-3.gif"]
        );
    }

    #[test]
    fn test_network_and_expired_failures_recorded() {
        let tmp = TempDir::new().unwrap();
        let sink = FsSink::new(tmp.path());
        let fetcher = StubFetcher::default()
            .timeout("https://x.test/slow.png")
            .status("https://x.test/signed.png", 403);
        let text = "![a](https://x.test/slow.png) ![b](https://x.test/signed.png)";

        let result = Pipeline::new(&fetcher, &sink, PipelineOptions::new(6))
            .run(text)
            .unwrap();

        let statuses: Vec<OutcomeStatus> =
            result.summary.outcomes.iter().map(|o| o.status).collect();
        assert_eq!(
            statuses,
            vec![OutcomeStatus::NetworkError, OutcomeStatus::Expired]
        );
        assert_eq!(result.summary.failed, 2);
        assert_eq!(result.body, text);
    }

    #[test]
    fn test_relative_url_skipped() {
        let tmp = TempDir::new().unwrap();
        let sink = FsSink::new(tmp.path());
        let fetcher = StubFetcher::default();
        let text = "![old](issue-1-images/image-1.png)";

        let result = Pipeline::new(&fetcher, &sink, PipelineOptions::new(1))
            .run(text)
            .unwrap();

        assert_eq!(result.summary.skipped, 1);
        assert_eq!(result.body, text);
    }

    #[test]
    fn test_storage_failure_does_not_abort() {
        let fetcher = StubFetcher::default()
            .body("https://x.test/a.png", PNG)
            .body("https://x.test/b.png", PNG);
        let text = "![a](https://x.test/a.png) ![b](https://x.test/b.png)";

        let result = Pipeline::new(&fetcher, &FullDisk, PipelineOptions::new(7))
            .run(text)
            .unwrap();

        assert_eq!(result.summary.total, 2);
        assert_eq!(result.summary.by_status.storage_error, 2);
        assert_eq!(result.body, text);
    }

    #[test]
    fn test_directory_failure_is_fatal() {
        let fetcher = StubFetcher::default().body("https://x.test/a.png", PNG);

        let err = Pipeline::new(&fetcher, &ReadOnly, PipelineOptions::new(8))
            .run("![a](https://x.test/a.png)")
            .unwrap_err();

        assert!(matches!(err, PipelineError::ImageDir(_)));
    }

    #[test]
    fn test_text_without_images() {
        let tmp = TempDir::new().unwrap();
        let sink = FsSink::new(tmp.path());
        let fetcher = StubFetcher::default();

        let result = Pipeline::new(&fetcher, &sink, PipelineOptions::new(9))
            .run("no images here")
            .unwrap();

        assert_eq!(result.body, "no images here");
        assert_eq!(result.summary.total, 0);
        assert!(!tmp.path().join("issue-9-images").exists());
    }
}
