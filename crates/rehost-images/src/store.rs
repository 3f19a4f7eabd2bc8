//! Local persistence of validated images.
//!
//! Images for issue `N` live in `issue-N-images/` below the store root, named
//! by their 1-based position among successful downloads:
//!
//! ```text
//! {root}/
//! +-- issue-42-images/
//!     +-- image-1.png
//!     +-- image-2.jpg
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::format::ImageFormat;

/// Capability to create directories and write files.
///
/// Paths are relative to the sink's root.
pub trait ImageSink: Send + Sync {
    /// Create `dir` and its parents; an existing directory is not an error.
    fn create_dir(&self, dir: &Path) -> io::Result<()>;

    /// Write `bytes` to `path`, replacing any existing file.
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;
}

/// [`ImageSink`] writing to the local filesystem.
///
/// Files are written to a temporary file in the target directory and then
/// persisted into place, so readers never see a partial image.
#[derive(Debug, Clone)]
pub struct FsSink {
    root: PathBuf,
}

impl FsSink {
    /// Create a sink rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ImageSink for FsSink {
    fn create_dir(&self, dir: &Path) -> io::Result<()> {
        fs::create_dir_all(self.root.join(dir))
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let target = self.root.join(path);
        let parent = target.parent().unwrap_or(&self.root);

        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(bytes)?;
        tmp.flush()?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Failure to persist one image.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to create image directory {}: {source}", .dir.display())]
    CreateDir {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A persisted image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    /// Relative path with forward slashes, suitable for links in the text.
    pub local_path: String,
    /// Number of bytes written.
    pub bytes_written: u64,
}

/// Per-issue image store.
///
/// The issue directory is created at most once per store instance.
pub struct LocalStore<'a> {
    sink: &'a dyn ImageSink,
    issue_number: u64,
    dir_ready: Mutex<bool>,
}

impl<'a> LocalStore<'a> {
    /// Create a store for `issue_number` writing through `sink`.
    pub fn new(sink: &'a dyn ImageSink, issue_number: u64) -> Self {
        Self {
            sink,
            issue_number,
            dir_ready: Mutex::new(false),
        }
    }

    /// Directory name for this issue's images.
    #[must_use]
    pub fn dir_name(&self) -> String {
        image_dir_name(self.issue_number)
    }

    /// Create the issue directory if this store has not done so yet.
    pub fn ensure_dir(&self) -> Result<(), StoreError> {
        let mut ready = self
            .dir_ready
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if *ready {
            return Ok(());
        }

        let dir = PathBuf::from(self.dir_name());
        match self.sink.create_dir(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(source) => return Err(StoreError::CreateDir { dir, source }),
        }
        debug!("image directory {} ready", dir.display());
        *ready = true;
        Ok(())
    }

    /// Persist `bytes` as the `success_index`-th image of the issue.
    pub fn store(
        &self,
        bytes: &[u8],
        format: ImageFormat,
        success_index: usize,
    ) -> Result<StoredImage, StoreError> {
        self.ensure_dir()?;

        let local_path = format!(
            "{}/{}",
            self.dir_name(),
            image_file_name(success_index, format)
        );
        let path = PathBuf::from(&local_path);
        self.sink
            .write(&path, bytes)
            .map_err(|source| StoreError::Write { path, source })?;

        Ok(StoredImage {
            local_path,
            bytes_written: bytes.len() as u64,
        })
    }
}

/// `issue-{n}-images`
#[must_use]
pub fn image_dir_name(issue_number: u64) -> String {
    format!("issue-{issue_number}-images")
}

/// `image-{index}{ext}` with the extension of the validated format.
#[must_use]
pub fn image_file_name(success_index: usize, format: ImageFormat) -> String {
    format!("image-{success_index}{}", format.extension())
}
