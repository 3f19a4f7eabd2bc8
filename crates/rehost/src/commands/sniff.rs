//! `rehost sniff` command implementation.

use std::path::{Path, PathBuf};

use clap::Args;
use rehost_images::{ImageFormat, ValidationError, validate_image};

use crate::error::CliError;
use crate::output::{Output, Tone};

/// Arguments for the sniff command.
#[derive(Args)]
pub(crate) struct SniffArgs {
    /// Files to inspect.
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

impl SniffArgs {
    /// Execute the sniff command.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or is not a recognized image.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let mut rejected = 0usize;

        for path in &self.files {
            let bytes = std::fs::read(path)?;
            match sniff(path, &bytes) {
                Ok(format) => output.status(
                    Tone::Good,
                    &format!("{}: {format} ({})", path.display(), format.mime_type()),
                ),
                Err(err) => {
                    rejected += 1;
                    output.status(Tone::Warn, &format!("{}: {err}", path.display()));
                }
            }
        }

        if rejected > 0 {
            return Err(CliError::Validation(format!(
                "{rejected} file(s) are not recognized images"
            )));
        }
        Ok(())
    }
}

/// Validate file content, using the extension only as a sniffing hint.
fn sniff(path: &Path, bytes: &[u8]) -> Result<ImageFormat, ValidationError> {
    let hint = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(ImageFormat::from_extension);
    validate_image(bytes, hint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_ignores_misleading_extension() {
        assert_eq!(
            sniff(Path::new("photo.png"), b"GIF89a\x01\x00"),
            Ok(ImageFormat::Gif)
        );
    }

    #[test]
    fn test_sniff_rejects_error_page() {
        assert_eq!(
            sniff(Path::new("photo.png"), b"<html><body>403</body></html>"),
            Err(ValidationError::HtmlErrorPage)
        );
    }

    #[test]
    fn test_sniff_without_extension() {
        assert_eq!(
            sniff(Path::new("download"), &[0xFF, 0xD8, 0xFF, 0xDB]),
            Ok(ImageFormat::Jpeg)
        );
    }
}
