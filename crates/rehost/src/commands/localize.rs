//! `rehost localize` command implementation.

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use rehost_config::{CliSettings, Config};
use rehost_images::{
    FetchConfig, FsSink, HttpFetcher, OutcomeStatus, Pipeline, PipelineOptions, PipelineResult,
    PipelineSummary,
};
use serde::Serialize;
use tracing::info;

use crate::error::CliError;
use crate::output::{Output, Tone};

/// Output format for the run result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Rewritten body on stdout, colored summary on stderr.
    Text,
    /// `{ "body": ..., "summary": ... }` on stdout.
    Json,
}

/// Arguments for the localize command.
#[derive(Args)]
pub(crate) struct LocalizeArgs {
    /// Markdown/HTML file with the issue or comment body ("-" for stdin).
    #[arg(default_value = "-")]
    input: PathBuf,

    /// Issue number the images belong to.
    #[arg(short, long, env = "ISSUE_NUMBER")]
    issue: u64,

    /// Download images and rewrite references (default: enabled).
    #[arg(long, default_value = "true")]
    download_images: Option<bool>,

    /// Only extract references; report every image as skipped.
    #[arg(long, conflicts_with = "download_images")]
    no_download_images: bool,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Write the rewritten body to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory to create `issue-N-images/` in (overrides config).
    #[arg(long)]
    root: Option<PathBuf>,

    /// Request timeout in seconds (overrides config).
    #[arg(long)]
    timeout: Option<u64>,

    /// Number of concurrent downloads (overrides config).
    #[arg(long)]
    concurrency: Option<usize>,

    /// Path to configuration file (default: auto-discover rehost.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output (log every image and failure reason).
    #[arg(short, long)]
    pub verbose: bool,
}

/// JSON report written in `--format json` mode.
#[derive(Serialize)]
struct JsonReport<'a> {
    body: &'a str,
    summary: &'a PipelineSummary,
}

impl LocalizeArgs {
    /// Execute the localize command.
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be read, the configuration is
    /// invalid, or the image directory cannot be created.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            timeout_secs: self.timeout,
            concurrency: self.concurrency,
            root_dir: self.root.clone(),
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        if let Some(path) = &config.config_path {
            info!("using configuration from {}", path.display());
        }

        let text = read_input(&self.input)?;

        let fetcher = HttpFetcher::new(&FetchConfig {
            timeout: config.fetch.timeout(),
            max_redirects: config.fetch.max_redirects,
            max_bytes: config.fetch.max_bytes,
            user_agent: config.fetch.user_agent.clone(),
        });
        let sink = FsSink::new(&config.store_resolved.root_dir);
        let options = PipelineOptions {
            issue_number: self.issue,
            download_images: self.resolve_download_images(),
            concurrency: config.fetch.concurrency,
        };

        let result = Pipeline::new(&fetcher, &sink, options).run(&text)?;

        if let Some(path) = &self.output {
            std::fs::write(path, &result.body)?;
            info!("wrote rewritten body to {}", path.display());
        }

        match self.format {
            OutputFormat::Json => {
                let report = JsonReport {
                    body: &result.body,
                    summary: &result.summary,
                };
                let json = serde_json::to_string_pretty(&report)?;
                output.body(&format!("{json}\n"))?;
            }
            OutputFormat::Text => {
                if self.output.is_none() {
                    output.body(&result.body)?;
                }
                print_summary(&output, &result, self.verbose);
            }
        }

        Ok(())
    }

    fn resolve_download_images(&self) -> bool {
        !self.no_download_images && self.download_images.unwrap_or(true)
    }
}

/// Read the text body from a file or stdin.
///
/// Non-UTF-8 input is rejected rather than lossily decoded.
fn read_input(path: &Path) -> Result<String, CliError> {
    let mut raw = Vec::new();
    if path.as_os_str() == "-" {
        io::stdin().lock().read_to_end(&mut raw)?;
    } else {
        raw = std::fs::read(path)?;
    }
    String::from_utf8(raw)
        .map_err(|_| CliError::Validation(format!("{} is not valid UTF-8 text", path.display())))
}

fn status_label(status: OutcomeStatus) -> &'static str {
    match status {
        OutcomeStatus::Success => "saved",
        OutcomeStatus::NotFound => "not found",
        OutcomeStatus::Expired => "expired",
        OutcomeStatus::InvalidFormat => "invalid format",
        OutcomeStatus::NetworkError => "network error",
        OutcomeStatus::StorageError => "storage error",
        OutcomeStatus::Skipped => "skipped",
    }
}

fn summary_line(summary: &PipelineSummary) -> String {
    format!(
        "Images: {} found, {} saved, {} failed, {} skipped",
        summary.total, summary.succeeded, summary.failed, summary.skipped
    )
}

fn print_summary(output: &Output, result: &PipelineResult, verbose: bool) {
    let summary = &result.summary;
    output.status(Tone::Heading, &format!("\n{}", summary_line(summary)));

    for outcome in &summary.outcomes {
        let url = &outcome.reference.url;
        match (&outcome.local_path, outcome.status) {
            (Some(path), _) => output.status(Tone::Good, &format!("  -> {url} => {path}")),
            (None, OutcomeStatus::Skipped) if verbose => {
                let label = status_label(outcome.status);
                output.status(Tone::Plain, &format!("  -  {url} ({label})"));
            }
            (None, OutcomeStatus::Skipped) => {}
            (None, status) => {
                let reason = outcome.message.as_deref().unwrap_or_default();
                let label = status_label(status);
                output.status(Tone::Warn, &format!("  !  {url}: {label} ({reason})"));
            }
        }
    }

    if summary.has_failures() {
        output.status(
            Tone::Warn,
            &format!(
                "\nWarning: {} image(s) kept their remote URL.",
                summary.failed
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: LocalizeArgs,
    }

    fn parse(args: &[&str]) -> LocalizeArgs {
        TestCli::try_parse_from(std::iter::once("rehost").chain(args.iter().copied()))
            .unwrap()
            .args
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["--issue", "12"]);

        assert_eq!(args.issue, 12);
        assert_eq!(args.input, PathBuf::from("-"));
        assert_eq!(args.format, OutputFormat::Text);
        assert!(args.resolve_download_images());
        assert!(!args.verbose);
    }

    #[test]
    fn test_no_download_images() {
        let args = parse(&["body.md", "--issue", "3", "--no-download-images"]);
        assert!(!args.resolve_download_images());

        let args = parse(&["body.md", "--issue", "3", "--download-images", "false"]);
        assert!(!args.resolve_download_images());
    }

    #[test]
    fn test_json_format_and_overrides() {
        let args = parse(&[
            "body.md",
            "-i",
            "7",
            "--format",
            "json",
            "--timeout",
            "5",
            "--concurrency",
            "2",
        ]);

        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.timeout, Some(5));
        assert_eq!(args.concurrency, Some(2));
    }

    #[test]
    fn test_read_input_rejects_invalid_utf8() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("body.md");
        std::fs::write(&path, [0xFF, 0xFE, 0x00, 0x61]).unwrap();

        assert!(matches!(read_input(&path), Err(CliError::Validation(_))));
    }

    #[test]
    fn test_read_input_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("body.md");
        std::fs::write(&path, "![a](https://x.test/a.png)").unwrap();

        assert_eq!(read_input(&path).unwrap(), "![a](https://x.test/a.png)");
    }

    #[test]
    fn test_summary_line() {
        let summary = PipelineSummary::from_outcomes(Vec::new());
        assert_eq!(
            summary_line(&summary),
            "Images: 0 found, 0 saved, 0 failed, 0 skipped"
        );
    }
}
