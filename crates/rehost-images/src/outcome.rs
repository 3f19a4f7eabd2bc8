//! Per-reference outcomes and the run summary.

use serde::Serialize;

use crate::fetch::FetchError;
use crate::format::{ImageFormat, ValidationError};
use crate::reference::ImageReference;
use crate::store::{StoreError, StoredImage};

/// Result category of processing one reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    NotFound,
    Expired,
    InvalidFormat,
    NetworkError,
    StorageError,
    Skipped,
}

impl OutcomeStatus {
    /// Whether the status counts as a failure in the summary.
    #[must_use]
    pub fn is_failure(self) -> bool {
        !matches!(self, Self::Success | Self::Skipped)
    }
}

impl From<&FetchError> for OutcomeStatus {
    fn from(err: &FetchError) -> Self {
        match err {
            FetchError::NotFound { .. } => Self::NotFound,
            FetchError::Expired { .. } => Self::Expired,
            FetchError::Network(_) => Self::NetworkError,
        }
    }
}

/// Outcome of downloading, validating and storing one reference.
///
/// `local_path` is set exactly when `status` is [`OutcomeStatus::Success`].
#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    pub reference: ImageReference,
    pub status: OutcomeStatus,
    pub local_path: Option<String>,
    pub detected_format: Option<ImageFormat>,
    pub bytes_written: Option<u64>,
    /// Human-readable reason for non-success outcomes.
    pub message: Option<String>,
}

impl DownloadOutcome {
    pub(crate) fn success(
        reference: ImageReference,
        format: ImageFormat,
        stored: StoredImage,
    ) -> Self {
        Self {
            reference,
            status: OutcomeStatus::Success,
            local_path: Some(stored.local_path),
            detected_format: Some(format),
            bytes_written: Some(stored.bytes_written),
            message: None,
        }
    }

    pub(crate) fn failure(
        reference: ImageReference,
        status: OutcomeStatus,
        message: impl Into<String>,
    ) -> Self {
        debug_assert!(status != OutcomeStatus::Success);
        Self {
            reference,
            status,
            local_path: None,
            detected_format: None,
            bytes_written: None,
            message: Some(message.into()),
        }
    }

    pub(crate) fn fetch_failed(reference: ImageReference, err: &FetchError) -> Self {
        Self::failure(reference, err.into(), err.to_string())
    }

    pub(crate) fn invalid(reference: ImageReference, err: &ValidationError) -> Self {
        Self::failure(reference, OutcomeStatus::InvalidFormat, err.to_string())
    }

    pub(crate) fn store_failed(
        reference: ImageReference,
        format: ImageFormat,
        err: &StoreError,
    ) -> Self {
        Self {
            detected_format: Some(format),
            ..Self::failure(reference, OutcomeStatus::StorageError, err.to_string())
        }
    }

    pub(crate) fn skipped(reference: ImageReference, reason: &str) -> Self {
        Self::failure(reference, OutcomeStatus::Skipped, reason)
    }
}

/// Serialized form of one outcome.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeRecord<'a> {
    pub url: &'a str,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_format: Option<ImageFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_written: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'a str>,
}

impl<'a> From<&'a DownloadOutcome> for OutcomeRecord<'a> {
    fn from(outcome: &'a DownloadOutcome) -> Self {
        Self {
            url: &outcome.reference.url,
            status: outcome.status,
            local_path: outcome.local_path.as_deref(),
            detected_format: outcome.detected_format,
            bytes_written: outcome.bytes_written,
            message: outcome.message.as_deref(),
        }
    }
}

/// Count of outcomes for each status.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub success: usize,
    pub not_found: usize,
    pub expired: usize,
    pub invalid_format: usize,
    pub network_error: usize,
    pub storage_error: usize,
    pub skipped: usize,
}

impl StatusCounts {
    fn record(&mut self, status: OutcomeStatus) {
        let slot = match status {
            OutcomeStatus::Success => &mut self.success,
            OutcomeStatus::NotFound => &mut self.not_found,
            OutcomeStatus::Expired => &mut self.expired,
            OutcomeStatus::InvalidFormat => &mut self.invalid_format,
            OutcomeStatus::NetworkError => &mut self.network_error,
            OutcomeStatus::StorageError => &mut self.storage_error,
            OutcomeStatus::Skipped => &mut self.skipped,
        };
        *slot += 1;
    }
}

/// Aggregate result of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub by_status: StatusCounts,
    /// One outcome per extracted reference, in extraction order.
    pub outcomes: Vec<DownloadOutcome>,
}

impl PipelineSummary {
    /// Build the summary from outcomes in extraction order.
    #[must_use]
    pub fn from_outcomes(outcomes: Vec<DownloadOutcome>) -> Self {
        let mut by_status = StatusCounts::default();
        for outcome in &outcomes {
            by_status.record(outcome.status);
        }
        let failed = outcomes.iter().filter(|o| o.status.is_failure()).count();

        Self {
            total: outcomes.len(),
            succeeded: by_status.success,
            failed,
            skipped: by_status.skipped,
            by_status,
            outcomes,
        }
    }

    /// Whether any reference failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

impl Serialize for PipelineSummary {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let records: Vec<OutcomeRecord<'_>> = self.outcomes.iter().map(Into::into).collect();
        let mut state = serializer.serialize_struct("PipelineSummary", 6)?;
        state.serialize_field("total", &self.total)?;
        state.serialize_field("succeeded", &self.succeeded)?;
        state.serialize_field("failed", &self.failed)?;
        state.serialize_field("skipped", &self.skipped)?;
        state.serialize_field("byStatus", &self.by_status)?;
        state.serialize_field("outcomes", &records)?;
        state.end()
    }
}
