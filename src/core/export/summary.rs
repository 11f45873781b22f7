//! Run summary and reporting
//!
//! This module defines structures for tracking and reporting the results of
//! one export run: files written, partner outcomes, and errors by stage.

use crate::core::profile::ScanType;
use crate::domain::{CredentialId, LedgerId, TeamId, UploadStatus};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// A written CSV file
#[derive(Debug, Clone)]
pub struct FileReport {
    pub scan_type: ScanType,
    pub team_id: TeamId,
    pub path: PathBuf,
    pub rows: usize,
    pub bytes: u64,
}

/// Outcome of one partner delivery
#[derive(Debug, Clone)]
pub struct PartnerOutcome {
    pub team_id: TeamId,
    pub credential_id: CredentialId,
    pub status: UploadStatus,
    pub files_uploaded: usize,
    pub files_total: usize,
    pub error_summary: Option<String>,

    /// Ledger row, when one was written
    pub ledger_id: Option<LedgerId>,

    /// Scans linked to the ledger row
    pub scans_marked: u64,
}

/// Summary of an export run
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Correlates log lines of one run
    pub run_id: Uuid,

    /// Profiles that exported without error
    pub profiles_exported: usize,

    /// Profiles that failed to fetch, render or write
    pub profiles_failed: usize,

    /// Records fetched across all profiles
    pub records_fetched: usize,

    /// Files written, in the order they completed
    pub files: Vec<FileReport>,

    /// Partner deliveries, in the order they completed
    pub deliveries: Vec<PartnerOutcome>,

    /// Partners not contacted because shutdown was requested
    pub partners_skipped: usize,

    /// Whether the run was interrupted by a shutdown signal
    pub interrupted: bool,

    pub dry_run: bool,

    pub duration: Duration,

    /// Errors encountered during the run
    pub errors: Vec<RunError>,
}

impl RunSummary {
    /// Create a new empty run summary
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            profiles_exported: 0,
            profiles_failed: 0,
            records_fetched: 0,
            files: Vec::new(),
            deliveries: Vec::new(),
            partners_skipped: 0,
            interrupted: false,
            dry_run: false,
            duration: Duration::from_secs(0),
            errors: Vec::new(),
        }
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Add an error
    pub fn add_error(&mut self, error: RunError) {
        self.errors.push(error);
    }

    pub fn successful_deliveries(&self) -> usize {
        self.deliveries
            .iter()
            .filter(|d| d.status == UploadStatus::Success)
            .count()
    }

    pub fn failed_deliveries(&self) -> usize {
        self.deliveries.len() - self.successful_deliveries()
    }

    /// Check if the run was successful (no failed profile, partner or stage)
    pub fn is_successful(&self) -> bool {
        self.errors.is_empty() && self.profiles_failed == 0 && self.failed_deliveries() == 0
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            run_id = %self.run_id,
            profiles_exported = self.profiles_exported,
            profiles_failed = self.profiles_failed,
            records = self.records_fetched,
            files = self.files.len(),
            deliveries_succeeded = self.successful_deliveries(),
            deliveries_failed = self.failed_deliveries(),
            partners_skipped = self.partners_skipped,
            dry_run = self.dry_run,
            interrupted = self.interrupted,
            duration_secs = self.duration.as_secs(),
            "Export run completed"
        );

        for delivery in self.deliveries.iter().filter(|d| d.status == UploadStatus::Failure) {
            tracing::warn!(
                team_id = %delivery.team_id,
                credential_id = %delivery.credential_id,
                error = delivery.error_summary.as_deref().unwrap_or(""),
                "Partner delivery failed"
            );
        }

        if !self.errors.is_empty() {
            tracing::warn!(error_count = self.errors.len(), "Run completed with errors");
            for error in &self.errors {
                tracing::warn!(
                    error_type = ?error.error_type,
                    message = %error.message,
                    context = error.context.as_deref().unwrap_or(""),
                    "Run error"
                );
            }
        }
    }
}

/// Stage an error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunErrorType {
    /// Database connectivity
    Connection,
    /// Scan query
    Query,
    /// Row rendering
    Transformation,
    /// CSV writing
    Io,
    /// Credential loading or decryption
    Credential,
    /// SFTP delivery
    Delivery,
    /// Ledger writes
    Ledger,
    /// Configuration error
    Configuration,
}

/// Run error with context
#[derive(Debug, Clone)]
pub struct RunError {
    pub error_type: RunErrorType,
    pub message: String,

    /// Optional context (e.g., scan type, team id)
    pub context: Option<String>,
}

impl RunError {
    pub fn new(error_type: RunErrorType, message: impl Into<String>) -> Self {
        Self {
            error_type,
            message: message.into(),
            context: None,
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}
