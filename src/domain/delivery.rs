//! Partner credentials and delivery outcomes

use super::errors::DeliveryError;
use super::ids::{CredentialId, TeamId};
use crate::config::SecretString;
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ledger `type` value written for every upload outcome
pub const UPLOAD_KIND: &str = "SFTPUPLOAD";

/// Decrypted SFTP credential for one partner
///
/// Secret fields are zeroized on drop and redacted from `Debug` output.
#[derive(Debug, Clone)]
pub struct SftpCredential {
    pub id: CredentialId,
    pub team_id: TeamId,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<SecretString>,
    pub ssh_key: Option<SecretString>,
    pub ssh_key_passphrase: Option<SecretString>,
    pub upload_directory: String,
    pub notification_email: Option<String>,
}

impl SftpCredential {
    /// `host:port` for logging and connection
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Outcome status of one partner delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Success,
    Failure,
}

impl UploadStatus {
    /// Value stored in the ledger `status` column
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Success => "success",
            UploadStatus::Failure => "failure",
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of delivering one partner's files
#[derive(Debug, Clone)]
pub struct UploadResult {
    pub status: UploadStatus,
    pub team_id: TeamId,
    pub error_summary: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,

    /// Files verified on the remote side
    pub files_uploaded: usize,

    /// Every error encountered, in order
    pub errors: Vec<DeliveryError>,
}

impl UploadResult {
    /// Builds the outcome from the accumulated per-file errors
    pub fn from_errors(team_id: TeamId, files_uploaded: usize, errors: Vec<DeliveryError>) -> Self {
        let now = Utc::now().naive_utc();
        let (status, error_summary) = if errors.is_empty() {
            (UploadStatus::Success, None)
        } else {
            let summary = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            (UploadStatus::Failure, Some(summary))
        };

        Self {
            status,
            team_id,
            error_summary,
            created_at: now,
            updated_at: now,
            files_uploaded,
            errors,
        }
    }

    /// Failure outcome for a partner whose delivery never started
    pub fn failure(team_id: TeamId, message: impl Into<String>) -> Self {
        let now = Utc::now().naive_utc();
        Self {
            status: UploadStatus::Failure,
            team_id,
            error_summary: Some(message.into()),
            created_at: now,
            updated_at: now,
            files_uploaded: 0,
            errors: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == UploadStatus::Success
    }

    /// Ledger kind, always [`UPLOAD_KIND`]
    pub fn kind(&self) -> &'static str {
        UPLOAD_KIND
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_result_success_without_errors() {
        let result = UploadResult::from_errors(TeamId::new(4), 2, vec![]);
        assert!(result.is_success());
        assert!(result.error_summary.is_none());
        assert_eq!(result.kind(), "SFTPUPLOAD");
    }

    #[test]
    fn test_upload_result_joins_errors() {
        let errors = vec![
            DeliveryError::Transfer {
                path: "a.csv".to_string(),
                message: "broken pipe".to_string(),
            },
            DeliveryError::Timeout {
                path: "b.csv".to_string(),
                seconds: 30,
            },
        ];
        let result = UploadResult::from_errors(TeamId::new(4), 0, errors);
        assert_eq!(result.status, UploadStatus::Failure);
        assert_eq!(
            result.error_summary.as_deref(),
            Some("Transfer of a.csv failed: broken pipe; Transfer of b.csv timed out after 30s")
        );
    }

    #[test]
    fn test_status_column_values() {
        assert_eq!(UploadStatus::Success.as_str(), "success");
        assert_eq!(UploadStatus::Failure.to_string(), "failure");
    }
}
